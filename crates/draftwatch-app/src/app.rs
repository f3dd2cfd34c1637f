//! Application wiring.
//!
//! Builds the store, poller, highlight tracker, and dispatcher, subscribes
//! the derivation components to the store, and exposes the read surface the
//! hosting application consumes: state snapshots, highlight classification,
//! poller health, and a channel of notification commands.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::mode::{ModeManager, ModeStore, SessionMode};
use draftwatch_core::{AuctionState, Clock, PlayerId, StateDiff, WatchlistSource};
use draftwatch_feed::FeedClient;
use draftwatch_notify::{NotificationCommand, NotificationDispatcher, PreferenceSource};
use draftwatch_session::{
    AuctionStore, Classification, FetchOutcome, HighlightTracker, Poller, PollerHealth,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Fully wired draftwatch session.
pub struct Application<C: FeedClient> {
    store: Arc<AuctionStore>,
    poller: Arc<Poller<C>>,
    highlights: Arc<HighlightTracker>,
    mode: Arc<ModeManager<C>>,
}

impl<C: FeedClient + 'static> Application<C> {
    /// Wire all components for one session.
    ///
    /// Notification commands flow out through `command_tx`; a full channel
    /// drops the command rather than stalling the apply path.
    pub fn new(
        config: &AppConfig,
        client: Arc<C>,
        watchlist: Arc<dyn WatchlistSource>,
        preferences: Arc<dyn PreferenceSource>,
        mode_store: Arc<dyn ModeStore>,
        clock: Arc<dyn Clock>,
        command_tx: mpsc::Sender<NotificationCommand>,
    ) -> Self {
        let store = Arc::new(AuctionStore::new(config.store.clone(), clock.clone()));
        let poller = Arc::new(Poller::new(
            config.poller.clone(),
            config.feed.session_id.clone(),
            client,
            store.clone(),
            clock.clone(),
        ));
        let highlights = Arc::new(HighlightTracker::new(
            config.highlights.clone(),
            clock.clone(),
            watchlist.clone(),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(preferences, watchlist, clock));
        let mode = Arc::new(ModeManager::new(
            poller.clone(),
            highlights.clone(),
            dispatcher.clone(),
            mode_store,
        ));

        {
            let highlights = highlights.clone();
            let dispatcher = dispatcher.clone();
            store.subscribe(move |diff| {
                highlights.on_state_change(diff);
                for command in dispatcher.on_state_change(diff) {
                    if let Err(e) = command_tx.try_send(command) {
                        warn!(error = %e, "Dropping notification command; host not keeping up");
                    }
                }
            });
        }

        Self {
            store,
            poller,
            highlights,
            mode,
        }
    }

    /// Read-only snapshot of the auction.
    pub fn state(&self) -> AuctionState {
        self.store.state()
    }

    /// Register an additional state-diff listener (e.g. a rendering layer).
    pub fn subscribe(&self, listener: impl Fn(&StateDiff) + Send + Sync + 'static) {
        self.store.subscribe(listener);
    }

    /// Poller health for the host's status indicator.
    pub fn health(&self) -> PollerHealth {
        self.poller.health()
    }

    /// Strongest live highlight for a player, if any.
    pub fn classify(&self, player: &PlayerId) -> Option<Classification> {
        self.highlights.classify(player)
    }

    pub fn mode(&self) -> SessionMode {
        self.mode.mode()
    }

    pub fn enter_live(&self) -> AppResult<()> {
        self.mode.enter_live()
    }

    pub fn enter_planning(&self) -> AppResult<()> {
        self.mode.enter_planning()
    }

    /// Restore the persisted mode; a live session resumes polling.
    pub fn restore_mode(&self) -> AppResult<SessionMode> {
        self.mode.restore()
    }

    /// One manual fetch cycle, regardless of mode or breaker state.
    pub async fn refresh(&self) -> FetchOutcome {
        self.poller.refresh().await
    }

    /// Run the cooperative session loop until shutdown.
    ///
    /// The highlight sweep runs on its own cadence here, independent of
    /// the poller's schedule.
    pub async fn run(&self) -> AppResult<()> {
        let mut sweep = tokio::time::interval(Duration::from_millis(
            self.highlights.sweep_interval_ms(),
        ));
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = sweep.tick() => self.highlights.sweep(),
            }
        }

        self.poller.stop();
        Ok(())
    }
}
