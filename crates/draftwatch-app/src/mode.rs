//! Session mode management.
//!
//! Two states: planning (roster prep, feed idle) and live (auction under
//! way, polling active). The current mode survives reloads through a
//! `ModeStore` owned by the hosting application; on cold start the last
//! mode is restored and a live session resumes polling immediately.

use crate::error::{AppError, AppResult};
use draftwatch_feed::FeedClient;
use draftwatch_notify::NotificationDispatcher;
use draftwatch_session::{HighlightTracker, Poller};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Planning,
    Live,
}

/// Mode persistence, owned by the hosting application.
pub trait ModeStore: Send + Sync {
    fn load(&self) -> AppResult<Option<SessionMode>>;
    fn save(&self, mode: SessionMode) -> AppResult<()>;
}

/// In-memory mode store for tests and embedded hosts.
#[derive(Debug, Default)]
pub struct InMemoryModeStore(Mutex<Option<SessionMode>>);

impl ModeStore for InMemoryModeStore {
    fn load(&self) -> AppResult<Option<SessionMode>> {
        Ok(*self.0.lock())
    }

    fn save(&self, mode: SessionMode) -> AppResult<()> {
        *self.0.lock() = Some(mode);
        Ok(())
    }
}

/// File-backed mode store used by the standalone binary.
#[derive(Debug)]
pub struct FileModeStore {
    path: PathBuf,
}

impl FileModeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModeStore for FileModeStore {
    fn load(&self) -> AppResult<Option<SessionMode>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        match content.trim() {
            "live" => Ok(Some(SessionMode::Live)),
            "planning" => Ok(Some(SessionMode::Planning)),
            other => Err(AppError::ModeStore(format!("unrecognized mode {other:?}"))),
        }
    }

    fn save(&self, mode: SessionMode) -> AppResult<()> {
        let tag = match mode {
            SessionMode::Live => "live",
            SessionMode::Planning => "planning",
        };
        std::fs::write(&self.path, tag)?;
        Ok(())
    }
}

/// Drives the planning/live state machine.
pub struct ModeManager<C: FeedClient> {
    mode: Mutex<SessionMode>,
    poller: Arc<Poller<C>>,
    highlights: Arc<HighlightTracker>,
    dispatcher: Arc<NotificationDispatcher>,
    store: Arc<dyn ModeStore>,
}

impl<C: FeedClient + 'static> ModeManager<C> {
    pub fn new(
        poller: Arc<Poller<C>>,
        highlights: Arc<HighlightTracker>,
        dispatcher: Arc<NotificationDispatcher>,
        store: Arc<dyn ModeStore>,
    ) -> Self {
        // Planning until told otherwise; emission stays off.
        dispatcher.set_suppressed(true);
        Self {
            mode: Mutex::new(SessionMode::Planning),
            poller,
            highlights,
            dispatcher,
            store,
        }
    }

    pub fn mode(&self) -> SessionMode {
        *self.mode.lock()
    }

    /// Start polling and enable highlight/notification emission.
    pub fn enter_live(&self) -> AppResult<()> {
        {
            let mut mode = self.mode.lock();
            if *mode == SessionMode::Live {
                debug!("Already live");
                return Ok(());
            }
            *mode = SessionMode::Live;
        }

        self.dispatcher.set_suppressed(false);
        self.poller.start();
        self.store.save(SessionMode::Live)?;
        info!("Session live; polling started");
        Ok(())
    }

    /// Stop polling, clear highlights, suppress notifications.
    pub fn enter_planning(&self) -> AppResult<()> {
        {
            let mut mode = self.mode.lock();
            if *mode == SessionMode::Planning {
                debug!("Already planning");
                return Ok(());
            }
            *mode = SessionMode::Planning;
        }

        self.poller.stop();
        self.highlights.clear();
        self.dispatcher.set_suppressed(true);
        self.store.save(SessionMode::Planning)?;
        info!("Session back to planning");
        Ok(())
    }

    /// Restore the persisted mode on cold start.
    pub fn restore(&self) -> AppResult<SessionMode> {
        let restored = self.store.load()?.unwrap_or_default();
        info!(?restored, "Restoring session mode");
        if restored == SessionMode::Live {
            self.enter_live()?;
        }
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use draftwatch_core::{
        ManualClock, PlayerId, RawTransactionRecord, RecentBid, StateDiff, StaticWatchlist,
    };
    use draftwatch_feed::FeedResult;
    use draftwatch_notify::StaticPreferences;
    use draftwatch_session::{
        AuctionStore, Classification, HighlightConfig, PollerConfig, StoreConfig,
    };

    struct EmptyFeed;

    #[async_trait]
    impl FeedClient for EmptyFeed {
        async fn fetch_since(
            &self,
            _session_id: &str,
            _since_ms: i64,
        ) -> FeedResult<Vec<RawTransactionRecord>> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        manager: ModeManager<EmptyFeed>,
        highlights: Arc<HighlightTracker>,
        dispatcher: Arc<NotificationDispatcher>,
        store: Arc<InMemoryModeStore>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(0));
        let auction = Arc::new(AuctionStore::new(StoreConfig::default(), clock.clone()));
        let poller = Arc::new(Poller::new(
            PollerConfig::default(),
            "s",
            Arc::new(EmptyFeed),
            auction,
            clock.clone(),
        ));
        let highlights = Arc::new(HighlightTracker::new(
            HighlightConfig::default(),
            clock.clone(),
            Arc::new(StaticWatchlist::default()),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(StaticPreferences::default()),
            Arc::new(StaticWatchlist::default()),
            clock,
        ));
        let store = Arc::new(InMemoryModeStore::default());
        let manager = ModeManager::new(
            poller,
            highlights.clone(),
            dispatcher.clone(),
            store.clone(),
        );
        Fixture {
            manager,
            highlights,
            dispatcher,
            store,
        }
    }

    fn bid_diff(player: &str) -> StateDiff {
        StateDiff {
            bids: vec![RecentBid {
                player: PlayerId::new(player),
                amount: 100,
                actor_id: "m1".to_string(),
                timestamp_ms: 1,
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_starts_in_planning_with_emission_suppressed() {
        let f = fixture();
        assert_eq!(f.manager.mode(), SessionMode::Planning);
        assert!(f.dispatcher.on_state_change(&bid_diff("A")).is_empty());
    }

    #[tokio::test]
    async fn test_enter_live_persists_and_enables_emission() {
        let f = fixture();
        f.manager.enter_live().unwrap();

        assert_eq!(f.manager.mode(), SessionMode::Live);
        assert_eq!(f.store.load().unwrap(), Some(SessionMode::Live));
        assert_eq!(f.dispatcher.on_state_change(&bid_diff("A")).len(), 1);
    }

    #[tokio::test]
    async fn test_enter_planning_clears_highlights_and_suppresses() {
        let f = fixture();
        f.manager.enter_live().unwrap();
        f.highlights.on_state_change(&bid_diff("A"));
        assert_eq!(
            f.highlights.classify(&PlayerId::new("A")),
            Some(Classification::RecentBid)
        );

        f.manager.enter_planning().unwrap();

        assert_eq!(f.manager.mode(), SessionMode::Planning);
        assert_eq!(f.store.load().unwrap(), Some(SessionMode::Planning));
        assert_eq!(f.highlights.classify(&PlayerId::new("A")), None);
        assert!(f.dispatcher.on_state_change(&bid_diff("B")).is_empty());
    }

    #[tokio::test]
    async fn test_restore_resumes_live_session() {
        let f = fixture();
        f.store.save(SessionMode::Live).unwrap();

        let restored = f.manager.restore().unwrap();

        assert_eq!(restored, SessionMode::Live);
        assert_eq!(f.manager.mode(), SessionMode::Live);
    }

    #[tokio::test]
    async fn test_restore_defaults_to_planning() {
        let f = fixture();
        let restored = f.manager.restore().unwrap();
        assert_eq!(restored, SessionMode::Planning);
        assert_eq!(f.manager.mode(), SessionMode::Planning);
    }

    #[test]
    fn test_file_mode_store_round_trip() {
        let dir = std::env::temp_dir().join("draftwatch-mode-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mode");
        let store = FileModeStore::new(&path);

        assert_eq!(store.load().unwrap(), None);
        store.save(SessionMode::Live).unwrap();
        assert_eq!(store.load().unwrap(), Some(SessionMode::Live));
        store.save(SessionMode::Planning).unwrap();
        assert_eq!(store.load().unwrap(), Some(SessionMode::Planning));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_file_mode_store_rejects_garbage() {
        let dir = std::env::temp_dir().join("draftwatch-mode-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mode-garbage");
        std::fs::write(&path, "livid").unwrap();

        let store = FileModeStore::new(&path);
        assert!(store.load().is_err());

        std::fs::remove_file(&path).ok();
    }
}
