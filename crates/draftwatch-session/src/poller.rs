//! Feed polling with backoff and a circuit breaker.
//!
//! The poller owns the only write path into the store: it fetches records
//! past the watermark, parses them, and applies the survivors in timestamp
//! order. Fetch failures back off exponentially and eventually open the
//! breaker, which halts the schedule; a manual `refresh()` can probe the
//! feed and close it again.

use crate::store::AuctionStore;
use draftwatch_core::{Clock, StateDiff};
use draftwatch_feed::{parse_batch, FeedClient};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Poller tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Scheduled fetch interval while healthy.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Base retry delay after the first failure.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Retry delay ceiling.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Consecutive failures that open the breaker.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

fn default_poll_interval_ms() -> u64 {
    15_000
}

fn default_base_backoff_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_max_failures() -> u32 {
    3
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_failures: default_max_failures(),
        }
    }
}

/// Breaker state. Transitions only `Closed → Open → HalfOpen → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Poller health, exposed to the hosting application's status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerHealth {
    pub breaker: BreakerState,
    pub consecutive_failures: u32,
    /// When the next scheduled attempt is allowed, if backing off.
    pub next_allowed_attempt_ms: Option<i64>,
    pub last_success_ms: Option<i64>,
}

/// Result of one fetch cycle.
///
/// Failures surface here and through `health()`; they are never thrown
/// across the public API.
#[derive(Debug)]
pub enum FetchOutcome {
    Applied {
        fetched: usize,
        skipped_malformed: usize,
        diff: StateDiff,
    },
    Failed {
        reason: String,
    },
}

struct HealthInner {
    breaker: BreakerState,
    consecutive_failures: u32,
    next_allowed_attempt_ms: Option<i64>,
    last_success_ms: Option<i64>,
}

struct SchedState {
    task: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
    /// True between `start()` and `stop()`; an open breaker halts the loop
    /// without flipping this, so a successful manual refresh can resume.
    enabled: bool,
}

/// Scheduled feed poller.
pub struct Poller<C: FeedClient> {
    config: PollerConfig,
    session_id: String,
    client: Arc<C>,
    store: Arc<AuctionStore>,
    clock: Arc<dyn Clock>,
    health: Mutex<HealthInner>,
    sched: Mutex<SchedState>,
    /// Set while the scheduled loop task is alive.
    loop_active: AtomicBool,
    /// Serializes fetch cycles (scheduled vs. manual).
    fetch_gate: tokio::sync::Mutex<()>,
}

impl<C: FeedClient + 'static> Poller<C> {
    pub fn new(
        config: PollerConfig,
        session_id: impl Into<String>,
        client: Arc<C>,
        store: Arc<AuctionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            session_id: session_id.into(),
            client,
            store,
            clock,
            health: Mutex::new(HealthInner {
                breaker: BreakerState::Closed,
                consecutive_failures: 0,
                next_allowed_attempt_ms: None,
                last_success_ms: None,
            }),
            sched: Mutex::new(SchedState {
                task: None,
                stop_tx: None,
                enabled: false,
            }),
            loop_active: AtomicBool::new(false),
            fetch_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn health(&self) -> PollerHealth {
        let h = self.health.lock();
        PollerHealth {
            breaker: h.breaker,
            consecutive_failures: h.consecutive_failures,
            next_allowed_attempt_ms: h.next_allowed_attempt_ms,
            last_success_ms: h.last_success_ms,
        }
    }

    /// Begin scheduled polling. The first fetch fires immediately.
    pub fn start(self: &Arc<Self>) {
        let mut sched = self.sched.lock();
        sched.enabled = true;
        if self.loop_active.load(Ordering::SeqCst) {
            debug!("Poller already running");
            return;
        }
        self.spawn_loop(&mut sched);
        info!(
            session = %self.session_id,
            interval_ms = self.config.poll_interval_ms,
            "Poller started"
        );
    }

    /// Cancel the next scheduled fetch. An in-flight fetch completes and
    /// its batch is still applied.
    pub fn stop(&self) {
        let mut sched = self.sched.lock();
        sched.enabled = false;
        if let Some(tx) = sched.stop_tx.take() {
            let _ = tx.send(true);
        }
        sched.task = None;
        info!("Poller stopped");
    }

    /// One manual fetch cycle, allowed even while the breaker is open.
    ///
    /// Success resets the breaker and resumes the schedule if polling had
    /// halted; failure while probing re-opens it.
    pub async fn refresh(self: &Arc<Self>) -> FetchOutcome {
        {
            let mut h = self.health.lock();
            if h.breaker == BreakerState::Open {
                info!("Manual refresh probing open breaker");
                h.breaker = BreakerState::HalfOpen;
            }
        }

        let outcome = self.fetch_once().await;
        if matches!(outcome, FetchOutcome::Applied { .. }) {
            self.resume_if_halted();
        }
        outcome
    }

    /// Fetch, parse, sort, and apply one batch; update breaker accounting.
    async fn fetch_once(&self) -> FetchOutcome {
        let _gate = self.fetch_gate.lock().await;

        let since_ms = self.store.watermark_ms();
        match self.client.fetch_since(&self.session_id, since_ms).await {
            Ok(records) => {
                let fetched = records.len();
                let (events, skipped_malformed) = parse_batch(&records);
                // apply_batch sorts ascending by timestamp before folding.
                let diff = self.store.apply_batch(events);
                self.record_success();
                debug!(fetched, skipped_malformed, "Fetch cycle applied");
                FetchOutcome::Applied {
                    fetched,
                    skipped_malformed,
                    diff,
                }
            }
            Err(e) => {
                let reason = e.to_string();
                self.record_failure(&reason);
                FetchOutcome::Failed { reason }
            }
        }
    }

    fn record_success(&self) {
        let mut h = self.health.lock();
        if h.breaker != BreakerState::Closed {
            info!("Feed recovered; breaker closed");
        }
        h.breaker = BreakerState::Closed;
        h.consecutive_failures = 0;
        h.next_allowed_attempt_ms = None;
        h.last_success_ms = Some(self.clock.now_ms());
    }

    fn record_failure(&self, reason: &str) {
        let mut h = self.health.lock();
        h.consecutive_failures += 1;
        let delay_ms = self.backoff_ms(h.consecutive_failures);
        h.next_allowed_attempt_ms = Some(self.clock.now_ms() + delay_ms as i64);

        if h.breaker == BreakerState::HalfOpen {
            h.breaker = BreakerState::Open;
            warn!(reason, "Probe failed; breaker re-opened");
        } else if h.consecutive_failures >= self.config.max_failures {
            h.breaker = BreakerState::Open;
            warn!(
                reason,
                failures = h.consecutive_failures,
                "Feed unavailable; breaker opened and scheduled polling halted"
            );
        } else {
            warn!(
                reason,
                failures = h.consecutive_failures,
                retry_in_ms = delay_ms,
                "Fetch failed; backing off"
            );
        }
    }

    /// `min(base × 2^(n−1), max)` for the n-th consecutive failure.
    fn backoff_ms(&self, failures: u32) -> u64 {
        let exp = failures.saturating_sub(1).min(16);
        self.config
            .base_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.config.max_backoff_ms)
    }

    /// Restart the scheduled loop after a successful manual refresh, if
    /// `start()` is still in effect but the breaker had halted the loop.
    fn resume_if_halted(self: &Arc<Self>) {
        let mut sched = self.sched.lock();
        if sched.enabled && !self.loop_active.load(Ordering::SeqCst) {
            info!("Resuming scheduled polling");
            self.spawn_loop(&mut sched);
        }
    }

    fn spawn_loop(self: &Arc<Self>, sched: &mut SchedState) {
        let (stop_tx, stop_rx) = watch::channel(false);
        sched.stop_tx = Some(stop_tx);
        self.loop_active.store(true, Ordering::SeqCst);

        let poller = Arc::clone(self);
        sched.task = Some(tokio::spawn(async move {
            poller.run_loop(stop_rx).await;
            poller.loop_active.store(false, Ordering::SeqCst);
        }));
    }

    async fn run_loop(self: &Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        let mut next_delay = Duration::ZERO;

        loop {
            if *stop_rx.borrow() {
                break;
            }

            // Cancellation races only the wait for the next fetch; once a
            // fetch begins it always runs to completion.
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(next_delay) => {}
            }

            self.fetch_once().await;

            let health = self.health.lock();
            match health.breaker {
                BreakerState::Open => {
                    debug!("Scheduled loop halting on open breaker");
                    break;
                }
                _ if health.consecutive_failures > 0 => {
                    next_delay = Duration::from_millis(self.backoff_ms(health.consecutive_failures));
                }
                _ => next_delay = Duration::from_millis(self.config.poll_interval_ms),
            }
        }
    }
}
