//! Auction state store.
//!
//! A single-writer reducer that folds ordered events into `AuctionState`.
//! The reducer never errors: logical feed inconsistencies are recorded as
//! anomalies and bookkeeping continues. Subscribers observe committed
//! batches only, delivered synchronously on the apply path.

use draftwatch_core::{
    Anomaly, AuctionEvent, AuctionState, Clock, CompletedLot, EventType, Lot, PlayerId, RecentBid,
    StateDiff,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Store tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Ring-buffer cap for `recent_bids`.
    #[serde(default = "default_recent_bids_cap")]
    pub recent_bids_cap: usize,
    /// Ring-buffer cap for `completed_lots`.
    #[serde(default = "default_completed_lots_cap")]
    pub completed_lots_cap: usize,
    /// An open lot idle for longer than this is considered stale when a new
    /// INIT displaces it (a WON record was most likely missed).
    #[serde(default = "default_stale_lot_threshold_ms")]
    pub stale_lot_threshold_ms: i64,
    /// How long a BID for an unopened lot waits for its INIT.
    #[serde(default = "default_orphan_bid_window_ms")]
    pub orphan_bid_window_ms: i64,
    /// Bounded anomaly log length.
    #[serde(default = "default_anomaly_log_cap")]
    pub anomaly_log_cap: usize,
}

fn default_recent_bids_cap() -> usize {
    16
}

fn default_completed_lots_cap() -> usize {
    64
}

fn default_stale_lot_threshold_ms() -> i64 {
    120_000
}

fn default_orphan_bid_window_ms() -> i64 {
    45_000
}

fn default_anomaly_log_cap() -> usize {
    128
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            recent_bids_cap: default_recent_bids_cap(),
            completed_lots_cap: default_completed_lots_cap(),
            stale_lot_threshold_ms: default_stale_lot_threshold_ms(),
            orphan_bid_window_ms: default_orphan_bid_window_ms(),
            anomaly_log_cap: default_anomaly_log_cap(),
        }
    }
}

/// State-diff listener, invoked synchronously after a batch commits.
pub type DiffListener = Box<dyn Fn(&StateDiff) + Send + Sync>;

/// A BID awaiting its INIT.
#[derive(Debug, Clone)]
struct PendingBid {
    event: AuctionEvent,
    buffered_at_ms: i64,
}

#[derive(Default)]
struct StoreInner {
    state: AuctionState,
    pending_bids: Vec<PendingBid>,
    anomalies: VecDeque<Anomaly>,
}

/// Single-writer holder for the reconstructed auction state.
pub struct AuctionStore {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<StoreInner>,
    listeners: RwLock<Vec<DiffListener>>,
}

impl AuctionStore {
    pub fn new(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(StoreInner::default()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a state-diff listener.
    ///
    /// Listeners run synchronously on the apply path, after the batch has
    /// committed; delivery is at-least-once and inter-listener order is
    /// unspecified. Empty diffs are not delivered.
    pub fn subscribe(&self, listener: impl Fn(&StateDiff) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    /// Read-only snapshot of the current state.
    pub fn state(&self) -> AuctionState {
        self.inner.lock().state.clone()
    }

    pub fn watermark_ms(&self) -> i64 {
        self.inner.lock().state.watermark_ms
    }

    /// Recorded feed inconsistencies, oldest first.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.inner.lock().anomalies.iter().cloned().collect()
    }

    /// Explicit session restart: drop all state, keep subscribers.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        *inner = StoreInner::default();
        debug!("Auction store reset");
    }

    /// Fold a batch of events into the state and return what changed.
    ///
    /// Events are stable-sorted ascending by timestamp, so feed-arrival
    /// order breaks ties and any input permutation converges to the same
    /// state. Events at or below the watermark are skipped (idempotent
    /// replay protection); every applied event advances it.
    pub fn apply_batch(&self, mut events: Vec<AuctionEvent>) -> StateDiff {
        events.sort_by_key(|e| e.timestamp_ms);

        let diff = {
            let mut inner = self.inner.lock();
            let mut diff = StateDiff::default();

            self.expire_orphans(&mut inner);

            for event in events {
                if event.timestamp_ms <= inner.state.watermark_ms {
                    continue;
                }
                self.apply_event(&mut inner, event, &mut diff);
            }

            diff.watermark_ms = inner.state.watermark_ms;
            diff
        };

        if !diff.is_empty() {
            for listener in self.listeners.read().iter() {
                listener(&diff);
            }
        }

        diff
    }

    fn apply_event(&self, inner: &mut StoreInner, event: AuctionEvent, diff: &mut StateDiff) {
        inner.state.watermark_ms = event.timestamp_ms;

        match event.event_type {
            EventType::Init => self.apply_init(inner, event, diff),
            EventType::Bid => self.apply_bid(inner, event, diff),
            EventType::Won => self.apply_won(inner, event, diff),
        }
    }

    fn apply_init(&self, inner: &mut StoreInner, event: AuctionEvent, diff: &mut StateDiff) {
        // At most one lot is ever open. An open lot displaced by a new INIT
        // is closed as abandoned; when it had gone stale the feed most
        // likely dropped a WON during a gap.
        if let Some(prev) = inner.state.current_lot.take() {
            let stale =
                event.timestamp_ms - prev.last_activity_ms > self.config.stale_lot_threshold_ms;
            if stale {
                warn!(
                    player = %prev.player,
                    last_activity_ms = prev.last_activity_ms,
                    "Stale lot closed as abandoned; WON record likely missed"
                );
            } else {
                debug!(player = %prev.player, "Open lot displaced by new INIT");
            }

            let completed = CompletedLot {
                player: prev.player.clone(),
                winning_bid: prev.current_bid,
                winner: prev.current_bidder.clone(),
                closed_at_ms: event.timestamp_ms,
                abandoned: true,
            };
            self.push_completed(inner, completed.clone());
            diff.completed.push(completed);
            self.record_anomaly(
                inner,
                Anomaly::LotAbandoned {
                    player: prev.player,
                    last_activity_ms: prev.last_activity_ms,
                    stale,
                },
            );
        }

        let lot = Lot {
            player: event.player.clone(),
            opening_bid: event.amount,
            current_bid: event.amount,
            current_bidder: None,
            opened_at_ms: event.timestamp_ms,
            last_activity_ms: event.timestamp_ms,
        };
        inner.state.current_lot = Some(lot.clone());
        diff.opened = Some(lot);
        debug!(player = %event.player, opening_bid = event.amount, "Lot opened");

        self.replay_pending(inner, &event.player, diff);
    }

    fn apply_bid(&self, inner: &mut StoreInner, event: AuctionEvent, diff: &mut StateDiff) {
        let open_player = inner.state.current_lot.as_ref().map(|l| l.player.clone());

        match open_player {
            Some(ref player) if *player == event.player => {
                self.bid_on_open_lot(inner, event, diff);
            }
            _ => {
                // A bid on a lot that already closed cannot change the
                // outcome; drop it quietly.
                if inner
                    .state
                    .completed_lots
                    .iter()
                    .any(|c| c.player == event.player)
                {
                    debug!(
                        player = %event.player,
                        amount = event.amount,
                        "Dropping stale bid on closed lot"
                    );
                    return;
                }

                debug!(
                    player = %event.player,
                    amount = event.amount,
                    "Buffering bid awaiting matching INIT"
                );
                inner.pending_bids.push(PendingBid {
                    event,
                    buffered_at_ms: self.clock.now_ms(),
                });
            }
        }
    }

    fn apply_won(&self, inner: &mut StoreInner, event: AuctionEvent, diff: &mut StateDiff) {
        let matches_open = inner
            .state
            .current_lot
            .as_ref()
            .is_some_and(|l| l.player == event.player);

        let winner = if matches_open {
            // The lot may have opened earlier in this same batch; `opened`
            // only ever names the lot still open once the batch commits.
            if diff.opened.as_ref().is_some_and(|l| l.player == event.player) {
                diff.opened = None;
            }
            inner
                .state
                .current_lot
                .take()
                .and_then(|l| l.current_bidder)
                .or_else(|| Some(event.actor_id.clone()))
        } else {
            self.record_anomaly(
                inner,
                Anomaly::UnknownLotWon {
                    player: event.player.clone(),
                    amount: event.amount,
                    timestamp_ms: event.timestamp_ms,
                },
            );
            warn!(player = %event.player, "WON for a lot that is not open");
            Some(event.actor_id.clone())
        };

        let completed = CompletedLot {
            player: event.player.clone(),
            winning_bid: event.amount,
            winner,
            closed_at_ms: event.timestamp_ms,
            abandoned: false,
        };
        self.push_completed(inner, completed.clone());
        diff.completed.push(completed);
        debug!(player = %event.player, winning_bid = event.amount, "Lot won");
    }

    fn bid_on_open_lot(&self, inner: &mut StoreInner, event: AuctionEvent, diff: &mut StateDiff) {
        let Some(lot) = inner.state.current_lot.as_mut() else {
            return;
        };
        lot.current_bid = event.amount;
        lot.current_bidder = Some(event.actor_id.clone());
        lot.last_activity_ms = event.timestamp_ms;

        let bid = RecentBid {
            player: event.player,
            amount: event.amount,
            actor_id: event.actor_id,
            timestamp_ms: event.timestamp_ms,
        };
        inner.state.recent_bids.insert(0, bid.clone());
        inner.state.recent_bids.truncate(self.config.recent_bids_cap);
        diff.bids.push(bid);
    }

    /// Re-apply buffered bids once their INIT arrives.
    fn replay_pending(&self, inner: &mut StoreInner, player: &PlayerId, diff: &mut StateDiff) {
        let mut ready: Vec<PendingBid> = Vec::new();
        inner.pending_bids.retain(|p| {
            if p.event.player == *player {
                ready.push(p.clone());
                false
            } else {
                true
            }
        });

        if ready.is_empty() {
            return;
        }

        ready.sort_by_key(|p| p.event.timestamp_ms);
        debug!(player = %player, count = ready.len(), "Replaying buffered bids");
        for pending in ready {
            self.bid_on_open_lot(inner, pending.event, diff);
        }
    }

    /// Drop buffered bids whose INIT never arrived within the window.
    fn expire_orphans(&self, inner: &mut StoreInner) {
        let now_ms = self.clock.now_ms();
        let window = self.config.orphan_bid_window_ms;

        let mut expired: Vec<AuctionEvent> = Vec::new();
        inner.pending_bids.retain(|p| {
            if now_ms - p.buffered_at_ms > window {
                expired.push(p.event.clone());
                false
            } else {
                true
            }
        });

        for event in expired {
            warn!(
                player = %event.player,
                amount = event.amount,
                "Dropping orphaned bid; no matching INIT arrived"
            );
            self.record_anomaly(
                inner,
                Anomaly::OrphanedBid {
                    player: event.player,
                    amount: event.amount,
                    timestamp_ms: event.timestamp_ms,
                },
            );
        }
    }

    fn push_completed(&self, inner: &mut StoreInner, completed: CompletedLot) {
        inner.state.completed_lots.insert(0, completed);
        inner
            .state
            .completed_lots
            .truncate(self.config.completed_lots_cap);
    }

    fn record_anomaly(&self, inner: &mut StoreInner, anomaly: Anomaly) {
        inner.anomalies.push_back(anomaly);
        while inner.anomalies.len() > self.config.anomaly_log_cap {
            inner.anomalies.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftwatch_core::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> (AuctionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = AuctionStore::new(StoreConfig::default(), clock.clone());
        (store, clock)
    }

    fn event(event_type: EventType, player: &str, amount: u64, ts: i64) -> AuctionEvent {
        AuctionEvent {
            event_type,
            player: PlayerId::new(player),
            amount,
            actor_id: format!("actor_{amount}"),
            timestamp_ms: ts,
        }
    }

    #[test]
    fn test_full_lot_lifecycle() {
        let (store, _) = store();

        store.apply_batch(vec![
            event(EventType::Init, "A", 425_000, 1),
            event(EventType::Bid, "A", 1_000_000, 2),
            event(EventType::Bid, "A", 2_000_000, 3),
            event(EventType::Won, "A", 2_000_000, 4),
        ]);

        let state = store.state();
        assert!(state.current_lot.is_none());
        assert_eq!(state.completed_lots[0].player, PlayerId::new("A"));
        assert_eq!(state.completed_lots[0].winning_bid, 2_000_000);
        assert!(!state.completed_lots[0].abandoned);
        assert_eq!(state.recent_bids.len(), 2);
        assert_eq!(state.recent_bids[0].amount, 2_000_000);
        assert_eq!(state.watermark_ms, 4);
    }

    #[test]
    fn test_replay_below_watermark_is_noop() {
        let (store, _) = store();

        store.apply_batch(vec![
            event(EventType::Init, "A", 100, 1),
            event(EventType::Bid, "A", 200, 2),
        ]);
        let before = store.state();

        // Re-deliver the same records, plus one strictly older.
        store.apply_batch(vec![
            event(EventType::Init, "A", 100, 1),
            event(EventType::Bid, "A", 200, 2),
            event(EventType::Bid, "A", 999, 0),
        ]);

        assert_eq!(store.state(), before);
    }

    #[test]
    fn test_order_independence() {
        let events = vec![
            event(EventType::Init, "A", 100, 10),
            event(EventType::Bid, "A", 200, 20),
            event(EventType::Bid, "A", 300, 30),
            event(EventType::Won, "A", 300, 40),
            event(EventType::Init, "B", 50, 50),
        ];

        let (sorted_store, _) = store();
        sorted_store.apply_batch(events.clone());
        let expected = sorted_store.state();

        // A few deliberate shuffles rather than all permutations.
        for rotation in 1..events.len() {
            let mut shuffled = events.clone();
            shuffled.rotate_left(rotation);

            let (s, _) = store();
            s.apply_batch(shuffled);
            assert_eq!(s.state(), expected, "rotation {rotation}");
        }
    }

    #[test]
    fn test_ring_buffers_stay_bounded() {
        let clock = Arc::new(ManualClock::new(0));
        let store = AuctionStore::new(
            StoreConfig {
                recent_bids_cap: 3,
                completed_lots_cap: 2,
                ..Default::default()
            },
            clock,
        );

        let mut events = Vec::new();
        let mut ts = 0;
        for lot in 0..5 {
            let player = format!("p{lot}");
            ts += 1;
            events.push(event(EventType::Init, &player, 10, ts));
            for bid in 0..4 {
                ts += 1;
                events.push(event(EventType::Bid, &player, 10 + bid, ts));
            }
            ts += 1;
            events.push(event(EventType::Won, &player, 13, ts));
        }
        store.apply_batch(events);

        let state = store.state();
        assert_eq!(state.recent_bids.len(), 3);
        assert_eq!(state.completed_lots.len(), 2);
        // Most-recent-first: the last lot won sits at the front.
        assert_eq!(state.completed_lots[0].player, PlayerId::new("p4"));
    }

    #[test]
    fn test_displaced_lot_closed_as_abandoned() {
        let (store, _) = store();

        store.apply_batch(vec![
            event(EventType::Init, "A", 100, 1),
            event(EventType::Bid, "A", 250, 2),
            event(EventType::Init, "B", 50, 3),
        ]);

        let state = store.state();
        assert_eq!(state.current_lot.as_ref().unwrap().player, PlayerId::new("B"));
        assert_eq!(state.completed_lots[0].player, PlayerId::new("A"));
        assert_eq!(state.completed_lots[0].winning_bid, 250);
        assert!(state.completed_lots[0].abandoned);
        assert!(matches!(
            store.anomalies()[0],
            Anomaly::LotAbandoned { stale: false, .. }
        ));
    }

    #[test]
    fn test_stale_displacement_flagged() {
        let (store, _) = store();

        store.apply_batch(vec![event(EventType::Init, "A", 100, 1_000)]);
        // Next INIT lands far past the stale threshold.
        store.apply_batch(vec![event(EventType::Init, "B", 50, 300_000)]);

        assert!(matches!(
            store.anomalies()[0],
            Anomaly::LotAbandoned { stale: true, .. }
        ));
    }

    #[test]
    fn test_out_of_order_bid_buffered_then_replayed() {
        let (store, _) = store();

        // The bid arrives a batch before its INIT; INIT carries a later
        // timestamp (distinct feed writers).
        store.apply_batch(vec![event(EventType::Bid, "A", 500, 10)]);
        assert!(store.state().current_lot.is_none());
        assert!(store.state().recent_bids.is_empty());

        store.apply_batch(vec![event(EventType::Init, "A", 100, 12)]);

        let state = store.state();
        let lot = state.current_lot.unwrap();
        assert_eq!(lot.current_bid, 500);
        assert_eq!(lot.current_bidder.as_deref(), Some("actor_500"));
        assert_eq!(state.recent_bids.len(), 1);
        assert!(store.anomalies().is_empty());
    }

    #[test]
    fn test_orphaned_bid_expires_with_anomaly() {
        let (store, clock) = store();

        store.apply_batch(vec![event(EventType::Bid, "A", 500, 10)]);

        // Window not yet elapsed: still pending, no anomaly.
        clock.advance_ms(1_000);
        store.apply_batch(vec![]);
        assert!(store.anomalies().is_empty());

        clock.advance_ms(60_000);
        store.apply_batch(vec![]);

        assert!(matches!(store.anomalies()[0], Anomaly::OrphanedBid { .. }));
        // An INIT arriving afterwards must not resurrect the dropped bid.
        store.apply_batch(vec![event(EventType::Init, "A", 100, 100_000)]);
        assert_eq!(store.state().current_lot.unwrap().current_bid, 100);
    }

    #[test]
    fn test_stale_bid_on_closed_lot_dropped_silently() {
        let (store, _) = store();

        store.apply_batch(vec![
            event(EventType::Init, "A", 100, 1),
            event(EventType::Won, "A", 100, 2),
        ]);
        let before = store.state();

        store.apply_batch(vec![event(EventType::Bid, "A", 999, 3)]);

        let after = store.state();
        assert_eq!(after.recent_bids, before.recent_bids);
        assert_eq!(after.completed_lots, before.completed_lots);
        assert!(store.anomalies().is_empty());
        // The event was still consumed: the watermark moved past it.
        assert_eq!(after.watermark_ms, 3);
    }

    #[test]
    fn test_won_for_unknown_lot_still_recorded() {
        let (store, _) = store();

        store.apply_batch(vec![event(EventType::Won, "Z", 750, 1)]);

        let state = store.state();
        assert_eq!(state.completed_lots[0].player, PlayerId::new("Z"));
        assert!(matches!(
            store.anomalies()[0],
            Anomaly::UnknownLotWon { .. }
        ));
    }

    #[test]
    fn test_diff_opened_tracks_end_of_batch_state() {
        let (store, _) = store();

        // A lot that opens and closes inside one batch never surfaces as
        // opened to subscribers.
        let diff = store.apply_batch(vec![
            event(EventType::Init, "A", 100, 1),
            event(EventType::Won, "A", 100, 2),
        ]);
        assert!(diff.opened.is_none());
        assert_eq!(diff.completed.len(), 1);

        // A re-listing after the close keeps the final open lot visible.
        let diff = store.apply_batch(vec![
            event(EventType::Init, "B", 50, 3),
            event(EventType::Won, "B", 80, 4),
            event(EventType::Init, "B", 60, 5),
        ]);
        assert_eq!(diff.opened.unwrap().opening_bid, 60);
        assert!(store.state().current_lot.is_some());
    }

    #[test]
    fn test_subscribers_see_committed_batches_only() {
        let (store, _) = store();
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = calls.clone();
        store.subscribe(move |diff| {
            assert!(!diff.is_empty());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.apply_batch(vec![event(EventType::Init, "A", 100, 1)]);
        // Empty diff: below-watermark replay produces no notification.
        store.apply_batch(vec![event(EventType::Init, "A", 100, 1)]);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_clears_state() {
        let (store, _) = store();

        store.apply_batch(vec![event(EventType::Init, "A", 100, 1)]);
        store.reset();

        let state = store.state();
        assert!(state.current_lot.is_none());
        assert_eq!(state.watermark_ms, i64::MIN);
    }
}
