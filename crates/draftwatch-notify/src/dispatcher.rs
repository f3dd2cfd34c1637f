//! Notification dispatch.
//!
//! Observes state diffs, filters candidates by the user's preferences,
//! collapses duplicates within a cycle, and rate-limits emission over a
//! sliding window. Excess candidates are dropped, never queued: a late
//! notification about a live auction is worse than none.

use crate::preference::{NotificationPreference, NotifyScope, PreferenceSource};
use draftwatch_core::{Clock, EventType, PlayerId, StateDiff, WatchlistSource};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Sliding rate-limit window.
const RATE_WINDOW_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    High,
}

/// A notification handed to the hosting application's presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCommand {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub sound: Option<String>,
}

/// Derives notification commands from state diffs.
pub struct NotificationDispatcher {
    prefs: Arc<dyn PreferenceSource>,
    watchlist: Arc<dyn WatchlistSource>,
    clock: Arc<dyn Clock>,
    /// Emission timestamps inside the current window.
    sent: Mutex<VecDeque<i64>>,
    suppressed: AtomicBool,
}

impl NotificationDispatcher {
    pub fn new(
        prefs: Arc<dyn PreferenceSource>,
        watchlist: Arc<dyn WatchlistSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prefs,
            watchlist,
            clock,
            sent: Mutex::new(VecDeque::new()),
            suppressed: AtomicBool::new(false),
        }
    }

    /// Planning mode emits nothing.
    pub fn set_suppressed(&self, suppressed: bool) {
        self.suppressed.store(suppressed, Ordering::SeqCst);
    }

    /// Derive commands for one committed state diff.
    ///
    /// Preferences and the watchlist are snapshotted once per cycle, so a
    /// live edit in the host cannot race an in-flight decision.
    pub fn on_state_change(&self, diff: &StateDiff) -> Vec<NotificationCommand> {
        if self.suppressed.load(Ordering::SeqCst) {
            return Vec::new();
        }

        let prefs = self.prefs.preferences();
        if !prefs.enabled {
            return Vec::new();
        }
        let watchlist = self.watchlist.watchlist();

        let mut seen: HashSet<(PlayerId, u64, EventType)> = HashSet::new();
        let mut commands = Vec::new();

        for bid in &diff.bids {
            let targeted = watchlist.contains(&bid.player);
            if prefs.scope == NotifyScope::TargetsOnly && !targeted {
                continue;
            }
            if bid.amount < prefs.min_amount_threshold {
                continue;
            }
            if !seen.insert((bid.player.clone(), bid.amount, EventType::Bid)) {
                continue;
            }
            if !self.admit(prefs.max_per_minute) {
                continue;
            }
            commands.push(self.bid_command(&prefs, bid.player.clone(), bid.amount, &bid.actor_id, targeted));
        }

        for completed in &diff.completed {
            // Abandoned closures are bookkeeping, not results worth a ping.
            if completed.abandoned || !watchlist.contains(&completed.player) {
                continue;
            }
            if !seen.insert((
                completed.player.clone(),
                completed.winning_bid,
                EventType::Won,
            )) {
                continue;
            }
            if !self.admit(prefs.max_per_minute) {
                continue;
            }
            commands.push(self.won_command(&prefs, completed.player.clone(), completed.winning_bid, completed.winner.as_deref()));
        }

        commands
    }

    /// Admit a candidate into the sliding window, or drop it.
    fn admit(&self, max_per_minute: usize) -> bool {
        let now_ms = self.clock.now_ms();
        let mut sent = self.sent.lock();

        while let Some(front) = sent.front() {
            if now_ms - *front >= RATE_WINDOW_MS {
                sent.pop_front();
            } else {
                break;
            }
        }

        if sent.len() >= max_per_minute {
            debug!("Notification dropped by rate limit");
            return false;
        }

        sent.push_back(now_ms);
        true
    }

    fn bid_command(
        &self,
        prefs: &NotificationPreference,
        player: PlayerId,
        amount: u64,
        actor_id: &str,
        targeted: bool,
    ) -> NotificationCommand {
        NotificationCommand {
            title: format!("Bid on {player}"),
            body: format!("{actor_id} bid ${amount} on {player}"),
            severity: if targeted { Severity::High } else { Severity::Info },
            sound: prefs.sound_enabled.then(|| "bid".to_string()),
        }
    }

    fn won_command(
        &self,
        prefs: &NotificationPreference,
        player: PlayerId,
        winning_bid: u64,
        winner: Option<&str>,
    ) -> NotificationCommand {
        let body = match winner {
            Some(winner) => format!("{player} sold to {winner} for ${winning_bid}"),
            None => format!("{player} sold for ${winning_bid}"),
        };
        NotificationCommand {
            title: format!("{player} sold"),
            body,
            severity: Severity::High,
            sound: prefs.sound_enabled.then(|| "sold".to_string()),
        }
    }
}
