//! Ephemeral UI highlight classification.
//!
//! Derives short-lived per-player classifications from state diffs, each
//! with its own TTL. Expiry is lazy: an entry past `expires_at` is invisible
//! to `classify` even before the periodic sweep physically removes it.
//! Nothing here is ever persisted.

use draftwatch_core::{Clock, PlayerId, StateDiff, WatchlistSource};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Highlight classification, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// The player currently up for bid.
    OnBlock,
    /// A bid landed on this player recently.
    RecentBid,
    /// This player's lot closed recently.
    Sold,
    /// On the user's watchlist, with no live classification.
    Target,
}

impl Classification {
    fn priority(self) -> u8 {
        match self {
            Classification::OnBlock => 3,
            Classification::RecentBid => 2,
            Classification::Sold => 1,
            Classification::Target => 0,
        }
    }
}

/// Highlight TTL and sweep cadence knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightConfig {
    #[serde(default = "default_recent_bid_ttl_ms")]
    pub recent_bid_ttl_ms: i64,
    #[serde(default = "default_sold_ttl_ms")]
    pub sold_ttl_ms: i64,
    /// Sweep cadence; independent of the poll cadence.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_recent_bid_ttl_ms() -> i64 {
    30_000
}

fn default_sold_ttl_ms() -> i64 {
    120_000
}

fn default_sweep_interval_ms() -> u64 {
    5_000
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            recent_bid_ttl_ms: default_recent_bid_ttl_ms(),
            sold_ttl_ms: default_sold_ttl_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

#[derive(Debug, Clone)]
struct HighlightEntry {
    classification: Classification,
    /// None while the classification has no expiry (an open lot).
    expires_at_ms: Option<i64>,
}

impl HighlightEntry {
    fn expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms >= at)
    }
}

/// Tracks live highlight entries per player.
pub struct HighlightTracker {
    config: HighlightConfig,
    clock: Arc<dyn Clock>,
    watchlist: Arc<dyn WatchlistSource>,
    entries: RwLock<HashMap<PlayerId, Vec<HighlightEntry>>>,
}

impl HighlightTracker {
    pub fn new(
        config: HighlightConfig,
        clock: Arc<dyn Clock>,
        watchlist: Arc<dyn WatchlistSource>,
    ) -> Self {
        Self {
            config,
            clock,
            watchlist,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn sweep_interval_ms(&self) -> u64 {
        self.config.sweep_interval_ms
    }

    /// Derive highlight changes from one committed state diff.
    pub fn on_state_change(&self, diff: &StateDiff) {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.write();

        for completed in &diff.completed {
            let slots = entries.entry(completed.player.clone()).or_default();
            slots.retain(|e| e.classification != Classification::OnBlock);
            upsert(
                slots,
                HighlightEntry {
                    classification: Classification::Sold,
                    expires_at_ms: Some(now_ms + self.config.sold_ttl_ms),
                },
            );
        }

        for bid in &diff.bids {
            upsert(
                entries.entry(bid.player.clone()).or_default(),
                HighlightEntry {
                    classification: Classification::RecentBid,
                    expires_at_ms: Some(now_ms + self.config.recent_bid_ttl_ms),
                },
            );
        }

        if let Some(lot) = &diff.opened {
            upsert(
                entries.entry(lot.player.clone()).or_default(),
                HighlightEntry {
                    classification: Classification::OnBlock,
                    expires_at_ms: None,
                },
            );
        }
    }

    /// Resolve the strongest live classification for a player.
    pub fn classify(&self, player: &PlayerId) -> Option<Classification> {
        let now_ms = self.clock.now_ms();

        let live = self.entries.read().get(player).and_then(|slots| {
            slots
                .iter()
                .filter(|e| !e.expired(now_ms))
                .max_by_key(|e| e.classification.priority())
                .map(|e| e.classification)
        });

        live.or_else(|| {
            self.watchlist
                .watchlist()
                .contains(player)
                .then_some(Classification::Target)
        })
    }

    /// Physically reclaim expired entries.
    pub fn sweep(&self) {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.write();
        let before: usize = entries.values().map(Vec::len).sum();

        entries.retain(|_, slots| {
            slots.retain(|e| !e.expired(now_ms));
            !slots.is_empty()
        });

        let after: usize = entries.values().map(Vec::len).sum();
        if after < before {
            debug!(reclaimed = before - after, "Highlight sweep");
        }
    }

    /// Drop every live entry (mode transition back to planning).
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Replace any same-classification entry, keeping one slot per class.
fn upsert(slots: &mut Vec<HighlightEntry>, entry: HighlightEntry) {
    slots.retain(|e| e.classification != entry.classification);
    slots.push(entry);
}
