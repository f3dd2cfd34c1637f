//! Reconstructed auction state.
//!
//! `AuctionState` is the single-writer view folded from ordered events by the
//! session store. All snapshot types here are cheap to clone; readers only
//! ever see a committed snapshot, never a partially-applied batch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a draftable player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The player currently up for bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub player: PlayerId,
    pub opening_bid: u64,
    pub current_bid: u64,
    /// None until the first bid lands.
    pub current_bidder: Option<String>,
    pub opened_at_ms: i64,
    pub last_activity_ms: i64,
}

/// One entry in the recent-bid ring buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentBid {
    pub player: PlayerId,
    pub amount: u64,
    pub actor_id: String,
    pub timestamp_ms: i64,
}

/// A closed lot, won or abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedLot {
    pub player: PlayerId,
    pub winning_bid: u64,
    /// None when the lot was abandoned with no bids, or the feed never
    /// named a winner.
    pub winner: Option<String>,
    pub closed_at_ms: i64,
    /// True when the lot was implicitly closed because a new lot opened
    /// without an intervening WON record.
    pub abandoned: bool,
}

/// Snapshot of the reconstructed auction.
///
/// `recent_bids` and `completed_lots` are most-recent-first and bounded;
/// oldest entries are evicted first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionState {
    pub current_lot: Option<Lot>,
    pub recent_bids: Vec<RecentBid>,
    pub completed_lots: Vec<CompletedLot>,
    /// Events at or below this timestamp are guaranteed already applied.
    pub watermark_ms: i64,
}

impl Default for AuctionState {
    fn default() -> Self {
        Self {
            current_lot: None,
            recent_bids: Vec::new(),
            completed_lots: Vec::new(),
            watermark_ms: i64::MIN,
        }
    }
}

/// What one committed apply batch changed.
///
/// Fed to the highlight tracker and notification dispatcher; empty diffs
/// are not delivered to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    /// The lot that is open after this batch, if it opened in this batch.
    pub opened: Option<Lot>,
    /// Bids applied to the open lot, in application order.
    pub bids: Vec<RecentBid>,
    /// Lots closed in this batch, won or abandoned, in application order.
    pub completed: Vec<CompletedLot>,
    /// Watermark after the batch committed.
    pub watermark_ms: i64,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.opened.is_none() && self.bids.is_empty() && self.completed.is_empty()
    }
}

/// A logical feed inconsistency, recorded but never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anomaly {
    /// A BID referenced a lot that never opened within the buffering window.
    OrphanedBid {
        player: PlayerId,
        amount: u64,
        timestamp_ms: i64,
    },
    /// A WON referenced a player with no open lot.
    UnknownLotWon {
        player: PlayerId,
        amount: u64,
        timestamp_ms: i64,
    },
    /// An open lot was implicitly closed because a new one opened.
    LotAbandoned {
        player: PlayerId,
        last_activity_ms: i64,
        /// True when the lot had already gone stale, i.e. a WON record was
        /// most likely missed during a feed gap.
        stale: bool,
    },
}
