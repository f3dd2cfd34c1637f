//! Core domain types for the draftwatch auction tracker.
//!
//! This crate provides the fundamental types shared across the system:
//! - `PlayerId`: Unique identifier for a draftable player
//! - `RawTransactionRecord`, `AuctionEvent`: Feed records and their parsed form
//! - `Lot`, `AuctionState`, `StateDiff`: The reconstructed auction view
//! - `Clock`: Injectable time source for deterministic scheduling and expiry

pub mod clock;
pub mod event;
pub mod host;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{AuctionEvent, EventType, RawTransactionRecord};
pub use host::{StaticWatchlist, WatchlistSource};
pub use types::{Anomaly, AuctionState, CompletedLot, Lot, PlayerId, RecentBid, StateDiff};
