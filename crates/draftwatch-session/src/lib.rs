//! Live auction session tracking for draftwatch.
//!
//! Folds the polled transaction feed into a single consistent
//! `AuctionState` and derives ephemeral UI highlights from its diffs.

pub mod highlights;
pub mod poller;
pub mod store;

pub use highlights::{Classification, HighlightConfig, HighlightTracker};
pub use poller::{BreakerState, FetchOutcome, Poller, PollerConfig, PollerHealth};
pub use store::{AuctionStore, StoreConfig};
