//! Bridge traits to the hosting application.
//!
//! The host owns the user's watchlist and mutates it freely; this side only
//! ever reads point-in-time snapshots, so a live edit can never race an
//! in-flight classification or dispatch cycle.

use crate::types::PlayerId;
use std::collections::HashSet;

/// Read-only snapshot access to the user's player watchlist.
pub trait WatchlistSource: Send + Sync {
    fn watchlist(&self) -> HashSet<PlayerId>;
}

/// Fixed watchlist, for tests and single-shot tools.
#[derive(Debug, Default, Clone)]
pub struct StaticWatchlist(pub HashSet<PlayerId>);

impl StaticWatchlist {
    pub fn of(players: &[&str]) -> Self {
        Self(players.iter().map(|p| PlayerId::new(*p)).collect())
    }
}

impl WatchlistSource for StaticWatchlist {
    fn watchlist(&self) -> HashSet<PlayerId> {
        self.0.clone()
    }
}
