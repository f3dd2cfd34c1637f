//! Feed transaction records and their parsed form.
//!
//! The external feed delivers `RawTransactionRecord`s; the feed crate parses
//! each into an `AuctionEvent`. Both are immutable once constructed.

use crate::types::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction type on the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A new lot opened for bidding.
    #[serde(rename = "INIT")]
    Init,
    /// A bid was placed on a lot.
    #[serde(rename = "BID")]
    Bid,
    /// A lot was won and closed.
    #[serde(rename = "WON")]
    Won,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Init => write!(f, "INIT"),
            EventType::Bid => write!(f, "BID"),
            EventType::Won => write!(f, "WON"),
        }
    }
}

/// A raw record as delivered by the transaction feed.
///
/// The payload is an opaque delimited string until parsed; its shape is
/// validated by the feed crate, never trusted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransactionRecord {
    #[serde(rename = "eventType")]
    pub event_type: EventType,
    #[serde(rename = "actorId")]
    pub actor_id: String,
    pub payload: String,
    /// Feed timestamp, milliseconds since epoch.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

/// A parsed, validated auction event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionEvent {
    pub event_type: EventType,
    pub player: PlayerId,
    /// Bid or opening amount in whole dollars.
    pub amount: u64,
    pub actor_id: String,
    pub timestamp_ms: i64,
}
