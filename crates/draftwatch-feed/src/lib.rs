//! Transaction feed ingestion for draftwatch.
//!
//! Parses raw feed records into typed auction events and provides the
//! HTTP polling client used by the session poller.

pub mod client;
pub mod error;
pub mod parser;

pub use client::{FeedClient, HttpFeedClient};
pub use error::{FeedError, FeedResult};
pub use parser::{parse_batch, parse_record};
