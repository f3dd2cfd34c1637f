//! HTTP client for the external transaction feed.
//!
//! The poller fetches incrementally by watermark via `since`; a feed that
//! ignores the parameter and returns full history is tolerated because the
//! store discards already-applied records.

use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use draftwatch_core::RawTransactionRecord;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default timeout for feed requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Access to the external transaction feed.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetch all records with `timestamp > since_ms` for a session.
    async fn fetch_since(
        &self,
        session_id: &str,
        since_ms: i64,
    ) -> FeedResult<Vec<RawTransactionRecord>>;
}

/// reqwest-backed feed client.
pub struct HttpFeedClient {
    client: Client,
    base_url: String,
}

impl HttpFeedClient {
    /// Create a new client against a feed base URL.
    ///
    /// Every request carries a bounded timeout; a timeout surfaces as
    /// `FeedError::Timeout` and counts as a fetch failure upstream.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| FeedError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_since(
        &self,
        session_id: &str,
        since_ms: i64,
    ) -> FeedResult<Vec<RawTransactionRecord>> {
        let url = format!("{}/sessions/{}/transactions", self.base_url, session_id);
        // The initial watermark predates the epoch; the feed only understands
        // non-negative bounds.
        let since = since_ms.max(0);

        debug!(url = %url, since_ms = since, "Fetching feed transactions");

        let response = self
            .client
            .get(&url)
            .query(&[("since", since.to_string())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Timeout(e.to_string())
                } else {
                    FeedError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Http(format!("HTTP {status}: {body}")));
        }

        let records: Vec<RawTransactionRecord> = response
            .json()
            .await
            .map_err(|e| FeedError::Http(format!("failed to decode feed response: {e}")))?;

        debug!(count = records.len(), "Feed transactions received");
        Ok(records)
    }
}
