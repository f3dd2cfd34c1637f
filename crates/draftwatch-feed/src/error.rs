//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Per-record failure; the caller skips the record and continues.
    #[error("Malformed payload ({reason}): {payload:?}")]
    MalformedPayload { reason: String, payload: String },

    #[error("Feed request failed: {0}")]
    Http(String),

    #[error("Feed request timed out: {0}")]
    Timeout(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeedError {
    pub fn malformed(reason: impl Into<String>, payload: &str) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
            payload: payload.to_string(),
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
