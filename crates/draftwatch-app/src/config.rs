//! Application configuration.

use crate::error::{AppError, AppResult};
use draftwatch_notify::NotificationPreference;
use draftwatch_session::{HighlightConfig, PollerConfig, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Feed endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Auction session to follow.
    #[serde(default = "default_session_id")]
    pub session_id: String,
    /// Per-request timeout; a timeout counts as a fetch failure.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://feed.draftwatch.dev/api".to_string()
}

fn default_session_id() -> String {
    "default".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_id: default_session_id(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Seed watchlist for standalone runs.
    #[serde(default)]
    pub watchlist: Vec<String>,
    /// Where the current session mode is persisted across reloads.
    #[serde(default = "default_mode_path")]
    pub mode_path: String,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub highlights: HighlightConfig,
    /// Seed preferences for standalone runs; a hosting application
    /// replaces these with its own live source.
    #[serde(default)]
    pub notifications: NotificationPreference,
}

fn default_mode_path() -> String {
    ".draftwatch-mode".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watchlist: Vec::new(),
            mode_path: default_mode_path(),
            feed: FeedConfig::default(),
            poller: PollerConfig::default(),
            store: StoreConfig::default(),
            highlights: HighlightConfig::default(),
            notifications: NotificationPreference::default(),
        }
    }
}

impl AppConfig {
    /// Load from `DRAFTWATCH_CONFIG` or the default path, falling back to
    /// defaults when no file exists.
    pub fn load() -> AppResult<Self> {
        let config_path = std::env::var("DRAFTWATCH_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}
