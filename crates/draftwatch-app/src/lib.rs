//! Application shell for the draftwatch auction tracker.
//!
//! Wires the feed client, state store, poller, highlight tracker, and
//! notification dispatcher into one session, and manages the
//! planning/live mode machine.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod mode;

pub use app::Application;
pub use config::{AppConfig, FeedConfig};
pub use error::{AppError, AppResult};
pub use mode::{FileModeStore, InMemoryModeStore, ModeManager, ModeStore, SessionMode};
