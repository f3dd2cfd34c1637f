//! Notification derivation for draftwatch.
//!
//! Turns committed state diffs into preference-filtered, rate-limited
//! notification commands for the hosting application to display.

pub mod dispatcher;
pub mod preference;

pub use dispatcher::{NotificationCommand, NotificationDispatcher, Severity};
pub use preference::{
    NotificationPreference, NotifyScope, PreferenceSource, StaticPreferences,
};
