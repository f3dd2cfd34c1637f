//! User notification preferences.
//!
//! Owned and mutated by the hosting application; read here as point-in-time
//! snapshots through `PreferenceSource`.

use serde::{Deserialize, Serialize};

/// Which bids warrant a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotifyScope {
    /// Every bid.
    All,
    /// Only bids on watchlisted players.
    TargetsOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub sound_enabled: bool,
    #[serde(default = "default_scope")]
    pub scope: NotifyScope,
    /// Bids below this amount are ignored (WON notifications bypass it).
    #[serde(default)]
    pub min_amount_threshold: u64,
    /// Sliding-window emission cap.
    #[serde(default = "default_max_per_minute")]
    pub max_per_minute: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_scope() -> NotifyScope {
    NotifyScope::All
}

fn default_max_per_minute() -> usize {
    10
}

impl Default for NotificationPreference {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sound_enabled: false,
            scope: default_scope(),
            min_amount_threshold: 0,
            max_per_minute: default_max_per_minute(),
        }
    }
}

/// Read-only snapshot access to the user's preferences.
pub trait PreferenceSource: Send + Sync {
    fn preferences(&self) -> NotificationPreference;
}

/// Fixed preferences, for tests and single-shot tools.
#[derive(Debug, Clone, Default)]
pub struct StaticPreferences(pub NotificationPreference);

impl PreferenceSource for StaticPreferences {
    fn preferences(&self) -> NotificationPreference {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = NotificationPreference::default();
        assert!(prefs.enabled);
        assert!(!prefs.sound_enabled);
        assert_eq!(prefs.scope, NotifyScope::All);
        assert_eq!(prefs.min_amount_threshold, 0);
        assert_eq!(prefs.max_per_minute, 10);
    }

    #[test]
    fn test_scope_wire_names() {
        assert_eq!(
            serde_json::to_string(&NotifyScope::TargetsOnly).unwrap(),
            "\"targetsOnly\""
        );
        assert_eq!(serde_json::to_string(&NotifyScope::All).unwrap(), "\"all\"");
    }
}
