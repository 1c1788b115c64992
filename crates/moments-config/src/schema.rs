//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Live session eligibility bounds
    #[serde(default)]
    pub session: RawSessionConfig,

    /// Reconciliation debounce
    #[serde(default)]
    pub debounce: RawDebounceConfig,

    /// Reminder delivery
    #[serde(default)]
    pub reminders: RawReminderConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Moments snapshot file (JSON)
    pub moments_path: Option<PathBuf>,

    /// Live session status file written by the local session host
    pub status_path: Option<PathBuf>,

    /// Widget feed file mirroring the moment collection
    pub widgets_path: Option<PathBuf>,

    /// Periodic re-evaluation interval
    pub tick_interval_seconds: Option<u64>,
}

/// Live session eligibility bounds
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSessionConfig {
    /// Sessions need strictly more than this remaining
    pub min_remaining_seconds: Option<u64>,

    /// Sessions need strictly less than this remaining
    pub max_remaining_seconds: Option<u64>,

    /// Moments need a creation-to-target span strictly longer than this
    pub min_total_seconds: Option<u64>,

    /// Staleness hint attached to pushed updates
    pub stale_after_seconds: Option<u64>,
}

/// Debounce configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDebounceConfig {
    /// Quiet period before a reconciliation pass runs
    pub quiet_period_ms: Option<u64>,
}

/// Reminder configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawReminderConfig {
    /// Whether reminders may be delivered at all
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [service]
            moments_path = "/var/lib/moments/moments.json"
            status_path = "/run/moments/session.json"
            widgets_path = "/var/lib/moments/moments-widgets.json"
            tick_interval_seconds = 30

            [session]
            min_remaining_seconds = 300
            max_remaining_seconds = 604800
            min_total_seconds = 300
            stale_after_seconds = 3600

            [debounce]
            quiet_period_ms = 150

            [reminders]
            enabled = false
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service.tick_interval_seconds, Some(30));
        assert_eq!(config.session.max_remaining_seconds, Some(604800));
        assert_eq!(config.debounce.quiet_period_ms, Some(150));
        assert_eq!(config.reminders.enabled, Some(false));
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.service.moments_path.is_none());
        assert!(config.session.min_remaining_seconds.is_none());
    }
}
