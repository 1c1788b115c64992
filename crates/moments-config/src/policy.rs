//! Validated policy structures

use crate::schema::RawConfig;
use moments_util::{default_moments_path, default_status_path, default_widgets_path};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const DEFAULT_MIN_REMAINING_SECS: u64 = 300;
pub(crate) const DEFAULT_MAX_REMAINING_SECS: u64 = 7 * 24 * 3600;
pub(crate) const DEFAULT_MIN_TOTAL_SECS: u64 = 300;
const DEFAULT_STALE_AFTER_SECS: u64 = 3600;
const DEFAULT_QUIET_PERIOD_MS: u64 = 150;
const DEFAULT_TICK_INTERVAL_SECS: u64 = 60;

/// Validated policy ready for use by the core
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub service: ServiceConfig,
    pub session: SessionPolicy,
    pub debounce: DebouncePolicy,
    pub reminders: ReminderPolicy,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let service = ServiceConfig {
            moments_path: raw
                .service
                .moments_path
                .unwrap_or_else(default_moments_path),
            status_path: raw
                .service
                .status_path
                .unwrap_or_else(default_status_path),
            widgets_path: raw
                .service
                .widgets_path
                .unwrap_or_else(default_widgets_path),
            tick_interval: Duration::from_secs(
                raw.service
                    .tick_interval_seconds
                    .unwrap_or(DEFAULT_TICK_INTERVAL_SECS),
            ),
        };

        let session = SessionPolicy {
            min_remaining: Duration::from_secs(
                raw.session
                    .min_remaining_seconds
                    .unwrap_or(DEFAULT_MIN_REMAINING_SECS),
            ),
            max_remaining: Duration::from_secs(
                raw.session
                    .max_remaining_seconds
                    .unwrap_or(DEFAULT_MAX_REMAINING_SECS),
            ),
            min_total: Duration::from_secs(
                raw.session
                    .min_total_seconds
                    .unwrap_or(DEFAULT_MIN_TOTAL_SECS),
            ),
            stale_after: Duration::from_secs(
                raw.session
                    .stale_after_seconds
                    .unwrap_or(DEFAULT_STALE_AFTER_SECS),
            ),
        };

        let debounce = DebouncePolicy {
            quiet_period: Duration::from_millis(
                raw.debounce
                    .quiet_period_ms
                    .unwrap_or(DEFAULT_QUIET_PERIOD_MS),
            ),
        };

        let reminders = ReminderPolicy {
            enabled: raw.reminders.enabled.unwrap_or(true),
        };

        Self {
            service,
            session,
            debounce,
            reminders,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub moments_path: PathBuf,
    pub status_path: PathBuf,
    pub widgets_path: PathBuf,
    pub tick_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            moments_path: default_moments_path(),
            status_path: default_status_path(),
            widgets_path: default_widgets_path(),
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
        }
    }
}

/// Bounds a moment must satisfy to hold a live session
///
/// Shared by the eligibility evaluator and the reconciler's re-check
/// immediately before a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Remaining time must be strictly greater
    pub min_remaining: Duration,

    /// Remaining time must be strictly smaller
    pub max_remaining: Duration,

    /// Creation-to-target span must be strictly greater
    pub min_total: Duration,

    /// Staleness hint for pushed updates
    pub stale_after: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            min_remaining: Duration::from_secs(DEFAULT_MIN_REMAINING_SECS),
            max_remaining: Duration::from_secs(DEFAULT_MAX_REMAINING_SECS),
            min_total: Duration::from_secs(DEFAULT_MIN_TOTAL_SECS),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
        }
    }
}

/// Debounce configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncePolicy {
    pub quiet_period: Duration,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
        }
    }
}

/// Reminder delivery configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub enabled: bool,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self { enabled: true }
    }
}
