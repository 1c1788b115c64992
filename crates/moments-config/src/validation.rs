//! Configuration validation

use crate::policy::{
    DEFAULT_MAX_REMAINING_SECS, DEFAULT_MIN_REMAINING_SECS, DEFAULT_MIN_TOTAL_SECS,
};
use crate::schema::RawConfig;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("[{section}] {field}: {message}")]
    FieldError {
        section: &'static str,
        field: &'static str,
        message: String,
    },

    #[error("Session bounds: min_remaining {min}s must be below max_remaining {max}s")]
    InvertedSessionBounds { min: u64, max: u64 },
}

impl ValidationError {
    fn field(section: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        Self::FieldError {
            section,
            field,
            message: message.into(),
        }
    }
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.service.tick_interval_seconds == Some(0) {
        errors.push(ValidationError::field(
            "service",
            "tick_interval_seconds",
            "must be greater than zero",
        ));
    }

    if config.debounce.quiet_period_ms == Some(0) {
        errors.push(ValidationError::field(
            "debounce",
            "quiet_period_ms",
            "must be greater than zero",
        ));
    }

    if config.session.stale_after_seconds == Some(0) {
        errors.push(ValidationError::field(
            "session",
            "stale_after_seconds",
            "must be greater than zero",
        ));
    }

    let min = config
        .session
        .min_remaining_seconds
        .unwrap_or(DEFAULT_MIN_REMAINING_SECS);
    let max = config
        .session
        .max_remaining_seconds
        .unwrap_or(DEFAULT_MAX_REMAINING_SECS);
    if min >= max {
        errors.push(ValidationError::InvertedSessionBounds { min, max });
    }

    let min_total = config
        .session
        .min_total_seconds
        .unwrap_or(DEFAULT_MIN_TOTAL_SECS);
    if min_total >= max {
        errors.push(ValidationError::field(
            "session",
            "min_total_seconds",
            format!("{}s leaves no room below max_remaining {}s", min_total, max),
        ));
    }

    errors
}
