//! Shared utilities for momentsd
//!
//! This crate provides:
//! - ID types (MomentId, SessionId, TriggerId)
//! - Time utilities (mockable wall-clock `now()`, formatting helpers)
//! - Error types
//! - Default paths for config, data, and session status files

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
