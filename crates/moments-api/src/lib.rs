//! Shared data model for momentsd
//!
//! This crate defines the types exchanged between the core and its
//! collaborators:
//! - Moments (the records the change feed delivers)
//! - Session payloads and states (what the session primitive renders)
//! - Reminder requests (what the reminder primitive schedules)

mod moment;
mod types;

pub use moment::*;
pub use types::*;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;
