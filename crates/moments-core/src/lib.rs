//! Core countdown engine and session reconciliation for momentsd
//!
//! This crate is the heart of momentsd, containing:
//! - Time remaining, floored progress and countdown formatting
//! - Session eligibility and next-moment selection
//! - The session reconciler (absent -> starting -> active -> ending -> absent)
//! - Debounced, cancellation-aware reconciliation triggering
//! - Reminder scheduling, independent of sessions
//! - Change-feed classification and the coordinator wiring it all together

mod coordinator;
mod countdown;
mod debounce;
mod eligibility;
mod events;
mod feed;
mod reconciler;
mod reminders;
mod selection;

pub use coordinator::*;
pub use countdown::*;
pub use debounce::*;
pub use eligibility::*;
pub use events::*;
pub use feed::*;
pub use reconciler::*;
pub use reminders::*;
pub use selection::*;
