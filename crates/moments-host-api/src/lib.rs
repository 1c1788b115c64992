//! Host primitive trait interfaces for momentsd
//!
//! This crate defines the narrow contracts between the core and the
//! platform pieces that actually render a live session or fire a reminder.
//! It contains no platform code itself.

mod handle;
mod mock;
mod traits;

pub use handle::*;
pub use mock::*;
pub use traits::*;
