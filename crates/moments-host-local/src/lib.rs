//! Local host primitives for momentsd
//!
//! Provides:
//! - A session host that renders the live session into a JSON status file
//!   for bars and widgets to pick up
//! - A widget feed mirroring the moment collection into a JSON file
//! - A reminder host backed by in-process tokio timers

mod atomic_file;
mod status_file;
mod timer;
mod widgets;

pub(crate) use atomic_file::write_json_atomic;
pub use status_file::*;
pub use timer::*;
pub use widgets::*;
