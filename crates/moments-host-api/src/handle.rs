//! Session handle abstraction

use moments_util::{MomentId, SessionId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque handle to a live session on the host
///
/// Created by the session host when a start request succeeds; the core keeps
/// it only while it believes the session is alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Unique per started session, even for the same moment
    pub session_id: SessionId,

    /// Moment this session renders
    pub moment_id: MomentId,

    /// Host-specific payload (opaque to core)
    payload: HandlePayload,
}

impl SessionHandle {
    pub fn new(moment_id: MomentId, payload: HandlePayload) -> Self {
        Self {
            session_id: SessionId::new(),
            moment_id,
            payload,
        }
    }

    pub fn payload(&self) -> &HandlePayload {
        &self.payload
    }
}

/// Host-specific handle payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "host", rename_all = "snake_case")]
pub enum HandlePayload {
    /// Session rendered into a status file
    StatusFile { path: PathBuf },

    /// Mock for testing
    Mock { id: u64 },
}
