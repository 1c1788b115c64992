//! Core events emitted by the reconciler

use moments_api::SessionEndReason;
use moments_util::{MomentId, SessionId};
use std::time::Duration;

use crate::SessionError;

/// Events emitted by the session reconciler
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// The host accepted a start request
    SessionStarted {
        moment_id: MomentId,
        session_id: SessionId,
    },

    /// Fresh content was pushed to a running session
    SessionUpdated {
        moment_id: MomentId,
        time_remaining: Duration,
        progress: f64,
    },

    /// A tracked session is gone
    SessionEnded {
        moment_id: MomentId,
        session_id: Option<SessionId>,
        reason: SessionEndReason,
    },

    /// A start attempt did not produce a session
    StartRejected {
        moment_id: MomentId,
        error: SessionError,
    },
}

impl CoreEvent {
    pub fn moment_id(&self) -> &MomentId {
        match self {
            CoreEvent::SessionStarted { moment_id, .. }
            | CoreEvent::SessionUpdated { moment_id, .. }
            | CoreEvent::SessionEnded { moment_id, .. }
            | CoreEvent::StartRejected { moment_id, .. } => moment_id,
        }
    }
}
