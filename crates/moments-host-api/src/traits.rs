//! Host primitive traits

use async_trait::async_trait;
use moments_api::{
    NotificationAuthorization, ReminderRequest, SessionActivity, SessionPayload, WidgetMoment,
};
use moments_util::{MomentId, TriggerId};
use std::collections::HashSet;
use thiserror::Error;

use crate::SessionHandle;

/// Errors from host primitive operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Request denied: {0}")]
    Denied(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Operation failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HostError {
    /// Whether the host refused the request outright, as opposed to failing
    /// transiently while trying to honor it
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            HostError::Denied(_) | HostError::PermissionDenied(_) | HostError::InvalidPayload(_)
        )
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Live session primitive - renders at most what the core asks for
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// Whether the host currently allows live sessions at all
    fn sessions_enabled(&self) -> bool {
        true
    }

    /// Ask the host to display a new session
    async fn request_start(&self, payload: &SessionPayload) -> HostResult<SessionHandle>;

    /// Push refreshed content to a running session
    async fn push(&self, handle: &SessionHandle, payload: &SessionPayload) -> HostResult<()>;

    /// Ask the host to dismiss a session
    async fn request_end(&self, handle: &SessionHandle) -> HostResult<()>;

    /// What the host currently knows about a session
    async fn current_state(&self, handle: &SessionHandle) -> SessionActivity;
}

/// Point-in-time reminder primitive
#[async_trait]
pub trait ReminderHost: Send + Sync {
    /// Current notification permission
    async fn authorization(&self) -> NotificationAuthorization;

    /// Ask for permission if it has not been determined yet
    async fn request_authorization(&self) -> HostResult<NotificationAuthorization> {
        Ok(self.authorization().await)
    }

    /// Remove every pending trigger carrying this moment id (no-op if none)
    async fn cancel_all(&self, moment_id: &MomentId);

    /// Install one trigger
    async fn schedule(&self, request: &ReminderRequest) -> HostResult<()>;

    /// Ids of triggers that have not fired yet
    async fn pending_ids(&self) -> HashSet<TriggerId>;
}

/// Passive display feed mirroring the whole moment collection
#[async_trait]
pub trait WidgetPublisher: Send + Sync {
    /// Replace the published moment list
    async fn publish(&self, moments: &[WidgetMoment]) -> HostResult<()>;
}
