//! Session host that renders into a JSON status file

use async_trait::async_trait;
use chrono::{DateTime, Local};
use moments_api::{SessionActivity, SessionPayload};
use moments_host_api::{HandlePayload, HostError, HostResult, SessionHandle, SessionHost};
use moments_util::SessionId;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::write_json_atomic;

#[derive(Serialize)]
struct StatusDocument<'a> {
    session_id: &'a SessionId,
    updated_at: DateTime<Local>,
    #[serde(flatten)]
    payload: &'a SessionPayload,
}

/// Renders at most one session by writing it to a status file
///
/// Starting a new session overwrites the file, superseding whatever was
/// there. Deleting the file from outside counts as the user dismissing the
/// session.
pub struct StatusFileSessionHost {
    path: PathBuf,
    enabled: bool,
    current: Mutex<Option<SessionId>>,
}

impl StatusFileSessionHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            current: Mutex::new(None),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn owns(&self, handle: &SessionHandle) -> bool {
        matches!(handle.payload(), HandlePayload::StatusFile { path } if path == &self.path)
    }

    async fn write(&self, session_id: &SessionId, payload: &SessionPayload) -> HostResult<()> {
        let document = StatusDocument {
            session_id,
            updated_at: moments_util::now(),
            payload,
        };
        write_json_atomic(&self.path, &document).await
    }
}

#[async_trait]
impl SessionHost for StatusFileSessionHost {
    fn sessions_enabled(&self) -> bool {
        self.enabled
    }

    async fn request_start(&self, payload: &SessionPayload) -> HostResult<SessionHandle> {
        if !self.enabled {
            return Err(HostError::PermissionDenied("status sessions disabled".into()));
        }
        if payload.title.trim().is_empty() {
            return Err(HostError::InvalidPayload("empty title".into()));
        }

        let handle = SessionHandle::new(
            payload.moment_id.clone(),
            HandlePayload::StatusFile {
                path: self.path.clone(),
            },
        );

        let mut current = self.current.lock().await;
        self.write(&handle.session_id, payload).await?;
        if let Some(previous) = current.replace(handle.session_id.clone()) {
            debug!(session_id = %previous, "Status session superseded");
        }

        info!(
            moment_id = %payload.moment_id,
            path = %self.path.display(),
            "Status session written"
        );
        Ok(handle)
    }

    async fn push(&self, handle: &SessionHandle, payload: &SessionPayload) -> HostResult<()> {
        if !self.owns(handle) {
            return Err(HostError::SessionNotFound);
        }

        let current = self.current.lock().await;
        if current.as_ref() != Some(&handle.session_id) || !self.path.exists() {
            return Err(HostError::SessionNotFound);
        }
        self.write(&handle.session_id, payload).await
    }

    async fn request_end(&self, handle: &SessionHandle) -> HostResult<()> {
        if !self.owns(handle) {
            return Err(HostError::SessionNotFound);
        }

        let mut current = self.current.lock().await;
        if current.as_ref() != Some(&handle.session_id) {
            // Already superseded or ended; nothing on disk belongs to it
            return Ok(());
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *current = None;

        info!(moment_id = %handle.moment_id, "Status session removed");
        Ok(())
    }

    async fn current_state(&self, handle: &SessionHandle) -> SessionActivity {
        if !self.owns(handle) {
            return SessionActivity::Unknown;
        }

        let current = self.current.lock().await;
        if current.as_ref() == Some(&handle.session_id) && self.path.exists() {
            SessionActivity::Active
        } else {
            SessionActivity::Ended
        }
    }
}
