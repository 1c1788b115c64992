//! Error types for momentsd

use thiserror::Error;

use crate::MomentId;

/// Shared error type for moments operations that cross crate boundaries
#[derive(Debug, Error)]
pub enum MomentsError {
    #[error("Invalid moment {id}: {message}")]
    InvalidMoment { id: MomentId, message: String },

    #[error("Snapshot error: {0}")]
    SnapshotError(String),
}

impl MomentsError {
    pub fn invalid(id: &MomentId, msg: impl Into<String>) -> Self {
        Self::InvalidMoment {
            id: id.clone(),
            message: msg.into(),
        }
    }

    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::SnapshotError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MomentsError>;
