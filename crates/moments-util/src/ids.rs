//! Strongly-typed identifiers for momentsd

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable unique identifier for a moment
///
/// Ordering follows the underlying UUID, which gives selection a
/// deterministic tie-break between moments sharing a target instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MomentId(Uuid);

impl MomentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for MomentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MomentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one live session instance on the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a scheduled reminder trigger
///
/// Derived from the moment and the absolute fire instant, so repeated edits
/// that move the target never collide with triggers from an earlier schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(String);

impl TriggerId {
    pub fn for_fire<Tz: TimeZone>(moment_id: &MomentId, fire_at: &DateTime<Tz>) -> Self {
        Self(format!("{}-{}", moment_id, fire_at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this trigger was derived from the given moment
    pub fn belongs_to(&self, moment_id: &MomentId) -> bool {
        self.0
            .strip_prefix(&moment_id.to_string())
            .is_some_and(|rest| rest.starts_with('-'))
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
