//! Session and reminder types shared between the core and host primitives

use chrono::{DateTime, Local};
use moments_util::{MomentId, SessionId, TriggerId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Moment, ReminderOffset};

/// Dynamic part of a live session: recomputed on every push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentState {
    /// Remaining time, clamped at zero
    pub time_remaining: Duration,
    /// Progress ratio in `[min_progress, 1.0]`
    pub progress: f64,
}

/// Everything the session primitive needs to render a moment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub moment_id: MomentId,
    pub title: String,
    pub target: DateTime<Local>,
    pub symbol: String,
    pub accent_color: String,
    pub show_end_time: bool,
    pub state: ContentState,
    /// Hint after which the host may render the content as stale
    pub stale_at: Option<DateTime<Local>>,
}

impl SessionPayload {
    pub fn new(moment: &Moment, state: ContentState) -> Self {
        Self {
            moment_id: moment.id.clone(),
            title: moment.title.clone(),
            target: moment.target,
            symbol: moment.symbol.clone(),
            accent_color: moment.accent_color.clone(),
            show_end_time: moment.show_end_time,
            state,
            stale_at: None,
        }
    }

    pub fn with_stale_at(mut self, stale_at: DateTime<Local>) -> Self {
        self.stale_at = Some(stale_at);
        self
    }
}

/// Reduced moment record published for widgets and other passive displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetMoment {
    pub id: MomentId,
    pub title: String,
    pub target: DateTime<Local>,
    pub accent_color: String,
    pub symbol: String,
}

impl From<&Moment> for WidgetMoment {
    fn from(moment: &Moment) -> Self {
        Self {
            id: moment.id.clone(),
            title: moment.title.clone(),
            target: moment.target,
            accent_color: moment.accent_color.clone(),
            symbol: moment.symbol.clone(),
        }
    }
}

/// Locally tracked state of a moment's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Start requested, host has not answered yet
    Starting,
    Active,
    /// End requested, host has not answered yet
    Ending,
}

/// What the session primitive reports for a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionActivity {
    Active,
    Ended,
    Unknown,
}

impl SessionActivity {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionActivity::Active)
    }
}

/// Why a session was ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEndReason {
    /// Another moment (or none) is now selected
    Deselected,
    /// Explicit end request (e.g. the moment was deleted)
    Requested,
    /// The host reported the session gone during a sweep
    HostEnded,
    /// Pushing an update failed; the session is treated as gone
    UpdateFailed { error: String },
    /// End was requested while the start was still in flight
    CancelledWhileStarting,
}

/// Tracked session as seen from outside the reconciler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub moment_id: MomentId,
    pub state: SessionState,
    pub session_id: Option<SessionId>,
}

/// Notification permission as reported by the reminder primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAuthorization {
    Granted,
    Denied,
    NotDetermined,
}

impl NotificationAuthorization {
    pub fn is_granted(&self) -> bool {
        matches!(self, NotificationAuthorization::Granted)
    }
}

/// A single point-in-time reminder to install
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub trigger_id: TriggerId,
    pub moment_id: MomentId,
    pub offset: ReminderOffset,
    pub fire_at: DateTime<Local>,
    pub title: String,
    pub body: String,
}

impl ReminderRequest {
    /// Build the request for one offset of a moment
    pub fn for_offset(moment: &Moment, offset: ReminderOffset) -> Self {
        let fire_at = moment.target - offset.before_target();
        Self {
            trigger_id: TriggerId::for_fire(&moment.id, &fire_at),
            moment_id: moment.id.clone(),
            offset,
            fire_at,
            title: offset.title(&moment.title),
            body: offset.body().to_string(),
        }
    }
}
