//! The moment record

use chrono::{DateTime, Local};
use moments_util::MomentId;
use serde::{Deserialize, Serialize};

/// Default accent color token
pub const DEFAULT_ACCENT_COLOR: &str = "#007AFF";

/// Default symbol token
pub const DEFAULT_SYMBOL: &str = "star.fill";

/// Default session threshold (minutes before target)
pub const DEFAULT_SESSION_THRESHOLD_MINUTES: u32 = 60;

/// A user-defined instant to count down to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moment {
    pub id: MomentId,
    pub title: String,

    /// Instant being counted down to (editable)
    pub target: DateTime<Local>,

    /// Instant the moment was created (immutable, anchors progress)
    pub created_at: DateTime<Local>,

    #[serde(default = "default_accent_color")]
    pub accent_color: String,

    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// How long before target a live session may begin. Zero disables sessions.
    #[serde(default = "default_session_threshold_minutes")]
    pub session_threshold_minutes: u32,

    /// Show the absolute end time in the live session
    #[serde(default = "default_true")]
    pub show_end_time: bool,

    #[serde(default)]
    pub reminders: ReminderFlags,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub completed_at: Option<DateTime<Local>>,
}

fn default_accent_color() -> String {
    DEFAULT_ACCENT_COLOR.to_string()
}

fn default_symbol() -> String {
    DEFAULT_SYMBOL.to_string()
}

fn default_session_threshold_minutes() -> u32 {
    DEFAULT_SESSION_THRESHOLD_MINUTES
}

fn default_true() -> bool {
    true
}

impl Moment {
    /// Create a moment with default display tokens and no reminders
    pub fn new(
        title: impl Into<String>,
        target: DateTime<Local>,
        created_at: DateTime<Local>,
    ) -> Self {
        Self {
            id: MomentId::new(),
            title: title.into(),
            target,
            created_at,
            accent_color: default_accent_color(),
            symbol: default_symbol(),
            session_threshold_minutes: DEFAULT_SESSION_THRESHOLD_MINUTES,
            show_end_time: true,
            reminders: ReminderFlags::default(),
            completed: false,
            completed_at: None,
        }
    }

    pub fn with_id(mut self, id: MomentId) -> Self {
        self.id = id;
        self
    }

    pub fn with_session_threshold_minutes(mut self, minutes: u32) -> Self {
        self.session_threshold_minutes = minutes;
        self
    }

    pub fn with_reminders(mut self, reminders: ReminderFlags) -> Self {
        self.reminders = reminders;
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Session threshold as a duration
    pub fn session_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.session_threshold_minutes))
    }

    /// Signed time until target (negative once the target has passed)
    pub fn time_remaining(&self, now: DateTime<Local>) -> chrono::Duration {
        self.target.signed_duration_since(now)
    }

    /// Span from creation to target
    pub fn total_duration(&self) -> chrono::Duration {
        self.target.signed_duration_since(self.created_at)
    }

    pub fn has_started(&self, now: DateTime<Local>) -> bool {
        self.time_remaining(now) <= chrono::Duration::zero()
    }

    /// Mark the moment completed at the given instant
    pub fn complete(&mut self, at: DateTime<Local>) {
        self.completed = true;
        self.completed_at = Some(at);
    }

    /// Reminder offsets enabled on this moment, longest first
    pub fn enabled_reminders(&self) -> Vec<ReminderOffset> {
        ReminderOffset::ALL
            .into_iter()
            .filter(|offset| self.reminders.is_enabled(*offset))
            .collect()
    }
}

/// Which reminder offsets are enabled for a moment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderFlags {
    #[serde(default)]
    pub twenty_four_hours: bool,
    #[serde(default)]
    pub one_hour: bool,
    #[serde(default)]
    pub ten_minutes: bool,
}

impl ReminderFlags {
    pub fn all() -> Self {
        Self {
            twenty_four_hours: true,
            one_hour: true,
            ten_minutes: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, offset: ReminderOffset) -> bool {
        match offset {
            ReminderOffset::TwentyFourHours => self.twenty_four_hours,
            ReminderOffset::OneHour => self.one_hour,
            ReminderOffset::TenMinutes => self.ten_minutes,
        }
    }
}

/// A fixed reminder offset before a moment's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderOffset {
    TwentyFourHours,
    OneHour,
    TenMinutes,
}

impl ReminderOffset {
    pub const ALL: [ReminderOffset; 3] = [
        ReminderOffset::TwentyFourHours,
        ReminderOffset::OneHour,
        ReminderOffset::TenMinutes,
    ];

    pub fn before_target(&self) -> chrono::Duration {
        match self {
            ReminderOffset::TwentyFourHours => chrono::Duration::hours(24),
            ReminderOffset::OneHour => chrono::Duration::hours(1),
            ReminderOffset::TenMinutes => chrono::Duration::minutes(10),
        }
    }

    pub fn title(&self, moment_title: &str) -> String {
        match self {
            ReminderOffset::TwentyFourHours => format!("Tomorrow: {}", moment_title),
            ReminderOffset::OneHour => format!("Soon: {}", moment_title),
            ReminderOffset::TenMinutes => format!("Almost here: {}", moment_title),
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            ReminderOffset::TwentyFourHours => "Your moment is happening in 24 hours",
            ReminderOffset::OneHour => "Your moment is happening in 1 hour",
            ReminderOffset::TenMinutes => "Your moment is happening in 10 minutes",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn new_moment_defaults() {
        let moment = Moment::new("Launch", at(12), at(8));

        assert_eq!(moment.accent_color, DEFAULT_ACCENT_COLOR);
        assert_eq!(moment.symbol, DEFAULT_SYMBOL);
        assert_eq!(moment.session_threshold(), chrono::Duration::minutes(60));
        assert!(moment.show_end_time);
        assert!(moment.enabled_reminders().is_empty());
        assert!(!moment.completed);
    }

    #[test]
    fn time_remaining_is_signed() {
        let moment = Moment::new("Launch", at(12), at(8));

        assert_eq!(moment.time_remaining(at(10)), chrono::Duration::hours(2));
        assert_eq!(moment.time_remaining(at(14)), chrono::Duration::hours(-2));
        assert!(moment.has_started(at(12)));
        assert!(!moment.has_started(at(11)));
        assert_eq!(moment.total_duration(), chrono::Duration::hours(4));
    }

    #[test]
    fn enabled_reminders_longest_first() {
        let moment = Moment::new("Launch", at(12), at(8)).with_reminders(ReminderFlags {
            twenty_four_hours: false,
            one_hour: true,
            ten_minutes: true,
        });

        assert_eq!(
            moment.enabled_reminders(),
            vec![ReminderOffset::OneHour, ReminderOffset::TenMinutes]
        );
    }

    #[test]
    fn reminder_copy() {
        assert_eq!(
            ReminderOffset::TwentyFourHours.title("Party"),
            "Tomorrow: Party"
        );
        assert_eq!(ReminderOffset::OneHour.title("Party"), "Soon: Party");
        assert_eq!(
            ReminderOffset::TenMinutes.body(),
            "Your moment is happening in 10 minutes"
        );
    }

    #[test]
    fn deserialize_with_defaults() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "title": "Flight",
            "target": "2026-03-01T12:00:00+00:00",
            "created_at": "2026-02-01T12:00:00+00:00"
        }"#;

        let moment: Moment = serde_json::from_str(json).unwrap();
        assert_eq!(moment.title, "Flight");
        assert_eq!(moment.symbol, DEFAULT_SYMBOL);
        assert_eq!(
            moment.session_threshold_minutes,
            DEFAULT_SESSION_THRESHOLD_MINUTES
        );
        assert!(moment.show_end_time);
        assert_eq!(moment.reminders, ReminderFlags::none());
    }

    #[test]
    fn complete_records_instant() {
        let mut moment = Moment::new("Launch", at(12), at(8));
        moment.complete(at(13));

        assert!(moment.completed);
        assert_eq!(moment.completed_at, Some(at(13)));
    }
}
