//! Time remaining, progress and countdown formatting
//!
//! Everything here is a pure function of a moment and "now". Nothing in this
//! module schedules itself; consumers ask [`next_refresh`] when to recompute.

use chrono::{DateTime, Local};
use moments_api::{ContentState, Moment};
use moments_util::saturating_std;

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;
const SECS_PER_MONTH: i64 = 30 * SECS_PER_DAY;
const SECS_PER_YEAR: i64 = 365 * SECS_PER_DAY;

/// Signed time until the moment's target. Clamped to zero when the moment
/// has a non-positive total duration.
pub fn time_remaining(moment: &Moment, now: DateTime<Local>) -> chrono::Duration {
    let remaining = moment.time_remaining(now);
    if is_degenerate(moment) && remaining < chrono::Duration::zero() {
        return chrono::Duration::zero();
    }
    remaining
}

/// Lowest progress value shown for a moment of the given total duration
pub fn min_progress(total: chrono::Duration) -> f64 {
    if total > chrono::Duration::days(1) {
        0.15
    } else if total > chrono::Duration::hours(1) {
        0.10
    } else {
        0.05
    }
}

/// Elapsed share of the creation-to-target span, floored by [`min_progress`]
pub fn progress(moment: &Moment, now: DateTime<Local>) -> f64 {
    if is_degenerate(moment) {
        return 1.0;
    }

    let total = moment.total_duration();
    let elapsed = now.signed_duration_since(moment.created_at);
    let raw = elapsed.num_milliseconds() as f64 / total.num_milliseconds() as f64;

    raw.clamp(min_progress(total), 1.0)
}

/// Dynamic session content for a moment at `now`
pub fn content_state(moment: &Moment, now: DateTime<Local>) -> ContentState {
    ContentState {
        time_remaining: saturating_std(time_remaining(moment, now)),
        progress: progress(moment, now),
    }
}

/// When a consumer should next recompute the display for this moment
pub fn next_refresh(moment: &Moment, now: DateTime<Local>) -> DateTime<Local> {
    let remaining = moment.time_remaining(now);

    let step = if remaining <= chrono::Duration::zero() {
        chrono::Duration::hours(1)
    } else if remaining.num_days() > 7 {
        chrono::Duration::days(1)
    } else if remaining.num_days() > 1 {
        chrono::Duration::hours(6)
    } else if remaining.num_hours() > 1 {
        chrono::Duration::hours(1)
    } else if remaining.num_minutes() > 10 {
        chrono::Duration::minutes(10)
    } else {
        chrono::Duration::minutes(1)
    };

    now + step
}

/// Human phrase for the largest non-zero unit ("3 days", "1 min", "Now")
pub fn format_human(remaining: chrono::Duration) -> String {
    let secs = remaining.num_seconds();
    if secs <= 0 {
        return "Now".to_string();
    }

    let units: [(i64, &str, &str); 7] = [
        (SECS_PER_YEAR, "year", "years"),
        (SECS_PER_MONTH, "month", "months"),
        (SECS_PER_WEEK, "week", "weeks"),
        (SECS_PER_DAY, "day", "days"),
        (SECS_PER_HOUR, "hour", "hours"),
        (SECS_PER_MINUTE, "min", "mins"),
        (1, "sec", "secs"),
    ];

    for (size, singular, plural) in units {
        let count = secs / size;
        if count > 0 {
            let label = if count == 1 { singular } else { plural };
            return format!("{} {}", count, label);
        }
    }

    "Now".to_string()
}

/// Compact token for the largest non-zero unit ("2w", "5h", "Now")
pub fn format_compact(remaining: chrono::Duration) -> String {
    let secs = remaining.num_seconds();
    if secs <= 0 {
        return "Now".to_string();
    }

    let units: [(i64, char); 5] = [
        (SECS_PER_WEEK, 'w'),
        (SECS_PER_DAY, 'd'),
        (SECS_PER_HOUR, 'h'),
        (SECS_PER_MINUTE, 'm'),
        (1, 's'),
    ];

    for (size, suffix) in units {
        let count = secs / size;
        if count > 0 {
            return format!("{}{}", count, suffix);
        }
    }

    "Now".to_string()
}

/// Fixed-width countdown ("2d 05h 07m" or "05:07:09")
pub fn format_countdown(remaining: chrono::Duration) -> String {
    let secs = remaining.num_seconds();
    if secs <= 0 {
        return "00:00:00".to_string();
    }

    let days = secs / SECS_PER_DAY;
    let hours = (secs % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = secs % SECS_PER_MINUTE;

    if days > 0 {
        format!("{}d {:02}h {:02}m", days, hours, minutes)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

fn is_degenerate(moment: &Moment) -> bool {
    moment.total_duration() <= chrono::Duration::zero()
}
