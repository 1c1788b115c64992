//! Session eligibility

use chrono::{DateTime, Local};
use moments_api::Moment;
use moments_config::SessionPolicy;
use moments_util::from_std_saturating;
use thiserror::Error;

/// Which eligibility condition a moment failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IneligibleReason {
    #[error("only {remaining} left, at or below the lower bound")]
    TooSoon { remaining: chrono::Duration },

    #[error("{remaining} left exceeds the moment's {threshold} session threshold")]
    BeyondThreshold {
        remaining: chrono::Duration,
        threshold: chrono::Duration,
    },

    #[error("{remaining} left, at or beyond the upper bound")]
    TooFar { remaining: chrono::Duration },

    #[error("total span {total} is too short")]
    DurationTooShort { total: chrono::Duration },
}

/// Check whether a moment qualifies for a live session at `now`
///
/// Conditions are checked in order and the first failure is reported. A
/// moment with a zero session threshold never qualifies.
pub fn check_eligibility(
    moment: &Moment,
    now: DateTime<Local>,
    policy: &SessionPolicy,
) -> Result<(), IneligibleReason> {
    let remaining = moment.time_remaining(now);
    let lower = from_std_saturating(policy.min_remaining);
    let upper = from_std_saturating(policy.max_remaining);
    let threshold = moment.session_threshold();

    if remaining <= lower {
        return Err(IneligibleReason::TooSoon { remaining });
    }

    if remaining > threshold {
        return Err(IneligibleReason::BeyondThreshold {
            remaining,
            threshold,
        });
    }

    if remaining >= upper {
        return Err(IneligibleReason::TooFar { remaining });
    }

    let total = moment.total_duration();
    if total <= from_std_saturating(policy.min_total) {
        return Err(IneligibleReason::DurationTooShort { total });
    }

    Ok(())
}

pub fn is_eligible(moment: &Moment, now: DateTime<Local>, policy: &SessionPolicy) -> bool {
    check_eligibility(moment, now, policy).is_ok()
}
