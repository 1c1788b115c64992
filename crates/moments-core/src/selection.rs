//! Next-moment selection and collection views

use chrono::{DateTime, Local};
use moments_api::Moment;
use moments_config::SessionPolicy;
use tracing::trace;

use crate::check_eligibility;

/// Moments that currently qualify for a live session
pub fn eligible_moments<'a>(
    moments: &'a [Moment],
    now: DateTime<Local>,
    policy: &SessionPolicy,
) -> Vec<&'a Moment> {
    moments
        .iter()
        .filter(|moment| match check_eligibility(moment, now, policy) {
            Ok(()) => true,
            Err(reason) => {
                trace!(moment_id = %moment.id, reason = %reason, "Moment not eligible");
                false
            }
        })
        .collect()
}

/// Pick the single moment that should hold the session: nearest target,
/// ties broken by id
pub fn select_next<'a, I>(eligible: I) -> Option<&'a Moment>
where
    I: IntoIterator<Item = &'a Moment>,
{
    eligible
        .into_iter()
        .min_by(|a, b| a.target.cmp(&b.target).then_with(|| a.id.cmp(&b.id)))
}

/// Moments still ahead of us
pub fn upcoming(moments: &[Moment], now: DateTime<Local>) -> Vec<&Moment> {
    moments
        .iter()
        .filter(|m| !m.completed && !m.has_started(now))
        .collect()
}

/// Moments that are done or whose target has passed
pub fn completed(moments: &[Moment], now: DateTime<Local>) -> Vec<&Moment> {
    moments
        .iter()
        .filter(|m| m.completed || m.has_started(now))
        .collect()
}

/// Moments ordered by how close their target is to `now`, past or future
pub fn sorted_by_proximity(moments: &[Moment], now: DateTime<Local>) -> Vec<&Moment> {
    let mut sorted: Vec<&Moment> = moments.iter().collect();
    sorted.sort_by_key(|m| {
        let remaining = m.time_remaining(now);
        let distance = if remaining < chrono::Duration::zero() {
            -remaining
        } else {
            remaining
        };
        (distance, m.id.clone())
    });
    sorted
}
