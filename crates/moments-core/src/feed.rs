//! Change feed events and snapshot diffing

use moments_api::Moment;
use moments_util::MomentId;
use std::collections::HashMap;

/// Something changed; each event carries the full current snapshot
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// The moment collection itself changed
    Collection(Vec<Moment>),
    /// The app came to the foreground
    Foreground(Vec<Moment>),
    /// Periodic tick
    Tick(Vec<Moment>),
}

impl ChangeEvent {
    pub fn snapshot(&self) -> &[Moment] {
        match self {
            ChangeEvent::Collection(m) | ChangeEvent::Foreground(m) | ChangeEvent::Tick(m) => m,
        }
    }

    pub fn into_snapshot(self) -> Vec<Moment> {
        match self {
            ChangeEvent::Collection(m) | ChangeEvent::Foreground(m) | ChangeEvent::Tick(m) => m,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Collection(_) => "collection",
            ChangeEvent::Foreground(_) => "foreground",
            ChangeEvent::Tick(_) => "tick",
        }
    }
}

/// How a single moment differs between two snapshots
#[derive(Debug, Clone, PartialEq)]
pub enum MomentChange {
    Created(Moment),
    Updated { previous: Moment, current: Moment },
    Deleted(Moment),
}

impl MomentChange {
    pub fn moment_id(&self) -> &MomentId {
        match self {
            MomentChange::Created(m) | MomentChange::Deleted(m) => &m.id,
            MomentChange::Updated { current, .. } => &current.id,
        }
    }
}

/// Classify every moment that differs between `previous` and `current`
///
/// Created and updated moments come first in `current` order, followed by
/// deletions in `previous` order.
pub fn diff_snapshots(previous: &[Moment], current: &[Moment]) -> Vec<MomentChange> {
    let before: HashMap<&MomentId, &Moment> = previous.iter().map(|m| (&m.id, m)).collect();
    let after: HashMap<&MomentId, &Moment> = current.iter().map(|m| (&m.id, m)).collect();

    let mut changes = Vec::new();

    for moment in current {
        match before.get(&moment.id) {
            None => changes.push(MomentChange::Created(moment.clone())),
            Some(old) if *old != moment => changes.push(MomentChange::Updated {
                previous: (*old).clone(),
                current: moment.clone(),
            }),
            Some(_) => {}
        }
    }

    for moment in previous {
        if !after.contains_key(&moment.id) {
            changes.push(MomentChange::Deleted(moment.clone()));
        }
    }

    changes
}
