//! Reminder scheduling
//!
//! Independent of live sessions. Every call starts by clearing the moment's
//! existing triggers, so scheduling is idempotent for unchanged flags.

use chrono::{DateTime, Local};
use moments_api::{Moment, NotificationAuthorization, ReminderOffset, ReminderRequest};
use moments_host_api::{HostResult, ReminderHost};
use moments_util::{MomentId, TriggerId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a scheduling call installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderReport {
    pub moment_id: MomentId,
    pub authorization: NotificationAuthorization,
    pub scheduled: Vec<TriggerId>,
    /// Enabled offsets whose fire instant had already passed
    pub skipped: Vec<ReminderOffset>,
    pub failed: Vec<(ReminderOffset, String)>,
}

impl ReminderReport {
    fn new(moment_id: &MomentId, authorization: NotificationAuthorization) -> Self {
        Self {
            moment_id: moment_id.clone(),
            authorization,
            scheduled: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

pub struct ReminderScheduler {
    host: Arc<dyn ReminderHost>,
    enabled: bool,
}

impl ReminderScheduler {
    pub fn new(host: Arc<dyn ReminderHost>, enabled: bool) -> Self {
        Self { host, enabled }
    }

    /// Resolve an undetermined notification permission
    pub async fn prepare(&self) -> HostResult<NotificationAuthorization> {
        let authorization = self.host.request_authorization().await?;
        info!(authorization = ?authorization, "Notification authorization");
        Ok(authorization)
    }

    /// Replace the moment's pending triggers with ones matching its flags
    pub async fn schedule(&self, moment: &Moment, now: DateTime<Local>) -> ReminderReport {
        self.host.cancel_all(&moment.id).await;

        let authorization = self.host.authorization().await;
        let mut report = ReminderReport::new(&moment.id, authorization);

        if !self.enabled {
            debug!(moment_id = %moment.id, "Reminders disabled, cleared triggers only");
            return report;
        }

        if !authorization.is_granted() {
            debug!(
                moment_id = %moment.id,
                authorization = ?authorization,
                "Notifications not authorized, skipping reminders"
            );
            return report;
        }

        for offset in moment.enabled_reminders() {
            let request = ReminderRequest::for_offset(moment, offset);
            if request.fire_at <= now {
                report.skipped.push(offset);
                continue;
            }

            match self.host.schedule(&request).await {
                Ok(()) => {
                    debug!(
                        moment_id = %moment.id,
                        trigger_id = %request.trigger_id,
                        fire_at = %request.fire_at,
                        "Reminder scheduled"
                    );
                    report.scheduled.push(request.trigger_id);
                }
                Err(e) => {
                    warn!(
                        moment_id = %moment.id,
                        offset = ?offset,
                        error = %e,
                        "Failed to schedule reminder"
                    );
                    report.failed.push((offset, e.to_string()));
                }
            }
        }

        report
    }

    /// Remove every trigger for a deleted moment
    pub async fn cancel(&self, moment_id: &MomentId) {
        self.host.cancel_all(moment_id).await;
        debug!(moment_id = %moment_id, "Reminders cancelled");
    }
}
