//! Wires change-feed events into reminders and the session reconciler

use chrono::{DateTime, Local};
use moments_api::{Moment, SessionState, WidgetMoment};
use moments_host_api::WidgetPublisher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    ChangeEvent, Debouncer, MomentChange, ReminderScheduler, SessionReconciler, diff_snapshots,
};

/// Entry point for change-feed events
///
/// Reminders and the widget feed are refreshed directly; session changes go
/// through the debouncer so bursts collapse into one reconciliation pass.
pub struct MomentsCoordinator {
    reconciler: SessionReconciler,
    reminders: ReminderScheduler,
    debouncer: Debouncer<Vec<Moment>>,
    widgets: Option<Arc<dyn WidgetPublisher>>,
    widgets_published: bool,
    last_snapshot: Vec<Moment>,
}

impl MomentsCoordinator {
    pub fn new(
        reconciler: SessionReconciler,
        reminders: ReminderScheduler,
        quiet_period: Duration,
    ) -> Self {
        let debouncer = Debouncer::new(quiet_period, Arc::new(reconciler.clone()));
        Self {
            reconciler,
            reminders,
            debouncer,
            widgets: None,
            widgets_published: false,
            last_snapshot: Vec::new(),
        }
    }

    /// Publish the collection to a widget feed on every change
    pub fn with_widgets(mut self, widgets: Arc<dyn WidgetPublisher>) -> Self {
        self.widgets = Some(widgets);
        self
    }

    pub fn reconciler(&self) -> &SessionReconciler {
        &self.reconciler
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn debouncer(&self) -> &Debouncer<Vec<Moment>> {
        &self.debouncer
    }

    /// Last collection snapshot seen
    pub fn snapshot(&self) -> &[Moment] {
        &self.last_snapshot
    }

    /// Handle one change-feed event, returning what changed in the collection
    pub async fn handle(&mut self, event: ChangeEvent, now: DateTime<Local>) -> Vec<MomentChange> {
        debug!(kind = event.kind(), moments = event.snapshot().len(), "Change event");

        let changes = match &event {
            ChangeEvent::Collection(snapshot) => {
                let changes = diff_snapshots(&self.last_snapshot, snapshot);
                for change in &changes {
                    self.apply(change, now).await;
                }
                if !changes.is_empty() {
                    info!(changes = changes.len(), "Moment collection changed");
                }
                changes
            }
            ChangeEvent::Foreground(_) | ChangeEvent::Tick(_) => Vec::new(),
        };

        let foreground = matches!(event, ChangeEvent::Foreground(_));
        let snapshot = event.into_snapshot();
        if !changes.is_empty() {
            self.last_snapshot = snapshot.clone();
        }
        if !changes.is_empty() || foreground || !self.widgets_published {
            self.publish_widgets(&snapshot).await;
        }
        self.debouncer.trigger(snapshot);

        changes
    }

    /// Drop any pending pass, let a pass in flight finish, then end every
    /// tracked session. No session is started afterwards.
    pub async fn shutdown(&self) {
        self.debouncer.cancel();
        self.reconciler.shutdown().await;
    }

    async fn publish_widgets(&mut self, snapshot: &[Moment]) {
        let Some(widgets) = self.widgets.clone() else {
            return;
        };
        let moments: Vec<WidgetMoment> = snapshot.iter().map(WidgetMoment::from).collect();
        match widgets.publish(&moments).await {
            Ok(()) => self.widgets_published = true,
            Err(e) => warn!(error = %e, "Failed to publish widget feed"),
        }
    }

    async fn apply(&self, change: &MomentChange, now: DateTime<Local>) {
        match change {
            MomentChange::Created(moment) => {
                self.reminders.schedule(moment, now).await;
            }
            MomentChange::Updated { current, .. } => {
                self.reminders.schedule(current, now).await;
                if matches!(
                    self.reconciler.session_state(&current.id),
                    Some(SessionState::Active | SessionState::Starting)
                ) {
                    if let Err(e) = self.reconciler.update(current, now).await {
                        debug!(moment_id = %current.id, error = %e, "Update after edit failed");
                    }
                }
            }
            MomentChange::Deleted(moment) => {
                self.reminders.cancel(&moment.id).await;
                if let Err(e) = self.reconciler.end(&moment.id).await {
                    debug!(moment_id = %moment.id, error = %e, "End after delete failed");
                }
            }
        }
    }
}
