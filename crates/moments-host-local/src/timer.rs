//! Reminder host backed by in-process tokio timers

use async_trait::async_trait;
use moments_api::{NotificationAuthorization, ReminderRequest};
use moments_host_api::{HostError, HostResult, ReminderHost};
use moments_util::{MomentId, TriggerId, saturating_std};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct PendingTrigger {
    moment_id: MomentId,
    task: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<TriggerId, PendingTrigger>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fires reminders from sleeping tasks inside the daemon
///
/// Pending triggers do not survive a restart; the daemon reschedules every
/// moment when it loads its first snapshot.
pub struct TimerReminderHost {
    authorization: Mutex<NotificationAuthorization>,
    pending: PendingMap,
    fired_tx: mpsc::UnboundedSender<ReminderRequest>,
    fired_rx: Mutex<Option<mpsc::UnboundedReceiver<ReminderRequest>>>,
}

impl TimerReminderHost {
    pub fn new(authorization: NotificationAuthorization) -> Self {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        Self {
            authorization: Mutex::new(authorization),
            pending: Arc::new(Mutex::new(HashMap::new())),
            fired_tx,
            fired_rx: Mutex::new(Some(fired_rx)),
        }
    }

    /// Take the stream of fired reminders. Only the first caller gets it.
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<ReminderRequest>> {
        lock(&self.fired_rx).take()
    }
}

impl Drop for TimerReminderHost {
    fn drop(&mut self) {
        for (_, trigger) in lock(&self.pending).drain() {
            trigger.task.abort();
        }
    }
}

#[async_trait]
impl ReminderHost for TimerReminderHost {
    async fn authorization(&self) -> NotificationAuthorization {
        *lock(&self.authorization)
    }

    async fn request_authorization(&self) -> HostResult<NotificationAuthorization> {
        let mut authorization = lock(&self.authorization);
        if *authorization == NotificationAuthorization::NotDetermined {
            *authorization = NotificationAuthorization::Granted;
        }
        Ok(*authorization)
    }

    async fn cancel_all(&self, moment_id: &MomentId) {
        let mut pending = lock(&self.pending);
        pending.retain(|trigger_id, trigger| {
            if &trigger.moment_id != moment_id {
                return true;
            }
            trigger.task.abort();
            debug!(trigger_id = %trigger_id, "Reminder cancelled");
            false
        });
    }

    async fn schedule(&self, request: &ReminderRequest) -> HostResult<()> {
        if !lock(&self.authorization).is_granted() {
            return Err(HostError::PermissionDenied(
                "notifications not authorized".into(),
            ));
        }

        let delay = saturating_std(request.fire_at - moments_util::now());
        let pending = self.pending.clone();
        let fired_tx = self.fired_tx.clone();
        let fired = request.clone();

        // Hold the map while spawning so a zero-delay timer cannot fire
        // before its entry exists
        let mut pending_map = lock(&self.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            lock(&pending).remove(&fired.trigger_id);
            info!(
                moment_id = %fired.moment_id,
                title = %fired.title,
                body = %fired.body,
                "Reminder"
            );
            let _ = fired_tx.send(fired);
        });

        let replaced = pending_map.insert(
            request.trigger_id.clone(),
            PendingTrigger {
                moment_id: request.moment_id.clone(),
                task,
            },
        );
        if let Some(previous) = replaced {
            previous.task.abort();
        }

        Ok(())
    }

    async fn pending_ids(&self) -> HashSet<TriggerId> {
        lock(&self.pending).keys().cloned().collect()
    }
}
