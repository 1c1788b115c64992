//! Session reconciler
//!
//! Owns the mapping from moment id to live session handle. All state lives
//! behind one mutex that is never held across an await; host calls happen
//! outside it and their completions update the state afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use moments_api::{Moment, SessionEndReason, SessionInfo, SessionPayload, SessionState};
use moments_config::SessionPolicy;
use moments_host_api::{HostError, SessionHandle, SessionHost};
use moments_util::{MomentId, SessionId, from_std_saturating};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    CoreEvent, DebouncedAction, IneligibleReason, check_eligibility, content_state,
    eligible_moments, select_next,
};

/// Why a session operation did not do what was asked
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Invalid moment: {0}")]
    InvalidMoment(String),

    #[error("Not eligible: {0}")]
    PolicyRejection(IneligibleReason),

    #[error("Host denied the session: {0}")]
    PrimitiveDenied(String),

    #[error("Host operation failed: {0}")]
    PrimitiveFailure(String),

    #[error("No active session")]
    NotActive,

    #[error("Session already tracked ({0:?})")]
    AlreadyTracked(SessionState),

    #[error("Session ended while its start was in flight")]
    CancelledWhileStarting,

    #[error("Reconciler is shut down")]
    Closed,
}

impl SessionError {
    fn from_host(err: &HostError) -> Self {
        if err.is_denial() {
            SessionError::PrimitiveDenied(err.to_string())
        } else {
            SessionError::PrimitiveFailure(err.to_string())
        }
    }
}

/// Reentrancy guard state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    Idle,
    Reconciling,
}

/// What a completed pass decided
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub selected: Option<MomentId>,
    /// Handles dropped because the host no longer reported them active
    pub swept: Vec<MomentId>,
    /// Sessions asked to end because they are no longer selected
    pub ending: Vec<MomentId>,
    /// Moment whose start was dispatched
    pub starting: Option<MomentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Completed(ReconcileSummary),
    /// Another pass was already in flight
    Dropped,
    /// The reconciler is shutting down
    Closed,
}

#[derive(Debug, Clone)]
enum SessionSlot {
    Starting {
        end_requested: bool,
        /// Latest edit seen while the start was in flight
        pending_edit: Option<Moment>,
    },
    Active(SessionHandle),
    Ending(SessionHandle),
}

impl SessionSlot {
    fn starting() -> Self {
        SessionSlot::Starting {
            end_requested: false,
            pending_edit: None,
        }
    }

    fn state(&self) -> SessionState {
        match self {
            SessionSlot::Starting { .. } => SessionState::Starting,
            SessionSlot::Active(_) => SessionState::Active,
            SessionSlot::Ending(_) => SessionState::Ending,
        }
    }

    fn session_id(&self) -> Option<SessionId> {
        match self {
            SessionSlot::Starting { .. } => None,
            SessionSlot::Active(h) | SessionSlot::Ending(h) => Some(h.session_id.clone()),
        }
    }

    fn is_active_handle(&self, handle: &SessionHandle) -> bool {
        matches!(self, SessionSlot::Active(h) if h.session_id == handle.session_id)
    }

    fn is_ending_handle(&self, handle: &SessionHandle) -> bool {
        matches!(self, SessionSlot::Ending(h) if h.session_id == handle.session_id)
    }
}

struct ReconcilerState {
    phase: ReconcilePhase,
    closed: bool,
    slots: HashMap<MomentId, SessionSlot>,
}

struct Inner {
    host: Arc<dyn SessionHost>,
    policy: SessionPolicy,
    state: Mutex<ReconcilerState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    events_tx: mpsc::UnboundedSender<CoreEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<CoreEvent>>>,
    dropped_passes: AtomicU64,
    idle: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resets the phase to idle however the pass exits
struct PhaseGuard<'a> {
    inner: &'a Inner,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        lock(&self.inner.state).phase = ReconcilePhase::Idle;
        self.inner.idle.notify_waiters();
    }
}

/// Single owner of all live session state
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SessionReconciler {
    inner: Arc<Inner>,
}

impl SessionReconciler {
    pub fn new(host: Arc<dyn SessionHost>, policy: SessionPolicy) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                host,
                policy,
                state: Mutex::new(ReconcilerState {
                    phase: ReconcilePhase::Idle,
                    closed: false,
                    slots: HashMap::new(),
                }),
                tasks: Mutex::new(Vec::new()),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                dropped_passes: AtomicU64::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Take the event receiver. Only the first caller gets it.
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<CoreEvent>> {
        lock(&self.inner.events_rx).take()
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.inner.policy
    }

    pub fn phase(&self) -> ReconcilePhase {
        self.state().phase
    }

    /// Whether `shutdown` has been called
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Passes dropped because another was in flight
    pub fn dropped_passes(&self) -> u64 {
        self.inner.dropped_passes.load(Ordering::SeqCst)
    }

    pub fn session_state(&self, moment_id: &MomentId) -> Option<SessionState> {
        self.state().slots.get(moment_id).map(SessionSlot::state)
    }

    /// All tracked sessions, ordered by moment id
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let state = self.state();
        let mut sessions: Vec<SessionInfo> = state
            .slots
            .iter()
            .map(|(moment_id, slot)| SessionInfo {
                moment_id: moment_id.clone(),
                state: slot.state(),
                session_id: slot.session_id(),
            })
            .collect();
        sessions.sort_by(|a, b| a.moment_id.cmp(&b.moment_id));
        sessions
    }

    /// Re-evaluate which moment should hold the session and dispatch the
    /// start/end calls needed to get there
    pub async fn reconcile(&self, moments: &[Moment], now: DateTime<Local>) -> ReconcileOutcome {
        let started = Instant::now();
        let active: Vec<SessionHandle> = {
            let mut state = self.state();
            if state.closed {
                debug!("Reconciler closed, ignoring pass");
                return ReconcileOutcome::Closed;
            }
            if state.phase == ReconcilePhase::Reconciling {
                let dropped = self.inner.dropped_passes.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(dropped, "Reconciliation already in flight, dropping request");
                return ReconcileOutcome::Dropped;
            }
            state.phase = ReconcilePhase::Reconciling;
            state
                .slots
                .values()
                .filter_map(|slot| match slot {
                    SessionSlot::Active(handle) => Some(handle.clone()),
                    _ => None,
                })
                .collect()
        };
        let _guard = PhaseGuard { inner: &self.inner };

        let mut stale = Vec::new();
        for handle in active {
            let activity = self.inner.host.current_state(&handle).await;
            if !activity.is_active() {
                stale.push((handle, activity));
            }
        }

        let selected = if self.inner.host.sessions_enabled() {
            select_next(eligible_moments(moments, now, &self.inner.policy))
        } else {
            None
        };

        let mut summary = ReconcileSummary {
            selected: selected.map(|m| m.id.clone()),
            ..Default::default()
        };
        let mut to_end = Vec::new();
        let mut to_start = None;

        {
            let mut state = self.state();
            if state.closed {
                debug!("Reconciler closed during pass, dispatching nothing");
                return ReconcileOutcome::Closed;
            }

            for (handle, activity) in stale {
                let still_tracked = state
                    .slots
                    .get(&handle.moment_id)
                    .is_some_and(|slot| slot.is_active_handle(&handle));
                if !still_tracked {
                    continue;
                }

                state.slots.remove(&handle.moment_id);
                debug!(
                    moment_id = %handle.moment_id,
                    session_id = %handle.session_id,
                    activity = ?activity,
                    "Swept stale session handle"
                );
                self.emit(CoreEvent::SessionEnded {
                    moment_id: handle.moment_id.clone(),
                    session_id: Some(handle.session_id.clone()),
                    reason: SessionEndReason::HostEnded,
                });
                summary.swept.push(handle.moment_id);
            }

            for (moment_id, slot) in state.slots.iter_mut() {
                if summary.selected.as_ref() == Some(moment_id) {
                    continue;
                }
                match slot {
                    SessionSlot::Active(handle) => {
                        let handle = handle.clone();
                        *slot = SessionSlot::Ending(handle.clone());
                        to_end.push(handle);
                        summary.ending.push(moment_id.clone());
                    }
                    SessionSlot::Starting { end_requested, .. } => {
                        *end_requested = true;
                        summary.ending.push(moment_id.clone());
                    }
                    SessionSlot::Ending(_) => {}
                }
            }

            if let Some(moment) = selected {
                let tracked = matches!(
                    state.slots.get(&moment.id),
                    Some(SessionSlot::Active(_)) | Some(SessionSlot::Starting { .. })
                );
                if !tracked {
                    match self.validate_start(moment, now) {
                        Ok(()) => {
                            state
                                .slots
                                .insert(moment.id.clone(), SessionSlot::starting());
                            summary.starting = Some(moment.id.clone());
                            to_start = Some(moment.clone());
                        }
                        Err(err) => self.reject(&moment.id, err),
                    }
                }
            }
        }

        for handle in to_end {
            let this = self.clone();
            self.track(tokio::spawn(async move {
                let _ = this.finish_end(handle, SessionEndReason::Deselected).await;
            }));
        }

        if let Some(moment) = to_start {
            let this = self.clone();
            self.track(tokio::spawn(async move {
                let _ = this.run_start(moment, now, started).await;
            }));
        }

        summary.ending.sort();
        debug!(
            selected = ?summary.selected,
            swept = summary.swept.len(),
            ending = summary.ending.len(),
            starting = ?summary.starting,
            "Reconciliation pass complete"
        );

        ReconcileOutcome::Completed(summary)
    }

    /// Start a session for one moment and wait for the host's answer
    pub async fn start(
        &self,
        moment: &Moment,
        now: DateTime<Local>,
    ) -> Result<SessionId, SessionError> {
        if let Err(err) = self.validate_start(moment, now) {
            self.reject(&moment.id, err.clone());
            return Err(err);
        }

        let started = Instant::now();
        {
            let mut state = self.state();
            if state.closed {
                return Err(SessionError::Closed);
            }
            match state.slots.get(&moment.id) {
                Some(SessionSlot::Starting { .. }) => {
                    return Err(SessionError::AlreadyTracked(SessionState::Starting));
                }
                Some(SessionSlot::Active(_)) => {
                    return Err(SessionError::AlreadyTracked(SessionState::Active));
                }
                Some(SessionSlot::Ending(_)) | None => {}
            }
            state.slots.insert(moment.id.clone(), SessionSlot::starting());
        }

        self.run_start(moment.clone(), now, started).await
    }

    /// Push fresh content to the moment's active session. An edit arriving
    /// while the start is in flight is pushed once the session is up.
    pub async fn update(&self, moment: &Moment, now: DateTime<Local>) -> Result<(), SessionError> {
        let handle = {
            let mut state = self.state();
            match state.slots.get_mut(&moment.id) {
                Some(SessionSlot::Active(handle)) => handle.clone(),
                Some(SessionSlot::Starting { pending_edit, .. }) => {
                    *pending_edit = Some(moment.clone());
                    debug!(moment_id = %moment.id, "Edit held until the start completes");
                    return Ok(());
                }
                _ => return Err(SessionError::NotActive),
            }
        };

        let content = content_state(moment, now);
        let mut payload = SessionPayload::new(moment, content.clone());
        if let Some(stale_at) =
            now.checked_add_signed(from_std_saturating(self.inner.policy.stale_after))
        {
            payload = payload.with_stale_at(stale_at);
        }

        match self.inner.host.push(&handle, &payload).await {
            Ok(()) => {
                debug!(
                    moment_id = %moment.id,
                    remaining_secs = content.time_remaining.as_secs(),
                    progress = content.progress,
                    "Session updated"
                );
                self.emit(CoreEvent::SessionUpdated {
                    moment_id: moment.id.clone(),
                    time_remaining: content.time_remaining,
                    progress: content.progress,
                });
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.state();
                    if state
                        .slots
                        .get(&moment.id)
                        .is_some_and(|slot| slot.is_active_handle(&handle))
                    {
                        state.slots.remove(&moment.id);
                    }
                }
                warn!(
                    moment_id = %moment.id,
                    error = %err,
                    "Session update failed, dropping handle"
                );
                self.emit(CoreEvent::SessionEnded {
                    moment_id: moment.id.clone(),
                    session_id: Some(handle.session_id.clone()),
                    reason: SessionEndReason::UpdateFailed {
                        error: err.to_string(),
                    },
                });
                Err(SessionError::PrimitiveFailure(err.to_string()))
            }
        }
    }

    /// End the moment's session. A no-op when nothing is tracked or an end is
    /// already in flight.
    pub async fn end(&self, moment_id: &MomentId) -> Result<(), SessionError> {
        self.end_with_reason(moment_id, SessionEndReason::Requested)
            .await
    }

    /// End every tracked session and wait for outstanding host calls
    pub async fn end_all(&self) {
        let ids: Vec<MomentId> = self.state().slots.keys().cloned().collect();
        for moment_id in ids {
            let _ = self
                .end_with_reason(&moment_id, SessionEndReason::Requested)
                .await;
        }
        self.settle().await;
    }

    /// Refuse further passes and starts, let an in-flight pass finish, then
    /// end every tracked session
    pub async fn shutdown(&self) {
        self.state().closed = true;
        self.wait_idle().await;
        self.end_all().await;
        info!("Session reconciler shut down");
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.phase() == ReconcilePhase::Idle {
                return;
            }
            notified.await;
        }
    }

    /// Wait until every start/end dispatched by a pass has completed
    pub async fn settle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.inner.tasks));
            if pending.is_empty() {
                break;
            }
            for task in pending {
                if let Err(e) = task.await {
                    warn!(error = %e, "Session task failed");
                }
            }
        }
    }

    async fn end_with_reason(
        &self,
        moment_id: &MomentId,
        reason: SessionEndReason,
    ) -> Result<(), SessionError> {
        let handle = {
            let mut state = self.state();
            let handle = match state.slots.get_mut(moment_id) {
                Some(SessionSlot::Active(handle)) => handle.clone(),
                Some(SessionSlot::Starting { end_requested, .. }) => {
                    *end_requested = true;
                    debug!(moment_id = %moment_id, "End requested while starting");
                    return Ok(());
                }
                Some(SessionSlot::Ending(_)) | None => return Ok(()),
            };
            state
                .slots
                .insert(moment_id.clone(), SessionSlot::Ending(handle.clone()));
            handle
        };

        self.finish_end(handle, reason).await
    }

    async fn run_start(
        &self,
        moment: Moment,
        now: DateTime<Local>,
        started: Instant,
    ) -> Result<SessionId, SessionError> {
        // Re-check against the clock as it is now, not as it was when the
        // pass made its decision
        let now = now
            .checked_add_signed(from_std_saturating(started.elapsed()))
            .unwrap_or(now);
        if let Err(err) = self.validate_start(&moment, now) {
            self.clear_starting(&moment.id);
            self.reject(&moment.id, err.clone());
            return Err(err);
        }

        let payload = SessionPayload::new(&moment, content_state(&moment, now));

        let handle = match self.inner.host.request_start(&payload).await {
            Ok(handle) => handle,
            Err(err) => {
                self.clear_starting(&moment.id);
                let error = SessionError::from_host(&err);
                if err.is_denial() {
                    warn!(moment_id = %moment.id, error = %err, "Host denied session start, not retrying");
                } else {
                    warn!(moment_id = %moment.id, error = %err, "Session start failed");
                }
                self.emit(CoreEvent::StartRejected {
                    moment_id: moment.id.clone(),
                    error: error.clone(),
                });
                return Err(error);
            }
        };

        let (cancelled, pending_edit) = {
            let mut state = self.state();
            match state.slots.remove(&moment.id) {
                Some(SessionSlot::Starting {
                    end_requested,
                    pending_edit,
                }) => {
                    let slot = if end_requested {
                        SessionSlot::Ending(handle.clone())
                    } else {
                        SessionSlot::Active(handle.clone())
                    };
                    state.slots.insert(moment.id.clone(), slot);
                    (end_requested, pending_edit)
                }
                // Nobody is waiting for this session any more
                Some(other) => {
                    state.slots.insert(moment.id.clone(), other);
                    (true, None)
                }
                None => (true, None),
            }
        };

        info!(
            moment_id = %moment.id,
            session_id = %handle.session_id,
            title = %moment.title,
            "Session started"
        );
        self.emit(CoreEvent::SessionStarted {
            moment_id: moment.id.clone(),
            session_id: handle.session_id.clone(),
        });

        if cancelled {
            let _ = self
                .finish_end(handle, SessionEndReason::CancelledWhileStarting)
                .await;
            return Err(SessionError::CancelledWhileStarting);
        }

        if let Some(edited) = pending_edit {
            let _ = self.update(&edited, now).await;
        }

        Ok(handle.session_id)
    }

    fn clear_starting(&self, moment_id: &MomentId) {
        let mut state = self.state();
        if matches!(state.slots.get(moment_id), Some(SessionSlot::Starting { .. })) {
            state.slots.remove(moment_id);
        }
    }

    async fn finish_end(
        &self,
        handle: SessionHandle,
        reason: SessionEndReason,
    ) -> Result<(), SessionError> {
        let result = self.inner.host.request_end(&handle).await;

        {
            let mut state = self.state();
            if state
                .slots
                .get(&handle.moment_id)
                .is_some_and(|slot| slot.is_ending_handle(&handle))
            {
                state.slots.remove(&handle.moment_id);
            }
        }

        self.emit(CoreEvent::SessionEnded {
            moment_id: handle.moment_id.clone(),
            session_id: Some(handle.session_id.clone()),
            reason: reason.clone(),
        });

        match result {
            Ok(()) => {
                info!(
                    moment_id = %handle.moment_id,
                    session_id = %handle.session_id,
                    reason = ?reason,
                    "Session ended"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    moment_id = %handle.moment_id,
                    error = %err,
                    "Session end failed, dropping handle"
                );
                Err(SessionError::from_host(&err))
            }
        }
    }

    fn validate_start(&self, moment: &Moment, now: DateTime<Local>) -> Result<(), SessionError> {
        if moment.title.trim().is_empty() {
            return Err(SessionError::InvalidMoment("empty title".into()));
        }
        if moment.target <= now {
            return Err(SessionError::InvalidMoment(
                "target is not in the future".into(),
            ));
        }
        if moment.symbol.trim().is_empty() {
            return Err(SessionError::InvalidMoment("empty symbol".into()));
        }

        check_eligibility(moment, now, &self.inner.policy)
            .map_err(SessionError::PolicyRejection)?;

        if !self.inner.host.sessions_enabled() {
            return Err(SessionError::PrimitiveDenied(
                "live sessions are disabled on this host".into(),
            ));
        }

        Ok(())
    }

    fn reject(&self, moment_id: &MomentId, error: SessionError) {
        debug!(moment_id = %moment_id, error = %error, "Session start rejected");
        self.emit(CoreEvent::StartRejected {
            moment_id: moment_id.clone(),
            error,
        });
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn emit(&self, event: CoreEvent) {
        let _ = self.inner.events_tx.send(event);
    }

    fn state(&self) -> MutexGuard<'_, ReconcilerState> {
        lock(&self.inner.state)
    }
}

#[async_trait]
impl DebouncedAction<Vec<Moment>> for SessionReconciler {
    async fn run(&self, moments: Vec<Moment>) {
        self.reconcile(&moments, moments_util::now()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use moments_host_api::MockSessionHost;
    use std::time::Duration;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn moment(title: &str, remaining: chrono::Duration) -> Moment {
        Moment::new(title, now() + remaining, now() - chrono::Duration::days(1))
            .with_session_threshold_minutes(24 * 60)
    }

    fn setup() -> (Arc<MockSessionHost>, SessionReconciler) {
        let host = Arc::new(MockSessionHost::new());
        let reconciler = SessionReconciler::new(host.clone(), SessionPolicy::default());
        (host, reconciler)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<CoreEvent>) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn live(reconciler: &SessionReconciler) -> Vec<MomentId> {
        reconciler
            .sessions()
            .into_iter()
            .filter(|s| matches!(s.state, SessionState::Active | SessionState::Starting))
            .map(|s| s.moment_id)
            .collect()
    }

    #[tokio::test]
    async fn test_selects_nearest_eligible() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(2));
        let b = moment("B", chrono::Duration::minutes(30));
        let moments = vec![a.clone(), b.clone()];

        let outcome = reconciler.reconcile(&moments, now()).await;
        let ReconcileOutcome::Completed(summary) = outcome else {
            panic!("pass should not be dropped");
        };
        assert_eq!(summary.selected, Some(b.id.clone()));
        assert_eq!(summary.starting, Some(b.id.clone()));

        reconciler.settle().await;
        assert_eq!(live(&reconciler), vec![b.id.clone()]);
        assert_eq!(reconciler.session_state(&b.id), Some(SessionState::Active));
        assert_eq!(reconciler.session_state(&a.id), None);
        assert_eq!(host.running_moments(), vec![b.id]);
    }

    #[tokio::test]
    async fn test_active_session_left_untouched() {
        let (host, reconciler) = setup();
        let moments = vec![moment("A", chrono::Duration::hours(1))];

        reconciler.reconcile(&moments, now()).await;
        reconciler.settle().await;
        let ReconcileOutcome::Completed(summary) = reconciler.reconcile(&moments, now()).await
        else {
            panic!("pass should not be dropped");
        };
        reconciler.settle().await;

        assert_eq!(summary.starting, None);
        assert!(summary.ending.is_empty());
        assert_eq!(host.start_calls(), 1);
        assert_eq!(host.end_calls(), 0);
    }

    #[tokio::test]
    async fn test_deleting_selected_switches_session() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(2));
        let b = moment("B", chrono::Duration::minutes(30));

        reconciler.reconcile(&[a.clone(), b.clone()], now()).await;
        reconciler.settle().await;
        assert_eq!(host.running_moments(), vec![b.id.clone()]);

        reconciler.end(&b.id).await.unwrap();
        reconciler.reconcile(&[a.clone()], now()).await;
        reconciler.settle().await;

        assert_eq!(host.running_moments(), vec![a.id.clone()]);
        assert_eq!(live(&reconciler), vec![a.id]);
        assert_eq!(host.end_calls(), 1);
    }

    #[tokio::test]
    async fn test_deselected_session_is_ended() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(2));
        let b = moment("B", chrono::Duration::minutes(30));
        let mut events = reconciler.subscribe().unwrap();

        reconciler.reconcile(&[a.clone()], now()).await;
        reconciler.settle().await;
        let ReconcileOutcome::Completed(summary) =
            reconciler.reconcile(&[a.clone(), b.clone()], now()).await
        else {
            panic!("pass should not be dropped");
        };
        reconciler.settle().await;

        assert_eq!(summary.ending, vec![a.id.clone()]);
        assert_eq!(host.running_moments(), vec![b.id.clone()]);
        assert!(drain(&mut events).iter().any(|e| matches!(
            e,
            CoreEvent::SessionEnded { moment_id, reason: SessionEndReason::Deselected, .. }
                if moment_id == &a.id
        )));
    }

    #[tokio::test]
    async fn test_end_twice_single_host_call() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));

        reconciler.start(&a, now()).await.unwrap();
        assert!(reconciler.end(&a.id).await.is_ok());
        assert!(reconciler.end(&a.id).await.is_ok());

        assert_eq!(host.end_calls(), 1);
        assert_eq!(reconciler.session_state(&a.id), None);
    }

    #[tokio::test]
    async fn test_end_of_unknown_moment_is_noop() {
        let (host, reconciler) = setup();

        assert!(reconciler.end(&MomentId::new()).await.is_ok());
        assert_eq!(host.end_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_while_starting() {
        let (host, reconciler) = setup();
        host.set_start_delay(Some(Duration::from_secs(1)));
        let a = moment("A", chrono::Duration::hours(1));
        let mut events = reconciler.subscribe().unwrap();

        reconciler.reconcile(&[a.clone()], now()).await;
        assert_eq!(reconciler.session_state(&a.id), Some(SessionState::Starting));

        reconciler.end(&a.id).await.unwrap();
        assert_eq!(host.end_calls(), 0);

        reconciler.settle().await;
        assert_eq!(reconciler.session_state(&a.id), None);
        assert!(host.running_moments().is_empty());
        assert_eq!(host.start_calls(), 1);
        assert_eq!(host.end_calls(), 1);
        assert!(drain(&mut events).iter().any(|e| matches!(
            e,
            CoreEvent::SessionEnded {
                reason: SessionEndReason::CancelledWhileStarting,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_duplicate_start_while_starting() {
        let (host, reconciler) = setup();
        host.set_start_delay(Some(Duration::from_secs(1)));
        let moments = vec![moment("A", chrono::Duration::hours(1))];

        reconciler.reconcile(&moments, now()).await;
        reconciler.reconcile(&moments, now()).await;
        let duplicate = reconciler.start(&moments[0], now()).await;
        reconciler.settle().await;

        assert!(matches!(
            duplicate,
            Err(SessionError::AlreadyTracked(SessionState::Starting))
        ));
        assert_eq!(host.start_calls(), 1);
        assert_eq!(host.running_moments().len(), 1);
    }

    #[tokio::test]
    async fn test_denied_start_not_retried() {
        let (host, reconciler) = setup();
        host.set_deny_start(true);
        let a = moment("A", chrono::Duration::hours(1));
        let mut events = reconciler.subscribe().unwrap();

        reconciler.reconcile(&[a.clone()], now()).await;
        reconciler.settle().await;

        assert_eq!(reconciler.session_state(&a.id), None);
        assert_eq!(host.start_calls(), 1);
        assert!(drain(&mut events).iter().any(|e| matches!(
            e,
            CoreEvent::StartRejected {
                error: SessionError::PrimitiveDenied(_),
                ..
            }
        )));

        let direct = reconciler.start(&a, now()).await;
        assert!(matches!(direct, Err(SessionError::PrimitiveDenied(_))));
        assert_eq!(host.start_calls(), 2);
    }

    #[tokio::test]
    async fn test_sweep_drops_expired_session() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));

        reconciler.reconcile(&[a.clone()], now()).await;
        reconciler.settle().await;
        host.expire(&a.id);

        let ReconcileOutcome::Completed(summary) = reconciler.reconcile(&[a.clone()], now()).await
        else {
            panic!("pass should not be dropped");
        };
        reconciler.settle().await;

        assert_eq!(summary.swept, vec![a.id.clone()]);
        assert_eq!(summary.starting, Some(a.id.clone()));
        assert_eq!(host.start_calls(), 2);
        assert_eq!(host.end_calls(), 0);
        assert_eq!(host.running_moments(), vec![a.id]);
    }

    #[tokio::test]
    async fn test_update_pushes_with_stale_hint() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));

        reconciler.start(&a, now()).await.unwrap();
        let later = now() + chrono::Duration::minutes(10);
        reconciler.update(&a, later).await.unwrap();

        let session = host.running_session(&a.id).unwrap();
        assert_eq!(session.pushes, 1);
        assert_eq!(
            session.payload.state.time_remaining,
            Duration::from_secs(50 * 60)
        );
        assert_eq!(
            session.payload.stale_at,
            Some(later + chrono::Duration::hours(1))
        );
    }

    #[tokio::test]
    async fn test_update_requires_active_session() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));

        let result = reconciler.update(&a, now()).await;
        assert!(matches!(result, Err(SessionError::NotActive)));
        assert_eq!(host.push_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_failure_drops_handle() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));

        reconciler.start(&a, now()).await.unwrap();
        host.set_fail_push(true);

        let result = reconciler.update(&a, now()).await;
        assert!(matches!(result, Err(SessionError::PrimitiveFailure(_))));
        assert_eq!(reconciler.session_state(&a.id), None);
    }

    #[tokio::test]
    async fn test_end_failure_still_drops_handle() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));

        reconciler.start(&a, now()).await.unwrap();
        host.set_fail_end(true);

        let result = reconciler.end(&a.id).await;
        assert!(matches!(result, Err(SessionError::PrimitiveFailure(_))));
        assert_eq!(reconciler.session_state(&a.id), None);
    }

    #[tokio::test]
    async fn test_start_validation() {
        let (host, reconciler) = setup();

        let untitled = moment("  ", chrono::Duration::hours(1));
        assert!(matches!(
            reconciler.start(&untitled, now()).await,
            Err(SessionError::InvalidMoment(_))
        ));

        let unsymbolled = moment("A", chrono::Duration::hours(1)).with_symbol(" ");
        assert!(matches!(
            reconciler.start(&unsymbolled, now()).await,
            Err(SessionError::InvalidMoment(_))
        ));

        let past = moment("A", chrono::Duration::hours(-1));
        assert!(matches!(
            reconciler.start(&past, now()).await,
            Err(SessionError::InvalidMoment(_))
        ));

        let too_soon = moment("A", chrono::Duration::seconds(300));
        assert!(matches!(
            reconciler.start(&too_soon, now()).await,
            Err(SessionError::PolicyRejection(IneligibleReason::TooSoon { .. }))
        ));

        assert_eq!(host.start_calls(), 0);
    }

    #[tokio::test]
    async fn test_host_disabled_starts_nothing() {
        let (host, reconciler) = setup();
        *host.enabled.lock().unwrap() = false;

        let outcome = reconciler
            .reconcile(&[moment("A", chrono::Duration::hours(1))], now())
            .await;
        reconciler.settle().await;

        assert!(matches!(
            outcome,
            ReconcileOutcome::Completed(ReconcileSummary { selected: None, .. })
        ));
        assert_eq!(host.start_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_pass_dropped() {
        let (host, reconciler) = setup();
        let moments = vec![moment("A", chrono::Duration::hours(1))];
        reconciler.reconcile(&moments, now()).await;
        reconciler.settle().await;

        host.set_state_delay(Some(Duration::from_secs(1)));
        let (first, second) = tokio::join!(
            reconciler.reconcile(&moments, now()),
            reconciler.reconcile(&moments, now())
        );

        assert!(matches!(first, ReconcileOutcome::Completed(_)));
        assert_eq!(second, ReconcileOutcome::Dropped);
        assert_eq!(reconciler.dropped_passes(), 1);
        assert_eq!(reconciler.phase(), ReconcilePhase::Idle);
        assert_eq!(host.start_calls(), 1);
    }

    #[tokio::test]
    async fn test_at_most_one_live_session() {
        let (host, reconciler) = setup();
        let mut moments: Vec<Moment> = (1..=5)
            .map(|i| moment(&format!("M{}", i), chrono::Duration::minutes(20 * i)))
            .collect();

        for _ in 0..3 {
            reconciler.reconcile(&moments, now()).await;
            reconciler.settle().await;

            let nearest = moments.iter().min_by_key(|m| m.target).unwrap();
            assert_eq!(live(&reconciler), vec![nearest.id.clone()]);
            assert_eq!(host.running_moments(), vec![nearest.id.clone()]);

            moments.remove(0);
        }
    }

    #[tokio::test]
    async fn test_end_all() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));

        reconciler.reconcile(&[a.clone()], now()).await;
        reconciler.settle().await;
        reconciler.end_all().await;

        assert!(reconciler.sessions().is_empty());
        assert!(host.running_moments().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_pass_in_flight() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));
        reconciler.reconcile(&[a.clone()], now()).await;
        reconciler.settle().await;

        host.set_state_delay(Some(Duration::from_secs(1)));
        let pass = tokio::spawn({
            let reconciler = reconciler.clone();
            let a = a.clone();
            async move { reconciler.reconcile(&[a], now()).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(reconciler.phase(), ReconcilePhase::Reconciling);

        reconciler.shutdown().await;

        assert_eq!(pass.await.unwrap(), ReconcileOutcome::Closed);
        reconciler.settle().await;
        assert!(reconciler.sessions().is_empty());
        assert!(host.running_moments().is_empty());
        assert_eq!(host.start_calls(), 1);
    }

    #[tokio::test]
    async fn test_closed_reconciler_refuses_work() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));
        reconciler.shutdown().await;

        assert!(reconciler.is_closed());
        assert_eq!(
            reconciler.reconcile(&[a.clone()], now()).await,
            ReconcileOutcome::Closed
        );
        assert!(matches!(
            reconciler.start(&a, now()).await,
            Err(SessionError::Closed)
        ));
        assert_eq!(reconciler.dropped_passes(), 0);
        assert_eq!(host.start_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_start_pushed_after_start() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));
        host.set_start_delay(Some(Duration::from_secs(1)));

        reconciler.reconcile(&[a.clone()], now()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(reconciler.session_state(&a.id), Some(SessionState::Starting));

        let mut renamed = a.clone();
        renamed.title = "Renamed".into();
        reconciler.update(&renamed, now()).await.unwrap();
        reconciler.settle().await;

        let session = host.running_session(&a.id).unwrap();
        assert_eq!(session.payload.title, "Renamed");
        assert_eq!(session.pushes, 1);
        assert_eq!(reconciler.session_state(&a.id), Some(SessionState::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rechecked_against_current_clock() {
        let (host, reconciler) = setup();
        let mut rx = reconciler.subscribe().unwrap();
        // Eligible when the pass decides, inside the lower bound by the time
        // the start runs
        let a = moment("A", chrono::Duration::seconds(301));

        let ReconcileOutcome::Completed(summary) = reconciler.reconcile(&[a.clone()], now()).await
        else {
            panic!("pass should not be dropped");
        };
        assert_eq!(summary.starting, Some(a.id.clone()));
        tokio::time::advance(Duration::from_secs(5)).await;
        reconciler.settle().await;

        assert_eq!(host.start_calls(), 0);
        assert_eq!(reconciler.session_state(&a.id), None);
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            CoreEvent::StartRejected {
                error: SessionError::PolicyRejection(IneligibleReason::TooSoon { .. }),
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reselected_while_ending_keeps_new_start() {
        let (host, reconciler) = setup();
        let a = moment("A", chrono::Duration::hours(1));
        reconciler.reconcile(&[a.clone()], now()).await;
        reconciler.settle().await;

        host.set_end_delay(Some(Duration::from_secs(1)));
        reconciler.reconcile(&[], now()).await;
        assert_eq!(reconciler.session_state(&a.id), Some(SessionState::Ending));

        reconciler.reconcile(&[a.clone()], now()).await;
        assert_eq!(reconciler.session_state(&a.id), Some(SessionState::Starting));
        reconciler.settle().await;

        assert_eq!(reconciler.session_state(&a.id), Some(SessionState::Active));
        assert_eq!(host.running_moments(), vec![a.id]);
        assert_eq!(host.start_calls(), 2);
        assert_eq!(host.end_calls(), 1);
    }
}
