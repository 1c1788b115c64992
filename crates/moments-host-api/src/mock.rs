//! Mock host primitives for testing

use async_trait::async_trait;
use moments_api::{
    NotificationAuthorization, ReminderOffset, ReminderRequest, SessionActivity, SessionPayload,
    WidgetMoment,
};
use moments_util::{MomentId, TriggerId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{
    HandlePayload, HostError, HostResult, ReminderHost, SessionHandle, SessionHost,
    WidgetPublisher,
};

/// Mock session state for testing
#[derive(Debug, Clone)]
pub struct MockSession {
    pub moment_id: MomentId,
    pub mock_id: u64,
    pub running: bool,
    pub payload: SessionPayload,
    pub pushes: usize,
}

/// Mock session host for unit/integration testing
pub struct MockSessionHost {
    next_id: AtomicU64,
    sessions: Arc<Mutex<HashMap<u64, MockSession>>>,
    start_calls: AtomicUsize,
    push_calls: AtomicUsize,
    end_calls: AtomicUsize,

    /// Host-wide switch (e.g. user disabled live sessions)
    pub enabled: Arc<Mutex<bool>>,

    /// Configure start to be refused
    pub deny_start: Arc<Mutex<bool>>,

    /// Configure push to fail
    pub fail_push: Arc<Mutex<bool>>,

    /// Configure end to fail
    pub fail_end: Arc<Mutex<bool>>,

    /// Simulated latency of a start request
    pub start_delay: Arc<Mutex<Option<Duration>>>,

    /// Simulated latency of a state query
    pub state_delay: Arc<Mutex<Option<Duration>>>,

    /// Simulated latency of an end request
    pub end_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockSessionHost {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            start_calls: AtomicUsize::new(0),
            push_calls: AtomicUsize::new(0),
            end_calls: AtomicUsize::new(0),
            enabled: Arc::new(Mutex::new(true)),
            deny_start: Arc::new(Mutex::new(false)),
            fail_push: Arc::new(Mutex::new(false)),
            fail_end: Arc::new(Mutex::new(false)),
            start_delay: Arc::new(Mutex::new(None)),
            state_delay: Arc::new(Mutex::new(None)),
            end_delay: Arc::new(Mutex::new(None)),
        }
    }

    /// Moments whose session is currently displayed
    pub fn running_moments(&self) -> Vec<MomentId> {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.running)
            .map(|s| s.moment_id.clone())
            .collect()
    }

    /// Latest running session for a moment
    pub fn running_session(&self, moment_id: &MomentId) -> Option<MockSession> {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.running && &s.moment_id == moment_id)
            .cloned()
    }

    /// Simulate the host dismissing a session on its own (user swipe, OS timeout)
    pub fn expire(&self, moment_id: &MomentId) {
        let mut sessions = self.sessions.lock().unwrap();
        for session in sessions.values_mut() {
            if &session.moment_id == moment_id {
                session.running = false;
            }
        }
    }

    pub fn set_deny_start(&self, deny: bool) {
        *self.deny_start.lock().unwrap() = deny;
    }

    pub fn set_fail_push(&self, fail: bool) {
        *self.fail_push.lock().unwrap() = fail;
    }

    pub fn set_fail_end(&self, fail: bool) {
        *self.fail_end.lock().unwrap() = fail;
    }

    pub fn set_start_delay(&self, delay: Option<Duration>) {
        *self.start_delay.lock().unwrap() = delay;
    }

    pub fn set_state_delay(&self, delay: Option<Duration>) {
        *self.state_delay.lock().unwrap() = delay;
    }

    pub fn set_end_delay(&self, delay: Option<Duration>) {
        *self.end_delay.lock().unwrap() = delay;
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn end_calls(&self) -> usize {
        self.end_calls.load(Ordering::SeqCst)
    }

    fn mock_id(handle: &SessionHandle) -> HostResult<u64> {
        match handle.payload() {
            HandlePayload::Mock { id } => Ok(*id),
            _ => Err(HostError::SessionNotFound),
        }
    }
}

impl Default for MockSessionHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionHost for MockSessionHost {
    fn sessions_enabled(&self) -> bool {
        *self.enabled.lock().unwrap()
    }

    async fn request_start(&self, payload: &SessionPayload) -> HostResult<SessionHandle> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.start_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.deny_start.lock().unwrap() {
            return Err(HostError::Denied("Mock start denied".into()));
        }

        let mock_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = MockSession {
            moment_id: payload.moment_id.clone(),
            mock_id,
            running: true,
            payload: payload.clone(),
            pushes: 0,
        };
        self.sessions.lock().unwrap().insert(mock_id, session);

        Ok(SessionHandle::new(
            payload.moment_id.clone(),
            HandlePayload::Mock { id: mock_id },
        ))
    }

    async fn push(&self, handle: &SessionHandle, payload: &SessionPayload) -> HostResult<()> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_push.lock().unwrap() {
            return Err(HostError::Failed("Mock push failure".into()));
        }

        let mock_id = Self::mock_id(handle)?;
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&mock_id) {
            Some(session) if session.running => {
                session.payload = payload.clone();
                session.pushes += 1;
                Ok(())
            }
            _ => Err(HostError::SessionNotFound),
        }
    }

    async fn request_end(&self, handle: &SessionHandle) -> HostResult<()> {
        self.end_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.end_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_end.lock().unwrap() {
            return Err(HostError::Failed("Mock end failure".into()));
        }

        let mock_id = Self::mock_id(handle)?;
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&mock_id) {
            Some(session) => {
                session.running = false;
                Ok(())
            }
            None => Err(HostError::SessionNotFound),
        }
    }

    async fn current_state(&self, handle: &SessionHandle) -> SessionActivity {
        let delay = *self.state_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let Ok(mock_id) = Self::mock_id(handle) else {
            return SessionActivity::Unknown;
        };

        match self.sessions.lock().unwrap().get(&mock_id) {
            Some(session) if session.running => SessionActivity::Active,
            Some(_) => SessionActivity::Ended,
            None => SessionActivity::Unknown,
        }
    }
}

/// Mock reminder host for unit/integration testing
pub struct MockReminderHost {
    authorization: Mutex<NotificationAuthorization>,
    pending: Mutex<BTreeMap<TriggerId, ReminderRequest>>,
    failing_offsets: Mutex<HashSet<ReminderOffset>>,
    schedule_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

impl MockReminderHost {
    pub fn new() -> Self {
        Self::with_authorization(NotificationAuthorization::Granted)
    }

    pub fn with_authorization(authorization: NotificationAuthorization) -> Self {
        Self {
            authorization: Mutex::new(authorization),
            pending: Mutex::new(BTreeMap::new()),
            failing_offsets: Mutex::new(HashSet::new()),
            schedule_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_authorization(&self, authorization: NotificationAuthorization) {
        *self.authorization.lock().unwrap() = authorization;
    }

    /// Make scheduling of one offset fail
    pub fn fail_offset(&self, offset: ReminderOffset) {
        self.failing_offsets.lock().unwrap().insert(offset);
    }

    /// Pending requests ordered by trigger id
    pub fn pending_requests(&self) -> Vec<ReminderRequest> {
        self.pending.lock().unwrap().values().cloned().collect()
    }

    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockReminderHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderHost for MockReminderHost {
    async fn authorization(&self) -> NotificationAuthorization {
        *self.authorization.lock().unwrap()
    }

    async fn request_authorization(&self) -> HostResult<NotificationAuthorization> {
        let mut authorization = self.authorization.lock().unwrap();
        if *authorization == NotificationAuthorization::NotDetermined {
            *authorization = NotificationAuthorization::Granted;
        }
        Ok(*authorization)
    }

    async fn cancel_all(&self, moment_id: &MomentId) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.pending
            .lock()
            .unwrap()
            .retain(|_, request| &request.moment_id != moment_id);
    }

    async fn schedule(&self, request: &ReminderRequest) -> HostResult<()> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_offsets.lock().unwrap().contains(&request.offset) {
            return Err(HostError::Failed("Mock schedule failure".into()));
        }

        self.pending
            .lock()
            .unwrap()
            .insert(request.trigger_id.clone(), request.clone());
        Ok(())
    }

    async fn pending_ids(&self) -> HashSet<TriggerId> {
        self.pending.lock().unwrap().keys().cloned().collect()
    }
}

/// Mock widget feed recording every published list
#[derive(Default)]
pub struct MockWidgetPublisher {
    published: Mutex<Vec<Vec<WidgetMoment>>>,
    fail: Mutex<bool>,
}

impl MockWidgetPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn publish_calls(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    /// Most recently published list
    pub fn last(&self) -> Option<Vec<WidgetMoment>> {
        self.published.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl WidgetPublisher for MockWidgetPublisher {
    async fn publish(&self, moments: &[WidgetMoment]) -> HostResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(HostError::Failed("Mock publish failure".into()));
        }
        self.published.lock().unwrap().push(moments.to_vec());
        Ok(())
    }
}
