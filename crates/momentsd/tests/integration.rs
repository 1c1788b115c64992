//! Integration tests for momentsd
//!
//! These tests drive the coordinator against the local host primitives
//! (status file sessions, timer reminders, widget feed) the daemon runs with.

use moments_api::{
    Moment, NotificationAuthorization, ReminderFlags, ReminderOffset, SessionState,
};
use moments_config::{Policy, parse_config};
use moments_core::{
    ChangeEvent, CoreEvent, MomentChange, MomentsCoordinator, ReminderScheduler,
    SessionReconciler,
};
use moments_host_api::ReminderHost;
use moments_host_local::{StatusFileSessionHost, TimerReminderHost, WidgetFileWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tokio::sync::mpsc;

const TEST_CONFIG: &str = r#"
config_version = 1

[session]
min_remaining_seconds = 300
max_remaining_seconds = 604800

[debounce]
quiet_period_ms = 20

[reminders]
enabled = true
"#;

struct Daemon {
    _dir: TempDir,
    status_path: PathBuf,
    widgets_path: PathBuf,
    reminder_host: Arc<TimerReminderHost>,
    coordinator: MomentsCoordinator,
    events: mpsc::UnboundedReceiver<CoreEvent>,
}

async fn start_daemon(policy: Policy) -> Daemon {
    let dir = tempdir().unwrap();
    let status_path = dir.path().join("run/session.json");
    let widgets_path = dir.path().join("data/moments-widgets.json");

    let session_host = Arc::new(StatusFileSessionHost::new(&status_path));
    let reconciler = SessionReconciler::new(session_host, policy.session.clone());
    let events = reconciler.subscribe().unwrap();

    let reminder_host = Arc::new(TimerReminderHost::new(
        NotificationAuthorization::NotDetermined,
    ));
    let reminders = ReminderScheduler::new(reminder_host.clone(), policy.reminders.enabled);
    assert_eq!(
        reminders.prepare().await.unwrap(),
        NotificationAuthorization::Granted
    );

    let coordinator =
        MomentsCoordinator::new(reconciler, reminders, policy.debounce.quiet_period)
            .with_widgets(Arc::new(WidgetFileWriter::new(&widgets_path)));

    Daemon {
        _dir: dir,
        status_path,
        widgets_path,
        reminder_host,
        coordinator,
        events,
    }
}

fn moment(title: &str, remaining: chrono::Duration) -> Moment {
    let now = moments_util::now();
    Moment::new(title, now + remaining, now - chrono::Duration::days(1))
        .with_session_threshold_minutes(24 * 60)
        .with_reminders(ReminderFlags::all())
}

fn widget_titles(path: &Path) -> Vec<String> {
    let bytes = std::fs::read(path).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    json["moments"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["title"].as_str().map(String::from))
        .collect()
}

fn status_title(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let json: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    json["title"].as_str().map(String::from)
}

/// Let the debounced pass run and its host calls finish
async fn quiesce(daemon: &Daemon) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    daemon.coordinator.reconciler().settle().await;
}

fn drain(events: &mut mpsc::UnboundedReceiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[test]
fn test_config_reaches_policy() {
    let policy = parse_config(TEST_CONFIG).unwrap();

    assert_eq!(policy.debounce.quiet_period, Duration::from_millis(20));
    assert_eq!(policy.session.min_remaining, Duration::from_secs(300));
    assert!(policy.reminders.enabled);
    assert_eq!(policy.service.tick_interval, Duration::from_secs(60));
}

#[tokio::test]
async fn test_nearest_moment_written_to_status_file() {
    let mut daemon = start_daemon(parse_config(TEST_CONFIG).unwrap()).await;
    let a = moment("Concert", chrono::Duration::hours(2));
    let b = moment("Dentist", chrono::Duration::minutes(30));

    daemon
        .coordinator
        .handle(
            ChangeEvent::Collection(vec![a.clone(), b.clone()]),
            moments_util::now(),
        )
        .await;
    quiesce(&daemon).await;

    assert_eq!(status_title(&daemon.status_path).as_deref(), Some("Dentist"));
    assert_eq!(
        daemon.coordinator.reconciler().session_state(&b.id),
        Some(SessionState::Active)
    );
    assert_eq!(daemon.coordinator.reconciler().session_state(&a.id), None);

    let events = drain(&mut daemon.events);
    assert!(events.iter().any(
        |e| matches!(e, CoreEvent::SessionStarted { moment_id, .. } if moment_id == &b.id)
    ));
}

#[tokio::test]
async fn test_deleting_selected_moment_switches_session() {
    let mut daemon = start_daemon(parse_config(TEST_CONFIG).unwrap()).await;
    let a = moment("Concert", chrono::Duration::hours(2));
    let b = moment("Dentist", chrono::Duration::minutes(30));

    daemon
        .coordinator
        .handle(
            ChangeEvent::Collection(vec![a.clone(), b.clone()]),
            moments_util::now(),
        )
        .await;
    quiesce(&daemon).await;

    let changes = daemon
        .coordinator
        .handle(ChangeEvent::Collection(vec![a.clone()]), moments_util::now())
        .await;
    assert!(matches!(changes.as_slice(), [MomentChange::Deleted(m)] if m.id == b.id));
    quiesce(&daemon).await;

    assert_eq!(status_title(&daemon.status_path).as_deref(), Some("Concert"));
    let sessions = daemon.coordinator.reconciler().sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].moment_id, a.id);

    // Deleting a moment takes its reminders with it
    let pending = daemon.reminder_host.pending_ids().await;
    assert!(!pending.is_empty());
    assert!(pending.iter().all(|id| id.belongs_to(&a.id)));
}

#[tokio::test]
async fn test_edit_rewrites_status_file() {
    let mut daemon = start_daemon(parse_config(TEST_CONFIG).unwrap()).await;
    let a = moment("Flight", chrono::Duration::hours(3));

    daemon
        .coordinator
        .handle(ChangeEvent::Collection(vec![a.clone()]), moments_util::now())
        .await;
    quiesce(&daemon).await;

    let mut edited = a.clone();
    edited.title = "Flight (delayed)".into();
    edited.target = a.target + chrono::Duration::minutes(45);
    daemon
        .coordinator
        .handle(ChangeEvent::Collection(vec![edited]), moments_util::now())
        .await;
    quiesce(&daemon).await;

    assert_eq!(
        status_title(&daemon.status_path).as_deref(),
        Some("Flight (delayed)")
    );
    let events = drain(&mut daemon.events);
    let starts = events
        .iter()
        .filter(|e| matches!(e, CoreEvent::SessionStarted { .. }))
        .count();
    assert_eq!(starts, 1);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, CoreEvent::SessionUpdated { .. }))
    );
}

#[tokio::test]
async fn test_far_moments_get_reminders_but_no_session() {
    let mut daemon = start_daemon(parse_config(TEST_CONFIG).unwrap()).await;
    let far = moment("Vacation", chrono::Duration::days(30));

    daemon
        .coordinator
        .handle(ChangeEvent::Collection(vec![far.clone()]), moments_util::now())
        .await;
    quiesce(&daemon).await;

    assert!(!daemon.status_path.exists());
    assert!(daemon.coordinator.reconciler().sessions().is_empty());
    assert_eq!(
        daemon.reminder_host.pending_ids().await.len(),
        ReminderOffset::ALL.len()
    );
}

#[tokio::test]
async fn test_shutdown_removes_status_file() {
    let mut daemon = start_daemon(parse_config(TEST_CONFIG).unwrap()).await;
    let a = moment("Deadline", chrono::Duration::hours(1));

    daemon
        .coordinator
        .handle(ChangeEvent::Collection(vec![a.clone()]), moments_util::now())
        .await;
    quiesce(&daemon).await;
    assert!(daemon.status_path.exists());

    daemon.coordinator.shutdown().await;

    assert!(!daemon.status_path.exists());
    let events = drain(&mut daemon.events);
    assert!(events.iter().any(
        |e| matches!(e, CoreEvent::SessionEnded { moment_id, .. } if moment_id == &a.id)
    ));
}

#[tokio::test]
async fn test_reminders_disabled_by_config() {
    let config = TEST_CONFIG.replace("enabled = true", "enabled = false");
    let daemon = start_daemon(parse_config(&config).unwrap()).await;
    let mut coordinator = daemon.coordinator;
    let a = moment("Deadline", chrono::Duration::hours(5));

    coordinator
        .handle(ChangeEvent::Collection(vec![a]), moments_util::now())
        .await;

    assert!(daemon.reminder_host.pending_ids().await.is_empty());
}

#[tokio::test]
async fn test_widget_file_tracks_collection() {
    let mut daemon = start_daemon(parse_config(TEST_CONFIG).unwrap()).await;
    let a = moment("Concert", chrono::Duration::hours(2));
    let far = moment("Vacation", chrono::Duration::days(30));

    daemon
        .coordinator
        .handle(
            ChangeEvent::Collection(vec![a.clone(), far.clone()]),
            moments_util::now(),
        )
        .await;
    assert_eq!(widget_titles(&daemon.widgets_path), vec!["Concert", "Vacation"]);

    // Moments too far out for a session still reach the widgets
    daemon
        .coordinator
        .handle(ChangeEvent::Collection(vec![far]), moments_util::now())
        .await;
    assert_eq!(widget_titles(&daemon.widgets_path), vec!["Vacation"]);

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&daemon.widgets_path).unwrap()).unwrap();
    assert_eq!(json["version"], 1);
    assert!(json["moments"][0].get("reminders").is_none());
}
