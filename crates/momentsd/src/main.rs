//! momentsd - The moments background service
//!
//! This is the main entry point for the momentsd service.
//! It wires together all the components:
//! - Configuration loading
//! - Moment snapshot loading (the change feed)
//! - Session reconciler and reminder scheduler
//! - Local host primitives (status file, reminder timers, widget feed)
//! - Signal handling and the periodic tick

mod snapshot;

use anyhow::{Context, Result};
use clap::Parser;
use moments_api::{Moment, NotificationAuthorization, ReminderRequest};
use moments_config::{Policy, load_config_or_default};
use moments_core::{
    ChangeEvent, CoreEvent, MomentsCoordinator, ReminderScheduler, SessionReconciler,
};
use moments_host_local::{StatusFileSessionHost, TimerReminderHost, WidgetFileWriter};
use moments_util::{default_config_path, format_datetime_full};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::snapshot::load_snapshot;

/// momentsd - Countdown live sessions and reminders
#[derive(Parser, Debug)]
#[command(name = "momentsd")]
#[command(about = "Countdown live sessions and reminders for your moments", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/moments/config.toml)
    #[arg(short, long, env = "MOMENTS_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Moments file override (or set MOMENTS_FILE env var)
    #[arg(short, long, env = "MOMENTS_FILE")]
    moments: Option<PathBuf>,

    /// Session status file override
    #[arg(short, long)]
    status: Option<PathBuf>,

    /// Widget feed file override
    #[arg(short, long)]
    widgets: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    policy: Policy,
    moments_path: PathBuf,
    coordinator: MomentsCoordinator,
    core_events: mpsc::UnboundedReceiver<CoreEvent>,
    fired_reminders: mpsc::UnboundedReceiver<ReminderRequest>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let policy = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        let moments_path = args
            .moments
            .clone()
            .unwrap_or_else(|| policy.service.moments_path.clone());
        let status_path = args
            .status
            .clone()
            .unwrap_or_else(|| policy.service.status_path.clone());
        let widgets_path = args
            .widgets
            .clone()
            .unwrap_or_else(|| policy.service.widgets_path.clone());

        info!(
            config_path = %args.config.display(),
            moments_path = %moments_path.display(),
            status_path = %status_path.display(),
            widgets_path = %widgets_path.display(),
            "Configuration loaded"
        );

        let session_host = Arc::new(StatusFileSessionHost::new(&status_path));
        let reconciler = SessionReconciler::new(session_host, policy.session.clone());
        let core_events = reconciler
            .subscribe()
            .context("Reconciler events already taken")?;

        let initial_authorization = if policy.reminders.enabled {
            NotificationAuthorization::NotDetermined
        } else {
            NotificationAuthorization::Denied
        };
        let reminder_host = Arc::new(TimerReminderHost::new(initial_authorization));
        let fired_reminders = reminder_host
            .subscribe()
            .context("Reminder stream already taken")?;
        let reminders = ReminderScheduler::new(reminder_host, policy.reminders.enabled);

        if let Err(e) = reminders.prepare().await {
            warn!(error = %e, "Could not resolve notification authorization");
        }

        let coordinator =
            MomentsCoordinator::new(reconciler, reminders, policy.debounce.quiet_period)
                .with_widgets(Arc::new(WidgetFileWriter::new(widgets_path)));

        Ok(Self {
            policy,
            moments_path,
            coordinator,
            core_events,
            fired_reminders,
        })
    }

    async fn run(mut self) -> Result<()> {
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;
        let mut sigusr1 = signal(SignalKind::user_defined1())
            .context("Failed to create SIGUSR1 handler")?;

        let initial = self.load_or_keep();
        self.coordinator
            .handle(ChangeEvent::Collection(initial), moments_util::now())
            .await;

        let mut tick_timer = tokio::time::interval(self.policy.service.tick_interval);
        // The first tick completes immediately; the initial load already covered it
        tick_timer.tick().await;

        info!(
            tick_secs = self.policy.service.tick_interval.as_secs(),
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // SIGHUP - the moments file was rewritten
                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading moments");
                    let snapshot = self.load_or_keep();
                    self.coordinator
                        .handle(ChangeEvent::Collection(snapshot), moments_util::now())
                        .await;
                }

                // SIGUSR1 - a front end came to the foreground
                _ = sigusr1.recv() => {
                    debug!("Received SIGUSR1, foreground refresh");
                    let snapshot = self.coordinator.snapshot().to_vec();
                    self.coordinator
                        .handle(ChangeEvent::Foreground(snapshot), moments_util::now())
                        .await;
                }

                _ = tick_timer.tick() => {
                    let snapshot = self.load_or_keep();
                    let event = if snapshot.as_slice() == self.coordinator.snapshot() {
                        ChangeEvent::Tick(snapshot)
                    } else {
                        ChangeEvent::Collection(snapshot)
                    };
                    self.coordinator.handle(event, moments_util::now()).await;
                }

                Some(event) = self.core_events.recv() => {
                    Self::log_core_event(&event);
                }

                Some(reminder) = self.fired_reminders.recv() => {
                    info!(
                        moment_id = %reminder.moment_id,
                        offset = ?reminder.offset,
                        fire_at = %format_datetime_full(&reminder.fire_at),
                        "Reminder delivered"
                    );
                }
            }
        }

        info!("Shutting down momentsd");
        self.coordinator.shutdown().await;
        while let Ok(event) = self.core_events.try_recv() {
            Self::log_core_event(&event);
        }

        info!("Shutdown complete");
        Ok(())
    }

    /// Read the moments file, keeping the last good snapshot on error
    fn load_or_keep(&self) -> Vec<Moment> {
        match load_snapshot(&self.moments_path) {
            Ok(moments) => moments,
            Err(e) => {
                error!(error = %e, "Failed to load moments, keeping previous snapshot");
                self.coordinator.snapshot().to_vec()
            }
        }
    }

    fn log_core_event(event: &CoreEvent) {
        match event {
            CoreEvent::SessionStarted {
                moment_id,
                session_id,
            } => {
                info!(moment_id = %moment_id, session_id = %session_id, "Live session started");
            }
            CoreEvent::SessionUpdated {
                moment_id,
                time_remaining,
                progress,
            } => {
                debug!(
                    moment_id = %moment_id,
                    remaining_secs = time_remaining.as_secs(),
                    progress,
                    "Live session refreshed"
                );
            }
            CoreEvent::SessionEnded {
                moment_id, reason, ..
            } => {
                info!(moment_id = %moment_id, reason = ?reason, "Live session ended");
            }
            CoreEvent::StartRejected { moment_id, error } => {
                debug!(moment_id = %moment_id, error = %error, "Live session not started");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "momentsd starting");
    if moments_util::is_mock_time_active() {
        warn!(now = %format_datetime_full(&moments_util::now()), "Running on mock time");
    }

    let service = Service::new(&args).await?;
    service.run().await
}
