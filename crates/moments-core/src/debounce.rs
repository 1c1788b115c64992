//! Debounced single-flight triggering
//!
//! Each trigger cancels whatever pass is still waiting out its quiet period
//! and schedules a fresh one. Superseded passes are cancelled, never queued.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Work run once a burst of triggers has gone quiet
#[async_trait]
pub trait DebouncedAction<T>: Send + Sync {
    async fn run(&self, payload: T);
}

struct Pending {
    generation: u64,
    token: Option<CancellationToken>,
}

struct DebounceInner<T> {
    quiet_period: Duration,
    action: Arc<dyn DebouncedAction<T>>,
    pending: Mutex<Pending>,
    passes: AtomicU64,
}

impl<T> DebounceInner<T> {
    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Debouncer<T> {
    inner: Arc<DebounceInner<T>>,
}

impl<T> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(quiet_period: Duration, action: Arc<dyn DebouncedAction<T>>) -> Self {
        Self {
            inner: Arc::new(DebounceInner {
                quiet_period,
                action,
                pending: Mutex::new(Pending {
                    generation: 0,
                    token: None,
                }),
                passes: AtomicU64::new(0),
            }),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet_period
    }

    /// Schedule a pass with this payload, superseding any pending one
    pub fn trigger(&self, payload: T) {
        let deadline = tokio::time::Instant::now() + self.inner.quiet_period;
        let (generation, token) = {
            let mut pending = self.inner.pending();
            if let Some(previous) = pending.token.take() {
                previous.cancel();
            }
            pending.generation += 1;
            let token = CancellationToken::new();
            pending.token = Some(token.clone());
            (pending.generation, token)
        };
        trace!(generation, "Debounce triggered");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep_until(deadline) => {}
            }

            // A trigger that raced the timer must still win
            {
                let mut pending = inner.pending();
                if token.is_cancelled() || pending.generation != generation {
                    trace!(generation, "Debounced pass superseded");
                    return;
                }
                pending.token = None;
            }

            inner.passes.fetch_add(1, Ordering::SeqCst);
            inner.action.run(payload).await;
        });
    }

    /// Drop the pending pass, if any
    pub fn cancel(&self) {
        if let Some(token) = self.inner.pending().token.take() {
            token.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending().token.is_some()
    }

    /// Passes that actually ran
    pub fn passes_run(&self) -> u64 {
        self.inner.passes.load(Ordering::SeqCst)
    }
}
