//! Cooperative cancellation for units of work.
//!
//! A [`TaskMonitor`] wraps a single `CancellationToken` together with a label,
//! a start time and a running token count. Blocking boundaries (model calls,
//! tool executions) poll it; nothing is preempted.
//!
//! The loop publishes whichever monitor is currently active through an
//! [`InterruptHandle`], which UI layers keep a clone of. Activations nest:
//! the turn monitor stays registered underneath each phase, so an interrupt
//! that lands between phases still reaches the turn.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct MonitorInner {
    label: String,
    started_at: Instant,
    token: CancellationToken,
    token_count: AtomicU64,
}

/// Handle on one cancellable unit of work. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TaskMonitor {
    inner: Arc<MonitorInner>,
}

impl TaskMonitor {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_token(label, CancellationToken::new())
    }

    fn with_token(label: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                label: label.into(),
                started_at: Instant::now(),
                token,
                token_count: AtomicU64::new(0),
            }),
        }
    }

    /// A monitor cancelled whenever this one is, but which can also be
    /// cancelled on its own.
    pub fn child(&self, label: impl Into<String>) -> Self {
        Self::with_token(label, self.inner.token.child_token())
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    pub fn request_interrupt(&self) {
        self.inner.token.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once the monitor is interrupted.
    pub async fn interrupted(&self) {
        self.inner.token.cancelled().await
    }

    pub fn add_tokens(&self, count: u64) {
        self.inner.token_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn token_count(&self) -> u64 {
        self.inner.token_count.load(Ordering::Relaxed)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.token
    }
}

/// Shared slot holding the loop's currently active monitor.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    active: Arc<Mutex<Option<TaskMonitor>>>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `monitor` the active unit until the returned guard drops; the
    /// previously active unit is restored then.
    pub fn activate(&self, monitor: &TaskMonitor) -> ActiveMonitorGuard {
        let mut slot = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let previous = slot.replace(monitor.clone());
        ActiveMonitorGuard {
            handle: self.clone(),
            previous,
        }
    }

    /// Interrupt the active unit of work. Returns immediately; true iff a
    /// unit was active.
    pub fn request_interrupt(&self) -> bool {
        let slot = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(monitor) => {
                monitor.request_interrupt();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Label of the active unit, if any.
    pub fn active_label(&self) -> Option<String> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|m| m.label().to_string())
    }
}

/// Restores the previously active unit when dropped.
#[derive(Debug)]
pub struct ActiveMonitorGuard {
    handle: InterruptHandle,
    previous: Option<TaskMonitor>,
}

impl Drop for ActiveMonitorGuard {
    fn drop(&mut self) {
        let mut slot = self.handle.active.lock().unwrap_or_else(|e| e.into_inner());
        *slot = self.previous.take();
    }
}
