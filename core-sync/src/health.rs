//! # Passive Health Check
//!
//! Refreshes the diff on a long interval so a displayed report does not go
//! stale while nobody triggers a scan.
//!
//! - The first check runs as soon as the monitor starts, later ones every
//!   `interval`.
//! - At most one check is in flight. A tick that finds a check still running
//!   is dropped, not queued.
//! - While the consumer is inactive the timer is stopped; on reactivation it
//!   is re-armed and checks immediately.

use crate::diff::DiffReport;
use crate::scanner::RescanTrigger;
use crate::scheduler::{spawn_repeating, TaskHandle, TickOutcome};
use crate::{Result, StateSource, SyncError};
use bridge_traits::LifecycleObserver;
use core_runtime::events::{CoreEvent, EventBus, HealthEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodic background diff refresh.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    trigger: Arc<dyn RescanTrigger>,
    event_bus: EventBus,
    interval: Duration,
    in_flight: AtomicBool,
    suspended: AtomicBool,
    timer: Mutex<Option<TaskHandle>>,
    lifecycle: Mutex<Option<JoinHandle<()>>>,
    root_token: CancellationToken,
}

/// Clears the in-flight flag when a check ends or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Inner {
    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    fn skip(&self) {
        debug!("Health check still running, tick skipped");
        self.emit(HealthEvent::CheckSkipped {
            reason: "previous check still running".to_string(),
        });
    }

    async fn run_check(&self) -> Result<DiffReport> {
        let result = self.trigger.rescan().await;
        match &result {
            Ok(report) => {
                debug!(in_sync = report.is_synced(), "Health check completed");
                self.emit(HealthEvent::CheckCompleted {
                    in_sync: report.is_synced(),
                });
            }
            Err(e) => {
                warn!(error = %e, "Health check failed");
                self.emit(HealthEvent::CheckFailed {
                    message: e.to_string(),
                });
            }
        }
        result
    }

    fn emit(&self, event: HealthEvent) {
        self.event_bus.emit(CoreEvent::Health(event)).ok();
    }
}

impl HealthMonitor {
    pub fn new(trigger: Arc<dyn RescanTrigger>, event_bus: EventBus, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                trigger,
                event_bus,
                interval,
                in_flight: AtomicBool::new(false),
                suspended: AtomicBool::new(false),
                timer: Mutex::new(None),
                lifecycle: Mutex::new(None),
                root_token: CancellationToken::new(),
            }),
        }
    }

    /// Arm the timer. A monitor that is already running is left alone.
    pub fn start(&self) {
        if self.inner.root_token.is_cancelled() {
            return;
        }
        let Ok(mut timer) = self.inner.timer.lock() else {
            return;
        };
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let token = self.inner.root_token.child_token();
        *timer = Some(spawn_repeating(self.inner.interval, token, move || {
            let inner = Arc::clone(&inner);
            async move {
                Self::spawn_check(inner);
                TickOutcome::Continue
            }
        }));
        self.inner.suspended.store(false, Ordering::Release);
        info!(interval_secs = self.inner.interval.as_secs(), "Health check started");
    }

    /// Run one check in the background unless one is already running.
    fn spawn_check(inner: Arc<Inner>) {
        if inner.in_flight.load(Ordering::Acquire) {
            inner.skip();
            return;
        }

        tokio::spawn(async move {
            let Some(_guard) = inner.try_begin() else {
                inner.skip();
                return;
            };
            tokio::select! {
                _ = inner.root_token.cancelled() => {}
                _ = inner.run_check() => {}
            }
        });
    }

    /// Stop the timer while the consumer is inactive. A check already in
    /// flight is allowed to finish.
    pub fn suspend(&self) {
        let handle = self.inner.timer.lock().ok().and_then(|mut timer| timer.take());
        if let Some(handle) = handle {
            handle.cancel();
            self.inner.suspended.store(true, Ordering::Release);
            self.inner.emit(HealthEvent::Suspended);
            info!("Health check suspended");
        }
    }

    /// Re-arm the timer after [`suspend`](Self::suspend). The first check
    /// runs immediately.
    pub fn resume(&self) {
        if !self.inner.suspended.load(Ordering::Acquire) {
            return;
        }
        self.inner.emit(HealthEvent::Resumed);
        info!("Health check resumed");
        self.start();
    }

    /// Run a check now and wait for it.
    ///
    /// Returns `None` if a check was already in flight.
    pub async fn check_now(&self) -> Option<Result<DiffReport>> {
        let Some(_guard) = self.inner.try_begin() else {
            self.inner.skip();
            return None;
        };
        Some(self.inner.run_check().await)
    }

    /// Suspend and resume with the observer's lifecycle transitions.
    ///
    /// The current state is applied right away; later transitions are
    /// followed in a background task until [`shutdown`](Self::shutdown).
    pub async fn follow_lifecycle(&self, observer: Arc<dyn LifecycleObserver>) -> Result<()> {
        let lifecycle_error = |e| SyncError::from_bridge(StateSource::Lifecycle, e);
        let state = observer.get_state().await.map_err(lifecycle_error)?;
        let mut changes = observer
            .subscribe_changes()
            .await
            .map_err(lifecycle_error)?;

        if state.is_active() {
            self.start();
        } else {
            self.suspend_or_mark();
        }

        let monitor = self.clone();
        let token = self.inner.root_token.clone();
        let task = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    next = changes.next() => next,
                };
                let Some(state) = next else {
                    debug!("Lifecycle stream closed");
                    break;
                };
                debug!(state = ?state, "Lifecycle transition");
                if state.is_active() {
                    monitor.resume();
                } else {
                    monitor.suspend();
                }
            }
        });

        if let Ok(mut lifecycle) = self.inner.lifecycle.lock() {
            if let Some(previous) = lifecycle.replace(task) {
                previous.abort();
            }
        }
        Ok(())
    }

    /// Suspend a running monitor, or mark a stopped one as suspended so a
    /// later resume arms it.
    fn suspend_or_mark(&self) {
        if self.is_running() {
            self.suspend();
        } else {
            self.inner.suspended.store(true, Ordering::Release);
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .timer
            .lock()
            .map(|timer| timer.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.suspended.load(Ordering::Acquire)
    }

    pub fn is_checking(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Stop the timer, the lifecycle follower and any check in flight.
    pub fn shutdown(&self) {
        self.inner.root_token.cancel();
        if let Some(handle) = self.inner.timer.lock().ok().and_then(|mut timer| timer.take()) {
            handle.cancel();
        }
        if let Some(task) = self
            .inner
            .lifecycle
            .lock()
            .ok()
            .and_then(|mut lifecycle| lifecycle.take())
        {
            task.abort();
        }
        debug!("Health check shut down");
    }
}
