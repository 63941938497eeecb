//! Cancellable repeating tasks.
//!
//! Job polling and the passive health check both run on
//! [`spawn_repeating`]: the first tick fires immediately, each later tick
//! fires one interval after the previous tick finished, and the
//! cancellation token is checked before every re-arm. A tick never
//! overlaps the previous one.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// What a tick asks the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Arm the timer again
    Continue,
    /// Stop repeating
    Stop,
}

/// Why a repeating task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    /// A tick returned [`TickOutcome::Stop`]
    Stopped,
    /// The token fired
    Cancelled,
}

/// Owner handle for a repeating task.
#[derive(Debug)]
pub struct TaskHandle {
    token: CancellationToken,
    join: JoinHandle<TaskExit>,
}

impl TaskHandle {
    /// Stop the task. An in-flight tick is dropped at its next await point.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to end.
    pub async fn join(self) -> TaskExit {
        self.join.await.unwrap_or(TaskExit::Cancelled)
    }
}

/// Spawn `tick` on a fixed-delay schedule until it returns
/// [`TickOutcome::Stop`] or `token` is cancelled.
pub fn spawn_repeating<F, Fut>(
    interval: Duration,
    token: CancellationToken,
    mut tick: F,
) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TickOutcome> + Send + 'static,
{
    let task_token = token.clone();
    let join = tokio::spawn(async move {
        let mut ticks: u64 = 0;
        loop {
            if task_token.is_cancelled() {
                return TaskExit::Cancelled;
            }

            ticks += 1;
            trace!(tick = ticks, "Running scheduled tick");
            let outcome = tokio::select! {
                biased;
                _ = task_token.cancelled() => return TaskExit::Cancelled,
                outcome = tick() => outcome,
            };
            if outcome == TickOutcome::Stop {
                return TaskExit::Stopped;
            }

            tokio::select! {
                biased;
                _ = task_token.cancelled() => return TaskExit::Cancelled,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    });

    TaskHandle { token, join }
}
