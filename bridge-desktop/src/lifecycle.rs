//! Lifecycle Observer Implementation
//!
//! Desktop hosts have no OS-level lifecycle callbacks for the engine to hook,
//! so the host UI reports visibility changes itself through
//! [`DesktopLifecycleObserver::set_state`].

use async_trait::async_trait;
use bridge_traits::{
    background::{LifecycleChangeStream, LifecycleObserver, LifecycleState},
    error::Result,
};
use tokio::sync::watch;
use tracing::debug;

/// Desktop lifecycle observer driven by the host.
pub struct DesktopLifecycleObserver {
    sender: watch::Sender<LifecycleState>,
}

impl DesktopLifecycleObserver {
    /// Create an observer that starts in the foreground.
    pub fn new() -> Self {
        Self::with_state(LifecycleState::Foreground)
    }

    pub fn with_state(state: LifecycleState) -> Self {
        let (sender, _) = watch::channel(state);
        Self { sender }
    }

    /// Report a lifecycle transition. Repeating the current state is ignored.
    pub fn set_state(&self, state: LifecycleState) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(state = ?state, "Lifecycle state changed");
        }
    }
}

impl Default for DesktopLifecycleObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleObserver for DesktopLifecycleObserver {
    async fn get_state(&self) -> Result<LifecycleState> {
        Ok(*self.sender.borrow())
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>> {
        Ok(Box::new(DesktopLifecycleChangeStream {
            receiver: self.sender.subscribe(),
        }))
    }
}

/// Stream of host-reported changes. Ends when the observer is dropped.
struct DesktopLifecycleChangeStream {
    receiver: watch::Receiver<LifecycleState>,
}

#[async_trait]
impl LifecycleChangeStream for DesktopLifecycleChangeStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        self.receiver.changed().await.ok()?;
        let state = *self.receiver.borrow_and_update();
        Some(state)
    }
}
