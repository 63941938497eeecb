//! # Event Bus System
//!
//! Provides an event-driven surface for the sync engine using `tokio::sync::broadcast`.
//! Hosts subscribe to follow job progress, reconciliation results and the
//! passive health check without polling the engine.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for sync, reconcile and health
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    emit      ┌───────────┐
//! │ Orchestrator ├─────────────>│           │
//! └──────────────┘              │           │
//!                               │ EventBus  │
//! ┌──────────────┐    emit      │ (broadcast│    subscribe    ┌────────────┐
//! │ Reconcile    ├─────────────>│  channel) ├────────────────>│ Subscriber │
//! └──────────────┘              │           │                 └────────────┘
//!                               │           │
//! ┌──────────────┐    emit      │           │
//! │ Health check ├─────────────>│           │
//! └──────────────┘              └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Cancelled {
//!         job_id: "job-1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Job observation cancelled");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error which publishers ignore; an
//! event never fails the operation that produced it.

use bridge_traits::TransferDirection;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Transfer job lifecycle
    Sync(SyncEvent),
    /// Diff refreshes and reconciliation actions
    Reconcile(ReconcileEvent),
    /// Passive health check
    Health(HealthEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Reconcile(e) => e.description(),
            CoreEvent::Health(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::StatusUnknown { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::StatusCheckRetry { .. }) => EventSeverity::Warning,
            CoreEvent::Health(HealthEvent::CheckFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Submitted { .. }) => EventSeverity::Info,
            CoreEvent::Reconcile(ReconcileEvent::DiffRefreshed { .. }) => EventSeverity::Debug,
            CoreEvent::Reconcile(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events of a single upload or download job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Job accepted by the transfer service; polling starts.
    Submitted {
        job_id: String,
        direction: TransferDirection,
        /// Id assigned by the transfer service.
        remote_job_id: String,
        file_count: u64,
    },
    /// A status check returned; the job is still running.
    Polled {
        job_id: String,
        /// Status checks issued so far.
        attempt: u32,
        transferred: u64,
        failed: u64,
    },
    /// A status check failed and will be retried after `delay_ms`.
    StatusCheckRetry {
        job_id: String,
        /// Consecutive failures so far.
        attempt: u32,
        delay_ms: u64,
        message: String,
    },
    /// Job completed successfully; a rescan follows.
    Completed {
        job_id: String,
        direction: TransferDirection,
        transferred: u64,
        duration_ms: u64,
    },
    /// Job completed with a failure. It is not resubmitted.
    Failed {
        job_id: String,
        direction: TransferDirection,
        message: String,
    },
    /// Status checks were exhausted; the job's outcome is unknown.
    StatusUnknown {
        job_id: String,
        attempts: u32,
        message: String,
    },
    /// Local observation of the job stopped. The remote job keeps running.
    Cancelled { job_id: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Submitted { .. } => "Transfer job submitted",
            SyncEvent::Polled { .. } => "Transfer job in progress",
            SyncEvent::StatusCheckRetry { .. } => "Status check failed, retrying",
            SyncEvent::Completed { .. } => "Transfer job completed successfully",
            SyncEvent::Failed { .. } => "Transfer job failed",
            SyncEvent::StatusUnknown { .. } => "Transfer job status unavailable",
            SyncEvent::Cancelled { .. } => "Job observation cancelled",
        }
    }
}

// ============================================================================
// Reconcile Events
// ============================================================================

/// Events of the diff engine and the reconciliation actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ReconcileEvent {
    /// A fresh diff was computed.
    DiffRefreshed {
        to_upload: u64,
        to_download: u64,
        missing_in_config: u64,
        deleted_categories: u64,
    },
    /// A deleted category was written back to the config.
    CategoryRestored { category: String },
    /// A deleted category was dropped from the config.
    CategoryRemoved { category: String },
    CategoryRenamed { from: String, to: String },
    DescriptionUpdated { category: String },
    /// A category was deleted after a confirmed preview.
    CategoryDeleted {
        category: String,
        files_removed: u64,
    },
    /// Categories found on disk or remotely were registered in the config.
    CategoriesAdopted { categories: Vec<String> },
    /// A media file was written into a local category.
    FileAdded { category: String, filename: String },
    /// A single file was removed locally, remotely, or both.
    FileDeleted {
        category: String,
        filename: String,
        local: bool,
        remote: bool,
    },
    FileRenamed {
        category: String,
        from: String,
        to: String,
    },
}

impl ReconcileEvent {
    fn description(&self) -> &str {
        match self {
            ReconcileEvent::DiffRefreshed { .. } => "Diff refreshed",
            ReconcileEvent::CategoryRestored { .. } => "Category restored",
            ReconcileEvent::CategoryRemoved { .. } => "Category removed from config",
            ReconcileEvent::CategoryRenamed { .. } => "Category renamed",
            ReconcileEvent::DescriptionUpdated { .. } => "Category description updated",
            ReconcileEvent::CategoryDeleted { .. } => "Category deleted",
            ReconcileEvent::CategoriesAdopted { .. } => "Categories adopted into config",
            ReconcileEvent::FileAdded { .. } => "Media file added",
            ReconcileEvent::FileDeleted { .. } => "Media file deleted",
            ReconcileEvent::FileRenamed { .. } => "Media file renamed",
        }
    }
}

// ============================================================================
// Health Events
// ============================================================================

/// Events of the periodic passive health check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum HealthEvent {
    /// A check finished; `in_sync` is true when the diff is empty.
    CheckCompleted { in_sync: bool },
    CheckFailed { message: String },
    /// A tick was dropped, e.g. because the previous check was still running.
    CheckSkipped { reason: String },
    /// Checks paused because the host went inactive.
    Suspended,
    Resumed,
}

impl HealthEvent {
    fn description(&self) -> &str {
        match self {
            HealthEvent::CheckCompleted { .. } => "Health check completed",
            HealthEvent::CheckFailed { .. } => "Health check failed",
            HealthEvent::CheckSkipped { .. } => "Health check skipped",
            HealthEvent::Suspended => "Health check suspended",
            HealthEvent::Resumed => "Health check resumed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to engine events.
///
/// The event bus uses `tokio::sync::broadcast` to provide:
/// - Multiple independent subscribers
/// - Bounded buffering with configurable capacity
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let health_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Health(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(job_id: &str) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Completed {
            job_id: job_id.to_string(),
            direction: TransferDirection::Upload,
            transferred: 3,
            duration_ms: 6000,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(completed("job-1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Reconcile(ReconcileEvent::CategoryRenamed {
            from: "cats".to_string(),
            to: "kittens".to_string(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Health(_)));

        bus.emit(completed("job-1")).ok();
        bus.emit(CoreEvent::Health(HealthEvent::Suspended)).ok();

        assert_eq!(
            stream.recv().await.unwrap(),
            CoreEvent::Health(HealthEvent::Suspended)
        );
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(completed(&format!("job-{}", i))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            job_id: "job-1".to_string(),
            direction: TransferDirection::Download,
            message: "2 files failed".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let unknown = CoreEvent::Sync(SyncEvent::StatusUnknown {
            job_id: "job-1".to_string(),
            attempts: 10,
            message: "connection refused".to_string(),
        });
        assert_eq!(unknown.severity(), EventSeverity::Warning);

        assert_eq!(completed("job-1").severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Health(HealthEvent::Resumed).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_description() {
        let event = CoreEvent::Reconcile(ReconcileEvent::CategoriesAdopted {
            categories: vec!["cats".to_string()],
        });
        assert_eq!(event.description(), "Categories adopted into config");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sync(SyncEvent::StatusCheckRetry {
            job_id: "job-123".to_string(),
            attempt: 2,
            delay_ms: 3000,
            message: "timeout".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Sync");
        assert_eq!(json["payload"]["event"], "StatusCheckRetry");
        assert_eq!(json["payload"]["delay_ms"], 3000);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(completed("job-1")).ok();
        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, completed("job-1"));
    }
}
