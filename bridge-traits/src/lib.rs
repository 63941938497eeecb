//! # Host Bridge Traits
//!
//! Collaborator contracts for the reconciliation engine, plus the value types
//! that cross them.
//!
//! ## Overview
//!
//! The engine keeps three records of a categorized media collection in
//! agreement: a local category tree, a remote object-storage mirror and a
//! persisted category → description table. Each record is reached only
//! through a trait defined here, so hosts can swap implementations and tests
//! can substitute in-memory fakes.
//!
//! ## Traits
//!
//! ### Collection records
//! - [`LocalMediaStore`](storage::LocalMediaStore) - Local category tree scan and mutation
//! - [`ConfigStore`](storage::ConfigStore) - Category description table (get/set/delete/rename)
//! - [`RemoteMediaStore`](remote::RemoteMediaStore) - Remote mirror scan and per-file transfer
//!
//! ### Jobs and lifecycle
//! - [`TransferService`](transfer::TransferService) - Bulk transfer jobs with polled status
//! - [`LifecycleObserver`](background::LifecycleObserver) - Consumer active/inactive transitions
//!
//! ### Utilities
//! - [`HttpClient`](http::HttpClient) - Async HTTP for remote connectors
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). The distinction
//! between its variants matters to the core:
//!
//! - `InvalidResponse` means a collaborator broke its contract and is never retried
//! - `Conflict` means a write collided with existing state
//! - everything else means the source is currently unreachable
//!
//! A failed scan is always an error, never an empty snapshot.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod background;
pub mod error;
pub mod http;
pub mod logging;
pub mod media;
pub mod remote;
pub mod storage;
pub mod transfer;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartPart, RetryPolicy};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{is_supported_image, CategorySnapshot, DescriptionTable, MediaKey};
pub use remote::RemoteMediaStore;
pub use storage::{ConfigStore, LocalMediaStore};
pub use transfer::{JobStatusReport, TransferDirection, TransferJobId, TransferService};
