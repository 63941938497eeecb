//! # Sync & Reconciliation Engine
//!
//! Keeps three records of a categorized media collection in agreement: the
//! local category tree, the remote object mirror and the category
//! description table.
//!
//! ## Overview
//!
//! One cycle scans all three records, computes a [`DiffReport`], and lets the
//! caller act on it: bulk upload or download jobs for files present on one
//! side only, and category-level fixes for config drift.
//!
//! ## Components
//!
//! - **Diff Engine** (`diff`): pure four-way difference of the snapshots
//! - **State Scanner** (`scanner`): fetches the snapshots, never substituting an empty one for a failed source
//! - **Sync Job State Machine** (`job`): job lifecycle with validated transitions
//! - **Sync Orchestrator** (`orchestrator`): submits jobs and polls them to completion
//! - **Backoff** (`backoff`): status-check retry with capped exponential delays
//! - **Scheduler** (`scheduler`): cancellable repeating tasks
//! - **Health Check** (`health`): periodic passive diff refresh
//! - **Reconciliation Actions** (`reconcile`): restore, remove, rename, describe, adopt and delete categories
//! - **Sync Context** (`context`): explicit owner of all of the above

pub mod backoff;
pub mod context;
pub mod diff;
pub mod error;
pub mod health;
pub mod job;
pub mod orchestrator;
pub mod reconcile;
pub mod scanner;
pub mod scheduler;

pub use context::SyncContext;
pub use diff::{diff, DiffReport, DiffSummary};
pub use error::{Result, StateSource, SyncError};
pub use health::HealthMonitor;
pub use job::{Observation, SyncJob, SyncJobId, SyncStatus};
pub use orchestrator::{JobHandle, JobOutcome, SyncOrchestrator};
pub use reconcile::{
    DeletePreview, FileRemoval, FileScope, NestedCategory, ReconciliationActions,
};
pub use scanner::{RescanTrigger, StateScanner, StateSnapshot};
pub use scheduler::{spawn_repeating, TaskExit, TaskHandle, TickOutcome};
