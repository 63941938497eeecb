//! # Sync Job State Machine
//!
//! Manages the lifecycle of upload and download jobs with validated state
//! transitions.
//!
//! ## State Machine
//!
//! ```text
//! Pending ──submit accepted──> Running ──completed──> CompletedSuccess
//!    │                            │
//!    └──submit failed──┐          └──completed, !success──> CompletedFailure
//!                      └──────────────────────────────────> CompletedFailure
//! ```
//!
//! A terminal job is never resumed; a fresh job supersedes it.
//!
//! Local observation of a running job is tracked separately in
//! [`Observation`]: cancelling a poll or exhausting status-check retries
//! stops observation but leaves the job `Running`, since its remote outcome
//! is unknown.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncJob, SyncStatus};
//! use bridge_traits::{JobStatusReport, MediaKey, TransferDirection, TransferJobId};
//!
//! let job = SyncJob::new(TransferDirection::Upload, vec![MediaKey::new("cats", "b.png")]);
//! let mut job = job.start(TransferJobId::new("remote-1"))?;
//! job.record_status_check()?;
//! let job = job.complete(&JobStatusReport::finished(true, 1, 0))?;
//! assert_eq!(job.status, SyncStatus::CompletedSuccess);
//! ```

use crate::{Result, SyncError};
use bridge_traits::{JobStatusReport, MediaKey, TransferDirection, TransferJobId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    /// Create a new random sync job ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a sync job ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| SyncError::InvalidJobId(e.to_string()))?,
        ))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SyncJobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Status Types
// ============================================================================

/// The current status of a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Requested, not yet accepted by the transfer service
    Pending,
    /// Accepted by the transfer service; outcome not yet known
    Running,
    /// Remote side reported completion with success
    CompletedSuccess,
    /// Remote side reported completion without success, or submit failed
    CompletedFailure,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::CompletedSuccess | SyncStatus::CompletedFailure
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Running => "running",
            SyncStatus::CompletedSuccess => "completed_success",
            SyncStatus::CompletedFailure => "completed_failure",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "running" => Ok(SyncStatus::Running),
            "completed_success" => Ok(SyncStatus::CompletedSuccess),
            "completed_failure" => Ok(SyncStatus::CompletedFailure),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the engine is still watching a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observation {
    /// Status checks are scheduled
    Polling,
    /// The job reached a terminal status
    Finished,
    /// Polling was cancelled locally; the remote job was left alone
    Cancelled,
    /// Status checks kept failing; the remote outcome is unknown
    StatusUnknown,
}

// ============================================================================
// Sync Job Entity
// ============================================================================

/// One bulk transfer in one direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: SyncJobId,
    pub direction: TransferDirection,
    /// Files requested for transfer
    pub files: Vec<MediaKey>,
    /// Id assigned by the transfer service once submitted
    pub remote_job_id: Option<TransferJobId>,
    pub status: SyncStatus,
    pub observation: Observation,
    /// Status-check calls issued, failed ones included
    pub poll_attempts: u32,
    /// Completion flag last reported by the remote side
    pub completed: bool,
    /// Success flag last reported by the remote side
    pub success: bool,
    pub transferred: u64,
    pub failed: u64,
    pub error_message: Option<String>,
    /// Unix epoch milliseconds
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl SyncJob {
    /// Create a new sync job in pending state
    pub fn new(direction: TransferDirection, files: Vec<MediaKey>) -> Self {
        Self {
            id: SyncJobId::new(),
            direction,
            files,
            remote_job_id: None,
            status: SyncStatus::Pending,
            observation: Observation::Polling,
            poll_attempts: 0,
            completed: false,
            success: false,
            transferred: 0,
            failed: 0,
            error_message: None,
            created_at: current_timestamp(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Record that the transfer service accepted the job
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not in `Pending` state
    pub fn start(mut self, remote_job_id: TransferJobId) -> Result<Self> {
        self.validate_transition(SyncStatus::Running)?;
        self.status = SyncStatus::Running;
        self.remote_job_id = Some(remote_job_id);
        self.started_at = Some(current_timestamp());
        Ok(self)
    }

    /// Count one status-check call
    pub fn record_status_check(&mut self) -> Result<()> {
        self.ensure_running("record_status_check")?;
        self.poll_attempts = self.poll_attempts.saturating_add(1);
        Ok(())
    }

    /// Apply an in-progress status report
    pub fn record_progress(&mut self, report: &JobStatusReport) -> Result<()> {
        self.ensure_running("record_progress")?;
        self.transferred = report.transferred as u64;
        self.failed = report.failed as u64;
        Ok(())
    }

    /// Mark the job as successfully completed
    pub fn complete(mut self, report: &JobStatusReport) -> Result<Self> {
        self.validate_transition(SyncStatus::CompletedSuccess)?;
        self.status = SyncStatus::CompletedSuccess;
        self.observation = Observation::Finished;
        self.completed = true;
        self.success = true;
        self.transferred = report.transferred as u64;
        self.failed = report.failed as u64;
        self.completed_at = Some(current_timestamp());
        Ok(self)
    }

    /// Mark the job as failed
    ///
    /// Used both for a remote failure report and for a rejected submit.
    pub fn fail(mut self, report: Option<&JobStatusReport>, error_message: String) -> Result<Self> {
        self.validate_transition(SyncStatus::CompletedFailure)?;
        self.status = SyncStatus::CompletedFailure;
        self.observation = Observation::Finished;
        if let Some(report) = report {
            self.completed = report.completed;
            self.success = report.success;
            self.transferred = report.transferred as u64;
            self.failed = report.failed as u64;
        }
        self.error_message = Some(error_message);
        self.completed_at = Some(current_timestamp());
        Ok(self)
    }

    /// Stop observing the job without touching its status
    pub fn stop_observing(&mut self, observation: Observation, reason: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.observation = observation;
        if reason.is_some() {
            self.error_message = reason;
        }
    }

    pub fn is_observed(&self) -> bool {
        self.observation == Observation::Polling
    }

    /// Milliseconds between start and completion
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start).max(0) as u64),
            _ => None,
        }
    }

    fn ensure_running(&self, operation: &str) -> Result<()> {
        if self.status != SyncStatus::Running {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: operation.to_string(),
                reason: "Job must be running".to_string(),
            });
        }
        Ok(())
    }

    fn validate_transition(&self, to: SyncStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (SyncStatus::Pending, SyncStatus::Running)
                | (SyncStatus::Pending, SyncStatus::CompletedFailure)
                | (SyncStatus::Running, SyncStatus::CompletedSuccess)
                | (SyncStatus::Running, SyncStatus::CompletedFailure)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// Tests
// ============================================================================
