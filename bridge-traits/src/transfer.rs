//! Bulk Transfer Jobs
//!
//! A transfer service accepts a batch of files, hands back a job identifier
//! right away, and reports progress through a polled status call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::media::MediaKey;

/// Direction of a bulk transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// Local → remote
    Upload,
    /// Remote → local
    Download,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Upload => "upload",
            TransferDirection::Download => "download",
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier assigned to a job by the transfer service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferJobId(pub String);

impl TransferJobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answer to a status poll.
///
/// `success` is only meaningful once `completed` is `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub completed: bool,
    pub success: bool,
    /// Files transferred so far
    pub transferred: usize,
    /// Files that gave up after retries
    pub failed: usize,
    pub message: Option<String>,
}

impl JobStatusReport {
    pub fn in_progress(transferred: usize, failed: usize) -> Self {
        Self {
            completed: false,
            success: false,
            transferred,
            failed,
            message: None,
        }
    }

    pub fn finished(success: bool, transferred: usize, failed: usize) -> Self {
        Self {
            completed: true,
            success,
            transferred,
            failed,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Transfer service trait
///
/// Submission is at-most-once per call: retrying a failed submit is the
/// caller's decision. Polling is a read and may be repeated freely.
///
/// # Example
///
/// ```ignore
/// let job_id = service.submit_upload(vec![MediaKey::new("cats", "b.png")]).await?;
/// loop {
///     let status = service.poll_job(&job_id).await?;
///     if status.completed {
///         break;
///     }
/// }
/// ```
#[async_trait]
pub trait TransferService: Send + Sync {
    /// Start copying local files to the remote mirror.
    async fn submit_upload(&self, files: Vec<MediaKey>) -> Result<TransferJobId>;

    /// Start copying remote files into the local store.
    async fn submit_download(&self, files: Vec<MediaKey>) -> Result<TransferJobId>;

    /// Ask for the status of a submitted job.
    async fn poll_job(&self, job_id: &TransferJobId) -> Result<JobStatusReport>;
}
