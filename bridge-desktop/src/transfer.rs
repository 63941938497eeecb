//! Bulk Transfer Execution Implementation
//!
//! Runs each submitted job as a tokio task that copies files one by one
//! between the local store and the remote mirror, and keeps a status record
//! per job for the poll call to read. Records of finished jobs are dropped
//! once they are older than the retention period.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::MediaKey,
    remote::RemoteMediaStore,
    storage::LocalMediaStore,
    transfer::{JobStatusReport, TransferDirection, TransferJobId, TransferService},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-file retry settings
#[derive(Debug, Clone, Copy)]
pub struct TransferRetry {
    /// Attempts per file, including the first
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

/// How long a finished job stays pollable by default
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(10 * 60);

impl Default for TransferRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
struct JobRecord {
    direction: TransferDirection,
    total: usize,
    transferred: usize,
    failed: usize,
    finished_at: Option<Instant>,
    last_error: Option<String>,
}

impl JobRecord {
    fn report(&self) -> JobStatusReport {
        if self.finished_at.is_none() {
            return JobStatusReport::in_progress(self.transferred, self.failed);
        }

        let success = self.failed == 0;
        let report = JobStatusReport::finished(success, self.transferred, self.failed);
        if success {
            report.with_message(format!(
                "{} {} of {} files",
                self.direction, self.transferred, self.total
            ))
        } else {
            report.with_message(format!(
                "{} of {} files failed to {}: {}",
                self.failed,
                self.total,
                self.direction,
                self.last_error.as_deref().unwrap_or("unknown error")
            ))
        }
    }
}

/// Tokio-based transfer service for desktop.
///
/// Submission returns immediately with a fresh job id. A finished job can be
/// polled for `retention` after it ends, then its record is pruned and polls
/// report it as not found.
pub struct TokioTransferService {
    local: Arc<dyn LocalMediaStore>,
    remote: Arc<dyn RemoteMediaStore>,
    jobs: Arc<RwLock<HashMap<TransferJobId, JobRecord>>>,
    retry: TransferRetry,
    retention: Duration,
}

impl TokioTransferService {
    pub fn new(local: Arc<dyn LocalMediaStore>, remote: Arc<dyn RemoteMediaStore>) -> Self {
        Self::with_retry(local, remote, TransferRetry::default())
    }

    pub fn with_retry(
        local: Arc<dyn LocalMediaStore>,
        remote: Arc<dyn RemoteMediaStore>,
        retry: TransferRetry,
    ) -> Self {
        Self {
            local,
            remote,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retry,
            retention: DEFAULT_JOB_RETENTION,
        }
    }

    /// Override how long finished jobs stay pollable
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn prune_finished(&self, jobs: &mut HashMap<TransferJobId, JobRecord>) {
        let before = jobs.len();
        jobs.retain(|_, record| {
            record
                .finished_at
                .map_or(true, |finished| finished.elapsed() < self.retention)
        });
        let pruned = before - jobs.len();
        if pruned > 0 {
            debug!(pruned, "Dropped expired transfer job records");
        }
    }

    async fn submit(
        &self,
        direction: TransferDirection,
        files: Vec<MediaKey>,
    ) -> Result<TransferJobId> {
        let job_id = TransferJobId::new(Uuid::new_v4().to_string());

        {
            let mut jobs = self.jobs.write().await;
            self.prune_finished(&mut jobs);
            jobs.insert(
                job_id.clone(),
                JobRecord {
                    direction,
                    total: files.len(),
                    transferred: 0,
                    failed: 0,
                    finished_at: None,
                    last_error: None,
                },
            );
        }

        info!(
            job_id = %job_id,
            direction = %direction,
            files = files.len(),
            "Transfer job submitted"
        );

        let jobs = Arc::clone(&self.jobs);
        let local = Arc::clone(&self.local);
        let remote = Arc::clone(&self.remote);
        let retry = self.retry;
        let id = job_id.clone();

        tokio::spawn(async move {
            Self::run_job(jobs, local, remote, retry, id, direction, files).await;
        });

        Ok(job_id)
    }

    async fn run_job(
        jobs: Arc<RwLock<HashMap<TransferJobId, JobRecord>>>,
        local: Arc<dyn LocalMediaStore>,
        remote: Arc<dyn RemoteMediaStore>,
        retry: TransferRetry,
        job_id: TransferJobId,
        direction: TransferDirection,
        files: Vec<MediaKey>,
    ) {
        for key in files {
            let outcome =
                Self::transfer_with_retry(local.as_ref(), remote.as_ref(), retry, direction, &key)
                    .await;

            let mut guard = jobs.write().await;
            if let Some(record) = guard.get_mut(&job_id) {
                match outcome {
                    Ok(()) => record.transferred += 1,
                    Err(e) => {
                        warn!(job_id = %job_id, file = %key, error = %e, "File transfer gave up");
                        record.failed += 1;
                        record.last_error = Some(format!("{}: {}", key, e));
                    }
                }
            }
        }

        let mut guard = jobs.write().await;
        if let Some(record) = guard.get_mut(&job_id) {
            record.finished_at = Some(Instant::now());
            info!(
                job_id = %job_id,
                transferred = record.transferred,
                failed = record.failed,
                "Transfer job finished"
            );
        }
    }

    async fn transfer_with_retry(
        local: &dyn LocalMediaStore,
        remote: &dyn RemoteMediaStore,
        retry: TransferRetry,
        direction: TransferDirection,
        key: &MediaKey,
    ) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match direction {
                TransferDirection::Upload => match local.read_file(key).await {
                    Ok(data) => remote.upload(key, data).await,
                    Err(e) => Err(e),
                },
                TransferDirection::Download => match remote.download(key).await {
                    Ok(data) => local.write_file(key, data).await,
                    Err(e) => Err(e),
                },
            };

            match result {
                Ok(()) => {
                    debug!(file = %key, attempt, "Transferred file");
                    return Ok(());
                }
                Err(e) if attempt < retry.max_attempts => {
                    debug!(
                        file = %key,
                        attempt,
                        error = %e,
                        delay_ms = retry.delay.as_millis() as u64,
                        "Retrying file transfer"
                    );
                    sleep(retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl TransferService for TokioTransferService {
    async fn submit_upload(&self, files: Vec<MediaKey>) -> Result<TransferJobId> {
        self.submit(TransferDirection::Upload, files).await
    }

    async fn submit_download(&self, files: Vec<MediaKey>) -> Result<TransferJobId> {
        self.submit(TransferDirection::Download, files).await
    }

    async fn poll_job(&self, job_id: &TransferJobId) -> Result<JobStatusReport> {
        let mut jobs = self.jobs.write().await;
        self.prune_finished(&mut jobs);
        jobs.get(job_id)
            .map(JobRecord::report)
            .ok_or_else(|| BridgeError::NotFound(format!("Transfer job {} not found", job_id)))
    }
}
