//! # Sync Orchestrator
//!
//! Submits upload and download jobs to the [`TransferService`] and follows
//! each one by polling its status until the remote side reports completion.
//!
//! ## Workflow
//!
//! 1. Take the `to_upload` or `to_download` list of a [`DiffReport`]
//! 2. Submit it as one job; the transfer service answers with a job id
//! 3. Poll the status every `poll_interval`, the first poll immediately
//! 4. A failing status check is retried with capped exponential backoff;
//!    when the attempts run out the job's outcome is unknown and polling stops
//! 5. On success, rescan so the displayed diff reflects the transfer
//! 6. On failure, report [`SyncError::JobFailed`]; the job is not resubmitted
//!
//! Each job owns its own poll task and cancellation token, so an upload and a
//! download can be followed at the same time without affecting each other.
//! At most one job per direction is followed at a time.
//!
//! Cancelling a job only stops local observation. The remote job keeps
//! running and is never told about the cancellation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let report = scanner.refresh().await?;
//! if let Some(mut handle) = orchestrator.start_upload(&report).await? {
//!     match handle.outcome().await {
//!         Some(JobOutcome::Succeeded { rescan, .. }) => println!("{:?}", rescan?),
//!         other => println!("{:?}", other),
//!     }
//! }
//! ```

use crate::backoff::retry_with_backoff;
use crate::diff::DiffReport;
use crate::job::{Observation, SyncJob, SyncJobId};
use crate::scanner::RescanTrigger;
use crate::scheduler::{spawn_repeating, TaskHandle, TickOutcome};
use crate::{Result, StateSource, SyncError};
use bridge_traits::{JobStatusReport, MediaKey, TransferDirection, TransferJobId, TransferService};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::StatusRetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How observation of a job ended.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The job completed successfully and a rescan was attempted.
    Succeeded {
        job: SyncJob,
        rescan: Result<DiffReport>,
    },
    /// The remote side reported a failure.
    Failed { job: SyncJob, error: SyncError },
    /// Status checks kept failing. The job may still be running remotely.
    StatusUnknown { job: SyncJob, error: SyncError },
    /// Observation was cancelled locally.
    Cancelled { job: SyncJob },
}

impl JobOutcome {
    pub fn job(&self) -> &SyncJob {
        match self {
            JobOutcome::Succeeded { job, .. }
            | JobOutcome::Failed { job, .. }
            | JobOutcome::StatusUnknown { job, .. }
            | JobOutcome::Cancelled { job } => job,
        }
    }

    /// The finished job, or the error that ended its observation.
    pub fn into_result(self) -> Result<SyncJob> {
        match self {
            JobOutcome::Succeeded { job, .. } => Ok(job),
            JobOutcome::Failed { error, .. } | JobOutcome::StatusUnknown { error, .. } => {
                Err(error)
            }
            JobOutcome::Cancelled { .. } => Err(SyncError::Cancelled),
        }
    }
}

/// Caller's view of a submitted job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job_id: SyncJobId,
    direction: TransferDirection,
    outcome: watch::Receiver<Option<JobOutcome>>,
}

impl JobHandle {
    pub fn job_id(&self) -> SyncJobId {
        self.job_id
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    /// The outcome if observation has already ended.
    pub fn try_outcome(&self) -> Option<JobOutcome> {
        self.outcome.borrow().clone()
    }

    /// Wait until observation of the job ends.
    ///
    /// Returns `None` only if the orchestrator shut down in the middle of
    /// the post-completion rescan.
    pub async fn outcome(&mut self) -> Option<JobOutcome> {
        let _ = self.outcome.wait_for(Option::is_some).await;
        self.outcome.borrow().clone()
    }
}

type OutcomeSender = Arc<watch::Sender<Option<JobOutcome>>>;

struct ActiveJob {
    job_id: SyncJobId,
    handle: TaskHandle,
    outcome: OutcomeSender,
}

/// Submits transfer jobs and follows them to completion.
pub struct SyncOrchestrator {
    transfer: Arc<dyn TransferService>,
    rescan: Arc<dyn RescanTrigger>,
    event_bus: EventBus,
    poll_interval: Duration,
    status_retry: StatusRetryPolicy,
    /// Every job this orchestrator created, terminal ones included
    jobs: Arc<RwLock<HashMap<SyncJobId, SyncJob>>>,
    /// Jobs currently being polled, one per direction
    active: Arc<Mutex<HashMap<TransferDirection, ActiveJob>>>,
    root_token: CancellationToken,
}

impl SyncOrchestrator {
    pub fn new(
        transfer: Arc<dyn TransferService>,
        rescan: Arc<dyn RescanTrigger>,
        event_bus: EventBus,
        poll_interval: Duration,
        status_retry: StatusRetryPolicy,
    ) -> Self {
        Self {
            transfer,
            rescan,
            event_bus,
            poll_interval,
            status_retry,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(Mutex::new(HashMap::new())),
            root_token: CancellationToken::new(),
        }
    }

    /// Submit the report's `to_upload` list as one job.
    ///
    /// Returns `None` when there is nothing to upload.
    pub async fn start_upload(&self, report: &DiffReport) -> Result<Option<JobHandle>> {
        self.start_job(TransferDirection::Upload, report.to_upload.clone())
            .await
    }

    /// Submit the report's `to_download` list as one job.
    ///
    /// Returns `None` when there is nothing to download.
    pub async fn start_download(&self, report: &DiffReport) -> Result<Option<JobHandle>> {
        self.start_job(TransferDirection::Download, report.to_download.clone())
            .await
    }

    /// Submit `files` and start polling.
    ///
    /// # Errors
    ///
    /// - [`SyncError::SyncInProgress`] if a job in this direction is still polled
    /// - the classified submit error; the job is then recorded as failed
    #[instrument(skip(self, files), fields(direction = %direction, files = files.len()))]
    pub async fn start_job(
        &self,
        direction: TransferDirection,
        files: Vec<MediaKey>,
    ) -> Result<Option<JobHandle>> {
        if files.is_empty() {
            debug!("Nothing to transfer");
            return Ok(None);
        }
        if self.root_token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        // Held across submit so two callers cannot both start this direction.
        let mut active = self.active.lock().await;
        if active.contains_key(&direction) {
            return Err(SyncError::SyncInProgress { direction });
        }

        let job = SyncJob::new(direction, files.clone());
        let job_id = job.id;
        let file_count = files.len() as u64;
        self.jobs.write().await.insert(job_id, job.clone());

        let submitted = match direction {
            TransferDirection::Upload => self.transfer.submit_upload(files).await,
            TransferDirection::Download => self.transfer.submit_download(files).await,
        };

        let remote_job_id = match submitted {
            Ok(remote_job_id) => remote_job_id,
            Err(e) => {
                let error = SyncError::from_bridge(StateSource::Transfer, e);
                warn!(job_id = %job_id, error = %error, "Submit failed");

                let failed = job.fail(None, error.to_string())?;
                self.jobs.write().await.insert(job_id, failed);
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        job_id: job_id.to_string(),
                        direction,
                        message: error.to_string(),
                    }))
                    .ok();
                return Err(error);
            }
        };

        let job = job.start(remote_job_id.clone())?;
        self.jobs.write().await.insert(job_id, job);

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Submitted {
                job_id: job_id.to_string(),
                direction,
                remote_job_id: remote_job_id.to_string(),
                file_count,
            }))
            .ok();

        let (outcome_tx, outcome_rx) = watch::channel(None);
        let outcome_tx = Arc::new(outcome_tx);
        let token = self.root_token.child_token();

        let poll = PollContext {
            job_id,
            direction,
            remote_job_id: remote_job_id.clone(),
            transfer: Arc::clone(&self.transfer),
            rescan: Arc::clone(&self.rescan),
            event_bus: self.event_bus.clone(),
            status_retry: self.status_retry,
            jobs: Arc::clone(&self.jobs),
            active: Arc::clone(&self.active),
            token: token.clone(),
            outcome: Arc::clone(&outcome_tx),
        };
        let handle = spawn_repeating(self.poll_interval, token, move || {
            let poll = poll.clone();
            async move { poll.tick().await }
        });

        active.insert(
            direction,
            ActiveJob {
                job_id,
                handle,
                outcome: outcome_tx,
            },
        );

        info!(job_id = %job_id, remote_job_id = %remote_job_id, file_count, "Started {} job", direction);

        Ok(Some(JobHandle {
            job_id,
            direction,
            outcome: outcome_rx,
        }))
    }

    /// Current snapshot of a job.
    pub async fn job(&self, job_id: SyncJobId) -> Option<SyncJob> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// Every job created so far, oldest first.
    pub async fn jobs(&self) -> Vec<SyncJob> {
        let mut jobs: Vec<SyncJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Jobs currently being polled.
    pub async fn active_jobs(&self) -> Vec<SyncJob> {
        let ids: Vec<SyncJobId> = self
            .active
            .lock()
            .await
            .values()
            .map(|active| active.job_id)
            .collect();
        let jobs = self.jobs.read().await;
        ids.iter().filter_map(|id| jobs.get(id).cloned()).collect()
    }

    /// Stop polling a job. The remote job is left running.
    ///
    /// Cancelling a job whose observation already ended is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::JobNotFound`] for an id this orchestrator never issued.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn cancel(&self, job_id: SyncJobId) -> Result<()> {
        let removed = {
            let mut active = self.active.lock().await;
            let direction = active
                .iter()
                .find(|(_, entry)| entry.job_id == job_id)
                .map(|(direction, _)| *direction);
            direction.and_then(|direction| active.remove(&direction))
        };

        let Some(entry) = removed else {
            if self.jobs.read().await.contains_key(&job_id) {
                debug!("Job is no longer polled");
                return Ok(());
            }
            return Err(SyncError::JobNotFound {
                job_id: job_id.to_string(),
            });
        };

        entry.handle.cancel();

        let job = {
            let mut jobs = self.jobs.write().await;
            jobs.get_mut(&job_id).map(|job| {
                job.stop_observing(Observation::Cancelled, None);
                job.clone()
            })
        };
        if let Some(job) = job {
            entry.outcome.send_if_modified(|outcome| {
                if outcome.is_some() {
                    return false;
                }
                *outcome = Some(JobOutcome::Cancelled { job });
                true
            });
        }

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Cancelled {
                job_id: job_id.to_string(),
            }))
            .ok();

        info!("Cancelled job observation");
        Ok(())
    }

    /// Stop polling every job.
    pub async fn cancel_all(&self) {
        let ids: Vec<SyncJobId> = self
            .active
            .lock()
            .await
            .values()
            .map(|active| active.job_id)
            .collect();

        for job_id in ids {
            if let Err(e) = self.cancel(job_id).await {
                debug!(job_id = %job_id, error = %e, "Cancel skipped");
            }
        }
    }

    /// Stop polling and refuse new jobs.
    pub async fn shutdown(&self) {
        self.cancel_all().await;
        self.root_token.cancel();
        debug!("Orchestrator shut down");
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        self.root_token.cancel();
    }
}

/// Everything one poll task needs.
#[derive(Clone)]
struct PollContext {
    job_id: SyncJobId,
    direction: TransferDirection,
    remote_job_id: TransferJobId,
    transfer: Arc<dyn TransferService>,
    rescan: Arc<dyn RescanTrigger>,
    event_bus: EventBus,
    status_retry: StatusRetryPolicy,
    jobs: Arc<RwLock<HashMap<SyncJobId, SyncJob>>>,
    active: Arc<Mutex<HashMap<TransferDirection, ActiveJob>>>,
    token: CancellationToken,
    outcome: OutcomeSender,
}

impl PollContext {
    #[instrument(skip(self), fields(job_id = %self.job_id, direction = %self.direction))]
    async fn tick(&self) -> TickOutcome {
        let status = retry_with_backoff(
            &self.status_retry,
            &self.token,
            |attempt, delay, error| {
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::StatusCheckRetry {
                        job_id: self.job_id.to_string(),
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                        message: error.to_string(),
                    }))
                    .ok();
            },
            || self.check_status(),
        )
        .await;

        match status {
            Ok(report) if !report.completed => {
                self.record_progress(&report).await;
                TickOutcome::Continue
            }
            Ok(report) if report.success => {
                self.finish_success(report).await;
                TickOutcome::Stop
            }
            Ok(report) => {
                self.finish_failure(report).await;
                TickOutcome::Stop
            }
            Err(SyncError::Cancelled) => TickOutcome::Stop,
            Err(error) => {
                self.finish_unknown(error).await;
                TickOutcome::Stop
            }
        }
    }

    async fn check_status(&self) -> Result<JobStatusReport> {
        if let Err(e) = self
            .transition(|mut job| {
                job.record_status_check()?;
                Ok(job)
            })
            .await
        {
            debug!(error = %e, "Could not count status check");
        }

        self.transfer
            .poll_job(&self.remote_job_id)
            .await
            .map_err(|e| SyncError::from_bridge(StateSource::Transfer, e))
    }

    async fn record_progress(&self, report: &JobStatusReport) {
        match self
            .transition(|mut job| {
                job.record_progress(report)?;
                Ok(job)
            })
            .await
        {
            Ok(job) => {
                debug!(
                    attempt = job.poll_attempts,
                    transferred = job.transferred,
                    "Job still running"
                );
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Polled {
                        job_id: self.job_id.to_string(),
                        attempt: job.poll_attempts,
                        transferred: job.transferred,
                        failed: job.failed,
                    }))
                    .ok();
            }
            Err(e) => debug!(error = %e, "Progress not recorded"),
        }
    }

    async fn finish_success(&self, report: JobStatusReport) {
        let job = match self.transition(|job| job.complete(&report)).await {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "Could not mark job completed");
                return;
            }
        };
        self.release().await;

        info!(
            transferred = job.transferred,
            polls = job.poll_attempts,
            "Job completed successfully"
        );
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Completed {
                job_id: self.job_id.to_string(),
                direction: self.direction,
                transferred: job.transferred,
                duration_ms: job.duration_ms().unwrap_or(0),
            }))
            .ok();

        let rescan = self.rescan.rescan().await;
        if let Err(e) = &rescan {
            warn!(error = %e, "Rescan after transfer failed");
        }
        self.publish(JobOutcome::Succeeded { job, rescan });
    }

    async fn finish_failure(&self, report: JobStatusReport) {
        let message = report.message.clone().unwrap_or_else(|| {
            format!("{} file(s) failed to {}", report.failed, self.direction)
        });
        let job = match self
            .transition(|job| job.fail(Some(&report), message.clone()))
            .await
        {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "Could not mark job failed");
                return;
            }
        };
        self.release().await;

        warn!(failed = job.failed, message = %message, "Job failed");
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Failed {
                job_id: self.job_id.to_string(),
                direction: self.direction,
                message: message.clone(),
            }))
            .ok();

        self.publish(JobOutcome::Failed {
            job,
            error: SyncError::JobFailed {
                job_id: self.job_id.to_string(),
                message,
            },
        });
    }

    async fn finish_unknown(&self, error: SyncError) {
        let message = error.to_string();
        let job = {
            let mut jobs = self.jobs.write().await;
            jobs.get_mut(&self.job_id).map(|job| {
                job.stop_observing(Observation::StatusUnknown, Some(message.clone()));
                job.clone()
            })
        };
        self.release().await;

        warn!(error = %error, "Job status unknown, polling stopped");
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::StatusUnknown {
                job_id: self.job_id.to_string(),
                attempts: self.status_retry.max_attempts,
                message,
            }))
            .ok();

        if let Some(job) = job {
            self.publish(JobOutcome::StatusUnknown { job, error });
        }
    }

    /// Apply `f` to the stored job and keep the result.
    async fn transition<F>(&self, f: F) -> Result<SyncJob>
    where
        F: FnOnce(SyncJob) -> Result<SyncJob>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&self.job_id)
            .ok_or_else(|| SyncError::JobNotFound {
                job_id: self.job_id.to_string(),
            })?;
        let next = f(job.clone())?;
        *job = next.clone();
        Ok(next)
    }

    /// Free this job's direction slot.
    async fn release(&self) {
        let mut active = self.active.lock().await;
        if active
            .get(&self.direction)
            .is_some_and(|entry| entry.job_id == self.job_id)
        {
            active.remove(&self.direction);
        }
    }

    fn publish(&self, outcome: JobOutcome) {
        self.outcome.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        });
    }
}
