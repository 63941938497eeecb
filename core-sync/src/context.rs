//! # Sync Context
//!
//! Owns one engine instance: the scanner, the orchestrator with its per-job
//! poll tasks, the reconciliation actions and the passive health check.
//! Nothing in the engine is global; two contexts never share timers.
//!
//! ```rust,ignore
//! let config = EngineConfig::builder()
//!     .media_dir("/srv/memes")
//!     .config_path("/srv/memes_data.json")
//!     .remote_store(Arc::new(StarDotsConnector::new(stardots_config)?))
//!     .build()?;
//!
//! let context = SyncContext::new(config)?;
//! context.start().await?;
//!
//! let report = context.refresh().await?;
//! for category in &report.deleted_categories {
//!     context.restore(category, None).await?;
//! }
//!
//! context.shutdown().await;
//! ```

use crate::diff::DiffReport;
use crate::health::HealthMonitor;
use crate::job::{SyncJob, SyncJobId};
use crate::orchestrator::{JobHandle, SyncOrchestrator};
use crate::reconcile::{DeletePreview, FileRemoval, FileScope, ReconciliationActions};
use crate::scanner::{StateScanner, StateSnapshot};
use crate::{Result, SyncError};
use bridge_traits::LifecycleObserver;
use bytes::Bytes;
use core_runtime::events::{EventBus, EventStream};
use core_runtime::EngineConfig;
use std::sync::Arc;
use tracing::{info, instrument};

/// Explicit owner of every long-lived task of the engine.
pub struct SyncContext {
    event_bus: EventBus,
    scanner: Arc<StateScanner>,
    orchestrator: SyncOrchestrator,
    actions: ReconciliationActions,
    health: HealthMonitor,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
}

impl SyncContext {
    /// Wire the engine from a configuration.
    ///
    /// Nothing runs until [`start`](Self::start) or an explicit operation.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let scanner = Arc::new(StateScanner::new(
            Arc::clone(&config.local_store),
            Arc::clone(&config.remote_store),
            Arc::clone(&config.config_store),
            event_bus.clone(),
        ));
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&config.transfer_service),
            scanner.clone(),
            event_bus.clone(),
            config.poll_interval,
            config.status_retry,
        );
        let actions = ReconciliationActions::new(
            Arc::clone(&config.local_store),
            Arc::clone(&config.remote_store),
            Arc::clone(&config.config_store),
            event_bus.clone(),
            config.default_description.clone(),
            config.rename_relocation_timeout,
        );
        let health = HealthMonitor::new(
            scanner.clone(),
            event_bus.clone(),
            config.health_check_interval,
        );

        Ok(Self {
            event_bus,
            scanner,
            orchestrator,
            actions,
            health,
            lifecycle_observer: config.lifecycle_observer.clone(),
        })
    }

    /// Arm the passive health check. With a lifecycle observer configured
    /// the check follows the consumer's activity from here on.
    pub async fn start(&self) -> Result<()> {
        match &self.lifecycle_observer {
            Some(observer) => {
                self.health
                    .follow_lifecycle(Arc::clone(observer))
                    .await?
            }
            None => self.health.start(),
        }
        info!("Sync context started");
        Ok(())
    }

    /// Subscribe to engine events.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Read all three records without diffing.
    pub async fn scan(&self) -> Result<StateSnapshot> {
        self.scanner.scan().await
    }

    /// Scan and diff.
    pub async fn refresh(&self) -> Result<DiffReport> {
        self.scanner.refresh().await
    }

    /// Refresh, then upload everything that is local only.
    #[instrument(skip(self))]
    pub async fn sync_upload(&self) -> Result<Option<JobHandle>> {
        let report = self.refresh().await?;
        self.orchestrator.start_upload(&report).await
    }

    /// Refresh, then download everything that is remote only.
    #[instrument(skip(self))]
    pub async fn sync_download(&self) -> Result<Option<JobHandle>> {
        let report = self.refresh().await?;
        self.orchestrator.start_download(&report).await
    }

    pub async fn job(&self, job_id: SyncJobId) -> Option<SyncJob> {
        self.orchestrator.job(job_id).await
    }

    pub async fn active_jobs(&self) -> Vec<SyncJob> {
        self.orchestrator.active_jobs().await
    }

    /// Stop polling a job. The remote job keeps running.
    pub async fn cancel_job(&self, job_id: SyncJobId) -> Result<()> {
        self.orchestrator.cancel(job_id).await
    }

    pub async fn restore(&self, category: &str, description: Option<&str>) -> Result<()> {
        self.actions.restore(category, description).await
    }

    pub async fn remove_from_config(&self, category: &str) -> Result<()> {
        self.actions.remove_from_config(category).await
    }

    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        self.actions.rename(old, new).await
    }

    pub async fn update_description(&self, category: &str, description: &str) -> Result<()> {
        self.actions.update_description(category, description).await
    }

    pub async fn adopt_missing(&self, report: &DiffReport) -> Result<Vec<String>> {
        self.actions.adopt_missing(report).await
    }

    pub async fn preview_delete(&self, category: &str) -> Result<DeletePreview> {
        self.actions.preview_delete(category).await
    }

    pub async fn confirm_delete(&self, preview: &DeletePreview) -> Result<()> {
        self.actions.confirm_delete(preview).await
    }

    pub async fn add_file(&self, category: &str, filename: &str, data: Bytes) -> Result<()> {
        self.actions.add_file(category, filename, data).await
    }

    pub async fn delete_file(
        &self,
        category: &str,
        filename: &str,
        scope: FileScope,
    ) -> Result<FileRemoval> {
        self.actions.delete_file(category, filename, scope).await
    }

    pub async fn rename_file(&self, category: &str, old: &str, new: &str) -> Result<()> {
        self.actions.rename_file(category, old, new).await
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Cancel every job poll and the health check. Remote jobs are left
    /// running.
    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
        self.health.shutdown();
        info!("Sync context shut down");
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        self.health.shutdown();
    }
}
