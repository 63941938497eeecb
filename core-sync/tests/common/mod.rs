//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    CategorySnapshot, ConfigStore, DescriptionTable, JobStatusReport, LocalMediaStore, MediaKey,
    RemoteMediaStore, TransferDirection, TransferJobId, TransferService,
};
use bytes::Bytes;
use core_runtime::{EngineConfig, EngineConfigBuilder};
use core_sync::SyncContext;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub fn snapshot(entries: Vec<(&str, Vec<&str>)>) -> CategorySnapshot {
    entries.into_iter().collect()
}

pub fn table(entries: &[(&str, &str)]) -> DescriptionTable {
    entries.iter().copied().collect()
}

fn without_category(snapshot: &CategorySnapshot, category: &str) -> CategorySnapshot {
    let prefix = format!("{}/", category);
    snapshot
        .iter()
        .filter(|(slug, _)| *slug != category && !slug.starts_with(&prefix))
        .map(|(slug, files)| (slug.to_string(), files.to_vec()))
        .collect()
}

fn without_file(snapshot: &CategorySnapshot, key: &MediaKey) -> CategorySnapshot {
    let mut kept = CategorySnapshot::new();
    for (slug, files) in snapshot.iter() {
        kept.insert_category(slug);
        for file in files
            .iter()
            .filter(|file| !(slug == key.category && **file == key.filename))
        {
            kept.insert_file(slug, file.clone());
        }
    }
    kept
}

// ============================================================================
// Local store
// ============================================================================

#[derive(Default)]
pub struct MemoryLocal {
    snapshot: Mutex<CategorySnapshot>,
    rename_delay: Mutex<Option<Duration>>,
    fail_scan: AtomicBool,
    scans: AtomicU32,
}

impl MemoryLocal {
    pub fn new(snapshot: CategorySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> CategorySnapshot {
        self.snapshot.lock().unwrap().clone()
    }

    pub fn add_file(&self, category: &str, filename: &str) {
        self.snapshot.lock().unwrap().insert_file(category, filename);
    }

    pub fn set_rename_delay(&self, delay: Duration) {
        *self.rename_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    pub fn scans(&self) -> u32 {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalMediaStore for MemoryLocal {
    async fn scan_local(&self) -> Result<CategorySnapshot> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("disk unmounted".to_string()));
        }
        Ok(self.snapshot())
    }

    async fn list_category_files(&self, category: &str) -> Result<Vec<String>> {
        Ok(self
            .snapshot
            .lock()
            .unwrap()
            .files(category)
            .map(|files| files.to_vec())
            .unwrap_or_default())
    }

    async fn create_category(&self, category: &str) -> Result<()> {
        self.snapshot.lock().unwrap().insert_category(category);
        Ok(())
    }

    async fn rename_category(&self, old: &str, new: &str) -> Result<()> {
        let delay = *self.rename_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut snapshot = self.snapshot.lock().unwrap();
        if snapshot.contains_category(new) {
            return Err(BridgeError::Conflict(format!("'{}' exists", new)));
        }
        let Some(files) = snapshot.files(old).map(|files| files.to_vec()) else {
            return Ok(());
        };
        let mut renamed = without_category(&snapshot, old);
        renamed.insert_category(new);
        for file in files {
            renamed.insert_file(new, file);
        }
        *snapshot = renamed;
        Ok(())
    }

    async fn delete_category(&self, category: &str) -> Result<()> {
        let mut snapshot = self.snapshot.lock().unwrap();
        *snapshot = without_category(&snapshot, category);
        Ok(())
    }

    async fn read_file(&self, key: &MediaKey) -> Result<Bytes> {
        if self.snapshot.lock().unwrap().contains_key(key) {
            Ok(Bytes::from(key.to_string()))
        } else {
            Err(BridgeError::NotFound(key.to_string()))
        }
    }

    async fn write_file(&self, key: &MediaKey, _data: Bytes) -> Result<()> {
        self.snapshot
            .lock()
            .unwrap()
            .insert_file(key.category.clone(), key.filename.clone());
        Ok(())
    }

    async fn delete_file(&self, key: &MediaKey) -> Result<()> {
        let mut snapshot = self.snapshot.lock().unwrap();
        if !snapshot.contains_key(key) {
            return Err(BridgeError::NotFound(key.to_string()));
        }
        *snapshot = without_file(&snapshot, key);
        Ok(())
    }

    async fn rename_file(&self, key: &MediaKey, new_filename: &str) -> Result<()> {
        let mut snapshot = self.snapshot.lock().unwrap();
        if !snapshot.contains_key(key) {
            return Err(BridgeError::NotFound(key.to_string()));
        }
        if snapshot.contains_file(&key.category, new_filename) {
            return Err(BridgeError::Conflict(format!("'{}' exists", new_filename)));
        }
        let mut renamed = without_file(&snapshot, key);
        renamed.insert_file(key.category.clone(), new_filename);
        *snapshot = renamed;
        Ok(())
    }
}

// ============================================================================
// Remote store
// ============================================================================

#[derive(Default)]
pub struct MemoryRemote {
    snapshot: Mutex<CategorySnapshot>,
    fail_scan: AtomicBool,
    scans: AtomicU32,
}

impl MemoryRemote {
    pub fn new(snapshot: CategorySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> CategorySnapshot {
        self.snapshot.lock().unwrap().clone()
    }

    pub fn set_fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    pub fn scans(&self) -> u32 {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteMediaStore for MemoryRemote {
    async fn scan_remote(&self) -> Result<CategorySnapshot> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("HTTP 503".to_string()));
        }
        Ok(self.snapshot())
    }

    async fn list_category_files(&self, category: &str) -> Result<Vec<String>> {
        Ok(self
            .snapshot
            .lock()
            .unwrap()
            .files(category)
            .map(|files| files.to_vec())
            .unwrap_or_default())
    }

    async fn upload(&self, key: &MediaKey, _data: Bytes) -> Result<()> {
        self.snapshot
            .lock()
            .unwrap()
            .insert_file(key.category.clone(), key.filename.clone());
        Ok(())
    }

    async fn download(&self, key: &MediaKey) -> Result<Bytes> {
        if self.snapshot.lock().unwrap().contains_key(key) {
            Ok(Bytes::from(key.to_string()))
        } else {
            Err(BridgeError::NotFound(key.to_string()))
        }
    }

    async fn delete(&self, key: &MediaKey) -> Result<()> {
        let mut snapshot = self.snapshot.lock().unwrap();
        *snapshot = without_file(&snapshot, key);
        Ok(())
    }
}

// ============================================================================
// Config store
// ============================================================================

#[derive(Default)]
pub struct MemoryConfig {
    table: Mutex<DescriptionTable>,
}

impl MemoryConfig {
    pub fn new(table: DescriptionTable) -> Self {
        Self {
            table: Mutex::new(table),
        }
    }

    pub fn table(&self) -> DescriptionTable {
        self.table.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfig {
    async fn get(&self) -> Result<DescriptionTable> {
        Ok(self.table())
    }

    async fn set(&self, category: &str, description: &str) -> Result<()> {
        self.table.lock().unwrap().set(category, description);
        Ok(())
    }

    async fn delete(&self, category: &str) -> Result<()> {
        self.table.lock().unwrap().remove(category);
        Ok(())
    }

    async fn rename(&self, old: &str, new: &str) -> Result<()> {
        let mut table = self.table.lock().unwrap();
        if !table.contains(old) {
            return Err(BridgeError::Conflict(format!("'{}' not in config", old)));
        }
        if !table.rename(old, new) {
            return Err(BridgeError::Conflict(format!("'{}' already exists", new)));
        }
        Ok(())
    }
}

// ============================================================================
// Transfer service
// ============================================================================

/// One scripted answer to a status check.
#[derive(Debug, Clone)]
pub enum PollStep {
    Report(JobStatusReport),
    Fail(&'static str),
}

pub fn running() -> PollStep {
    PollStep::Report(JobStatusReport::in_progress(0, 0))
}

pub fn finished(success: bool, transferred: usize, failed: usize) -> PollStep {
    PollStep::Report(JobStatusReport::finished(success, transferred, failed))
}

/// Transfer service that answers status checks from a per-direction script.
/// Once a script runs out the job reports itself as still running.
#[derive(Default)]
pub struct ScriptedTransfer {
    scripts: Mutex<HashMap<TransferDirection, VecDeque<PollStep>>>,
    jobs: Mutex<HashMap<TransferJobId, TransferDirection>>,
    submitted: Mutex<Vec<(TransferDirection, Vec<MediaKey>)>>,
    polls: Mutex<Vec<(TransferDirection, Instant)>>,
    reject_submit: AtomicBool,
}

impl ScriptedTransfer {
    pub fn script(&self, direction: TransferDirection, steps: impl IntoIterator<Item = PollStep>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(direction, steps.into_iter().collect());
    }

    pub fn set_reject_submit(&self, reject: bool) {
        self.reject_submit.store(reject, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<(TransferDirection, Vec<MediaKey>)> {
        self.submitted.lock().unwrap().clone()
    }

    /// Offsets of the status checks of one direction, relative to `start`.
    pub fn poll_offsets(&self, direction: TransferDirection, start: Instant) -> Vec<Duration> {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| *d == direction)
            .map(|(_, at)| at.duration_since(start))
            .collect()
    }

    pub fn poll_count(&self, direction: TransferDirection) -> usize {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| *d == direction)
            .count()
    }

    fn submit(&self, direction: TransferDirection, files: Vec<MediaKey>) -> Result<TransferJobId> {
        if self.reject_submit.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("transfer service offline".to_string()));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push((direction, files));
        let job_id = TransferJobId::new(format!("{}-{}", direction, submitted.len()));
        self.jobs.lock().unwrap().insert(job_id.clone(), direction);
        Ok(job_id)
    }
}

#[async_trait]
impl TransferService for ScriptedTransfer {
    async fn submit_upload(&self, files: Vec<MediaKey>) -> Result<TransferJobId> {
        self.submit(TransferDirection::Upload, files)
    }

    async fn submit_download(&self, files: Vec<MediaKey>) -> Result<TransferJobId> {
        self.submit(TransferDirection::Download, files)
    }

    async fn poll_job(&self, job_id: &TransferJobId) -> Result<JobStatusReport> {
        let direction = self
            .jobs
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .ok_or_else(|| BridgeError::NotFound(job_id.to_string()))?;
        self.polls.lock().unwrap().push((direction, Instant::now()));

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&direction)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(running);

        match step {
            PollStep::Report(report) => Ok(report),
            PollStep::Fail(message) => Err(BridgeError::NotAvailable(message.to_string())),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub local: Arc<MemoryLocal>,
    pub remote: Arc<MemoryRemote>,
    pub config: Arc<MemoryConfig>,
    pub transfer: Arc<ScriptedTransfer>,
}

impl Harness {
    pub fn new(local: CategorySnapshot, remote: CategorySnapshot, config: DescriptionTable) -> Self {
        Self {
            local: Arc::new(MemoryLocal::new(local)),
            remote: Arc::new(MemoryRemote::new(remote)),
            config: Arc::new(MemoryConfig::new(config)),
            transfer: Arc::new(ScriptedTransfer::default()),
        }
    }

    /// Builder with every collaborator set to the in-memory fakes.
    pub fn builder(&self) -> EngineConfigBuilder {
        EngineConfig::builder()
            .local_store(self.local.clone())
            .remote_store(self.remote.clone())
            .config_store(self.config.clone())
            .transfer_service(self.transfer.clone())
            .event_buffer_size(256)
    }

    pub fn context(&self) -> SyncContext {
        SyncContext::new(self.builder().build().unwrap()).unwrap()
    }
}
