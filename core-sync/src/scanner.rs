//! # State Scanner
//!
//! Fetches the three records of the collection and feeds them to the
//! [`diff`](crate::diff) engine.
//!
//! A scan either returns all three snapshots or fails naming the source that
//! could not be read. A failed source is never replaced by an empty snapshot,
//! since an empty remote would turn every local file into an upload.

use crate::diff::{diff, DiffReport};
use crate::{Result, StateSource, SyncError};
use async_trait::async_trait;
use bridge_traits::{CategorySnapshot, ConfigStore, DescriptionTable, LocalMediaStore, RemoteMediaStore};
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// The three records as read by one scan.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub local: CategorySnapshot,
    pub remote: CategorySnapshot,
    pub config: DescriptionTable,
}

impl StateSnapshot {
    pub fn diff(&self) -> DiffReport {
        diff(&self.local, &self.remote, &self.config)
    }
}

/// Something that can produce a fresh diff on demand.
///
/// Job polling and the health check only need this much of the scanner.
#[async_trait]
pub trait RescanTrigger: Send + Sync {
    async fn rescan(&self) -> Result<DiffReport>;
}

/// Scans the local store, the remote mirror and the config.
pub struct StateScanner {
    local: Arc<dyn LocalMediaStore>,
    remote: Arc<dyn RemoteMediaStore>,
    config: Arc<dyn ConfigStore>,
    event_bus: EventBus,
    /// Serializes scan-diff cycles.
    cycle_lock: Mutex<()>,
}

impl StateScanner {
    pub fn new(
        local: Arc<dyn LocalMediaStore>,
        remote: Arc<dyn RemoteMediaStore>,
        config: Arc<dyn ConfigStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            local,
            remote,
            config,
            event_bus,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Read all three records.
    ///
    /// # Errors
    ///
    /// Fails with the classified error of the first source that could not
    /// be read.
    #[instrument(skip(self))]
    pub async fn scan(&self) -> Result<StateSnapshot> {
        let local = async {
            self.local
                .scan_local()
                .await
                .map_err(|e| SyncError::from_bridge(StateSource::Local, e))
        };
        let remote = async {
            self.remote
                .scan_remote()
                .await
                .map_err(|e| SyncError::from_bridge(StateSource::Remote, e))
        };
        let config = async {
            self.config
                .get()
                .await
                .map_err(|e| SyncError::from_bridge(StateSource::Config, e))
        };

        let (local, remote, config) = tokio::try_join!(local, remote, config).map_err(|e| {
            warn!(error = %e, "Scan failed");
            e
        })?;

        debug!(
            local_categories = local.len(),
            local_files = local.file_count(),
            remote_categories = remote.len(),
            remote_files = remote.file_count(),
            config_entries = config.len(),
            "Scan completed"
        );

        Ok(StateSnapshot {
            local,
            remote,
            config,
        })
    }

    /// Scan and diff. Only one cycle runs at a time; a caller arriving while
    /// a cycle runs waits for it and then runs its own.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<DiffReport> {
        let _cycle = self.cycle_lock.lock().await;

        let report = self.scan().await?.diff();
        let summary = report.summary();
        info!(
            to_upload = summary.to_upload,
            to_download = summary.to_download,
            missing_in_config = summary.missing_in_config,
            deleted_categories = summary.deleted_categories,
            "Diff refreshed"
        );

        self.event_bus
            .emit(CoreEvent::Reconcile(ReconcileEvent::DiffRefreshed {
                to_upload: summary.to_upload as u64,
                to_download: summary.to_download as u64,
                missing_in_config: summary.missing_in_config as u64,
                deleted_categories: summary.deleted_categories as u64,
            }))
            .ok();

        Ok(report)
    }
}

#[async_trait]
impl RescanTrigger for StateScanner {
    async fn rescan(&self) -> Result<DiffReport> {
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{BridgeError, MediaKey};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedLocal(std::result::Result<CategorySnapshot, String>);

    #[async_trait]
    impl LocalMediaStore for FixedLocal {
        async fn scan_local(&self) -> bridge_traits::error::Result<CategorySnapshot> {
            self.0
                .clone()
                .map_err(|m| BridgeError::Io(std::io::Error::new(std::io::ErrorKind::Other, m)))
        }
        async fn list_category_files(&self, _: &str) -> bridge_traits::error::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn create_category(&self, _: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn rename_category(&self, _: &str, _: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn delete_category(&self, _: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn read_file(&self, _: &MediaKey) -> bridge_traits::error::Result<Bytes> {
            Ok(Bytes::new())
        }
        async fn write_file(&self, _: &MediaKey, _: Bytes) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn delete_file(&self, _: &MediaKey) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn rename_file(&self, _: &MediaKey, _: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }
    }

    struct FixedRemote {
        result: std::result::Result<CategorySnapshot, BridgeError>,
        scans: AtomicU32,
    }

    impl FixedRemote {
        fn new(result: std::result::Result<CategorySnapshot, BridgeError>) -> Self {
            Self {
                result,
                scans: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteMediaStore for FixedRemote {
        async fn scan_remote(&self) -> bridge_traits::error::Result<CategorySnapshot> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(snapshot) => Ok(snapshot.clone()),
                Err(BridgeError::InvalidResponse(m)) => Err(BridgeError::InvalidResponse(m.clone())),
                Err(e) => Err(BridgeError::NotAvailable(e.to_string())),
            }
        }
        async fn list_category_files(&self, _: &str) -> bridge_traits::error::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn upload(&self, _: &MediaKey, _: Bytes) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn download(&self, _: &MediaKey) -> bridge_traits::error::Result<Bytes> {
            Ok(Bytes::new())
        }
        async fn delete(&self, _: &MediaKey) -> bridge_traits::error::Result<()> {
            Ok(())
        }
    }

    struct FixedConfig(DescriptionTable);

    #[async_trait]
    impl ConfigStore for FixedConfig {
        async fn get(&self) -> bridge_traits::error::Result<DescriptionTable> {
            Ok(self.0.clone())
        }
        async fn set(&self, _: &str, _: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn delete(&self, _: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn rename(&self, _: &str, _: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }
    }

    fn scanner(
        local: std::result::Result<CategorySnapshot, String>,
        remote: Arc<FixedRemote>,
        bus: EventBus,
    ) -> StateScanner {
        let config: DescriptionTable = vec![("cats", "猫"), ("dogs", "狗")].into_iter().collect();
        StateScanner::new(
            Arc::new(FixedLocal(local)),
            remote,
            Arc::new(FixedConfig(config)),
            bus,
        )
    }

    #[tokio::test]
    async fn test_refresh_diffs_and_emits() {
        let local: CategorySnapshot = vec![("cats", vec!["a.png", "b.png"])].into_iter().collect();
        let remote: CategorySnapshot = vec![("cats", vec!["a.png"])].into_iter().collect();
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();

        let scanner = scanner(Ok(local), Arc::new(FixedRemote::new(Ok(remote))), bus);
        let report = scanner.refresh().await.unwrap();

        assert_eq!(report.to_upload, vec![MediaKey::new("cats", "b.png")]);
        assert_eq!(report.deleted_categories, vec!["dogs".to_string()]);

        match events.recv().await.unwrap() {
            CoreEvent::Reconcile(ReconcileEvent::DiffRefreshed {
                to_upload,
                deleted_categories,
                ..
            }) => {
                assert_eq!(to_upload, 1);
                assert_eq!(deleted_categories, 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_failure_is_not_an_empty_snapshot() {
        let local: CategorySnapshot = vec![("cats", vec!["a.png"])].into_iter().collect();
        let remote = Arc::new(FixedRemote::new(Err(BridgeError::NotAvailable(
            "503".to_string(),
        ))));

        let scanner = scanner(Ok(local), remote, EventBus::new(16));
        let err = scanner.refresh().await.unwrap_err();

        match err {
            SyncError::SourceUnavailable { origin, .. } => assert_eq!(origin, StateSource::Remote),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_local_failure_names_local_source() {
        let remote = Arc::new(FixedRemote::new(Ok(CategorySnapshot::new())));
        let scanner = scanner(Err("permission denied".to_string()), remote, EventBus::new(16));

        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::SourceUnavailable {
                origin: StateSource::Local,
                ..
            }
        ));
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_malformed_remote_listing() {
        let remote = Arc::new(FixedRemote::new(Err(BridgeError::InvalidResponse(
            "expected array".to_string(),
        ))));
        let scanner = scanner(Ok(CategorySnapshot::new()), remote, EventBus::new(16));

        assert!(matches!(
            scanner.scan().await,
            Err(SyncError::MalformedResponse {
                origin: StateSource::Remote,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_every_refresh_rescans() {
        let remote = Arc::new(FixedRemote::new(Ok(CategorySnapshot::new())));
        let scanner = scanner(Ok(CategorySnapshot::new()), remote.clone(), EventBus::new(16));

        scanner.rescan().await.unwrap();
        scanner.rescan().await.unwrap();
        assert_eq!(remote.scans.load(Ordering::SeqCst), 2);
    }
}
