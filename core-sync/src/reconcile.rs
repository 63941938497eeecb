//! # Reconciliation Actions
//!
//! User-initiated fixes for the divergences a [`DiffReport`] lists, plus
//! single-file edits inside a category.
//!
//! Actions on the same category slug are serialized through a per-slug lock;
//! actions on different slugs run freely. An action that needs several slugs
//! takes their locks in sorted order.
//!
//! ## Rename consistency
//!
//! The config entry is renamed first, then the local category directory is
//! relocated within `relocation_timeout`. If the relocation fails or times
//! out the config rename is rolled back. The remote mirror is not relocated:
//! until an upload runs, the next diff lists the renamed files as uploads and
//! the old remote category as missing from config. A category with nested
//! categories (`animals` over `animals/cats`) cannot be renamed.
//!
//! ## Deleting
//!
//! Deleting is two calls: [`ReconciliationActions::preview_delete`] reports
//! what would go, [`ReconciliationActions::confirm_delete`] deletes exactly
//! that or refuses with [`SyncError::StalePreview`] if anything changed in
//! between. Nested categories go with their parent and are listed in the
//! preview. Remote objects are never deleted by a category delete.

use crate::diff::DiffReport;
use crate::{Result, StateSource, SyncError};
use bridge_traits::{
    is_supported_image, BridgeError, CategorySnapshot, ConfigStore, DescriptionTable,
    LocalMediaStore, MediaKey, RemoteMediaStore,
};
use bytes::Bytes;
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

/// Files and config entry of one category in a [`DeletePreview`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedCategory {
    pub slug: String,
    pub description: Option<String>,
    pub local_files: Vec<String>,
    pub remote_files: Vec<String>,
}

/// What a delete would remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePreview {
    pub category: String,
    /// Config description, if the category is registered
    pub description: Option<String>,
    pub local_files: Vec<String>,
    /// Listed for information; remote objects are left alone
    pub remote_files: Vec<String>,
    /// Categories below this one (`{category}/...`), removed with it
    pub nested: Vec<NestedCategory>,
    /// Hex SHA-256 over every field above, compared on confirm
    pub fingerprint: String,
}

impl DeletePreview {
    fn new(
        category: &str,
        description: Option<String>,
        local_files: Vec<String>,
        remote_files: Vec<String>,
        nested: Vec<NestedCategory>,
    ) -> Self {
        let mut digest = Fingerprint::default();
        digest.entry(category, description.as_deref(), &local_files, &remote_files);
        for child in &nested {
            digest.entry(
                &child.slug,
                child.description.as_deref(),
                &child.local_files,
                &child.remote_files,
            );
        }

        Self {
            category: category.to_string(),
            description,
            local_files,
            remote_files,
            nested,
            fingerprint: digest.finish(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local_files.is_empty()
            && self.remote_files.is_empty()
            && self
                .nested
                .iter()
                .all(|child| child.local_files.is_empty() && child.remote_files.is_empty())
    }

    /// Local files removed by confirming, nested categories included.
    pub fn local_file_count(&self) -> usize {
        self.local_files.len()
            + self
                .nested
                .iter()
                .map(|child| child.local_files.len())
                .sum::<usize>()
    }

    pub fn nested_slugs(&self) -> Vec<&str> {
        self.nested.iter().map(|child| child.slug.as_str()).collect()
    }
}

/// Length-prefixed SHA-256 so that field boundaries cannot shift.
#[derive(Default)]
struct Fingerprint(Sha256);

impl Fingerprint {
    fn text(&mut self, value: &str) {
        self.0.update((value.len() as u64).to_le_bytes());
        self.0.update(value.as_bytes());
    }

    fn list(&mut self, values: &[String]) {
        self.0.update((values.len() as u64).to_le_bytes());
        for value in values {
            self.text(value);
        }
    }

    fn entry(
        &mut self,
        slug: &str,
        description: Option<&str>,
        local_files: &[String],
        remote_files: &[String],
    ) {
        self.text(slug);
        match description {
            Some(description) => {
                self.0.update([1u8]);
                self.text(description);
            }
            None => self.0.update([0u8]),
        }
        self.list(local_files);
        self.list(remote_files);
    }

    fn finish(self) -> String {
        format!("{:x}", self.0.finalize())
    }
}

/// Sides a single-file delete applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileScope {
    Local,
    Remote,
    Both,
}

impl FileScope {
    fn includes_local(self) -> bool {
        matches!(self, FileScope::Local | FileScope::Both)
    }

    fn includes_remote(self) -> bool {
        matches!(self, FileScope::Remote | FileScope::Both)
    }
}

/// Which copies a single-file delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRemoval {
    pub local: bool,
    pub remote: bool,
}

/// One async lock per category slug.
#[derive(Default)]
struct SlugLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SlugLocks {
    fn entry(&self, slug: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Drop locks nobody holds or waits on.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(slug.to_string()).or_default())
    }

    async fn lock(&self, slug: &str) -> OwnedMutexGuard<()> {
        self.entry(slug).lock_owned().await
    }

    async fn lock_pair(&self, a: &str, b: &str) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first_guard = self.lock(first).await;
        let second_guard = self.lock(second).await;
        (first_guard, second_guard)
    }

    async fn lock_all(&self, slugs: &[&str]) -> Vec<OwnedMutexGuard<()>> {
        let sorted: BTreeSet<&str> = slugs.iter().copied().collect();
        let mut guards = Vec::with_capacity(sorted.len());
        for slug in sorted {
            guards.push(self.lock(slug).await);
        }
        guards
    }
}

fn is_nested_under(slug: &str, category: &str) -> bool {
    slug.len() > category.len() + 1
        && slug.starts_with(category)
        && slug.as_bytes()[category.len()] == b'/'
}

/// Category-level fixes across the config, the local store and the remote mirror.
pub struct ReconciliationActions {
    local: Arc<dyn LocalMediaStore>,
    remote: Arc<dyn RemoteMediaStore>,
    config: Arc<dyn ConfigStore>,
    event_bus: EventBus,
    default_description: String,
    relocation_timeout: Duration,
    locks: SlugLocks,
}

impl ReconciliationActions {
    pub fn new(
        local: Arc<dyn LocalMediaStore>,
        remote: Arc<dyn RemoteMediaStore>,
        config: Arc<dyn ConfigStore>,
        event_bus: EventBus,
        default_description: impl Into<String>,
        relocation_timeout: Duration,
    ) -> Self {
        Self {
            local,
            remote,
            config,
            event_bus,
            default_description: default_description.into(),
            relocation_timeout,
            locks: SlugLocks::default(),
        }
    }

    /// Bring a deleted category back.
    ///
    /// Writes the config entry with `description`, else the entry's current
    /// description, else the default, and makes sure the local category
    /// exists (possibly empty).
    #[instrument(skip(self, description))]
    pub async fn restore(&self, category: &str, description: Option<&str>) -> Result<()> {
        let _guard = self.locks.lock(category).await;

        let table = self.read_config().await?;
        let description = description
            .or_else(|| table.get(category))
            .unwrap_or(&self.default_description)
            .to_string();

        self.config
            .set(category, &description)
            .await
            .map_err(config_error)?;
        self.local
            .create_category(category)
            .await
            .map_err(local_error)?;

        info!("Restored category");
        self.emit(ReconcileEvent::CategoryRestored {
            category: category.to_string(),
        });
        Ok(())
    }

    /// Drop a category from the config. Removing an absent entry succeeds.
    #[instrument(skip(self))]
    pub async fn remove_from_config(&self, category: &str) -> Result<()> {
        let _guard = self.locks.lock(category).await;

        self.config.delete(category).await.map_err(config_error)?;

        info!("Removed category from config");
        self.emit(ReconcileEvent::CategoryRemoved {
            category: category.to_string(),
        });
        Ok(())
    }

    /// Rename a category in the config and relocate its local directory.
    ///
    /// # Errors
    ///
    /// - [`SyncError::CategoryNotFound`] if `old` is not in the config
    /// - [`SyncError::ConfigWriteConflict`] if `new` is already in the config,
    ///   or if a failed relocation could not be rolled back
    /// - [`SyncError::HasNestedCategories`] if categories exist below `old`
    ///   in the config or locally
    /// - the relocation error, after a successful rollback
    #[instrument(skip(self))]
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let _guards = self.locks.lock_pair(old, new).await;

        let table = self.read_config().await?;
        if !table.contains(old) {
            return Err(SyncError::CategoryNotFound(old.to_string()));
        }
        if table.contains(new) {
            return Err(SyncError::ConfigWriteConflict(format!(
                "category '{}' already exists",
                new
            )));
        }

        let local = self.local.scan_local().await.map_err(local_error)?;
        let nested: BTreeSet<String> = table
            .keys()
            .chain(local.categories())
            .filter(|slug| is_nested_under(slug, old))
            .map(str::to_string)
            .collect();
        if !nested.is_empty() {
            return Err(SyncError::HasNestedCategories {
                category: old.to_string(),
                nested: nested.into_iter().collect(),
            });
        }

        self.config.rename(old, new).await.map_err(config_error)?;
        debug!("Config entry renamed, relocating files");

        let relocation =
            tokio::time::timeout(self.relocation_timeout, self.local.rename_category(old, new))
                .await;
        let failure = match relocation {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(local_error(e)),
            Err(_) => Some(SyncError::SourceUnavailable {
                origin: StateSource::Local,
                message: format!(
                    "relocating '{}' did not finish within {}s",
                    old,
                    self.relocation_timeout.as_secs_f64()
                ),
            }),
        };

        if let Some(error) = failure {
            warn!(error = %error, "Relocation failed, rolling back config rename");
            return match self.config.rename(new, old).await {
                Ok(()) => Err(error),
                Err(rollback) => Err(SyncError::ConfigWriteConflict(format!(
                    "relocating '{}' to '{}' failed ({}) and restoring the config entry failed ({})",
                    old, new, error, rollback
                ))),
            };
        }

        info!("Renamed category");
        self.emit(ReconcileEvent::CategoryRenamed {
            from: old.to_string(),
            to: new.to_string(),
        });
        Ok(())
    }

    /// Replace the description of a registered category.
    #[instrument(skip(self, description))]
    pub async fn update_description(&self, category: &str, description: &str) -> Result<()> {
        let _guard = self.locks.lock(category).await;

        if !self.read_config().await?.contains(category) {
            return Err(SyncError::CategoryNotFound(category.to_string()));
        }
        self.config
            .set(category, description)
            .await
            .map_err(config_error)?;

        debug!("Updated description");
        self.emit(ReconcileEvent::DescriptionUpdated {
            category: category.to_string(),
        });
        Ok(())
    }

    /// Register every `missing_in_config` category with the default
    /// description. Categories registered in the meantime are left as they
    /// are. Returns the slugs that were added.
    #[instrument(skip(self, report), fields(missing = report.missing_in_config.len()))]
    pub async fn adopt_missing(&self, report: &DiffReport) -> Result<Vec<String>> {
        let mut adopted = Vec::new();

        for category in &report.missing_in_config {
            let _guard = self.locks.lock(category).await;
            if self.read_config().await?.contains(category) {
                continue;
            }
            self.config
                .set(category, &self.default_description)
                .await
                .map_err(config_error)?;
            adopted.push(category.clone());
        }

        if !adopted.is_empty() {
            info!(count = adopted.len(), "Adopted categories into config");
            self.emit(ReconcileEvent::CategoriesAdopted {
                categories: adopted.clone(),
            });
        }
        Ok(adopted)
    }

    /// List what deleting `category` would affect, nested categories included.
    ///
    /// # Errors
    ///
    /// [`SyncError::CategoryNotFound`] if the category is neither registered
    /// nor holds any files.
    #[instrument(skip(self))]
    pub async fn preview_delete(&self, category: &str) -> Result<DeletePreview> {
        let _guard = self.locks.lock(category).await;
        let preview = self.current_preview(category).await?;

        if preview.description.is_none() && preview.nested.is_empty() && preview.is_empty() {
            return Err(SyncError::CategoryNotFound(category.to_string()));
        }
        Ok(preview)
    }

    /// Delete the config entries and the local directory of a previewed
    /// category and of its nested categories.
    ///
    /// # Errors
    ///
    /// [`SyncError::StalePreview`] if the category or anything below it
    /// changed since the preview.
    #[instrument(skip(self, preview), fields(category = %preview.category))]
    pub async fn confirm_delete(&self, preview: &DeletePreview) -> Result<()> {
        let category = preview.category.as_str();
        let _guard = self.locks.lock(category).await;

        let mut current = self.current_preview(category).await?;
        let _nested_guards = if current.nested.is_empty() {
            Vec::new()
        } else {
            let guards = self.locks.lock_all(&current.nested_slugs()).await;
            // Nested categories may have changed while we waited.
            current = self.current_preview(category).await?;
            guards
        };

        if current.fingerprint != preview.fingerprint {
            warn!("Category changed since preview, delete refused");
            return Err(SyncError::StalePreview {
                category: category.to_string(),
            });
        }

        for child in current.nested.iter().filter(|child| child.description.is_some()) {
            self.config
                .delete(&child.slug)
                .await
                .map_err(config_error)?;
        }
        if current.description.is_some() {
            self.config.delete(category).await.map_err(config_error)?;
        }
        self.local
            .delete_category(category)
            .await
            .map_err(local_error)?;

        info!(
            files = current.local_file_count(),
            nested = current.nested.len(),
            "Deleted category"
        );
        self.emit(ReconcileEvent::CategoryDeleted {
            category: category.to_string(),
            files_removed: current.local_file_count() as u64,
        });
        Ok(())
    }

    /// Write a media file into a local category, replacing a file of the
    /// same name. The category directory is created if needed.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn add_file(&self, category: &str, filename: &str, data: Bytes) -> Result<()> {
        if !is_supported_image(filename) {
            return Err(SyncError::UnsupportedFile(filename.to_string()));
        }
        let _guard = self.locks.lock(category).await;

        self.local
            .write_file(&MediaKey::new(category, filename), data)
            .await
            .map_err(local_error)?;

        info!("Added media file");
        self.emit(ReconcileEvent::FileAdded {
            category: category.to_string(),
            filename: filename.to_string(),
        });
        Ok(())
    }

    /// Delete one file from the sides named by `scope`. A side that does not
    /// hold the file is skipped.
    ///
    /// # Errors
    ///
    /// [`SyncError::FileNotFound`] if no side in `scope` holds the file.
    #[instrument(skip(self))]
    pub async fn delete_file(
        &self,
        category: &str,
        filename: &str,
        scope: FileScope,
    ) -> Result<FileRemoval> {
        let _guard = self.locks.lock(category).await;
        let key = MediaKey::new(category, filename);

        let in_local = scope.includes_local()
            && self
                .local
                .list_category_files(category)
                .await
                .map_err(local_error)?
                .iter()
                .any(|file| file == filename);
        let in_remote = scope.includes_remote()
            && self
                .remote
                .list_category_files(category)
                .await
                .map_err(remote_error)?
                .iter()
                .any(|file| file == filename);

        if !in_local && !in_remote {
            return Err(SyncError::FileNotFound {
                category: category.to_string(),
                filename: filename.to_string(),
            });
        }

        if in_local {
            self.local.delete_file(&key).await.map_err(local_error)?;
        }
        if in_remote {
            self.remote.delete(&key).await.map_err(remote_error)?;
        }

        let removal = FileRemoval {
            local: in_local,
            remote: in_remote,
        };
        info!(local = removal.local, remote = removal.remote, "Deleted media file");
        self.emit(ReconcileEvent::FileDeleted {
            category: category.to_string(),
            filename: filename.to_string(),
            local: removal.local,
            remote: removal.remote,
        });
        Ok(removal)
    }

    /// Rename a local file within its category.
    ///
    /// The remote copy keeps its old name: the next diff lists the new name
    /// as an upload and the old one as a download until the mirror catches up.
    #[instrument(skip(self))]
    pub async fn rename_file(&self, category: &str, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if !is_supported_image(new) {
            return Err(SyncError::UnsupportedFile(new.to_string()));
        }
        let _guard = self.locks.lock(category).await;

        let files = self
            .local
            .list_category_files(category)
            .await
            .map_err(local_error)?;
        if !files.iter().any(|file| file == old) {
            return Err(SyncError::FileNotFound {
                category: category.to_string(),
                filename: old.to_string(),
            });
        }
        if files.iter().any(|file| file == new) {
            return Err(SyncError::FileExists {
                category: category.to_string(),
                filename: new.to_string(),
            });
        }

        self.local
            .rename_file(&MediaKey::new(category, old), new)
            .await
            .map_err(local_error)?;

        info!("Renamed media file");
        self.emit(ReconcileEvent::FileRenamed {
            category: category.to_string(),
            from: old.to_string(),
            to: new.to_string(),
        });
        Ok(())
    }

    async fn current_preview(&self, category: &str) -> Result<DeletePreview> {
        let (table, local, remote) = tokio::try_join!(
            self.read_config(),
            async { self.local.scan_local().await.map_err(local_error) },
            async { self.remote.scan_remote().await.map_err(remote_error) },
        )?;

        let files = |snapshot: &CategorySnapshot, slug: &str| {
            snapshot
                .files(slug)
                .map(|files| files.to_vec())
                .unwrap_or_default()
        };

        let nested_slugs: BTreeSet<&str> = table
            .keys()
            .chain(local.categories())
            .chain(remote.categories())
            .filter(|slug| is_nested_under(slug, category))
            .collect();
        let nested = nested_slugs
            .into_iter()
            .map(|slug| NestedCategory {
                slug: slug.to_string(),
                description: table.get(slug).map(str::to_string),
                local_files: files(&local, slug),
                remote_files: files(&remote, slug),
            })
            .collect();

        Ok(DeletePreview::new(
            category,
            table.get(category).map(str::to_string),
            files(&local, category),
            files(&remote, category),
            nested,
        ))
    }

    async fn read_config(&self) -> Result<DescriptionTable> {
        self.config.get().await.map_err(config_error)
    }

    fn emit(&self, event: ReconcileEvent) {
        self.event_bus.emit(CoreEvent::Reconcile(event)).ok();
    }
}

fn config_error(e: BridgeError) -> SyncError {
    SyncError::from_bridge(StateSource::Config, e)
}

fn local_error(e: BridgeError) -> SyncError {
    SyncError::from_bridge(StateSource::Local, e)
}

fn remote_error(e: BridgeError) -> SyncError {
    SyncError::from_bridge(StateSource::Remote, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::{FsMediaStore, JsonConfigStore};
    use bridge_traits::{BridgeError, CategorySnapshot, MediaKey};
    use bytes::Bytes;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct StaticRemote {
        files: HashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl RemoteMediaStore for StaticRemote {
        async fn scan_remote(&self) -> bridge_traits::error::Result<CategorySnapshot> {
            Ok(self.files.iter().map(|(c, f)| (c.clone(), f.clone())).collect())
        }
        async fn list_category_files(&self, category: &str) -> bridge_traits::error::Result<Vec<String>> {
            Ok(self.files.get(category).cloned().unwrap_or_default())
        }
        async fn upload(&self, _: &MediaKey, _: Bytes) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn download(&self, key: &MediaKey) -> bridge_traits::error::Result<Bytes> {
            Err(BridgeError::NotFound(key.to_string()))
        }
        async fn delete(&self, _: &MediaKey) -> bridge_traits::error::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        temp: TempDir,
        config: Arc<JsonConfigStore>,
        actions: ReconciliationActions,
    }

    impl Fixture {
        fn media(&self) -> std::path::PathBuf {
            self.temp.path().join("memes")
        }
    }

    async fn touch(path: &Path) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, b"img").await.unwrap();
    }

    async fn fixture(config_json: &str, remote: StaticRemote) -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("memes_data.json");
        tokio::fs::write(&config_path, config_json).await.unwrap();

        let config = Arc::new(JsonConfigStore::open(&config_path).await.unwrap());
        let local = Arc::new(FsMediaStore::with_root(temp.path().join("memes")));
        let actions = ReconciliationActions::new(
            local,
            Arc::new(remote),
            config.clone(),
            EventBus::new(64),
            "请添加描述",
            Duration::from_secs(30),
        );
        Fixture {
            temp,
            config,
            actions,
        }
    }

    #[tokio::test]
    async fn test_restore_uses_existing_description() {
        let fx = fixture(r#"{"dogs": "狗"}"#, StaticRemote::default()).await;

        fx.actions.restore("dogs", None).await.unwrap();

        assert_eq!(fx.config.get().await.unwrap().get("dogs"), Some("狗"));
        assert!(fx.media().join("dogs").is_dir());
    }

    #[tokio::test]
    async fn test_restore_with_description_and_default() {
        let fx = fixture("{}", StaticRemote::default()).await;

        fx.actions.restore("dogs", Some("good boys")).await.unwrap();
        fx.actions.restore("cats", None).await.unwrap();

        let table = fx.config.get().await.unwrap();
        assert_eq!(table.get("dogs"), Some("good boys"));
        assert_eq!(table.get("cats"), Some("请添加描述"));
    }

    #[tokio::test]
    async fn test_remove_from_config_is_idempotent() {
        let fx = fixture(r#"{"dogs": "狗"}"#, StaticRemote::default()).await;

        fx.actions.remove_from_config("dogs").await.unwrap();
        fx.actions.remove_from_config("dogs").await.unwrap();
        assert!(fx.config.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_moves_config_and_directory() {
        let fx = fixture(r#"{"cats": "猫", "dogs": "狗"}"#, StaticRemote::default()).await;
        touch(&fx.media().join("cats/a.png")).await;

        fx.actions.rename("cats", "kittens").await.unwrap();

        let table = fx.config.get().await.unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["kittens", "dogs"]);
        assert_eq!(table.get("kittens"), Some("猫"));
        assert!(fx.media().join("kittens/a.png").exists());
    }

    #[tokio::test]
    async fn test_rename_rejects_unknown_and_taken_slugs() {
        let fx = fixture(r#"{"cats": "猫", "dogs": "狗"}"#, StaticRemote::default()).await;

        assert!(matches!(
            fx.actions.rename("birds", "parrots").await,
            Err(SyncError::CategoryNotFound(_))
        ));
        assert!(matches!(
            fx.actions.rename("cats", "dogs").await,
            Err(SyncError::ConfigWriteConflict(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_rolls_back_when_directory_taken() {
        let fx = fixture(r#"{"cats": "猫"}"#, StaticRemote::default()).await;
        touch(&fx.media().join("cats/a.png")).await;
        touch(&fx.media().join("kittens/b.png")).await;

        let result = fx.actions.rename("cats", "kittens").await;

        assert!(matches!(result, Err(SyncError::ConfigWriteConflict(_))));
        let table = fx.config.get().await.unwrap();
        assert_eq!(table.get("cats"), Some("猫"));
        assert!(!table.contains("kittens"));
        assert!(fx.media().join("cats/a.png").exists());
    }

    #[tokio::test]
    async fn test_update_description() {
        let fx = fixture(r#"{"cats": "猫"}"#, StaticRemote::default()).await;

        fx.actions.update_description("cats", "cats!").await.unwrap();
        assert_eq!(fx.config.get().await.unwrap().get("cats"), Some("cats!"));

        assert!(matches!(
            fx.actions.update_description("dogs", "x").await,
            Err(SyncError::CategoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_adopt_missing_uses_default_description() {
        let fx = fixture(r#"{"cats": "猫"}"#, StaticRemote::default()).await;
        let report = DiffReport {
            missing_in_config: vec!["cats".to_string(), "birds".to_string()],
            ..Default::default()
        };

        let adopted = fx.actions.adopt_missing(&report).await.unwrap();

        assert_eq!(adopted, vec!["birds".to_string()]);
        let table = fx.config.get().await.unwrap();
        assert_eq!(table.get("cats"), Some("猫"));
        assert_eq!(table.get("birds"), Some("请添加描述"));
    }

    #[tokio::test]
    async fn test_delete_preview_then_confirm() {
        let mut remote = StaticRemote::default();
        remote
            .files
            .insert("cats".to_string(), vec!["r.png".to_string()]);
        let fx = fixture(r#"{"cats": "猫"}"#, remote).await;
        touch(&fx.media().join("cats/a.png")).await;

        let preview = fx.actions.preview_delete("cats").await.unwrap();
        assert_eq!(preview.description.as_deref(), Some("猫"));
        assert_eq!(preview.local_files, vec!["a.png".to_string()]);
        assert_eq!(preview.remote_files, vec!["r.png".to_string()]);

        fx.actions.confirm_delete(&preview).await.unwrap();
        assert!(!fx.config.get().await.unwrap().contains("cats"));
        assert!(!fx.media().join("cats").exists());
    }

    #[tokio::test]
    async fn test_confirm_delete_refuses_stale_preview() {
        let fx = fixture(r#"{"cats": "猫"}"#, StaticRemote::default()).await;
        touch(&fx.media().join("cats/a.png")).await;

        let preview = fx.actions.preview_delete("cats").await.unwrap();
        touch(&fx.media().join("cats/new.png")).await;

        let result = fx.actions.confirm_delete(&preview).await;
        assert!(matches!(result, Err(SyncError::StalePreview { .. })));
        assert!(fx.media().join("cats/a.png").exists());
        assert!(fx.config.get().await.unwrap().contains("cats"));
    }

    #[tokio::test]
    async fn test_preview_unknown_category() {
        let fx = fixture("{}", StaticRemote::default()).await;
        assert!(matches!(
            fx.actions.preview_delete("ghosts").await,
            Err(SyncError::CategoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_preview_covers_nested_categories() {
        let fx = fixture(r#"{"animals": "动物", "animals/cats": "猫"}"#, StaticRemote::default()).await;
        touch(&fx.media().join("animals/a.png")).await;
        touch(&fx.media().join("animals/cats/c.png")).await;

        let preview = fx.actions.preview_delete("animals").await.unwrap();
        assert_eq!(preview.local_files, vec!["a.png".to_string()]);
        assert_eq!(preview.nested_slugs(), vec!["animals/cats"]);
        assert_eq!(preview.nested[0].local_files, vec!["c.png".to_string()]);
        assert_eq!(preview.nested[0].description.as_deref(), Some("猫"));
        assert_eq!(preview.local_file_count(), 2);

        fx.actions.confirm_delete(&preview).await.unwrap();
        assert!(fx.config.get().await.unwrap().is_empty());
        assert!(!fx.media().join("animals").exists());
    }

    #[tokio::test]
    async fn test_confirm_delete_refuses_when_nested_category_changed() {
        let fx = fixture(r#"{"animals": "动物"}"#, StaticRemote::default()).await;
        touch(&fx.media().join("animals/a.png")).await;

        let preview = fx.actions.preview_delete("animals").await.unwrap();
        assert!(preview.nested.is_empty());
        touch(&fx.media().join("animals/cats/c.png")).await;

        assert!(matches!(
            fx.actions.confirm_delete(&preview).await,
            Err(SyncError::StalePreview { .. })
        ));
        assert!(fx.media().join("animals/cats/c.png").exists());
    }

    #[tokio::test]
    async fn test_sibling_prefix_is_not_nested() {
        let fx = fixture(r#"{"cat": "a", "cats": "b"}"#, StaticRemote::default()).await;

        let preview = fx.actions.preview_delete("cat").await.unwrap();
        assert!(preview.nested.is_empty());

        fx.actions.confirm_delete(&preview).await.unwrap();
        assert_eq!(fx.config.get().await.unwrap().get("cats"), Some("b"));
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = DeletePreview::new("cats", Some("猫".into()), vec!["a.png".into()], vec![], vec![]);
        let b = DeletePreview::new("cats", Some("猫".into()), vec!["a.png".into()], vec![], vec![]);
        let moved = DeletePreview::new("cats", Some("猫".into()), vec![], vec!["a.png".into()], vec![]);
        let joined = DeletePreview::new("cats", Some("猫".into()), vec!["ab.png".into()], vec![], vec![]);
        let split = DeletePreview::new(
            "cats",
            Some("猫".into()),
            vec!["a".into(), "b.png".into()],
            vec![],
            vec![],
        );

        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
        assert_ne!(a.fingerprint, moved.fingerprint);
        assert_ne!(joined.fingerprint, split.fingerprint);
    }

    #[tokio::test]
    async fn test_rename_refuses_nested_categories() {
        let fx = fixture(r#"{"animals": "动物", "animals/cats": "猫"}"#, StaticRemote::default()).await;
        touch(&fx.media().join("animals/cats/c.png")).await;

        match fx.actions.rename("animals", "pets").await {
            Err(SyncError::HasNestedCategories { category, nested }) => {
                assert_eq!(category, "animals");
                assert_eq!(nested, vec!["animals/cats".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let table = fx.config.get().await.unwrap();
        assert!(table.contains("animals") && table.contains("animals/cats"));
        assert!(!table.contains("pets"));
        assert!(fx.media().join("animals/cats/c.png").exists());
    }

    #[tokio::test]
    async fn test_rename_refuses_unregistered_nested_directory() {
        let fx = fixture(r#"{"animals": "动物"}"#, StaticRemote::default()).await;
        touch(&fx.media().join("animals/cats/c.png")).await;

        assert!(matches!(
            fx.actions.rename("animals", "pets").await,
            Err(SyncError::HasNestedCategories { .. })
        ));
        assert!(fx.config.get().await.unwrap().contains("animals"));
    }

    #[tokio::test]
    async fn test_add_and_rename_file() {
        let fx = fixture("{}", StaticRemote::default()).await;

        fx.actions
            .add_file("cats", "a.png", Bytes::from_static(b"img"))
            .await
            .unwrap();
        assert!(fx.media().join("cats/a.png").exists());

        fx.actions.rename_file("cats", "a.png", "b.png").await.unwrap();
        assert!(!fx.media().join("cats/a.png").exists());
        assert!(fx.media().join("cats/b.png").exists());

        assert!(matches!(
            fx.actions.add_file("cats", "notes.txt", Bytes::new()).await,
            Err(SyncError::UnsupportedFile(_))
        ));
        assert!(matches!(
            fx.actions.rename_file("cats", "missing.png", "c.png").await,
            Err(SyncError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rename_file_refuses_existing_target() {
        let fx = fixture("{}", StaticRemote::default()).await;
        touch(&fx.media().join("cats/a.png")).await;
        touch(&fx.media().join("cats/b.png")).await;

        assert!(matches!(
            fx.actions.rename_file("cats", "a.png", "b.png").await,
            Err(SyncError::FileExists { .. })
        ));
        assert!(fx.media().join("cats/a.png").exists());
    }

    #[tokio::test]
    async fn test_delete_file_by_scope() {
        let mut remote = StaticRemote::default();
        remote
            .files
            .insert("cats".to_string(), vec!["a.png".to_string()]);
        let fx = fixture("{}", remote).await;
        touch(&fx.media().join("cats/a.png")).await;
        touch(&fx.media().join("cats/b.png")).await;

        let removal = fx
            .actions
            .delete_file("cats", "a.png", FileScope::Both)
            .await
            .unwrap();
        assert_eq!(removal, FileRemoval { local: true, remote: true });
        assert!(!fx.media().join("cats/a.png").exists());

        let removal = fx
            .actions
            .delete_file("cats", "b.png", FileScope::Remote)
            .await;
        assert!(matches!(removal, Err(SyncError::FileNotFound { .. })));
        assert!(fx.media().join("cats/b.png").exists());
    }
}
