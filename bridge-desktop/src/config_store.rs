//! Category Config Storage using a JSON file
//!
//! The description table lives in a single JSON object file
//! (`{"slug": "description", ...}`), which hosts and users may also edit by
//! hand. Every operation reloads the file, so manual edits are picked up on
//! the next call. The default table is only written when the file is missing
//! at open; a file removed later is reported as missing.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::DescriptionTable,
    storage::ConfigStore,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default config file name, placed next to the media root.
pub const DEFAULT_CONFIG_FILE: &str = "memes_data.json";

/// JSON-file-backed config store implementation
///
/// Provides the category description table with:
/// - Ordered keys preserved across rewrites
/// - Atomic replacement (write to a sibling temp file, then rename)
/// - Mutations serialized through an async mutex
pub struct JsonConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonConfigStore {
    /// Open the store at `path`, seeding it with the default table if the file is missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };
        match store.load().await {
            Ok(_) => {}
            Err(BridgeError::NotFound(_)) => {
                let table = DescriptionTable::with_defaults();
                store.persist(&table).await?;
                info!(path = ?store.path, entries = table.len(), "Created config file with defaults");
            }
            Err(e) => return Err(e),
        }
        debug!(path = ?store.path, "Initialized config store");
        Ok(store)
    }

    /// Open the store at the platform data directory.
    pub async fn open_default() -> Result<Self> {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("meme-sync");
        Self::open(dir.join(DEFAULT_CONFIG_FILE)).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the table from disk.
    async fn load(&self) -> Result<DescriptionTable> {
        match fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                BridgeError::InvalidResponse(format!(
                    "Config file {} is not a valid description table: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BridgeError::NotFound(
                format!("Config file {}", self.path.display()),
            )),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    /// Replace the file with `table` atomically.
    async fn persist(&self, table: &DescriptionTable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(BridgeError::Io)?;
            }
        }

        let json = serde_json::to_vec_pretty(table).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to serialize config: {}", e))
        })?;

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        if let Err(e) = fs::write(&temp_path, &json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(BridgeError::Io(e));
        }
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(BridgeError::Io(e));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn get(&self) -> Result<DescriptionTable> {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }

    async fn set(&self, category: &str, description: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.load().await?;
        table.set(category, description);
        self.persist(&table).await?;
        debug!(category, "Stored category description");
        Ok(())
    }

    async fn delete(&self, category: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.load().await?;
        if table.remove(category).is_none() {
            return Ok(());
        }
        self.persist(&table).await?;
        debug!(category, "Removed category from config");
        Ok(())
    }

    async fn rename(&self, old: &str, new: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.load().await?;
        if !table.contains(old) {
            return Err(BridgeError::Conflict(format!(
                "Category '{}' is not in config",
                old
            )));
        }
        if !table.rename(old, new) {
            return Err(BridgeError::Conflict(format!(
                "Category '{}' already exists in config",
                new
            )));
        }
        self.persist(&table).await?;
        debug!(old, new, "Renamed category in config");
        Ok(())
    }
}
