//! Local Media Store using Tokio
//!
//! Maps categories onto directories under a media root. Nested directories
//! form `/`-joined slugs (`animals/cats`). Files directly under the root
//! belong to no category and are ignored.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{is_supported_image, CategorySnapshot, MediaKey},
    storage::LocalMediaStore,
};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Suffix of the sibling file a write goes through before it is renamed into place.
const TEMP_SUFFIX: &str = ".tmp";

/// Tokio-based local media store
///
/// Provides the local record of the collection using:
/// - `tokio::fs` for async directory walks and file I/O
/// - write-to-temp-then-rename for file replacement
/// - the platform data directory as the default media root
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    /// Create a media store rooted at the platform data directory
    pub fn new() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("meme-sync")
            .join("memes");

        Self { root }
    }

    /// Create a media store rooted at a custom directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    /// Resolve a category slug to its directory, rejecting path escapes.
    fn category_path(&self, category: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        let mut segments = 0;
        for segment in category.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(BridgeError::OperationFailed(format!(
                    "Invalid category slug: {:?}",
                    category
                )));
            }
            path.push(segment);
            segments += 1;
        }
        if segments == 0 {
            return Err(BridgeError::OperationFailed(
                "Category slug is empty".to_string(),
            ));
        }
        Ok(path)
    }

    fn file_path(&self, key: &MediaKey) -> Result<PathBuf> {
        let filename = key.filename.as_str();
        if filename.is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains('/')
            || filename.contains('\\')
        {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid filename: {:?}",
                filename
            )));
        }
        Ok(self.category_path(&key.category)?.join(filename))
    }

    /// Sorted directory entries split into (subdirectories, media filenames).
    async fn read_entries(dir: &Path) -> Result<(Vec<String>, Vec<String>)> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        let mut entries = fs::read_dir(dir).await.map_err(Self::map_io_error)?;

        while let Some(entry) = entries.next_entry().await.map_err(Self::map_io_error)? {
            let Ok(name) = entry.file_name().into_string() else {
                debug!(path = ?entry.path(), "Skipping non UTF-8 entry");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().await.map_err(Self::map_io_error)?;
            if file_type.is_dir() {
                dirs.push(name);
            } else if file_type.is_file() && is_supported_image(&name) {
                files.push(name);
            }
        }

        dirs.sort();
        files.sort();
        Ok((dirs, files))
    }
}

impl Default for FsMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalMediaStore for FsMediaStore {
    async fn scan_local(&self) -> Result<CategorySnapshot> {
        if !fs::try_exists(&self.root).await.map_err(Self::map_io_error)? {
            fs::create_dir_all(&self.root)
                .await
                .map_err(Self::map_io_error)?;
            debug!(path = ?self.root, "Created media root");
        }

        let mut snapshot = CategorySnapshot::new();
        let (top_level, _root_files) = Self::read_entries(&self.root).await?;

        // Depth-first, children visited in name order.
        let mut pending: Vec<String> = top_level.into_iter().rev().collect();
        while let Some(slug) = pending.pop() {
            let dir = self.category_path(&slug)?;
            let (children, files) = Self::read_entries(&dir).await?;

            snapshot.insert_category(slug.clone());
            for file in files {
                snapshot.insert_file(slug.clone(), file);
            }
            pending.extend(
                children
                    .into_iter()
                    .rev()
                    .map(|child| format!("{}/{}", slug, child)),
            );
        }

        debug!(
            categories = snapshot.len(),
            files = snapshot.file_count(),
            "Scanned local media"
        );
        Ok(snapshot)
    }

    async fn list_category_files(&self, category: &str) -> Result<Vec<String>> {
        let dir = self.category_path(category)?;
        match Self::read_entries(&dir).await {
            Ok((_, files)) => Ok(files),
            Err(BridgeError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn create_category(&self, category: &str) -> Result<()> {
        let dir = self.category_path(category)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?dir, "Ensured category directory");
        Ok(())
    }

    async fn rename_category(&self, old: &str, new: &str) -> Result<()> {
        let from = self.category_path(old)?;
        let to = self.category_path(new)?;

        if !fs::try_exists(&from).await.map_err(Self::map_io_error)? {
            debug!(category = old, "Nothing to relocate");
            return Ok(());
        }
        if fs::try_exists(&to).await.map_err(Self::map_io_error)? {
            return Err(BridgeError::Conflict(format!(
                "Category directory '{}' already exists",
                new
            )));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(Self::map_io_error)?;
        }

        fs::rename(&from, &to).await.map_err(Self::map_io_error)?;
        debug!(from = ?from, to = ?to, "Relocated category directory");
        Ok(())
    }

    async fn delete_category(&self, category: &str) -> Result<()> {
        let dir = self.category_path(category)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(path = ?dir, "Deleted category directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io_error(e)),
        }
    }

    async fn read_file(&self, key: &MediaKey) -> Result<Bytes> {
        let path = self.file_path(key)?;
        let data = fs::read(&path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, key: &MediaKey, data: Bytes) -> Result<()> {
        let path = self.file_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(Self::map_io_error)?;
        }

        let temp_path = path.with_file_name(format!("{}{}", key.filename, TEMP_SUFFIX));
        if let Err(e) = fs::write(&temp_path, data.as_ref()).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Self::map_io_error(e));
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Self::map_io_error(e));
        }

        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn delete_file(&self, key: &MediaKey) -> Result<()> {
        let path = self.file_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = ?path, "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BridgeError::NotFound(format!("File {} does not exist", key)))
            }
            Err(e) => Err(Self::map_io_error(e)),
        }
    }

    async fn rename_file(&self, key: &MediaKey, new_filename: &str) -> Result<()> {
        let from = self.file_path(key)?;
        let to = self.file_path(&MediaKey::new(key.category.clone(), new_filename))?;

        if !fs::try_exists(&from).await.map_err(Self::map_io_error)? {
            return Err(BridgeError::NotFound(format!("File {} does not exist", key)));
        }
        if fs::try_exists(&to).await.map_err(Self::map_io_error)? {
            return Err(BridgeError::Conflict(format!(
                "File '{}' already exists in '{}'",
                new_filename, key.category
            )));
        }

        fs::rename(&from, &to).await.map_err(Self::map_io_error)?;
        debug!(from = ?from, to = ?to, "Renamed file");
        Ok(())
    }
}
