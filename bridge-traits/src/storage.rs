//! Local Media and Config Storage Abstractions
//!
//! Contracts for the two host-side records of the collection: the local
//! category tree and the persisted category → description table.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::media::{CategorySnapshot, DescriptionTable, MediaKey};

/// Local media store trait
///
/// Enumerates and mutates the local category tree. A scan that cannot read
/// the store must fail; it must never report an empty snapshot in place of an
/// unknown one.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::LocalMediaStore;
///
/// async fn count_files(store: &dyn LocalMediaStore) -> Result<usize> {
///     let snapshot = store.scan_local().await?;
///     Ok(snapshot.file_count())
/// }
/// ```
#[async_trait]
pub trait LocalMediaStore: Send + Sync {
    /// Enumerate every category and its supported media files.
    async fn scan_local(&self) -> Result<CategorySnapshot>;

    /// List the files of a single category.
    ///
    /// Returns an empty list if the category does not exist locally.
    async fn list_category_files(&self, category: &str) -> Result<Vec<String>>;

    /// Create an empty category. An existing category is left untouched.
    async fn create_category(&self, category: &str) -> Result<()>;

    /// Relocate a category's files from `old` to `new`.
    ///
    /// A missing `old` is a no-op. An existing `new` is a conflict.
    async fn rename_category(&self, old: &str, new: &str) -> Result<()>;

    /// Remove a category with all of its files and nested categories.
    /// A missing category is a no-op.
    async fn delete_category(&self, category: &str) -> Result<()>;

    /// Read a media file's bytes.
    async fn read_file(&self, key: &MediaKey) -> Result<Bytes>;

    /// Write a media file, replacing any existing file atomically.
    async fn write_file(&self, key: &MediaKey, data: Bytes) -> Result<()>;

    /// Remove a single media file.
    ///
    /// A missing file is [`BridgeError::NotFound`](crate::error::BridgeError::NotFound).
    async fn delete_file(&self, key: &MediaKey) -> Result<()>;

    /// Rename a media file within its category.
    ///
    /// A missing source is `NotFound`; an existing target is `Conflict`.
    async fn rename_file(&self, key: &MediaKey, new_filename: &str) -> Result<()>;
}

/// Config store trait
///
/// Keyed store for category descriptions, the authoritative record of which
/// categories are known to the system.
///
/// # Atomicity
///
/// `rename` must be all-or-nothing from the caller's point of view: after a
/// failure, `get` shows either the old or the new slug, never both and never
/// neither.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the whole table in stored order.
    async fn get(&self) -> Result<DescriptionTable>;

    /// Insert or overwrite a category description.
    async fn set(&self, category: &str, description: &str) -> Result<()>;

    /// Remove a category. Removing an absent category is a no-op.
    async fn delete(&self, category: &str) -> Result<()>;

    /// Move `old`'s description to `new`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Conflict`](crate::error::BridgeError::Conflict)
    /// if `old` does not exist or `new` already exists.
    async fn rename(&self, old: &str, new: &str) -> Result<()>;
}
