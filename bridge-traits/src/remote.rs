//! Remote Mirror Abstraction
//!
//! Object-storage mirror of the local collection, addressed by [`MediaKey`].

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::media::{CategorySnapshot, MediaKey};

/// Remote media store trait
///
/// Implementations map a [`MediaKey`] onto whatever naming scheme the
/// storage provider uses and hide paging and request signing.
///
/// # Errors
///
/// Transport failures should surface as
/// [`BridgeError::OperationFailed`](crate::error::BridgeError::OperationFailed);
/// responses that violate the provider contract as
/// [`BridgeError::InvalidResponse`](crate::error::BridgeError::InvalidResponse).
#[async_trait]
pub trait RemoteMediaStore: Send + Sync {
    /// Enumerate every category and file in the mirror.
    async fn scan_remote(&self) -> Result<CategorySnapshot>;

    /// List the files of a single remote category.
    async fn list_category_files(&self, category: &str) -> Result<Vec<String>>;

    /// Upload one file under its key.
    async fn upload(&self, key: &MediaKey, data: Bytes) -> Result<()>;

    /// Download one file.
    async fn download(&self, key: &MediaKey) -> Result<Bytes>;

    /// Delete one file.
    async fn delete(&self, key: &MediaKey) -> Result<()>;
}
