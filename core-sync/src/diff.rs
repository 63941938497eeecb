//! # Diff Engine
//!
//! Combines the local, remote and config snapshots into a [`DiffReport`].
//!
//! Files are matched by exact `(category, filename)` identity: no case
//! folding, no content comparison. A file whose bytes changed under the same
//! name counts as synced.

use bridge_traits::{CategorySnapshot, DescriptionTable, MediaKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Differences between the three records of the collection.
///
/// Entries keep the order of the scan they came from. The four lists are
/// disjoint set differences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    /// Present locally, absent remotely
    pub to_upload: Vec<MediaKey>,
    /// Present remotely, absent locally
    pub to_download: Vec<MediaKey>,
    /// Present locally or remotely, absent from config
    pub missing_in_config: Vec<String>,
    /// Present in config, absent both locally and remotely
    pub deleted_categories: Vec<String>,
}

/// Entry counts of a [`DiffReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub to_upload: usize,
    pub to_download: usize,
    pub missing_in_config: usize,
    pub deleted_categories: usize,
}

impl DiffReport {
    /// True when all three records agree.
    pub fn is_synced(&self) -> bool {
        self.to_upload.is_empty()
            && self.to_download.is_empty()
            && self.missing_in_config.is_empty()
            && self.deleted_categories.is_empty()
    }

    /// True when local and remote hold the same files.
    pub fn is_mirrored(&self) -> bool {
        self.to_upload.is_empty() && self.to_download.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            to_upload: self.to_upload.len(),
            to_download: self.to_download.len(),
            missing_in_config: self.missing_in_config.len(),
            deleted_categories: self.deleted_categories.len(),
        }
    }
}

fn missing_from(source: &CategorySnapshot, other: &CategorySnapshot) -> Vec<MediaKey> {
    source.keys().filter(|key| !other.contains_key(key)).collect()
}

/// Compute the difference report of one scan cycle.
pub fn diff(
    local: &CategorySnapshot,
    remote: &CategorySnapshot,
    config: &DescriptionTable,
) -> DiffReport {
    let mut seen = HashSet::new();
    let missing_in_config = local
        .categories()
        .chain(remote.categories())
        .filter(|slug| seen.insert(*slug) && !config.contains(slug))
        .map(str::to_string)
        .collect();

    let deleted_categories = config
        .keys()
        .filter(|slug| !local.contains_category(slug) && !remote.contains_category(slug))
        .map(str::to_string)
        .collect();

    DiffReport {
        to_upload: missing_from(local, remote),
        to_download: missing_from(remote, local),
        missing_in_config,
        deleted_categories,
    }
}
