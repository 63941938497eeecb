//! Media Collection Data Model
//!
//! Shared value types describing the three records of the collection: the
//! category → files snapshots produced by the local and remote scanners, and
//! the category → description table held by the config store.
//!
//! Both containers keep insertion order, since the reconciliation report lists
//! its entries in scan order rather than sorted.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// File extensions (lowercase, without dot) that count as category members.
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Description table written when no config file exists yet.
pub const DEFAULT_CATEGORY_DESCRIPTIONS: &[(&str, &str)] = &[
    ("angry", "表达愤怒或不满的场景"),
    ("happy", "表达开心或愉悦的场景"),
    ("sad", "表达悲伤或遗憾的场景"),
    ("surprised", "表达震惊或意外的场景"),
    ("confused", "表达困惑或不解的场景"),
    ("color", "表达调皮或暧昧的场景"),
    ("cpu", "表达思维停滞的场景"),
    ("fool", "表达自嘲或调侃的场景"),
    ("givemoney", "表达想要报酬的场景"),
    ("like", "表达喜爱之情的场景"),
    ("see", "表达关注或观察的场景"),
    ("shy", "表达害羞的场景"),
    ("work", "表达工作相关的场景"),
    ("scissors", "表达剪切或分割的场景"),
    ("reply", "表达等待回复的场景"),
    ("meow", "表达卖萌的场景"),
    ("baka", "表达责备的场景"),
    ("morning", "表达早安问候的场景"),
    ("sleep", "表达疲惫或休息的场景"),
    ("sigh", "表达叹息的场景"),
];

/// Check whether a filename carries a supported image extension (case-insensitive).
pub fn is_supported_image(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

// =============================================================================
// MediaKey
// =============================================================================

/// Identity of a media file: `(category slug, filename)`.
///
/// Comparison is exact and case-sensitive on both halves. No content hash is
/// tracked, so a file replaced in place under the same name keeps its identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaKey {
    pub category: String,
    pub filename: String,
}

impl MediaKey {
    pub fn new(category: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            filename: filename.into(),
        }
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.filename)
    }
}

impl<C: Into<String>, F: Into<String>> From<(C, F)> for MediaKey {
    fn from((category, filename): (C, F)) -> Self {
        Self::new(category, filename)
    }
}

// =============================================================================
// CategorySnapshot
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CategoryFiles {
    slug: String,
    files: Vec<String>,
    members: HashSet<String>,
}

/// Category → filenames mapping produced by one scan of a store.
///
/// Categories and files are kept in insertion order. A category may exist with
/// no files (an empty directory still counts as a category). Inserting the
/// same file twice keeps the first occurrence only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySnapshot {
    categories: Vec<CategoryFiles>,
    index: HashMap<String, usize>,
}

impl CategorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category, returning `true` if it was not present yet.
    pub fn insert_category(&mut self, slug: impl Into<String>) -> bool {
        let slug = slug.into();
        if self.index.contains_key(&slug) {
            return false;
        }
        self.index.insert(slug.clone(), self.categories.len());
        self.categories.push(CategoryFiles {
            slug,
            ..Default::default()
        });
        true
    }

    /// Add a file to a category, registering the category if needed.
    ///
    /// Returns `true` if the file was not already a member.
    pub fn insert_file(&mut self, slug: impl Into<String>, filename: impl Into<String>) -> bool {
        let slug = slug.into();
        let filename = filename.into();
        self.insert_category(slug.clone());
        let Some(&position) = self.index.get(&slug) else {
            return false;
        };
        let entry = &mut self.categories[position];
        if !entry.members.insert(filename.clone()) {
            return false;
        }
        entry.files.push(filename);
        true
    }

    pub fn contains_category(&self, slug: &str) -> bool {
        self.index.contains_key(slug)
    }

    pub fn contains_file(&self, slug: &str, filename: &str) -> bool {
        self.index
            .get(slug)
            .map(|&position| self.categories[position].members.contains(filename))
            .unwrap_or(false)
    }

    pub fn contains_key(&self, key: &MediaKey) -> bool {
        self.contains_file(&key.category, &key.filename)
    }

    /// Files of one category in insertion order.
    pub fn files(&self, slug: &str) -> Option<&[String]> {
        self.index
            .get(slug)
            .map(|&position| self.categories[position].files.as_slice())
    }

    /// Category slugs in insertion order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|entry| entry.slug.as_str())
    }

    /// `(slug, files)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories
            .iter()
            .map(|entry| (entry.slug.as_str(), entry.files.as_slice()))
    }

    /// Every file as a [`MediaKey`], category by category.
    pub fn keys(&self) -> impl Iterator<Item = MediaKey> + '_ {
        self.categories.iter().flat_map(|entry| {
            entry
                .files
                .iter()
                .map(move |file| MediaKey::new(entry.slug.clone(), file.clone()))
        })
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.categories.iter().map(|entry| entry.files.len()).sum()
    }
}

impl<S, I, F> FromIterator<(S, I)> for CategorySnapshot
where
    S: Into<String>,
    I: IntoIterator<Item = F>,
    F: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (S, I)>>(iter: T) -> Self {
        let mut snapshot = CategorySnapshot::new();
        for (slug, files) in iter {
            let slug = slug.into();
            snapshot.insert_category(slug.clone());
            for file in files {
                snapshot.insert_file(slug.clone(), file);
            }
        }
        snapshot
    }
}

// =============================================================================
// DescriptionTable
// =============================================================================

/// Ordered category → description table, the persisted config record.
///
/// Serializes as a plain JSON object. Key order survives a round trip through
/// the file, which is why this is not a `HashMap`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptionTable {
    entries: Vec<(String, String)>,
}

impl DescriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table used to seed a fresh config file.
    pub fn with_defaults() -> Self {
        DEFAULT_CATEGORY_DESCRIPTIONS
            .iter()
            .map(|(slug, description)| (*slug, *description))
            .collect()
    }

    fn position(&self, slug: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == slug)
    }

    pub fn get(&self, slug: &str) -> Option<&str> {
        self.position(slug)
            .map(|position| self.entries[position].1.as_str())
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.position(slug).is_some()
    }

    /// Insert or overwrite a description.
    ///
    /// An existing slug keeps its position; a new slug is appended. Returns the
    /// previous description, if any.
    pub fn set(&mut self, slug: impl Into<String>, description: impl Into<String>) -> Option<String> {
        let slug = slug.into();
        let description = description.into();
        match self.position(&slug) {
            Some(position) => Some(std::mem::replace(&mut self.entries[position].1, description)),
            None => {
                self.entries.push((slug, description));
                None
            }
        }
    }

    pub fn remove(&mut self, slug: &str) -> Option<String> {
        self.position(slug)
            .map(|position| self.entries.remove(position).1)
    }

    /// Move `old`'s description to `new`, keeping `old`'s position.
    ///
    /// Returns `false` and leaves the table untouched if `old` is absent or
    /// `new` already exists.
    pub fn rename(&mut self, old: &str, new: impl Into<String>) -> bool {
        let new = new.into();
        if self.contains(&new) {
            return false;
        }
        match self.position(old) {
            Some(position) => {
                self.entries[position].0 = new;
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(slug, _)| slug.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(slug, description)| (slug.as_str(), description.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>, D: Into<String>> FromIterator<(S, D)> for DescriptionTable {
    fn from_iter<T: IntoIterator<Item = (S, D)>>(iter: T) -> Self {
        let mut table = DescriptionTable::new();
        for (slug, description) in iter {
            table.set(slug, description);
        }
        table
    }
}

impl Serialize for DescriptionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (slug, description) in &self.entries {
            map.serialize_entry(slug, description)?;
        }
        map.end()
    }
}

struct DescriptionTableVisitor;

impl<'de> Visitor<'de> for DescriptionTableVisitor {
    type Value = DescriptionTable;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of category slug to description")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut table = DescriptionTable::new();
        while let Some((slug, description)) = access.next_entry::<String, String>()? {
            table.set(slug, description);
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for DescriptionTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DescriptionTableVisitor)
    }
}
