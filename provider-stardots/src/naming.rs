//! Remote object naming
//!
//! The StarDots space is a flat namespace, so the category travels inside the
//! object name: `{category}@@CAT@@{filename}`, with `/` in nested category
//! slugs written as `@@DIR@@`. Objects without a separator belong to the
//! `default` category, and files of that category are stored under their bare
//! filename.

use bridge_traits::media::MediaKey;
use std::path::Path;

pub const CATEGORY_SEPARATOR: &str = "@@CAT@@";
pub const DIRECTORY_SEPARATOR: &str = "@@DIR@@";
pub const DEFAULT_CATEGORY: &str = "default";

/// Object name for a media key.
pub fn encode_remote_name(key: &MediaKey) -> String {
    if key.category.is_empty() || key.category == "." || key.category == DEFAULT_CATEGORY {
        return key.filename.clone();
    }
    let category = key
        .category
        .replace('/', DIRECTORY_SEPARATOR)
        .replace('\\', DIRECTORY_SEPARATOR);
    format!("{}{}{}", category, CATEGORY_SEPARATOR, key.filename)
}

/// Media key for an object name.
pub fn decode_remote_name(name: &str) -> MediaKey {
    match name.split_once(CATEGORY_SEPARATOR) {
        Some((encoded, filename)) if encoded.is_empty() => {
            MediaKey::new(DEFAULT_CATEGORY, filename)
        }
        Some((encoded, filename)) => {
            MediaKey::new(encoded.replace(DIRECTORY_SEPARATOR, "/"), filename)
        }
        None => MediaKey::new(DEFAULT_CATEGORY, name),
    }
}

/// MIME type sent with an upload, from the file extension.
pub fn mime_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
