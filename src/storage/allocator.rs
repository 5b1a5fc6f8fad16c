use std::collections::HashSet;

use super::manifest::MANIFEST_FILE_NAME;
use super::models::{BlobSlot, DocumentRecord};
use super::slug::slugify;

/// Extension used for primary blobs that arrive without a usable one.
pub const DEFAULT_EXTENSION: &str = ".pdf";

/// Extension used for logo blobs that arrive without a usable one.
pub const DEFAULT_LOGO_EXTENSION: &str = ".png";

/// A collision-free stored name and the slug it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub filename: String,
    pub slug: String,
}

/// Picks stored names that are unique against a snapshot of the manifest.
///
/// Every primary and logo filename of every record counts as taken, except
/// the single slot named by `exclude`, which lets a record keep its own name
/// across an update.
pub struct FilenameAllocator {
    taken: HashSet<String>,
}

impl FilenameAllocator {
    pub fn new(records: &[DocumentRecord], exclude: Option<(i64, BlobSlot)>) -> Self {
        let mut taken = HashSet::new();
        taken.insert(MANIFEST_FILE_NAME.to_string());

        for record in records {
            for slot in [BlobSlot::Primary, BlobSlot::Logo] {
                if exclude == Some((record.id, slot)) {
                    continue;
                }
                if let Some(name) = record.blob_name(slot) {
                    taken.insert(name.to_string());
                }
            }
        }

        Self { taken }
    }

    /// Mark a name as taken, e.g. one allocated earlier in the same operation.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.taken.insert(name.into());
    }

    /// Allocate a name for `source` with the given extension.
    ///
    /// `fallback` is used as the base when `source` slugifies to nothing.
    /// On collision the base gets `-1`, `-2`, ... until a free name is found.
    pub fn allocate(&self, source: &str, fallback: &str, extension: &str) -> Allocation {
        let mut base = slugify(source);
        if base.is_empty() {
            base = slugify(fallback);
        }

        let mut slug = base.clone();
        let mut suffix: u64 = 0;
        loop {
            let filename = format!("{slug}{extension}");
            if !self.taken.contains(&filename) {
                return Allocation { filename, slug };
            }
            suffix += 1;
            slug = format!("{base}-{suffix}");
        }
    }
}

/// Normalize an extension to `.ext` form, lower-cased.
///
/// Missing, empty or non-alphanumeric extensions become `default`.
pub fn normalize_extension(extension: Option<&str>, default: &str) -> String {
    let Some(raw) = extension else {
        return default.to_string();
    };
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return default.to_string();
    }
    format!(".{}", trimmed.to_ascii_lowercase())
}

/// Extension of an uploaded file's original name, if it has one.
pub fn extension_of(name: &str) -> Option<&str> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
}
