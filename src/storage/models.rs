use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format tag written into every manifest.
pub const MANIFEST_VERSION: &str = "1.0";

/// Public URL prefix under which stored blobs are served.
pub const FILES_URL_PREFIX: &str = "/files";

/// Which of a record's two blobs a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobSlot {
    Primary,
    Logo,
}

/// One logical document in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: i64,
    pub name: String,
    /// Missing from manifests written before slugs existed.
    #[serde(default)]
    pub slug: String,
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(rename = "uploaded")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_filename: Option<String>,
    #[serde(default, rename = "logo", skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl DocumentRecord {
    /// The slug, or the filename stem for legacy records that never had one.
    pub fn effective_slug(&self) -> &str {
        if self.slug.is_empty() {
            file_stem(&self.filename)
        } else {
            &self.slug
        }
    }

    /// Extension of the primary blob including the leading dot, if any.
    pub fn extension(&self) -> Option<&str> {
        file_extension(&self.filename)
    }

    /// The stored name occupying `slot`, if set.
    pub fn blob_name(&self, slot: BlobSlot) -> Option<&str> {
        match slot {
            BlobSlot::Primary => Some(self.filename.as_str()),
            BlobSlot::Logo => self.logo_filename.as_deref(),
        }
    }

    pub fn set_filename(&mut self, filename: String) {
        self.url = blob_url(&filename);
        self.filename = filename;
    }

    pub fn set_logo(&mut self, logo_filename: Option<String>) {
        self.logo_url = logo_filename.as_deref().map(blob_url);
        self.logo_filename = logo_filename;
    }
}

/// The persisted JSON document listing every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    #[serde(default, rename = "generated", skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<DocumentRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            generated_at: None,
            files: Vec::new(),
        }
    }
}

impl Manifest {
    pub fn find(&self, id: i64) -> Option<&DocumentRecord> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.files.iter().position(|f| f.id == id)
    }

    /// Find the record owning a stored blob name, as primary or logo.
    pub fn find_by_blob(&self, name: &str) -> Option<(&DocumentRecord, BlobSlot)> {
        self.files.iter().find_map(|f| {
            if f.filename == name {
                Some((f, BlobSlot::Primary))
            } else if f.logo_filename.as_deref() == Some(name) {
                Some((f, BlobSlot::Logo))
            } else {
                None
            }
        })
    }

    pub fn max_id(&self) -> Option<i64> {
        self.files.iter().map(|f| f.id).max()
    }
}

pub fn blob_url(name: &str) -> String {
    format!("{FILES_URL_PREFIX}/{name}")
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

fn file_extension(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => Some(&name[idx..]),
        _ => None,
    }
}
