//! Document service: the only writer of the manifest and the blob directory.
//!
//! Every operation holds one mutex across its whole read-modify-write span,
//! so two uploads can never allocate names against the same stale snapshot.
//! Blob moves happen before the manifest write; superseded blobs are removed
//! only after the manifest no longer references them.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage::allocator::{
    extension_of, normalize_extension, DEFAULT_EXTENSION, DEFAULT_LOGO_EXTENSION,
};
use crate::storage::models::{BlobSlot, DocumentRecord, Manifest};
use crate::storage::{FilenameAllocator, ManifestError, ManifestStore};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{0}")]
    Validation(String),
    #[error("Document {0} not found")]
    NotFound(i64),
    #[error("Failed to store blob '{name}': {source}")]
    BlobIo {
        name: String,
        #[source]
        source: ObjectStoreError,
    },
    #[error("Failed to write manifest: {0}")]
    ManifestIo(#[from] ManifestError),
}

impl DocumentError {
    fn validation(message: impl Into<String>) -> Self {
        DocumentError::Validation(message.into())
    }

    fn blob_io(name: &str, source: ObjectStoreError) -> Self {
        DocumentError::BlobIo {
            name: name.to_string(),
            source,
        }
    }
}

/// A superseded blob that could not be removed. Non-fatal; may leave an orphan.
#[derive(Debug, Error)]
#[error("Failed to remove stale blob '{name}': {source}")]
pub struct StaleBlobCleanupError {
    pub name: String,
    #[source]
    pub source: ObjectStoreError,
}

/// Result of a completed mutation plus any best-effort cleanup that failed.
#[derive(Debug)]
pub struct Outcome<T> {
    pub record: T,
    pub stale_blobs: Vec<StaleBlobCleanupError>,
}

/// An uploaded file waiting in the staging directory.
#[derive(Debug, Clone)]
pub struct StagedBlob {
    pub path: PathBuf,
    pub original_name: Option<String>,
    pub content_type: Option<String>,
}

impl StagedBlob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            original_name: None,
            content_type: None,
        }
    }

    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn extension(&self) -> Option<&str> {
        self.original_name.as_deref().and_then(extension_of)
    }

    fn original_stem(&self) -> Option<&str> {
        let name = self.original_name.as_deref()?;
        std::path::Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// Content type from the upload, else guessed from the names, else binary.
    fn mime_type(&self, stored_name: &str) -> String {
        self.content_type
            .clone()
            .filter(|ct| !ct.is_empty() && ct != DEFAULT_MIME_TYPE)
            .or_else(|| {
                self.original_name
                    .as_deref()
                    .and_then(|n| mime_guess::from_path(n).first())
                    .or_else(|| mime_guess::from_path(stored_name).first())
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
    }
}

/// Input for [`DocumentService::create`].
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub blob: Option<StagedBlob>,
    pub logo: Option<StagedBlob>,
    pub display_name: Option<String>,
    pub slug: Option<String>,
}

/// Input for [`DocumentService::replace`]. At least one field must be set.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub blob: Option<StagedBlob>,
    pub logo: Option<StagedBlob>,
    pub display_name: Option<String>,
    pub slug: Option<String>,
}

/// Id source for new records. Lives inside the service lock.
#[derive(Debug, Default)]
struct IdClock {
    last: i64,
}

impl IdClock {
    /// Wall-clock milliseconds, forced strictly above every id seen so far.
    fn next(&mut self, manifest: &Manifest) -> i64 {
        let floor = manifest.max_id().map_or(self.last, |max| max.max(self.last));
        let id = Utc::now().timestamp_millis().max(floor + 1);
        self.last = id;
        id
    }
}

pub struct DocumentService {
    manifest: ManifestStore,
    blobs: Arc<dyn ObjectStore>,
    /// Held across every manifest read-modify-write span, reads included.
    lock: Mutex<IdClock>,
}

impl DocumentService {
    pub fn new(manifest: ManifestStore, blobs: Arc<dyn ObjectStore>) -> Self {
        Self {
            manifest,
            blobs,
            lock: Mutex::new(IdClock::default()),
        }
    }

    pub fn blobs(&self) -> &Arc<dyn ObjectStore> {
        &self.blobs
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn list(&self) -> Vec<DocumentRecord> {
        let _guard = self.lock.lock().await;
        self.manifest.read().await.files
    }

    pub async fn get(&self, id: i64) -> Result<DocumentRecord, DocumentError> {
        let _guard = self.lock.lock().await;
        self.manifest
            .read()
            .await
            .find(id)
            .cloned()
            .ok_or(DocumentError::NotFound(id))
    }

    pub async fn manifest(&self) -> Manifest {
        let _guard = self.lock.lock().await;
        self.manifest.read().await
    }

    /// Resolve a stored blob name to the record that references it.
    pub async fn find_blob(&self, name: &str) -> Option<(DocumentRecord, BlobSlot)> {
        let _guard = self.lock.lock().await;
        self.manifest
            .read()
            .await
            .find_by_blob(name)
            .map(|(record, slot)| (record.clone(), slot))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub async fn create(&self, doc: NewDocument) -> Result<Outcome<DocumentRecord>, DocumentError> {
        let blob = doc
            .blob
            .ok_or_else(|| DocumentError::validation("a primary file is required"))?;

        let mut clock = self.lock.lock().await;
        let mut manifest = self.manifest.read().await;
        let id = clock.next(&manifest);
        let fallback = fallback_slug(id);

        let display_name = non_blank(doc.display_name);
        let source = non_blank(doc.slug)
            .or_else(|| display_name.clone())
            .or_else(|| blob.original_stem().map(str::to_string))
            .unwrap_or_default();
        let extension = normalize_extension(blob.extension(), DEFAULT_EXTENSION);

        let mut allocator = FilenameAllocator::new(&manifest.files, None);
        let primary = allocator.allocate(&source, &fallback, &extension);

        let size = self
            .blobs
            .install(&blob.path, &primary.filename)
            .await
            .map_err(|e| DocumentError::blob_io(&primary.filename, e))?;
        let mut installed = vec![primary.filename.clone()];

        let logo_filename = match doc.logo {
            Some(logo) => {
                allocator.reserve(primary.filename.clone());
                let logo_ext = normalize_extension(logo.extension(), DEFAULT_LOGO_EXTENSION);
                let allocation = allocator.allocate(
                    &format!("{}-logo", primary.slug),
                    &format!("{fallback}-logo"),
                    &logo_ext,
                );
                if let Err(e) = self.blobs.install(&logo.path, &allocation.filename).await {
                    self.rollback(&installed, &[]).await;
                    return Err(DocumentError::blob_io(&allocation.filename, e));
                }
                installed.push(allocation.filename.clone());
                Some(allocation.filename)
            }
            None => None,
        };

        let name = display_name
            .or_else(|| non_blank(blob.original_name.clone()))
            .unwrap_or_else(|| primary.filename.clone());

        let mut record = DocumentRecord {
            id,
            name,
            slug: primary.slug,
            filename: String::new(),
            size,
            mime_type: blob.mime_type(&primary.filename),
            uploaded_at: Utc::now(),
            url: String::new(),
            logo_filename: None,
            logo_url: None,
        };
        record.set_filename(primary.filename);
        record.set_logo(logo_filename);

        manifest.files.push(record.clone());
        if let Err(e) = self.manifest.write(&mut manifest).await {
            self.rollback(&installed, &[]).await;
            return Err(e.into());
        }

        debug!(id, filename = %record.filename, "Created document");
        Ok(Outcome {
            record,
            stale_blobs: Vec::new(),
        })
    }

    pub async fn replace(
        &self,
        id: i64,
        update: DocumentUpdate,
    ) -> Result<Outcome<DocumentRecord>, DocumentError> {
        let _guard = self.lock.lock().await;
        let mut manifest = self.manifest.read().await;
        let index = manifest.position(id).ok_or(DocumentError::NotFound(id))?;

        let slug_override = non_blank(update.slug);
        if update.blob.is_none()
            && update.logo.is_none()
            && update.display_name.is_none()
            && slug_override.is_none()
        {
            return Err(DocumentError::validation(
                "at least one of file, logo, name or slug must be provided",
            ));
        }
        let display_name = match update.display_name {
            Some(name) => Some(
                non_blank(Some(name))
                    .ok_or_else(|| DocumentError::validation("name must not be empty"))?,
            ),
            None => None,
        };

        let current = manifest.files[index].clone();
        let mut record = current.clone();
        let fallback = fallback_slug(id);

        let extension = match &update.blob {
            Some(blob) => normalize_extension(
                blob.extension().or(current.extension()),
                DEFAULT_EXTENSION,
            ),
            None => current
                .extension()
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
        };
        let source = slug_override
            .or_else(|| display_name.clone())
            .unwrap_or_else(|| current.effective_slug().to_string());
        let primary = FilenameAllocator::new(&manifest.files, Some((id, BlobSlot::Primary)))
            .allocate(&source, &fallback, &extension);

        let mut installed: Vec<String> = Vec::new();
        let mut renamed: Vec<(String, String)> = Vec::new();
        let mut stale: Vec<String> = Vec::new();

        if let Some(blob) = &update.blob {
            if primary.filename == current.filename {
                self.set_aside(&current.filename, &mut renamed, &mut stale)
                    .await?;
            } else {
                stale.push(current.filename.clone());
            }
            let size = match self.blobs.install(&blob.path, &primary.filename).await {
                Ok(size) => size,
                Err(e) => {
                    self.rollback(&installed, &renamed).await;
                    return Err(DocumentError::blob_io(&primary.filename, e));
                }
            };
            installed.push(primary.filename.clone());
            record.size = size;
            record.mime_type = blob.mime_type(&primary.filename);
            record.uploaded_at = Utc::now();
        } else if primary.filename != current.filename {
            self.blobs
                .rename(&current.filename, &primary.filename)
                .await
                .map_err(|e| DocumentError::blob_io(&current.filename, e))?;
            renamed.push((current.filename.clone(), primary.filename.clone()));
        }

        if let Some(logo) = &update.logo {
            let mut allocator = FilenameAllocator::new(&manifest.files, Some((id, BlobSlot::Logo)));
            allocator.reserve(primary.filename.clone());
            let logo_ext = normalize_extension(logo.extension(), DEFAULT_LOGO_EXTENSION);
            let allocation = allocator.allocate(
                &format!("{}-logo", primary.slug),
                &format!("{fallback}-logo"),
                &logo_ext,
            );
            match current.logo_filename.as_deref() {
                Some(old) if old == allocation.filename => {
                    if let Err(e) = self.set_aside(old, &mut renamed, &mut stale).await {
                        self.rollback(&installed, &renamed).await;
                        return Err(e);
                    }
                }
                Some(old) => stale.push(old.to_string()),
                None => {}
            }
            if let Err(e) = self.blobs.install(&logo.path, &allocation.filename).await {
                self.rollback(&installed, &renamed).await;
                return Err(DocumentError::blob_io(&allocation.filename, e));
            }
            installed.push(allocation.filename.clone());
            record.set_logo(Some(allocation.filename));
        }

        if let Some(name) = display_name {
            record.name = name;
        }
        record.slug = primary.slug;
        record.set_filename(primary.filename);

        manifest.files[index] = record.clone();
        if let Err(e) = self.manifest.write(&mut manifest).await {
            self.rollback(&installed, &renamed).await;
            return Err(e.into());
        }

        let stale_blobs = self.remove_stale(&stale).await;
        debug!(id, filename = %record.filename, "Replaced document");
        Ok(Outcome {
            record,
            stale_blobs,
        })
    }

    /// Metadata-only update. A changed slug still renames the blob on disk.
    pub async fn rename(
        &self,
        id: i64,
        display_name: Option<String>,
        slug: Option<String>,
    ) -> Result<Outcome<DocumentRecord>, DocumentError> {
        self.replace(
            id,
            DocumentUpdate {
                display_name,
                slug,
                ..Default::default()
            },
        )
        .await
    }

    /// Remove a record and its blobs. The manifest entry goes first; blob
    /// removal is best-effort.
    pub async fn delete(&self, id: i64) -> Result<Outcome<DocumentRecord>, DocumentError> {
        let _guard = self.lock.lock().await;
        let mut manifest = self.manifest.read().await;
        let index = manifest.position(id).ok_or(DocumentError::NotFound(id))?;

        let record = manifest.files.remove(index);
        self.manifest.write(&mut manifest).await?;

        let mut names = vec![record.filename.clone()];
        names.extend(record.logo_filename.clone());
        let stale_blobs = self.remove_stale(&names).await;

        debug!(id, filename = %record.filename, "Deleted document");
        Ok(Outcome {
            record,
            stale_blobs,
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn remove_stale(&self, names: &[String]) -> Vec<StaleBlobCleanupError> {
        let mut failures = Vec::new();
        for name in names {
            if let Err(source) = self.blobs.delete(name).await {
                let err = StaleBlobCleanupError {
                    name: name.clone(),
                    source,
                };
                warn!(error = %err, "Stale blob left on disk");
                failures.push(err);
            }
        }
        failures
    }

    /// Move a blob that is about to be overwritten in place to a side name.
    /// Rollback moves it back; success leaves it to `remove_stale`.
    async fn set_aside(
        &self,
        name: &str,
        renamed: &mut Vec<(String, String)>,
        stale: &mut Vec<String>,
    ) -> Result<(), DocumentError> {
        let side = superseded_name(name);
        self.blobs
            .rename(name, &side)
            .await
            .map_err(|e| DocumentError::blob_io(name, e))?;
        renamed.push((name.to_string(), side.clone()));
        stale.push(side);
        Ok(())
    }

    /// Undo blob changes made by an operation that is about to fail.
    /// Installed blobs go first so set-aside originals can move back.
    async fn rollback(&self, installed: &[String], renamed: &[(String, String)]) {
        for name in installed {
            if let Err(e) = self.blobs.delete(name).await {
                warn!(blob = %name, error = %e, "Failed to remove blob during rollback");
            }
        }
        for (from, to) in renamed.iter().rev() {
            if let Err(e) = self.blobs.rename(to, from).await {
                warn!(from = %to, to = %from, error = %e, "Failed to revert blob rename");
            }
        }
    }
}

/// Side name for a blob being replaced in place. Slugs never contain `.`,
/// so this can't collide with an allocated name.
fn superseded_name(name: &str) -> String {
    format!(".{name}.superseded")
}

fn fallback_slug(id: i64) -> String {
    format!("manual-{id}")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
