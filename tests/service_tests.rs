use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use manual_manager::object_store::{BlobReader, LocalStore, ObjectStore, ObjectStoreError};
use manual_manager::service::{
    DocumentError, DocumentService, DocumentUpdate, NewDocument, StagedBlob,
};
use manual_manager::storage::models::BlobSlot;
use manual_manager::storage::ManifestStore;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    staging: PathBuf,
    service: Arc<DocumentService>,
}

impl Fixture {
    async fn new() -> Self {
        Self::build(|root| Arc::new(LocalStore::new(root).unwrap()) as Arc<dyn ObjectStore>).await
    }

    async fn with_failing_deletes() -> Self {
        Self::build(|root| {
            Arc::new(FailingDeletes {
                inner: LocalStore::new(root).unwrap(),
            }) as Arc<dyn ObjectStore>
        })
        .await
    }

    async fn build(blobs: impl FnOnce(&Path) -> Arc<dyn ObjectStore>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("files");
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(&staging).unwrap();

        let manifest = ManifestStore::open(&root).await.unwrap();
        let service = DocumentService::new(manifest, blobs(&root));
        Self {
            _dir: dir,
            root,
            staging,
            service: Arc::new(service),
        }
    }

    fn stage(&self, original_name: &str, contents: &[u8]) -> StagedBlob {
        let path = self
            .staging
            .join(format!("{}.part", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        StagedBlob::new(path).with_original_name(original_name)
    }

    fn on_disk(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    async fn create(&self, original_name: &str, display_name: &str) -> i64 {
        self.service
            .create(NewDocument {
                blob: Some(self.stage(original_name, b"%PDF-1.4 manual")),
                display_name: Some(display_name.to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
            .record
            .id
    }

    /// Every manifest filename is unique and present on disk.
    async fn assert_consistent(&self) {
        let files = self.service.list().await;
        let mut seen = HashSet::new();
        for record in &files {
            assert!(
                seen.insert(record.filename.clone()),
                "duplicate filename {}",
                record.filename
            );
            assert!(self.on_disk(&record.filename), "{} missing", record.filename);
            if let Some(logo) = &record.logo_filename {
                assert!(seen.insert(logo.clone()), "duplicate logo {logo}");
                assert!(self.on_disk(logo), "{logo} missing");
            }
        }
    }
}

/// Blob store whose deletes always fail.
struct FailingDeletes {
    inner: LocalStore,
}

#[async_trait]
impl ObjectStore for FailingDeletes {
    async fn install(&self, source: &Path, name: &str) -> Result<u64, ObjectStoreError> {
        self.inner.install(source, name).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), ObjectStoreError> {
        self.inner.rename(from, to).await
    }

    async fn delete(&self, _name: &str) -> Result<(), ObjectStoreError> {
        Err(ObjectStoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only volume",
        )))
    }

    async fn open(&self, name: &str) -> Result<BlobReader, ObjectStoreError> {
        self.inner.open(name).await
    }
}

// ============================================================================
// create
// ============================================================================

#[tokio::test]
async fn test_create_and_delete_scenario() {
    let fx = Fixture::new().await;

    let first = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("guide.pdf", b"first")),
            display_name: Some("User Guide".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .record;
    assert_eq!(first.name, "User Guide");
    assert_eq!(first.slug, "user-guide");
    assert_eq!(first.filename, "user-guide.pdf");
    assert_eq!(first.url, "/files/user-guide.pdf");
    assert_eq!(first.size, 5);
    assert_eq!(first.mime_type, "application/pdf");

    let second = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("guide.pdf", b"second")),
            display_name: Some("User Guide".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .record;
    assert_eq!(second.slug, "user-guide-1");
    assert_eq!(second.filename, "user-guide-1.pdf");

    let outcome = fx.service.delete(first.id).await.unwrap();
    assert!(outcome.stale_blobs.is_empty());

    let files = fx.service.list().await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, second.id);
    assert!(!fx.on_disk("user-guide.pdf"));
    assert!(fx.on_disk("user-guide-1.pdf"));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_create_collision_suffixes() {
    let fx = Fixture::new().await;
    fx.create("a.pdf", "Install Guide").await;
    fx.create("b.pdf", "Install Guide").await;
    fx.create("c.pdf", "Install Guide").await;

    let slugs: Vec<String> = fx.service.list().await.into_iter().map(|f| f.slug).collect();
    assert_eq!(slugs, vec!["install-guide", "install-guide-1", "install-guide-2"]);
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_create_requires_primary_blob() {
    let fx = Fixture::new().await;
    let result = fx
        .service
        .create(NewDocument {
            display_name: Some("No File".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DocumentError::Validation(_))));
    assert!(fx.service.list().await.is_empty());
}

#[tokio::test]
async fn test_create_slug_override_wins() {
    let fx = Fixture::new().await;
    let record = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("scan.PDF", b"data")),
            display_name: Some("Widget Manual".to_string()),
            slug: Some("Widget v2".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .record;
    assert_eq!(record.name, "Widget Manual");
    assert_eq!(record.slug, "widget-v2");
    assert_eq!(record.filename, "widget-v2.pdf");
}

#[tokio::test]
async fn test_create_falls_back_to_original_name() {
    let fx = Fixture::new().await;
    let record = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("Quick Start.docx", b"data")),
            display_name: Some("   ".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .record;
    assert_eq!(record.name, "Quick Start.docx");
    assert_eq!(record.slug, "quick-start");
    assert_eq!(record.filename, "quick-start.docx");
}

#[tokio::test]
async fn test_create_unusable_slug_uses_generated_default() {
    let fx = Fixture::new().await;
    let record = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("!!!.pdf", b"data")),
            display_name: Some("!!!".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .record;
    assert_eq!(record.name, "!!!");
    assert_eq!(record.slug, format!("manual-{}", record.id));
    assert_eq!(record.filename, format!("manual-{}.pdf", record.id));
    assert!(fx.on_disk(&record.filename));
}

#[tokio::test]
async fn test_create_without_extension_defaults_to_pdf() {
    let fx = Fixture::new().await;
    let record = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("README", b"data").with_content_type("text/plain")),
            ..Default::default()
        })
        .await
        .unwrap()
        .record;
    assert_eq!(record.filename, "readme.pdf");
    assert_eq!(record.mime_type, "text/plain");
}

#[tokio::test]
async fn test_create_with_logo() {
    let fx = Fixture::new().await;
    let record = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("guide.pdf", b"data")),
            logo: Some(fx.stage("brand.png", b"png")),
            display_name: Some("User Guide".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .record;
    assert_eq!(record.logo_filename.as_deref(), Some("user-guide-logo.png"));
    assert_eq!(record.logo_url.as_deref(), Some("/files/user-guide-logo.png"));
    assert!(fx.on_disk("user-guide-logo.png"));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_create_missing_staged_blob_is_blob_io() {
    let fx = Fixture::new().await;
    let result = fx
        .service
        .create(NewDocument {
            blob: Some(StagedBlob::new(fx.staging.join("gone.part")).with_original_name("x.pdf")),
            display_name: Some("Gone".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DocumentError::BlobIo { .. })));
    assert!(fx.service.list().await.is_empty());
    assert!(!fx.on_disk("gone.pdf"));
}

#[tokio::test]
async fn test_create_failed_logo_removes_primary() {
    let fx = Fixture::new().await;
    let result = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("guide.pdf", b"data")),
            logo: Some(StagedBlob::new(fx.staging.join("gone.part")).with_original_name("l.png")),
            display_name: Some("Guide".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DocumentError::BlobIo { .. })));
    assert!(fx.service.list().await.is_empty());
    assert!(!fx.on_disk("guide.pdf"));
}

#[tokio::test]
async fn test_create_manifest_write_failure_removes_blob() {
    let fx = Fixture::new().await;
    // A directory where the manifest temp file goes makes every write fail
    std::fs::create_dir_all(fx.root.join(".manifest.json.tmp")).unwrap();

    let result = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("guide.pdf", b"data")),
            display_name: Some("Guide".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DocumentError::ManifestIo(_))));
    assert!(!fx.on_disk("guide.pdf"));
}

#[tokio::test]
async fn test_ids_increase_and_are_not_reused() {
    let fx = Fixture::new().await;
    let a = fx.create("a.pdf", "A").await;
    let b = fx.create("b.pdf", "B").await;
    assert!(b > a);

    fx.service.delete(b).await.unwrap();
    let c = fx.create("c.pdf", "C").await;
    assert!(c > b);
}

#[tokio::test]
async fn test_concurrent_creates_allocate_unique_names() {
    let fx = Fixture::new().await;
    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let service = Arc::clone(&fx.service);
        let blob = fx.stage("guide.pdf", b"data");
        tasks.spawn(async move {
            service
                .create(NewDocument {
                    blob: Some(blob),
                    display_name: Some("Shared Name".to_string()),
                    ..Default::default()
                })
                .await
                .map(|o| o.record)
        });
    }

    let mut ids = HashSet::new();
    while let Some(result) = tasks.join_next().await {
        let record = result.unwrap().unwrap();
        assert!(ids.insert(record.id));
    }

    assert_eq!(fx.service.list().await.len(), 8);
    fx.assert_consistent().await;
}

// ============================================================================
// replace
// ============================================================================

#[tokio::test]
async fn test_replace_logo_only_keeps_filename() {
    let fx = Fixture::new().await;
    let id = fx.create("warranty.pdf", "Warranty").await;

    let record = fx
        .service
        .replace(
            id,
            DocumentUpdate {
                logo: Some(fx.stage("logo.png", b"png")),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .record;
    assert_eq!(record.id, id);
    assert_eq!(record.slug, "warranty");
    assert_eq!(record.filename, "warranty.pdf");
    assert_eq!(record.logo_filename.as_deref(), Some("warranty-logo.png"));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_replace_logo_removes_old_logo() {
    let fx = Fixture::new().await;
    let id = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("warranty.pdf", b"data")),
            logo: Some(fx.stage("old.png", b"png")),
            display_name: Some("Warranty".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .record
        .id;

    let record = fx
        .service
        .replace(
            id,
            DocumentUpdate {
                logo: Some(fx.stage("new.jpg", b"jpg")),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .record;
    assert_eq!(record.logo_filename.as_deref(), Some("warranty-logo.jpg"));
    assert!(!fx.on_disk("warranty-logo.png"));
    assert!(fx.on_disk("warranty-logo.jpg"));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_replace_blob_same_extension() {
    let fx = Fixture::new().await;
    let id = fx.create("guide.pdf", "Guide").await;
    let before = fx.service.get(id).await.unwrap();

    let record = fx
        .service
        .replace(
            id,
            DocumentUpdate {
                blob: Some(fx.stage("guide-v2.pdf", b"a much longer body")),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .record;
    assert_eq!(record.filename, "guide.pdf");
    assert_eq!(record.size, 18);
    assert!(record.uploaded_at >= before.uploaded_at);
    assert_eq!(
        std::fs::read(fx.root.join("guide.pdf")).unwrap(),
        b"a much longer body"
    );
    assert!(!fx.on_disk(".guide.pdf.superseded"));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_replace_same_name_failed_logo_restores_blob() {
    let fx = Fixture::new().await;
    let id = fx.create("guide.pdf", "Guide").await;
    let before = fx.service.get(id).await.unwrap();

    let result = fx
        .service
        .replace(
            id,
            DocumentUpdate {
                blob: Some(fx.stage("guide-v2.pdf", b"NEW CONTENT THAT IS LONGER")),
                logo: Some(StagedBlob::new(fx.staging.join("gone.part")).with_original_name("l.png")),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(DocumentError::BlobIo { .. })));

    let after = fx.service.get(id).await.unwrap();
    assert_eq!(after.size, before.size);
    assert_eq!(after.logo_filename, None);
    assert_eq!(
        std::fs::read(fx.root.join("guide.pdf")).unwrap(),
        b"%PDF-1.4 manual"
    );
    assert!(!fx.on_disk(".guide.pdf.superseded"));
    assert!(!fx.on_disk("guide-logo.png"));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_replace_same_name_manifest_failure_restores_blobs() {
    let fx = Fixture::new().await;
    let id = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("guide.pdf", b"%PDF-1.4 manual")),
            logo: Some(fx.stage("logo.png", b"old png")),
            display_name: Some("Guide".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .record
        .id;
    std::fs::create_dir_all(fx.root.join(".manifest.json.tmp")).unwrap();

    let result = fx
        .service
        .replace(
            id,
            DocumentUpdate {
                blob: Some(fx.stage("guide-v2.pdf", b"NEW CONTENT THAT IS LONGER")),
                logo: Some(fx.stage("logo-v2.png", b"new png")),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(DocumentError::ManifestIo(_))));

    let after = fx.service.get(id).await.unwrap();
    assert_eq!(after.size, 15);
    assert_eq!(
        std::fs::read(fx.root.join("guide.pdf")).unwrap(),
        b"%PDF-1.4 manual"
    );
    assert_eq!(
        std::fs::read(fx.root.join("guide-logo.png")).unwrap(),
        b"old png"
    );
    assert!(!fx.on_disk(".guide.pdf.superseded"));
    assert!(!fx.on_disk(".guide-logo.png.superseded"));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_replace_blob_new_extension_removes_old() {
    let fx = Fixture::new().await;
    let id = fx.create("guide.pdf", "Guide").await;

    let record = fx
        .service
        .replace(
            id,
            DocumentUpdate {
                blob: Some(fx.stage("guide.docx", b"docx")),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .record;
    assert_eq!(record.filename, "guide.docx");
    assert_eq!(
        record.mime_type,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    assert!(!fx.on_disk("guide.pdf"));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_replace_rejects_empty_request() {
    let fx = Fixture::new().await;
    let id = fx.create("guide.pdf", "Guide").await;

    let result = fx.service.replace(id, DocumentUpdate::default()).await;
    assert!(matches!(result, Err(DocumentError::Validation(_))));
}

#[tokio::test]
async fn test_replace_unknown_id() {
    let fx = Fixture::new().await;
    let result = fx.service.replace(42, DocumentUpdate::default()).await;
    assert!(matches!(result, Err(DocumentError::NotFound(42))));
}

#[tokio::test]
async fn test_replace_stale_cleanup_failure_is_reported() {
    let fx = Fixture::with_failing_deletes().await;
    let id = fx.create("guide.pdf", "Guide").await;

    let outcome = fx
        .service
        .replace(
            id,
            DocumentUpdate {
                blob: Some(fx.stage("guide.docx", b"docx")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.record.filename, "guide.docx");
    assert_eq!(outcome.stale_blobs.len(), 1);
    assert_eq!(outcome.stale_blobs[0].name, "guide.pdf");
    // Orphan left behind, manifest still consistent
    assert!(fx.on_disk("guide.pdf"));
    fx.assert_consistent().await;
}

// ============================================================================
// rename
// ============================================================================

#[tokio::test]
async fn test_rename_moves_blob() {
    let fx = Fixture::new().await;
    let id = fx.create("guide.pdf", "Guide").await;

    let record = fx
        .service
        .rename(id, Some("Owner Handbook".to_string()), None)
        .await
        .unwrap()
        .record;
    assert_eq!(record.id, id);
    assert_eq!(record.name, "Owner Handbook");
    assert_eq!(record.slug, "owner-handbook");
    assert_eq!(record.filename, "owner-handbook.pdf");
    assert_eq!(record.url, "/files/owner-handbook.pdf");
    assert!(!fx.on_disk("guide.pdf"));
    assert!(fx.on_disk("owner-handbook.pdf"));
}

#[tokio::test]
async fn test_rename_slug_override_keeps_name() {
    let fx = Fixture::new().await;
    let id = fx.create("guide.pdf", "Guide").await;

    let record = fx
        .service
        .rename(id, None, Some("setup".to_string()))
        .await
        .unwrap()
        .record;
    assert_eq!(record.name, "Guide");
    assert_eq!(record.filename, "setup.pdf");
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_rename_into_collision_gets_suffix() {
    let fx = Fixture::new().await;
    fx.create("a.pdf", "Setup").await;
    let id = fx.create("b.pdf", "Other").await;

    let record = fx
        .service
        .rename(id, None, Some("setup".to_string()))
        .await
        .unwrap()
        .record;
    assert_eq!(record.filename, "setup-1.pdf");
    fx.assert_consistent().await;
}

#[tokio::test]
async fn test_rename_to_same_name_keeps_filename() {
    let fx = Fixture::new().await;
    let id = fx.create("guide.pdf", "Guide").await;

    let record = fx
        .service
        .rename(id, Some("GUIDE".to_string()), None)
        .await
        .unwrap()
        .record;
    assert_eq!(record.name, "GUIDE");
    assert_eq!(record.filename, "guide.pdf");
}

#[tokio::test]
async fn test_rename_rejects_blank_name() {
    let fx = Fixture::new().await;
    let id = fx.create("guide.pdf", "Guide").await;

    let result = fx.service.rename(id, Some("  ".to_string()), None).await;
    assert!(matches!(result, Err(DocumentError::Validation(_))));

    let result = fx.service.rename(id, None, None).await;
    assert!(matches!(result, Err(DocumentError::Validation(_))));
    assert_eq!(fx.service.get(id).await.unwrap().filename, "guide.pdf");
}

// ============================================================================
// delete
// ============================================================================

#[tokio::test]
async fn test_delete_removes_logo_too() {
    let fx = Fixture::new().await;
    let id = fx
        .service
        .create(NewDocument {
            blob: Some(fx.stage("guide.pdf", b"data")),
            logo: Some(fx.stage("logo.png", b"png")),
            display_name: Some("Guide".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .record
        .id;

    fx.service.delete(id).await.unwrap();
    assert!(fx.service.list().await.is_empty());
    assert!(!fx.on_disk("guide.pdf"));
    assert!(!fx.on_disk("guide-logo.png"));
}

#[tokio::test]
async fn test_delete_unknown_id() {
    let fx = Fixture::new().await;
    let result = fx.service.delete(7).await;
    assert!(matches!(result, Err(DocumentError::NotFound(7))));
}

#[tokio::test]
async fn test_delete_with_failing_cleanup_still_removes_record() {
    let fx = Fixture::with_failing_deletes().await;
    let id = fx.create("guide.pdf", "Guide").await;

    let outcome = fx.service.delete(id).await.unwrap();
    assert_eq!(outcome.record.id, id);
    assert_eq!(outcome.stale_blobs.len(), 1);
    assert!(fx.service.list().await.is_empty());
    assert!(matches!(
        fx.service.get(id).await,
        Err(DocumentError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_find_blob_resolves_primary_and_logo() {
    let fx = Fixture::new().await;
    fx.service
        .create(NewDocument {
            blob: Some(fx.stage("guide.pdf", b"data")),
            logo: Some(fx.stage("logo.png", b"png")),
            display_name: Some("Guide".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let (_, slot) = fx.service.find_blob("guide.pdf").await.unwrap();
    assert_eq!(slot, BlobSlot::Primary);
    let (_, slot) = fx.service.find_blob("guide-logo.png").await.unwrap();
    assert_eq!(slot, BlobSlot::Logo);
    assert!(fx.service.find_blob("manifest.json").await.is_none());
}
