//! Shared test helpers for manual-manager router tests.

use std::sync::Arc;

use crate::config::{Config, ServerConfig, StorageConfig};
use crate::object_store::LocalStore;
use crate::service::DocumentService;
use crate::storage::ManifestStore;
use crate::AppState;

/// Create a test AppState with a temporary storage root and staging directory.
pub async fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let root = temp_dir.path().join("files");
    let upload_dir = root.join(".uploads");

    let config = Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
        },
        storage: StorageConfig {
            root: root.clone(),
            upload_dir: upload_dir.clone(),
        },
        max_upload_size: 1024 * 1024, // 1MB for tests
    };

    let manifest = ManifestStore::open(&root)
        .await
        .expect("Failed to open test manifest");
    let blobs = LocalStore::new(&root).expect("Failed to create test object store");
    std::fs::create_dir_all(&upload_dir).expect("Failed to create staging directory");

    Arc::new(AppState {
        config,
        service: DocumentService::new(manifest, Arc::new(blobs)),
    })
}
