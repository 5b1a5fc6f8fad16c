use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::warn;

use super::models::Manifest;

/// Name of the manifest inside the storage root.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

const MANIFEST_TEMP_NAME: &str = ".manifest.json.tmp";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The single JSON document holding every record, stored in the storage root.
///
/// The store does no locking of its own; the document service serializes
/// every read-modify-write span.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    temp_path: PathBuf,
}

impl ManifestStore {
    /// Open the manifest in `root`, creating the directory and an empty
    /// manifest when they do not exist yet.
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, ManifestError> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root).await?;

        let store = Self {
            path: root.join(MANIFEST_FILE_NAME),
            temp_path: root.join(MANIFEST_TEMP_NAME),
        };

        if !tokio::fs::try_exists(&store.path).await? {
            store.write(&mut Manifest::default()).await?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest. A missing or unreadable document yields an empty one.
    pub async fn read(&self) -> Manifest {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Manifest::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read manifest, using empty manifest");
                return Manifest::default();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt manifest, using empty manifest");
                Manifest::default()
            }
        }
    }

    /// Persist the manifest, stamping `generated_at` first.
    ///
    /// Written to a sibling temp file and renamed over the manifest so readers
    /// never see a half-written document.
    pub async fn write(&self, manifest: &mut Manifest) -> Result<(), ManifestError> {
        manifest.generated_at = Some(Utc::now());
        let data = serde_json::to_vec_pretty(manifest)?;

        tokio::fs::write(&self.temp_path, &data).await?;
        if let Err(e) = tokio::fs::rename(&self.temp_path, &self.path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&self.temp_path).await {
                warn!(path = %self.temp_path.display(), error = %cleanup, "Failed to remove manifest temp file");
            }
            return Err(e.into());
        }
        Ok(())
    }
}
