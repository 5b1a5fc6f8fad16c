use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{BlobReader, ObjectStore, ObjectStoreError};

/// Blob store backed by a single flat directory.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn object_path(&self, name: &str) -> Result<PathBuf, ObjectStoreError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
            || name.contains('\0')
        {
            return Err(ObjectStoreError::InvalidName(name.to_string()));
        }
        Ok(self.base_path.join(name))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn install(&self, source: &Path, name: &str) -> Result<u64, ObjectStoreError> {
        let dest = self.object_path(name)?;

        if tokio::fs::rename(source, &dest).await.is_err() {
            // Different filesystem: fall back to copy, then drop the source.
            if let Err(e) = tokio::fs::copy(source, &dest).await {
                match tokio::fs::remove_file(&dest).await {
                    Ok(()) => {}
                    Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                    Err(cleanup) => {
                        tracing::warn!(dest = %dest.display(), error = %cleanup, "Failed to remove partial copy");
                    }
                }
                return Err(e.into());
            }
            if let Err(e) = tokio::fs::remove_file(source).await {
                tracing::warn!(source = %source.display(), error = %e, "Failed to remove staged file after copy");
            }
        }

        let meta = tokio::fs::metadata(&dest).await?;
        Ok(meta.len())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), ObjectStoreError> {
        let src = self.object_path(from)?;
        let dest = self.object_path(to)?;
        if !tokio::fs::try_exists(&src).await? {
            return Err(ObjectStoreError::NotFound(from.to_string()));
        }
        tokio::fs::rename(&src, &dest).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn open(&self, name: &str) -> Result<BlobReader, ObjectStoreError> {
        let path = self.object_path(name)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();
        Ok((Box::new(file), len))
    }
}
