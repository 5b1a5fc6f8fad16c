mod local;

pub use local::LocalStore;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object name: {0}")]
    InvalidName(String),
}

/// A readable blob together with its length in bytes.
pub type BlobReader = (Box<dyn AsyncRead + Send + Unpin>, u64);

/// Abstraction over the directory holding uploaded blobs.
/// Keys are the plain file names recorded in the manifest.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Move a staged file into the store under `name`, replacing any blob of
    /// that name. Returns the stored size.
    async fn install(&self, source: &Path, name: &str) -> Result<u64, ObjectStoreError>;
    async fn rename(&self, from: &str, to: &str) -> Result<(), ObjectStoreError>;
    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError>;
    async fn open(&self, name: &str) -> Result<BlobReader, ObjectStoreError>;
}
