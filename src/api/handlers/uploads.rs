use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::api::response::ApiError;
use crate::service::StagedBlob;

/// Fields of an upload or replace form, with file parts staged on disk.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<StagedBlob>,
    pub logo: Option<StagedBlob>,
    pub name: Option<String>,
    pub slug: Option<String>,
    staged: Vec<PathBuf>,
}

impl UploadForm {
    /// Read every field, streaming `file` and `logo` parts into `upload_dir`.
    /// Each file part is capped at `max_size` bytes.
    pub async fn read(
        multipart: &mut Multipart,
        upload_dir: &Path,
        max_size: u64,
    ) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        if let Err(e) = form.read_fields(multipart, upload_dir, max_size).await {
            form.cleanup().await;
            return Err(e);
        }
        Ok(form)
    }

    async fn read_fields(
        &mut self,
        multipart: &mut Multipart,
        upload_dir: &Path,
        max_size: u64,
    ) -> Result<(), ApiError> {
        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                "file" => {
                    self.file = Some(self.stage(field, upload_dir, max_size).await?);
                }
                "logo" => {
                    self.logo = Some(self.stage(field, upload_dir, max_size).await?);
                }
                "name" | "manualName" => {
                    self.name = Some(field.text().await?);
                }
                "slug" | "manualSlug" => {
                    self.slug = Some(field.text().await?);
                }
                _ => {
                    // Ignore unknown fields
                }
            }
        }
        Ok(())
    }

    async fn stage(
        &mut self,
        mut field: Field<'_>,
        upload_dir: &Path,
        max_size: u64,
    ) -> Result<StagedBlob, ApiError> {
        let original_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let path = upload_dir.join(format!("{}.part", uuid::Uuid::new_v4()));
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to stage upload: {e}")))?;
        self.staged.push(path.clone());

        let mut written: u64 = 0;
        while let Some(chunk) = field.chunk().await? {
            let chunk: Bytes = chunk;
            written += chunk.len() as u64;
            if written > max_size {
                return Err(ApiError::payload_too_large(format!(
                    "File exceeds maximum upload size of {max_size} bytes"
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to stage upload: {e}")))?;
        }
        file.sync_all()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to stage upload: {e}")))?;

        Ok(StagedBlob {
            path,
            original_name,
            content_type,
        })
    }

    /// Remove staged files the service did not move into the store.
    pub async fn cleanup(&self) {
        for path in &self.staged {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
                }
            }
        }
    }
}
