use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::api::response::ApiError;
use crate::object_store::ObjectStoreError;
use crate::storage::manifest::MANIFEST_FILE_NAME;
use crate::storage::models::BlobSlot;
use crate::AppState;

/// Serve a stored manual or logo by the name the manifest records for it.
/// `manifest.json` itself is served as the bare manifest document.
/// Route: GET /files/:filename
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if filename == MANIFEST_FILE_NAME {
        let mut response = Json(state.service.manifest().await).into_response();
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-cache"),
        );
        return Ok(response);
    }

    // Only names referenced by the manifest are downloadable
    let (record, slot) = state
        .service
        .find_blob(&filename)
        .await
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let (reader, len) = state
        .service
        .blobs()
        .open(&filename)
        .await
        .map_err(|e| match e {
            ObjectStoreError::NotFound(_) => ApiError::not_found("File content not found"),
            _ => ApiError::internal(format!("Failed to retrieve file: {e}")),
        })?;

    let mime_type = match slot {
        BlobSlot::Primary => record.mime_type.clone(),
        BlobSlot::Logo => mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string(),
    };

    let body = Body::from_stream(ReaderStream::new(reader));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        mime_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(len));

    if let Ok(value) = format!("inline; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Replacing a manual can rewrite the same name in place
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );

    Ok(response)
}
