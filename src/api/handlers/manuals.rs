use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{parse_id, UploadForm};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::service::{DocumentUpdate, NewDocument};
use crate::storage::models::{DocumentRecord, Manifest};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct RenameRequest {
    #[serde(default, alias = "manualName")]
    pub name: Option<String>,
    #[serde(default, alias = "manualSlug")]
    pub slug: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_manuals(State(state): State<Arc<AppState>>) -> Json<JSend<Vec<DocumentRecord>>> {
    JSend::success(state.service.list().await)
}

pub async fn get_manifest(State(state): State<Arc<AppState>>) -> Json<JSend<Manifest>> {
    JSend::success(state.service.manifest().await)
}

pub async fn get_manual(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<DocumentRecord>>, ApiError> {
    let id = parse_id(&id)?;
    let record = state.service.get(id).await?;
    Ok(JSend::success(record))
}

pub async fn upload_manual(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<JSend<DocumentRecord>>, ApiError> {
    let form = UploadForm::read(
        &mut multipart,
        &state.config.storage.upload_dir,
        state.config.max_upload_size,
    )
    .await?;

    if form.file.is_none() {
        form.cleanup().await;
        return Err(ApiError::bad_request("file field is required"));
    }

    let result = state
        .service
        .create(NewDocument {
            blob: form.file.clone(),
            logo: form.logo.clone(),
            display_name: form.name.clone(),
            slug: form.slug.clone(),
        })
        .await;
    form.cleanup().await;

    let outcome = result?;
    tracing::debug!(id = outcome.record.id, filename = %outcome.record.filename, "Uploaded manual");
    Ok(JSend::success(outcome.record))
}

pub async fn replace_manual(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<JSend<DocumentRecord>>, ApiError> {
    let id = parse_id(&id)?;
    let form = UploadForm::read(
        &mut multipart,
        &state.config.storage.upload_dir,
        state.config.max_upload_size,
    )
    .await?;

    let result = state
        .service
        .replace(
            id,
            DocumentUpdate {
                blob: form.file.clone(),
                logo: form.logo.clone(),
                display_name: form.name.clone(),
                slug: form.slug.clone(),
            },
        )
        .await;
    form.cleanup().await;

    let outcome = result?;
    Ok(JSend::success(outcome.record))
}

pub async fn rename_manual(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<RenameRequest>,
) -> Result<Json<JSend<DocumentRecord>>, ApiError> {
    let id = parse_id(&id)?;

    if req.name.is_none() && req.slug.is_none() {
        return Err(ApiError::bad_request(
            "at least one field (name, slug) must be provided",
        ));
    }

    let outcome = state.service.rename(id, req.name, req.slug).await?;
    Ok(JSend::success(outcome.record))
}

pub async fn delete_manual(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let id = parse_id(&id)?;
    state.service.delete(id).await?;
    Ok(JSend::success(()))
}
