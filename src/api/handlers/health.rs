use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::api::response::JSend;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
