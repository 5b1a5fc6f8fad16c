//! manual-manager - Manifest-backed document store for downloadable manuals
//!
//! This crate provides upload, replacement, renaming and deletion of manual
//! documents (with optional logos) with:
//! - A single JSON manifest as the source of truth for metadata
//! - Slug-derived, collision-free file names in a flat blob directory
//! - Serialized read-modify-write of the manifest
//! - REST API with multipart upload support and a public download route

pub mod api;
pub mod config;
pub mod object_store;
pub mod service;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use config::Config;
use service::DocumentService;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub service: DocumentService,
}
