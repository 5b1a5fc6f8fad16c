mod health;
mod manuals;
mod static_files;
mod uploads;

use crate::api::response::ApiError;

pub use health::health;
pub use manuals::{
    delete_manual, get_manifest, get_manual, list_manuals, rename_manual, replace_manual,
    upload_manual,
};
pub use static_files::serve_file;
pub use uploads::UploadForm;

/// Parse a document id from a path segment.
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid document id '{raw}'")))
}
