pub mod allocator;
pub mod manifest;
pub mod models;
pub mod slug;

pub use allocator::{Allocation, FilenameAllocator};
pub use manifest::{ManifestError, ManifestStore};
pub use slug::slugify;
