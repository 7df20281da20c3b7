// Per-file work done when a photo is imported or refreshed
mod content_hash;
mod thumbnail;

pub use content_hash::{compute_content_hash, content_hash_or_zero};
pub use thumbnail::{load_thumbnail, Thumbnail};
