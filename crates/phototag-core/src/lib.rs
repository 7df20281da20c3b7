//! Core functionality for cataloging and tagging photos.
//!
//! This library provides the building blocks of a photo catalog:
//! - Directory scanning and import of image files
//! - Content hashing and duplicate tracking
//! - Tags, favorites, captions and rotation per photo
//! - JSON persistence of the catalog
//! - Filtered and sorted views with change notifications

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use catalog::{Catalog, CatalogSnapshot, DuplicateGroup};
pub use config::*;
pub use error::{Error, Result};
pub use events::CatalogEvent;
pub use photo::Photo;
pub use tasks::{ProgressSender, Task};
pub use view::{CatalogView, Filter, SortDirection, SortKey, ViewRow};

// -- Public Modules --
pub mod catalog;
pub mod config;
pub mod discovery;
pub mod events;
pub mod logging;
pub mod metadata;
pub mod persistence;
pub mod photo;
pub mod processing;
pub mod progress;
pub mod tasks;
pub mod view;
