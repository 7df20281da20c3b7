//! JSON catalog format.
//!
//! A catalog file is a pretty-printed JSON array of [`PhotoRecord`]s. Unknown
//! fields are ignored on read and absent ones take their defaults, so files
//! written by older or newer versions still load.
//!
//! The search roots of a catalog are kept next to it in a separate JSON
//! array of directory paths, see [`search_roots_path`].

mod models;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use models::PhotoRecord;

use crate::error::Result;

/// Serialize `records` as an indented JSON array
pub fn write_records<W: Write>(writer: W, records: &[PhotoRecord]) -> Result<()> {
    serde_json::to_writer_pretty(writer, records)?;
    Ok(())
}

/// Parse a JSON array of photo records
pub fn read_records<R: Read>(reader: R) -> Result<Vec<PhotoRecord>> {
    let records = serde_json::from_reader(reader)?;
    Ok(records)
}

/// Location of the search roots file belonging to the catalog at
/// `catalog_path`: `photos.json` keeps its roots in `photos.roots.json`
pub fn search_roots_path(catalog_path: &Path) -> PathBuf {
    catalog_path.with_extension("roots.json")
}

pub fn write_search_roots<W: Write>(writer: W, roots: &[PathBuf]) -> Result<()> {
    serde_json::to_writer_pretty(writer, roots)?;
    Ok(())
}

pub fn read_search_roots<R: Read>(reader: R) -> Result<Vec<PathBuf>> {
    let roots = serde_json::from_reader(reader)?;
    Ok(roots)
}
