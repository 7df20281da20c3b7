use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};

/// Walk `directory` and hand every image file to `visit` as soon as it is
/// found. Returns the number of files visited.
///
/// A walk error is logged and ends the walk early without failing it.
pub fn for_each_image<F>(directory: &Path, config: &Config, mut visit: F) -> Result<usize>
where
    F: FnMut(PathBuf),
{
    if !directory.exists() {
        return Err(Error::FileNotFound(directory.to_path_buf()));
    }

    let max_depth = config.max_depth.unwrap_or(usize::MAX);
    let mut visited = 0;

    for entry in WalkDir::new(directory).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    "Stopped scanning {} after {} files: {}",
                    directory.display(),
                    visited,
                    e
                );
                break;
            }
        };

        if entry.file_type().is_file() && has_image_extension(entry.path(), config) {
            visited += 1;
            visit(entry.into_path());
        }
    }

    debug!("Discovered {} images in {}", visited, directory.display());
    Ok(visited)
}

/// Returns if the given path has an extension on the configured allowlist
pub fn has_image_extension(path: &Path, config: &Config) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| config.accepts_extension(ext))
        .unwrap_or(false)
}

// -- Tests --
