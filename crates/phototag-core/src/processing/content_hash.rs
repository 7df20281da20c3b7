//! Computes the content hash of a file using CRC-32.
//!
//! The hash is only used to spot byte-identical copies of a photo, so a fast
//! 32-bit checksum is enough; two different files that collide are treated
//! as duplicates.
use crate::logging::log_hash_error;

use std::{fs::File, io::Read, path::Path};

/// Compute the CRC-32 of a file's full content
pub fn compute_content_hash<P: AsRef<Path>>(path: P) -> std::io::Result<u32> {
    let mut file = File::open(&path)?;
    let mut hasher = crc32fast::Hasher::new();

    // Read the file in chunks and update the hasher
    let mut buffer = [0; 64 * 1024];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize())
}

/// Compute the content hash, falling back to 0 when the file can't be read
pub fn content_hash_or_zero(path: &Path) -> u32 {
    match compute_content_hash(path) {
        Ok(hash) => hash,
        Err(e) => {
            log_hash_error(path, &e);
            0
        }
    }
}
