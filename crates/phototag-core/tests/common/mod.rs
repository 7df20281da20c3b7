#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageBuffer, Rgb};
use phototag_core::metadata::{MetadataReader, MetadataTag};
use phototag_core::{Catalog, Config};

/// Metadata reader that reports nothing, so tests do not depend on EXIF
pub struct NoMetadata;

impl MetadataReader for NoMetadata {
    fn read_tags(&self, _path: &Path) -> phototag_core::Result<Vec<MetadataTag>> {
        Ok(Vec::new())
    }
}

pub fn test_config() -> Config {
    Config {
        threads: 2,
        thumbnail_size: 16,
        ..Default::default()
    }
}

/// Route library logs through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_catalog() -> Arc<Catalog> {
    init_logging();
    Arc::new(Catalog::with_reader(test_config(), Arc::new(NoMetadata)).unwrap())
}

/// Create a small real JPEG whose pixels depend on `seed`
pub fn create_jpeg(dir: &Path, name: &str, seed: u8) -> PathBuf {
    let path = dir.join(name);
    let img = ImageBuffer::from_fn(24, 16, |x, y| {
        Rgb([seed, (x * 10) as u8, (y * 15) as u8])
    });
    img.save(&path).unwrap();
    path
}

/// Copy `source` byte for byte to `name` in `dir`
pub fn copy_file(source: &Path, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::copy(source, &path).unwrap();
    path
}

/// Create a file with dummy data that is not a decodable image
pub fn create_fake_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(b"DUMMY IMAGE DATA").unwrap();
    path
}

/// Persisted view of a photo, for comparing catalogs
pub fn persisted_fields(catalog: &Catalog) -> Vec<phototag_core::persistence::PhotoRecord> {
    catalog
        .get()
        .iter()
        .map(phototag_core::persistence::PhotoRecord::from)
        .collect()
}
