use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;

use crate::config::Config;
use crate::error::Result;

/// Opaque, cheaply clonable handle to a decoded thumbnail
#[derive(Clone)]
pub struct Thumbnail(Arc<RgbaImage>);

impl Thumbnail {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thumbnail({}x{})", self.width(), self.height())
    }
}

/// Check that `path` decodes as an image.
///
/// With thumbnails enabled the whole image is decoded and scaled to fit the
/// configured bounding box, preserving aspect ratio. Otherwise only the
/// header is parsed and no handle is returned.
pub fn load_thumbnail(path: &Path, config: &Config) -> Result<Option<Thumbnail>> {
    let reader = image::io::Reader::open(path)?.with_guessed_format()?;

    if !config.generate_thumbnails {
        reader.into_dimensions()?;
        return Ok(None);
    }

    let decoded = reader.decode()?;
    let scaled = decoded.thumbnail(config.thumbnail_size, config.thumbnail_size);
    Ok(Some(Thumbnail(Arc::new(scaled.to_rgba8()))))
}
