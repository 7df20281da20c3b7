use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::Config;
use crate::metadata::{read_metadata, MetadataReader};
use crate::processing::{content_hash_or_zero, load_thumbnail, Thumbnail};

/// Width or height of a photo whose dimensions are not known
pub const UNKNOWN_DIMENSION: i64 = -1;

/// One cataloged image file.
///
/// The persisted attributes are the ones the user edits (favorite, caption,
/// tags, rotation) plus what was read from the file at import time. The
/// thumbnail and the `missing`/`invalid` flags are recomputed from disk by
/// [`Photo::refresh`] and never saved.
///
/// Photos inside a catalog are only mutated through catalog operations, which
/// keep the tag index and the dirty flag in step.
#[derive(Debug, Clone)]
pub struct Photo {
    pub(crate) path: PathBuf,
    pub(crate) favorite: bool,
    pub(crate) caption: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) rotation: i32,
    pub(crate) last_modified: DateTime<Utc>,
    pub(crate) file_size: u64,
    pub(crate) hash: u32,
    pub(crate) width: i64,
    pub(crate) height: i64,
    pub(crate) original_date: Option<NaiveDateTime>,

    // Transient
    pub(crate) thumbnail: Option<Thumbnail>,
    pub(crate) missing: bool,
    pub(crate) invalid: bool,
}

impl Photo {
    /// A photo with default attributes and nothing read from disk
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            favorite: false,
            caption: None,
            tags: Vec::new(),
            rotation: 0,
            last_modified: DateTime::<Utc>::from(SystemTime::UNIX_EPOCH),
            file_size: 0,
            hash: 0,
            width: UNKNOWN_DIMENSION,
            height: UNKNOWN_DIMENSION,
            original_date: None,
            thumbnail: None,
            missing: false,
            invalid: false,
        }
    }

    /// Build a photo for a newly imported file: reads the file for its hash,
    /// thumbnail, size and modification time, then its metadata for
    /// dimensions, orientation and capture date.
    pub fn from_file(
        path: impl Into<PathBuf>,
        config: &Config,
        reader: &dyn MetadataReader,
    ) -> Self {
        let mut photo = Self::new(path);
        photo.refresh(config);
        if !photo.missing {
            photo.read_metadata(reader, true);
        }
        photo
    }

    /// Recompute the transient state from disk.
    ///
    /// A missing file only sets `missing`; the persisted hash, size and
    /// modification time are left as they were. An existing file that does
    /// not decode sets `invalid` but is still hashed.
    pub fn refresh(&mut self, config: &Config) {
        self.missing = false;
        self.invalid = false;
        self.thumbnail = None;

        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(_) => {
                self.missing = true;
                return;
            }
        };

        match load_thumbnail(&self.path, config) {
            Ok(thumbnail) => self.thumbnail = thumbnail,
            Err(e) => {
                log::debug!("Not a readable image: {} ({})", self.path.display(), e);
                self.invalid = true;
            }
        }

        self.hash = content_hash_or_zero(&self.path);
        self.file_size = metadata.len();
        if let Ok(modified) = metadata.modified() {
            self.last_modified = DateTime::<Utc>::from(modified);
        }
    }

    /// Apply metadata read from the file. The orientation only overrides the
    /// rotation when `apply_rotation` is set, so a re-read does not discard a
    /// rotation chosen by the user.
    pub fn read_metadata(&mut self, reader: &dyn MetadataReader, apply_rotation: bool) {
        let metadata = read_metadata(reader, &self.path);
        self.width = metadata.width;
        self.height = metadata.height;
        self.original_date = metadata.original_date;
        if apply_rotation {
            self.rotation = metadata.rotation;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    /// Rotation folded into `0..360`
    pub fn normalized_rotation(&self) -> i32 {
        self.rotation.rem_euclid(360)
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    /// `(width, height)` once both are known
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let width = u32::try_from(self.width).ok()?;
        let height = u32::try_from(self.height).ok()?;
        Some((width, height))
    }

    pub fn original_date(&self) -> Option<NaiveDateTime> {
        self.original_date
    }

    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    pub fn is_missing(&self) -> bool {
        self.missing
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    // -- Mutators, called by the catalog --

    pub(crate) fn set_favorite(&mut self, favorite: bool) {
        self.favorite = favorite;
    }

    pub(crate) fn set_caption(&mut self, caption: Option<String>) {
        self.caption = caption;
    }

    pub(crate) fn set_rotation(&mut self, rotation: i32) {
        self.rotation = rotation;
    }

    /// Returns false if the tag was already present
    pub(crate) fn add_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Returns false if the tag was not present
    pub(crate) fn remove_tag(&mut self, tag: &str) -> bool {
        match self.tags.iter().position(|t| t == tag) {
            Some(index) => {
                self.tags.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every tag, returning the removed ones in order
    pub(crate) fn take_tags(&mut self) -> Vec<String> {
        std::mem::take(&mut self.tags)
    }

    /// Copy everything read from disk out of `fresh`, a refreshed copy of this
    /// photo, leaving the user's edits alone. Returns whether a persisted
    /// field changed.
    pub(crate) fn merge_disk_state(&mut self, fresh: Photo) -> bool {
        let changed = self.hash != fresh.hash
            || self.file_size != fresh.file_size
            || self.last_modified != fresh.last_modified
            || self.width != fresh.width
            || self.height != fresh.height
            || self.original_date != fresh.original_date;

        self.hash = fresh.hash;
        self.file_size = fresh.file_size;
        self.last_modified = fresh.last_modified;
        self.width = fresh.width;
        self.height = fresh.height;
        self.original_date = fresh.original_date;
        self.thumbnail = fresh.thumbnail;
        self.missing = fresh.missing;
        self.invalid = fresh.invalid;
        changed
    }
}
