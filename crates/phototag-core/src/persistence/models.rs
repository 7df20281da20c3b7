use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use crate::photo::{Photo, UNKNOWN_DIMENSION};

/// Persisted form of a photo: every attribute except the ones recomputed
/// from disk on load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    /// Full path to the image file
    pub file: PathBuf,

    #[serde(default)]
    pub favorite: bool,

    #[serde(default = "unix_epoch")]
    pub last_modified: DateTime<Utc>,

    /// CRC-32 of the file content
    #[serde(default, deserialize_with = "deserialize_hash")]
    pub hash: u32,

    #[serde(default)]
    pub caption: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub rotation: i32,

    /// File size in bytes
    #[serde(default)]
    pub file_size: u64,

    /// Capture date from the image metadata
    #[serde(default)]
    pub original_date: Option<NaiveDateTime>,

    #[serde(default = "unknown_dimension")]
    pub width: i64,

    #[serde(default = "unknown_dimension")]
    pub height: i64,
}

impl PhotoRecord {
    /// A record with default attributes for `file`
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            favorite: false,
            last_modified: unix_epoch(),
            hash: 0,
            caption: None,
            tags: Vec::new(),
            rotation: 0,
            file_size: 0,
            original_date: None,
            width: UNKNOWN_DIMENSION,
            height: UNKNOWN_DIMENSION,
        }
    }

    /// Restore a photo verbatim. Transient state is left unset until the
    /// photo is refreshed.
    pub fn into_photo(self) -> Photo {
        let mut photo = Photo::new(self.file);
        photo.favorite = self.favorite;
        photo.last_modified = self.last_modified;
        photo.hash = self.hash;
        photo.caption = self.caption;
        photo.rotation = self.rotation;
        photo.file_size = self.file_size;
        photo.original_date = self.original_date;
        photo.width = self.width;
        photo.height = self.height;

        // Repair duplicated tags from hand-edited files
        for tag in self.tags {
            photo.add_tag(&tag);
        }
        photo
    }
}

impl From<&Photo> for PhotoRecord {
    fn from(photo: &Photo) -> Self {
        Self {
            file: photo.path.clone(),
            favorite: photo.favorite,
            last_modified: photo.last_modified,
            hash: photo.hash,
            caption: photo.caption.clone(),
            tags: photo.tags.clone(),
            rotation: photo.rotation,
            file_size: photo.file_size,
            original_date: photo.original_date,
            width: photo.width,
            height: photo.height,
        }
    }
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from(SystemTime::UNIX_EPOCH)
}

fn unknown_dimension() -> i64 {
    UNKNOWN_DIMENSION
}

// Accepts hashes written as signed 32-bit values as well as unsigned ones
fn deserialize_hash<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    if value < 0 {
        i32::try_from(value)
            .map(|signed| signed as u32)
            .map_err(|_| D::Error::custom(format!("hash out of range: {}", value)))
    } else {
        u32::try_from(value).map_err(|_| D::Error::custom(format!("hash out of range: {}", value)))
    }
}
