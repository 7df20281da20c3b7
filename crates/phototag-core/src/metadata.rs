//! Metadata extraction for imported photos.
//!
//! A [`MetadataReader`] turns a file into descriptive `(tag name, description)`
//! pairs, e.g. `("Image Width", "4000 pixels")` or
//! `("Orientation", "Right side, top (Rotate 90 CW)")`. [`extract_metadata`]
//! then picks the handful of fields the catalog keeps out of those strings.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{In, Tag, Value};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

/// Timestamp layout used by EXIF date fields
pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

pub const TAG_IMAGE_WIDTH: &str = "Image Width";
pub const TAG_IMAGE_HEIGHT: &str = "Image Height";
pub const TAG_ORIENTATION: &str = "Orientation";
pub const TAG_DATE_TIME: &str = "Date/Time";
pub const TAG_DATE_TIME_ORIGINAL: &str = "Date/Time Original";

static PIXELS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+) pixels$").unwrap());
static ROTATE_CW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(Rotate (\d+) CW\)").unwrap());
static ROTATE_CCW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(Rotate (\d+) CCW\)").unwrap());

/// One descriptive metadata entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTag {
    pub name: String,
    pub description: String,
}

impl MetadataTag {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Source of descriptive metadata for an image file
pub trait MetadataReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<Vec<MetadataTag>>;
}

/// Fields the catalog derives from metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: i64,
    pub height: i64,
    pub rotation: i32,
    pub original_date: Option<NaiveDateTime>,
}

impl Default for ImageMetadata {
    fn default() -> Self {
        Self {
            width: -1,
            height: -1,
            rotation: 0,
            original_date: None,
        }
    }
}

/// Read metadata for `path`, leaving every field at its default when the
/// reader fails
pub fn read_metadata(reader: &dyn MetadataReader, path: &Path) -> ImageMetadata {
    match reader.read_tags(path) {
        Ok(tags) => extract_metadata(&tags),
        Err(e) => {
            warn!("Could not read metadata: {} ({})", path.display(), e);
            ImageMetadata::default()
        }
    }
}

/// Pick width, height, orientation and capture date out of `tags`.
///
/// A tag that fails to parse is logged and skipped without affecting the
/// others. `Date/Time Original` is preferred over `Date/Time` when both are
/// present.
pub fn extract_metadata(tags: &[MetadataTag]) -> ImageMetadata {
    let mut metadata = ImageMetadata::default();
    let mut have_original = false;

    for tag in tags {
        let parsed = match tag.name.as_str() {
            TAG_IMAGE_WIDTH => parse_pixels(&tag.description).map(|v| {
                if let Some(v) = v {
                    metadata.width = v;
                }
            }),
            TAG_IMAGE_HEIGHT => parse_pixels(&tag.description).map(|v| {
                if let Some(v) = v {
                    metadata.height = v;
                }
            }),
            TAG_ORIENTATION => parse_rotation(&tag.description).map(|v| {
                if let Some(v) = v {
                    metadata.rotation = v;
                }
            }),
            TAG_DATE_TIME_ORIGINAL => parse_exif_date(&tag.description).map(|date| {
                metadata.original_date = Some(date);
                have_original = true;
            }),
            TAG_DATE_TIME if !have_original => {
                parse_exif_date(&tag.description).map(|date| metadata.original_date = Some(date))
            }
            _ => Ok(()),
        };

        if let Err(reason) = parsed {
            warn!(
                "Skipping metadata tag {} = {:?}: {}",
                tag.name, tag.description, reason
            );
        }
    }

    metadata
}

/// `"4000 pixels"` → `Some(4000)`; other shapes are ignored
fn parse_pixels(description: &str) -> std::result::Result<Option<i64>, String> {
    match PIXELS.captures(description) {
        Some(caps) => caps[1].parse().map(Some).map_err(|e| format!("{}", e)),
        None => Ok(None),
    }
}

/// `"... (Rotate 90 CW)"` → `Some(90)`, `"... (Rotate 90 CCW)"` → `Some(-90)`
fn parse_rotation(description: &str) -> std::result::Result<Option<i32>, String> {
    if let Some(caps) = ROTATE_CW.captures(description) {
        return caps[1].parse().map(Some).map_err(|e| format!("{}", e));
    }
    if let Some(caps) = ROTATE_CCW.captures(description) {
        return caps[1]
            .parse::<i32>()
            .map(|degrees| Some(-degrees))
            .map_err(|e| format!("{}", e));
    }
    Ok(None)
}

fn parse_exif_date(description: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(description.trim(), EXIF_DATE_FORMAT)
        .map_err(|e| format!("{}", e))
}

/// Reads EXIF data from the file and renders it as descriptive tags
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifMetadataReader;

impl ExifMetadataReader {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataReader for ExifMetadataReader {
    fn read_tags(&self, path: &Path) -> Result<Vec<MetadataTag>> {
        let file = File::open(path)?;
        let mut buf_reader = BufReader::new(file);
        let exif = exif::Reader::new().read_from_container(&mut buf_reader)?;

        let mut tags = Vec::new();
        for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
            let tag = field.tag;
            let described = if tag == Tag::PixelXDimension || tag == Tag::ImageWidth {
                field
                    .value
                    .get_uint(0)
                    .map(|v| MetadataTag::new(TAG_IMAGE_WIDTH, format!("{} pixels", v)))
            } else if tag == Tag::PixelYDimension || tag == Tag::ImageLength {
                field
                    .value
                    .get_uint(0)
                    .map(|v| MetadataTag::new(TAG_IMAGE_HEIGHT, format!("{} pixels", v)))
            } else if tag == Tag::Orientation {
                field
                    .value
                    .get_uint(0)
                    .and_then(describe_orientation)
                    .map(|d| MetadataTag::new(TAG_ORIENTATION, d))
            } else if tag == Tag::DateTimeOriginal {
                ascii(&field.value).map(|d| MetadataTag::new(TAG_DATE_TIME_ORIGINAL, d))
            } else if tag == Tag::DateTime {
                ascii(&field.value).map(|d| MetadataTag::new(TAG_DATE_TIME, d))
            } else {
                None
            };

            if let Some(tag) = described {
                debug!("{}: {} = {}", path.display(), tag.name, tag.description);
                tags.push(tag);
            }
        }

        Ok(tags)
    }
}

fn ascii(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(vec) => vec.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .to_string()
        }),
        _ => None,
    }
}

/// Human-readable EXIF orientation, in the wording `extract_metadata` parses
fn describe_orientation(value: u32) -> Option<&'static str> {
    Some(match value {
        1 => "Top, left side (Horizontal / normal)",
        2 => "Top, right side (Mirror horizontal)",
        3 => "Bottom, right side (Rotate 180)",
        4 => "Bottom, left side (Mirror vertical)",
        5 => "Left side, top (Mirror horizontal and rotate 270 CW)",
        6 => "Right side, top (Rotate 90 CW)",
        7 => "Right side, bottom (Mirror horizontal and rotate 90 CW)",
        8 => "Left side, bottom (Rotate 270 CW)",
        _ => return None,
    })
}
