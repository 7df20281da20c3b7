use crate::error::{Error, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

/// Configuration for the photo catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File extensions (without the dot) that are imported during a scan
    pub image_extensions: Vec<String>,

    /// Whether extensions are compared ignoring ASCII case
    pub case_insensitive_extensions: bool,

    /// Maximum directory depth for scanning
    pub max_depth: Option<usize>,

    /// Number of worker threads for background tasks (0 = auto)
    pub threads: usize,

    /// Whether to decode a thumbnail for every photo
    pub generate_thumbnails: bool,

    /// Bounding box of generated thumbnails, in pixels
    pub thumbnail_size: u32,

    /// Whether `refresh_all` rebuilds the duplicate index after re-hashing
    pub rebuild_duplicates_on_refresh: bool,

    /// Where the catalog is saved
    pub catalog_path: PathBuf,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_extensions: ["jpg", "JPG", "jpeg", "JPEG"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            case_insensitive_extensions: false,
            max_depth: None,
            threads: 0, // Auto
            generate_thumbnails: true,
            thumbnail_size: 100,
            rebuild_duplicates_on_refresh: true,
            catalog_path: default_catalog_path(),
            log_level: LogLevel::Info,
        }
    }
}

/// `<data dir>/phototag/db.json`, or `db.json` in the working directory when
/// the platform has no data directory.
pub fn default_catalog_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("phototag").join("db.json"))
        .unwrap_or_else(|| PathBuf::from("db.json"))
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.image_extensions.is_empty() {
            return Err(Error::Configuration(
                "At least one image extension must be configured".to_string(),
            ));
        }

        if let Some(ext) = self
            .image_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(Error::Configuration(format!(
                "Image extensions must be non-empty and given without a leading dot: {:?}",
                ext
            )));
        }

        if self.thumbnail_size == 0 {
            return Err(Error::Configuration(
                "Thumbnail size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Number of worker threads to use, resolving 0 to the CPU count
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Returns whether `ext` is on the extension allowlist
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.image_extensions.iter().any(|allowed| {
            if self.case_insensitive_extensions {
                allowed.eq_ignore_ascii_case(ext)
            } else {
                allowed == ext
            }
        })
    }
}
