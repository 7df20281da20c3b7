use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use phototag_core::config::LogLevel;
use phototag_core::progress::ProgressTracker;
use phototag_core::{
    Catalog, CatalogView, Config, Error, Filter, SortDirection, SortKey, ViewRow,
};

#[derive(Parser)]
#[command(name = "phototag")]
#[command(about = "Catalog, tag and find duplicate photos")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Catalog file (defaults to the configured catalog path)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to a rotating file in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add directories as search roots and import every image below them
    Scan {
        #[arg(required = true)]
        directories: Vec<PathBuf>,
    },

    /// Import individual image files
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Walk the recorded search roots again for new files
    Rescan,

    /// List photos
    List(ListArgs),

    /// Add, remove or clear tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Mark photos as favorites
    Favorite {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Remove the favorite mark instead
        #[arg(long)]
        unset: bool,
    },

    /// Set or clear the caption of a photo
    Caption {
        file: PathBuf,

        /// New caption; omit to clear
        text: Option<String>,
    },

    /// Rotate photos by 90 degrees
    Rotate {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Rotate counter-clockwise
        #[arg(long, conflicts_with = "right")]
        left: bool,

        /// Rotate clockwise (default)
        #[arg(long)]
        right: bool,
    },

    /// Remove photos from the catalog (files on disk are kept)
    Delete {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Report groups of photos with identical content
    Duplicates,

    /// Show tags with their usage counts
    Tags {
        /// Number of tags to show
        #[arg(long, default_value_t = 20)]
        top: usize,

        /// Rank by usage instead of alphabetically
        #[arg(long)]
        most_used: bool,
    },

    /// Re-read every photo from disk
    Refresh,

    /// Remove every photo from the catalog
    Clear,

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "phototag.json")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum TagAction {
    /// Add a tag to photos
    Add {
        tag: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove a tag from photos
    Remove {
        tag: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove every tag from photos
    Clear {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    favorites: bool,

    /// Only photos whose file is gone
    #[arg(long)]
    missing: bool,

    #[arg(long, conflicts_with = "untagged")]
    tagged: bool,

    #[arg(long)]
    untagged: bool,

    /// Only photos with this tag
    #[arg(long)]
    tag: Option<String>,

    /// Only photos with more than one copy
    #[arg(long)]
    duplicates: bool,

    /// Hide extra copies of the same content
    #[arg(long, conflicts_with = "extra_copies")]
    canonical: bool,

    /// Only extra copies
    #[arg(long)]
    extra_copies: bool,

    #[arg(long, value_enum)]
    sort: Option<SortField>,

    /// Reverse the order, catalog order included
    #[arg(long)]
    desc: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortField {
    Name,
    Modified,
    Size,
    Favorite,
    Tags,
    Duplicates,
    Date,
}

impl From<SortField> for SortKey {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Name => SortKey::FileName,
            SortField::Modified => SortKey::LastModified,
            SortField::Size => SortKey::FileSize,
            SortField::Favorite => SortKey::Favorite,
            SortField::Tags => SortKey::Tags,
            SortField::Duplicates => SortKey::DuplicateGroups,
            SortField::Date => SortKey::CaptureDate,
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    if let Commands::GenerateConfig { path } = &cli.command {
        let config = Config::default();
        config.save_to_file(path)?;
        println!("Configuration file generated at: {}", path.display());
        return Ok(());
    }

    // Set up configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => Config::default(),
    };
    if cli.verbose > 0 {
        config.log_level = match cli.verbose {
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
    }
    config.validate()?;

    init_logging(&cli, &config)?;

    let catalog_path = cli
        .catalog
        .clone()
        .unwrap_or_else(|| config.catalog_path.clone());
    let catalog = Arc::new(Catalog::new(config)?);
    load_catalog(&catalog, &catalog_path)?;

    run_and_save(cli.command, &catalog, &catalog_path)
}

/// Run `command`, then save whatever it changed, even when it failed part way
fn run_and_save(
    command: Commands,
    catalog: &Arc<Catalog>,
    catalog_path: &Path,
) -> anyhow::Result<()> {
    let outcome = run_command(command, catalog);

    if catalog.was_changed_since_save() {
        catalog
            .save_to_file(catalog_path)
            .with_context(|| format!("Failed to save catalog to {}", catalog_path.display()))?;
        info!("Catalog saved to {}", catalog_path.display());
    }

    outcome
}

fn init_logging(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let level = config.log_level.to_level_filter();
    match &cli.log_dir {
        Some(log_dir) => phototag_core::logging::init_logger(log_dir, level)
            .map_err(|e| anyhow!("Failed to initialize logging: {}", e)),
        None => {
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(level.to_string()),
            )
            .init();
            Ok(())
        }
    }
}

fn load_catalog(catalog: &Arc<Catalog>, path: &Path) -> anyhow::Result<()> {
    let task = catalog.spawn_load_from_file(path);
    match ProgressTracker::new("Loading").follow(task) {
        Ok(count) => info!("Loaded {} images from {}", count, path.display()),
        Err(Error::FileNotFound(_)) => {
            info!("No catalog at {}, starting empty", path.display());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load catalog {}", path.display()));
        }
    }
    catalog.clear_changed_since_save();
    Ok(())
}

fn run_command(command: Commands, catalog: &Arc<Catalog>) -> anyhow::Result<()> {
    match command {
        Commands::Scan { directories } => {
            let mut failed = 0;
            for directory in &directories {
                let directory = absolute(directory);
                let task = catalog.spawn_add_search_root(directory.clone());
                match ProgressTracker::new("Scanning").follow(task) {
                    Ok(added) => println!("Added {} images from {}", added, directory.display()),
                    Err(e) => {
                        warn!("Could not scan {}: {}", directory.display(), e);
                        eprintln!("Could not scan {}: {}", directory.display(), e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                return Err(anyhow!(
                    "{} of {} directories could not be scanned",
                    failed,
                    directories.len()
                ));
            }
        }

        Commands::Import { files } => {
            let files: Vec<PathBuf> = files.iter().map(|file| absolute(file)).collect();
            let added = ProgressTracker::new("Importing").follow(catalog.spawn_add_files(files))?;
            println!("Added {} images", added);
        }

        Commands::Rescan => {
            let added = ProgressTracker::new("Rescanning").follow(catalog.spawn_rescan())?;
            println!("Added {} images", added);
        }

        Commands::List(args) => list(catalog, args),

        Commands::Tag { action } => match action {
            TagAction::Add { tag, files } => {
                for_each_photo(&files, |path| catalog.add_tag(path, &tag))?;
            }
            TagAction::Remove { tag, files } => {
                for_each_photo(&files, |path| catalog.remove_tag(path, &tag))?;
            }
            TagAction::Clear { files } => {
                for_each_photo(&files, |path| catalog.remove_all_tags(path))?;
            }
        },

        Commands::Favorite { files, unset } => {
            for_each_photo(&files, |path| catalog.set_favorite(path, !unset))?;
        }

        Commands::Caption { file, text } => {
            let caption = text.filter(|text| !text.is_empty());
            catalog.set_caption(&absolute(&file), caption)?;
        }

        Commands::Rotate { files, left, .. } => {
            for_each_photo(&files, |path| {
                if left {
                    catalog.rotate_left(path)
                } else {
                    catalog.rotate_right(path)
                }
            })?;
        }

        Commands::Delete { files } => {
            let files: Vec<PathBuf> = files.iter().map(|file| absolute(file)).collect();
            let removed = catalog.delete_items(&files);
            println!("Removed {} photos from the catalog", removed);
        }

        Commands::Duplicates => {
            let groups = catalog.duplicate_groups();
            for group in &groups {
                println!("{:08x} ({} copies)", group.hash, group.members.len());
                for member in &group.members {
                    let marker = if *member == group.canonical { "*" } else { " " };
                    println!("  {} {}", marker, member.display());
                }
            }
            println!(
                "{} photos, {} distinct, {} duplicate groups",
                catalog.size(),
                catalog.num_distinct(),
                groups.len()
            );
        }

        Commands::Tags { top, most_used } => {
            let counts = catalog.all_tags();
            let tags = if most_used {
                catalog.most_used_tags(top)
            } else {
                catalog.top_tags(top)
            };
            for tag in tags {
                println!("{:>6}  {}", counts.get(&tag).copied().unwrap_or(0), tag);
            }
        }

        Commands::Refresh => {
            let refreshed = ProgressTracker::new("Refreshing").follow(catalog.spawn_refresh_all())?;
            println!("Refreshed {} images", refreshed);
        }

        Commands::Clear => {
            catalog.clear();
            println!("Catalog cleared");
        }

        Commands::GenerateConfig { .. } => {}
    }

    Ok(())
}

fn list(catalog: &Arc<Catalog>, args: ListArgs) {
    let filter = Filter {
        favorites_only: args.favorites,
        missing_only: args.missing,
        tagged_only: args.tagged,
        untagged_only: args.untagged,
        tag: args.tag,
        duplicates_only: args.duplicates,
        canonical_only: args.canonical,
        non_canonical_only: args.extra_copies,
    };
    let direction = if args.desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    let view = CatalogView::with_options(
        Arc::clone(catalog),
        filter,
        args.sort.map(SortKey::from),
        direction,
    );

    for row in view.rows() {
        println!("{}", format_row(row));
    }
    println!("Total = {} images.", view.len());
}

fn format_row(row: &ViewRow) -> String {
    let photo = &row.photo;
    let favorite = if photo.is_favorite() { '*' } else { ' ' };
    let status = if photo.is_missing() {
        "missing"
    } else if photo.is_invalid() {
        "invalid"
    } else {
        ""
    };
    let copies = if row.duplicates > 1 {
        format!("x{}", row.duplicates)
    } else {
        String::new()
    };

    let mut line = format!(
        "{} {:<4} {:>4} {:<7} {}",
        favorite,
        copies,
        photo.normalized_rotation(),
        status,
        photo.path().display()
    );
    if !photo.tags().is_empty() {
        line.push_str(&format!("  [{}]", photo.tags().join(", ")));
    }
    if let Some(caption) = photo.caption() {
        line.push_str(&format!("  \"{}\"", caption));
    }
    line
}

/// Apply `update` to each photo, warning about files that are not cataloged
fn for_each_photo<F>(files: &[PathBuf], mut update: F) -> anyhow::Result<()>
where
    F: FnMut(&Path) -> phototag_core::Result<bool>,
{
    let mut missing = 0;
    for file in files {
        let path = absolute(file);
        match update(&path) {
            Ok(_) => {}
            Err(Error::PhotoNotFound(path)) => {
                warn!("Not in catalog: {}", path.display());
                eprintln!("Not in catalog: {}", path.display());
                missing += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    if missing == files.len() {
        return Err(anyhow!("None of the given files are in the catalog"));
    }
    Ok(())
}

/// Resolve `path` the way scans record it, falling back to the path as given
fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn test_catalog() -> Arc<Catalog> {
        let config = Config {
            threads: 2,
            generate_thumbnails: false,
            ..Default::default()
        };
        Arc::new(Catalog::new(config).unwrap())
    }

    #[test]
    fn test_failed_scan_keeps_earlier_directories() {
        let dir = tempdir().unwrap();
        let pictures = dir.path().join("pictures");
        fs::create_dir_all(&pictures).unwrap();
        fs::write(pictures.join("a.jpg"), b"alpha").unwrap();
        let db = dir.path().join("photos.json");

        let catalog = test_catalog();
        let command = Commands::Scan {
            directories: vec![pictures.clone(), dir.path().join("gone")],
        };
        assert!(run_and_save(command, &catalog, &db).is_err());
        assert_eq!(catalog.size(), 1);
        assert!(!catalog.was_changed_since_save());

        let restored = test_catalog();
        load_catalog(&restored, &db).unwrap();
        assert_eq!(restored.size(), 1);
        assert_eq!(restored.search_roots(), vec![absolute(&pictures)]);
    }

    #[test]
    fn test_rescan_uses_roots_from_an_earlier_run() {
        let dir = tempdir().unwrap();
        let pictures = dir.path().join("pictures");
        fs::create_dir_all(&pictures).unwrap();
        fs::write(pictures.join("a.jpg"), b"alpha").unwrap();
        let db = dir.path().join("photos.json");

        let command = Commands::Scan {
            directories: vec![pictures.clone()],
        };
        run_and_save(command, &test_catalog(), &db).unwrap();

        fs::write(pictures.join("b.jpg"), b"beta").unwrap();
        let catalog = test_catalog();
        load_catalog(&catalog, &db).unwrap();
        run_and_save(Commands::Rescan, &catalog, &db).unwrap();
        assert_eq!(catalog.size(), 2);
    }
}
