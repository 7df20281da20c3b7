//! The photo catalog.
//!
//! A [`Catalog`] owns the photos in insertion order together with two derived
//! indices: a duplicate index keyed by content hash and a tag index counting
//! how many photos carry each tag. All of it lives behind one mutex so the
//! indices never disagree with the photo list. Readers get copies, never the
//! lock or the containers.
//!
//! Scans, bulk imports, loads and refreshes have a blocking form taking a
//! [`ProgressSender`] and a `spawn_*` form that runs the same work on the
//! catalog's worker pool and returns a [`Task`].

mod duplicates;
mod tags;

pub use duplicates::{DuplicateGroup, DuplicateIndex};
pub use tags::TagIndex;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam::channel::Receiver;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::Config;
use crate::discovery::for_each_image;
use crate::error::{Error, Result};
use crate::events::{CatalogEvent, EventBus};
use crate::logging::{log_catalog_change, log_file_error};
use crate::metadata::{ExifMetadataReader, MetadataReader};
use crate::persistence::{
    read_records, read_search_roots, search_roots_path, write_records, write_search_roots,
    PhotoRecord,
};
use crate::photo::Photo;
use crate::tasks::{ProgressSender, Task, WorkerPool};

/// Consistent copy of the photos and the duplicate index, taken under one
/// lock
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub photos: Vec<Photo>,
    pub duplicates: DuplicateIndex,
}

#[derive(Default)]
struct CatalogState {
    photos: Vec<Photo>,
    positions: HashMap<PathBuf, usize>,
    search_roots: Vec<PathBuf>,
    duplicates: DuplicateIndex,
    tags: TagIndex,
}

impl CatalogState {
    fn contains(&self, path: &Path) -> bool {
        self.positions.contains_key(path)
    }

    /// Append `photo` and index it. Returns false if its path is present.
    fn insert(&mut self, photo: Photo) -> bool {
        if self.contains(photo.path()) {
            return false;
        }
        self.duplicates.insert(&photo);
        for tag in photo.tags() {
            self.tags.increment(tag);
        }
        self.positions.insert(photo.path().to_path_buf(), self.photos.len());
        self.photos.push(photo);
        true
    }

    fn reindex_positions(&mut self) {
        self.positions = self
            .photos
            .iter()
            .enumerate()
            .map(|(index, photo)| (photo.path().to_path_buf(), index))
            .collect();
    }

    /// Returns false if `directory` is already recorded
    fn add_search_root(&mut self, directory: &Path) -> bool {
        if self.search_roots.iter().any(|root| root == directory) {
            return false;
        }
        self.search_roots.push(directory.to_path_buf());
        true
    }

    fn clear(&mut self) {
        self.photos.clear();
        self.positions.clear();
        self.search_roots.clear();
        self.duplicates.clear();
        self.tags.clear();
    }
}

/// A collection of photos with duplicate and tag indices
pub struct Catalog {
    config: Config,
    reader: Arc<dyn MetadataReader>,
    state: Mutex<CatalogState>,
    events: EventBus,
    changed_since_save: AtomicBool,
    workers: WorkerPool,
}

impl Catalog {
    /// Create an empty catalog reading metadata from EXIF
    pub fn new(config: Config) -> Result<Self> {
        Self::with_reader(config, Arc::new(ExifMetadataReader::new()))
    }

    /// Create an empty catalog with a custom metadata source
    pub fn with_reader(config: Config, reader: Arc<dyn MetadataReader>) -> Result<Self> {
        config.validate()?;
        let workers = WorkerPool::new(config.worker_threads())?;
        debug!("Catalog created with {} worker threads", workers.threads());

        Ok(Self {
            config,
            reader,
            state: Mutex::new(CatalogState::default()),
            events: EventBus::new(),
            changed_since_save: AtomicBool::new(false),
            workers,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Receive every future change notification on a channel
    pub fn subscribe(&self) -> Receiver<CatalogEvent> {
        self.events.subscribe_channel()
    }

    // -- Import --

    /// Add one file. Returns false, doing nothing, if the path is already
    /// cataloged. Does not notify; callers batching imports notify once.
    pub fn import_file(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if self.lock().contains(path) {
            return false;
        }

        // Reading the file happens outside the lock
        let photo = Photo::from_file(path, &self.config, self.reader.as_ref());
        let added = self.lock().insert(photo);
        if added {
            self.mark_changed();
        }
        added
    }

    /// Import every file in `files`, in order, then notify once. Returns the
    /// number of photos added.
    pub fn add_files<P>(&self, files: &[P]) -> usize
    where
        P: AsRef<Path> + Sync,
    {
        let pending: Vec<PathBuf> = {
            let state = self.lock();
            files
                .iter()
                .map(|file| file.as_ref().to_path_buf())
                .filter(|path| !state.contains(path))
                .collect()
        };

        let photos: Vec<Photo> = self.workers.install(|| {
            pending
                .par_iter()
                .map(|path| Photo::from_file(path, &self.config, self.reader.as_ref()))
                .collect()
        });

        let added = self.insert_all(photos);
        if added > 0 {
            self.mark_changed();
        }
        log_catalog_change("add files", added, None);
        self.notify();
        added
    }

    /// [`Catalog::add_files`] on the worker pool
    pub fn spawn_add_files(self: &Arc<Self>, files: Vec<PathBuf>) -> Task<usize> {
        let catalog = Arc::clone(self);
        self.workers.spawn("add files", move |progress| {
            progress.send(format!("Importing {} files...", files.len()));
            let added = catalog.add_files(&files);
            progress.send(format!("Total = {} images.", catalog.size()));
            Ok(added)
        })
    }

    /// Record `directory` as a search root and import every image below it.
    /// Returns the number of photos added.
    pub fn add_search_root(&self, directory: &Path, progress: &ProgressSender) -> Result<usize> {
        if !directory.is_dir() {
            return Err(Error::FileNotFound(directory.to_path_buf()));
        }

        if self.lock().add_search_root(directory) {
            self.mark_changed();
        }

        progress.send("Starting scan...");
        let added = self.scan_directory(directory, progress)?;
        progress.send(format!("Total = {} images.", self.size()));

        log_catalog_change("scan", added, Some(&directory.display().to_string()));
        self.notify();
        Ok(added)
    }

    /// [`Catalog::add_search_root`] on the worker pool
    pub fn spawn_add_search_root(self: &Arc<Self>, directory: impl Into<PathBuf>) -> Task<usize> {
        let catalog = Arc::clone(self);
        let directory = directory.into();
        self.workers.spawn("add search root", move |progress| {
            catalog.add_search_root(&directory, progress)
        })
    }

    /// Walk every recorded search root again and import files not yet
    /// cataloged. Roots that no longer exist are skipped.
    pub fn rescan(&self, progress: &ProgressSender) -> Result<usize> {
        let roots = self.search_roots();
        progress.send("Starting scan...");

        let mut added = 0;
        for root in &roots {
            if !root.is_dir() {
                warn!("Search root no longer exists: {}", root.display());
                continue;
            }
            added += self.scan_directory(root, progress)?;
        }

        progress.send(format!("Total = {} images.", self.size()));
        log_catalog_change("rescan", added, None);
        self.notify();
        Ok(added)
    }

    /// [`Catalog::rescan`] on the worker pool
    pub fn spawn_rescan(self: &Arc<Self>) -> Task<usize> {
        let catalog = Arc::clone(self);
        self.workers.spawn("rescan", move |progress| catalog.rescan(progress))
    }

    fn scan_directory(&self, directory: &Path, progress: &ProgressSender) -> Result<usize> {
        let mut found = 0;
        let mut added = 0;
        for_each_image(directory, &self.config, |path| {
            found += 1;
            progress.send(format!("Found {} files.  Scanning...", found));
            if self.import_file(&path) {
                added += 1;
            }
        })?;
        Ok(added)
    }

    /// Insert in order, skipping paths already present. Does not mark the
    /// catalog changed.
    fn insert_all(&self, photos: Vec<Photo>) -> usize {
        let mut state = self.lock();
        let mut added = 0;
        for photo in photos {
            if state.insert(photo) {
                added += 1;
            }
        }
        added
    }

    // -- Removal and refresh --

    /// Remove the photos at `paths`, releasing their tags. The duplicate
    /// index is rebuilt over the survivors, so a deleted canonical copy is
    /// replaced by the earliest surviving copy. Returns the number removed.
    pub fn delete_items<P: AsRef<Path>>(&self, paths: &[P]) -> usize {
        let removed = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let targets: HashSet<&Path> = paths
                .iter()
                .map(|path| path.as_ref())
                .filter(|path| state.contains(path))
                .collect();

            if !targets.is_empty() {
                let tags = &mut state.tags;
                state.photos.retain_mut(|photo| {
                    if !targets.contains(photo.path()) {
                        return true;
                    }
                    for tag in photo.take_tags() {
                        tags.decrement(&tag);
                    }
                    false
                });
                state.duplicates.rebuild(&state.photos);
                state.reindex_positions();
            }
            targets.len()
        };

        if removed > 0 {
            self.mark_changed();
            log_catalog_change("delete", removed, None);
        }
        self.notify();
        removed
    }

    /// Re-read every photo from disk: thumbnail, missing and invalid flags,
    /// hash, size, modification time and metadata. User edits, including
    /// rotation, are kept. Returns the number of photos refreshed.
    pub fn refresh_all(&self, progress: &ProgressSender) -> usize {
        let photos = self.get();
        let total = photos.len();
        let done = AtomicUsize::new(0);

        let refreshed: Vec<Photo> = self.workers.install(|| {
            photos
                .into_par_iter()
                .map(|mut photo| {
                    photo.refresh(&self.config);
                    if !photo.is_missing() {
                        photo.read_metadata(self.reader.as_ref(), false);
                    }
                    let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                    progress.send(format!("Refreshed {} of {} images.", count, total));
                    photo
                })
                .collect()
        });

        let changed = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let mut changed = false;
            for fresh in refreshed {
                if let Some(&index) = state.positions.get(fresh.path()) {
                    changed |= state.photos[index].merge_disk_state(fresh);
                }
            }
            if self.config.rebuild_duplicates_on_refresh {
                state.duplicates.rebuild(&state.photos);
            }
            changed
        };

        if changed {
            self.mark_changed();
        }
        log_catalog_change("refresh", total, None);
        self.notify();
        total
    }

    /// [`Catalog::refresh_all`] on the worker pool
    pub fn spawn_refresh_all(self: &Arc<Self>) -> Task<usize> {
        let catalog = Arc::clone(self);
        self.workers
            .spawn("refresh", move |progress| Ok(catalog.refresh_all(progress)))
    }

    /// Remove every photo and search root
    pub fn clear(&self) {
        self.lock().clear();
        self.mark_changed();
        log_catalog_change("clear", 0, None);
        self.notify();
    }

    // -- Persistence --

    /// Write the catalog as a pretty-printed JSON array of photo records
    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let records: Vec<PhotoRecord> = self.lock().photos.iter().map(PhotoRecord::from).collect();
        write_records(writer, &records)
    }

    /// Load photo records from `reader`. Paths already cataloged are
    /// skipped; every loaded photo is refreshed from disk. Notifies once and
    /// returns the number of photos added.
    pub fn read<R: Read>(&self, reader: R, progress: &ProgressSender) -> Result<usize> {
        let records = read_records(reader)?;
        info!("Read {} images", records.len());

        let mut photos: Vec<Photo> = {
            let state = self.lock();
            records
                .into_iter()
                .filter(|record| !state.contains(&record.file))
                .map(PhotoRecord::into_photo)
                .collect()
        };

        let total = photos.len();
        let done = AtomicUsize::new(0);
        self.workers.install(|| {
            photos.par_iter_mut().for_each(|photo| {
                photo.refresh(&self.config);
                let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress.send(format!("Loaded {} of {} images.", count, total));
            })
        });

        let added = self.insert_all(photos);
        log_catalog_change("load", added, None);
        self.notify();
        Ok(added)
    }

    /// Save to `path`, creating its directory if needed, and the search
    /// roots next to it. Each file is replaced atomically. A successful save
    /// clears the changed flag; a failed one leaves it set.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let was_changed = self.changed_since_save.swap(false, Ordering::SeqCst);
        let result = write_atomically(path, |writer| self.write(writer)).and_then(|()| {
            let roots = self.search_roots();
            write_atomically(&search_roots_path(path), |writer| {
                write_search_roots(writer, &roots)
            })
        });
        match &result {
            Ok(()) => info!("Saved {} images to {}", self.size(), path.display()),
            Err(e) => {
                if was_changed {
                    self.mark_changed();
                }
                log_file_error(path, "save catalog", e);
            }
        }
        result
    }

    /// Load records from the catalog file at `path`, then the search roots
    /// saved next to it if there are any. A missing catalog file is reported
    /// as [`Error::FileNotFound`].
    pub fn load_from_file(&self, path: &Path, progress: &ProgressSender) -> Result<usize> {
        let file = open_existing(path)?;
        let added = self.read(BufReader::new(file), progress)?;

        let roots_path = search_roots_path(path);
        match open_existing(&roots_path) {
            Ok(file) => {
                let roots = read_search_roots(BufReader::new(file))?;
                let mut state = self.lock();
                for root in &roots {
                    state.add_search_root(root);
                }
                debug!("Restored {} search roots", roots.len());
            }
            Err(Error::FileNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        Ok(added)
    }

    /// [`Catalog::load_from_file`] on the worker pool
    pub fn spawn_load_from_file(self: &Arc<Self>, path: impl Into<PathBuf>) -> Task<usize> {
        let catalog = Arc::clone(self);
        let path = path.into();
        self.workers.spawn("load", move |progress| {
            let added = catalog.load_from_file(&path, progress)?;
            progress.send(format!("Total = {} images.", catalog.size()));
            Ok(added)
        })
    }

    pub fn was_changed_since_save(&self) -> bool {
        self.changed_since_save.load(Ordering::SeqCst)
    }

    pub fn clear_changed_since_save(&self) {
        self.changed_since_save.store(false, Ordering::SeqCst);
    }

    // -- Photo attributes --

    pub fn set_favorite(&self, path: &Path, favorite: bool) -> Result<bool> {
        self.update_photo(path, |photo, _| {
            let changed = photo.is_favorite() != favorite;
            photo.set_favorite(favorite);
            changed
        })
    }

    pub fn set_caption(&self, path: &Path, caption: Option<String>) -> Result<bool> {
        self.update_photo(path, |photo, _| {
            let changed = photo.caption() != caption.as_deref();
            photo.set_caption(caption);
            changed
        })
    }

    /// Set the display rotation in degrees
    pub fn set_rotation(&self, path: &Path, rotation: i32) -> Result<bool> {
        self.update_photo(path, |photo, _| {
            let changed = photo.rotation() != rotation;
            photo.set_rotation(rotation);
            changed
        })
    }

    /// Rotate 90 degrees counter-clockwise
    pub fn rotate_left(&self, path: &Path) -> Result<bool> {
        self.update_photo(path, |photo, _| {
            photo.set_rotation(photo.rotation() - 90);
            true
        })
    }

    /// Rotate 90 degrees clockwise
    pub fn rotate_right(&self, path: &Path) -> Result<bool> {
        self.update_photo(path, |photo, _| {
            photo.set_rotation(photo.rotation() + 90);
            true
        })
    }

    /// Returns false if the photo already had `tag`
    pub fn add_tag(&self, path: &Path, tag: &str) -> Result<bool> {
        self.update_photo(path, |photo, tags| {
            let added = photo.add_tag(tag);
            if added {
                tags.increment(tag);
            }
            added
        })
    }

    /// Returns false if the photo did not have `tag`
    pub fn remove_tag(&self, path: &Path, tag: &str) -> Result<bool> {
        self.update_photo(path, |photo, tags| {
            let removed = photo.remove_tag(tag);
            if removed {
                tags.decrement(tag);
            }
            removed
        })
    }

    pub fn remove_all_tags(&self, path: &Path) -> Result<bool> {
        self.update_photo(path, |photo, tags| {
            let removed = photo.take_tags();
            for tag in &removed {
                tags.decrement(tag);
            }
            !removed.is_empty()
        })
    }

    fn update_photo<F>(&self, path: &Path, update: F) -> Result<bool>
    where
        F: FnOnce(&mut Photo, &mut TagIndex) -> bool,
    {
        let changed = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let index = *state
                .positions
                .get(path)
                .ok_or_else(|| Error::PhotoNotFound(path.to_path_buf()))?;
            update(&mut state.photos[index], &mut state.tags)
        };

        if changed {
            self.mark_changed();
            self.events
                .emit(CatalogEvent::PhotoChanged(path.to_path_buf()));
        }
        Ok(changed)
    }

    // -- Queries --

    /// Number of photos sharing `photo`'s hash, 0 if it is not indexed
    pub fn num_duplicates(&self, photo: &Photo) -> usize {
        self.lock().duplicates.num_duplicates(photo)
    }

    pub fn is_canonical_copy(&self, photo: &Photo) -> bool {
        self.lock().duplicates.is_canonical_copy(photo)
    }

    /// Number of distinct content hashes
    pub fn num_distinct(&self) -> usize {
        self.lock().duplicates.num_distinct()
    }

    /// Every hash shared by two or more photos, in catalog order
    pub fn duplicate_groups(&self) -> Vec<DuplicateGroup> {
        let state = self.lock();
        state.duplicates.groups(&state.photos)
    }

    /// Every tag with the number of photos carrying it
    pub fn all_tags(&self) -> BTreeMap<String, usize> {
        self.lock().tags.all().clone()
    }

    pub fn tag_count(&self, tag: &str) -> usize {
        self.lock().tags.count(tag)
    }

    /// The first `n` tags in alphabetical order
    pub fn top_tags(&self, n: usize) -> Vec<String> {
        self.lock().tags.top(n)
    }

    /// The `n` most used tags
    pub fn most_used_tags(&self, n: usize) -> Vec<String> {
        self.lock().tags.most_used(n)
    }

    pub fn size(&self) -> usize {
        self.lock().photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    /// Copy of every photo, in catalog order
    pub fn get(&self) -> Vec<Photo> {
        self.lock().photos.clone()
    }

    pub fn photo(&self, path: &Path) -> Option<Photo> {
        let state = self.lock();
        state
            .positions
            .get(path)
            .map(|&index| state.photos[index].clone())
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.lock();
        CatalogSnapshot {
            photos: state.photos.clone(),
            duplicates: state.duplicates.clone(),
        }
    }

    pub fn search_roots(&self) -> Vec<PathBuf> {
        self.lock().search_roots.clone()
    }

    // -- Internal --

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_changed(&self) {
        self.changed_since_save.store(true, Ordering::SeqCst);
    }

    fn notify(&self) {
        self.events.emit(CatalogEvent::Changed);
    }
}

fn open_existing(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

/// Write through `<path>.tmp` and rename over `path`
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let written = File::create(&temp_path)
        .map_err(Error::from)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            Ok(())
        })
        .and_then(|()| fs::rename(&temp_path, path).map_err(Error::from));

    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}
