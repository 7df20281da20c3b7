//! Filtered, sorted presentation of a catalog.
//!
//! A [`CatalogView`] keeps a row list derived from a catalog snapshot. The
//! rows are recomputed from scratch whenever the filter or the sort changes
//! and when the catalog reports a structural change. A change to a single
//! photo only refreshes that photo's row.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crossbeam::channel::Receiver;

use crate::catalog::{Catalog, DuplicateIndex};
use crate::events::CatalogEvent;
use crate::photo::Photo;

/// Which photos a view shows. Every enabled condition must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub favorites_only: bool,
    pub missing_only: bool,
    pub tagged_only: bool,
    pub untagged_only: bool,

    /// Only photos carrying this tag
    pub tag: Option<String>,

    /// Only photos whose content appears more than once
    pub duplicates_only: bool,

    /// Hide extra copies, keeping the canonical one
    pub canonical_only: bool,

    /// Only extra copies
    pub non_canonical_only: bool,
}

impl Filter {
    pub fn matches(&self, photo: &Photo, duplicates: &DuplicateIndex) -> bool {
        if self.favorites_only && !photo.is_favorite() {
            return false;
        }
        if self.missing_only && !photo.is_missing() {
            return false;
        }
        if self.tagged_only && photo.tags().is_empty() {
            return false;
        }
        if self.untagged_only && !photo.tags().is_empty() {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !photo.has_tag(tag) {
                return false;
            }
        }
        if self.duplicates_only && duplicates.num_duplicates(photo) <= 1 {
            return false;
        }
        if self.canonical_only && !duplicates.is_canonical_copy(photo) {
            return false;
        }
        if self.non_canonical_only && duplicates.is_canonical_copy(photo) {
            return false;
        }
        true
    }

    /// True when no condition is enabled
    pub fn is_empty(&self) -> bool {
        *self == Filter::default()
    }
}

pub type Comparator = Arc<dyn Fn(&Photo, &Photo) -> Ordering + Send + Sync>;

/// Ordering applied to view rows
#[derive(Clone)]
pub enum SortKey {
    /// Full path, so same-named files sort by folder
    FileName,
    LastModified,
    FileSize,
    /// Non-favorites first
    Favorite,
    /// Lexicographic over each photo's tag list
    Tags,
    /// Copies of the same content together, canonical copy last
    DuplicateGroups,
    /// Photos without a capture date first
    CaptureDate,
    Custom(Comparator),
}

impl SortKey {
    fn compare(&self, a: &ViewRow, b: &ViewRow) -> Ordering {
        match self {
            Self::FileName => a.photo.path().cmp(b.photo.path()),
            Self::LastModified => a.photo.last_modified().cmp(&b.photo.last_modified()),
            Self::FileSize => a.photo.file_size().cmp(&b.photo.file_size()),
            Self::Favorite => a.photo.is_favorite().cmp(&b.photo.is_favorite()),
            Self::Tags => a.photo.tags().cmp(b.photo.tags()),
            Self::DuplicateGroups => {
                (a.photo.hash(), a.canonical).cmp(&(b.photo.hash(), b.canonical))
            }
            Self::CaptureDate => a.photo.original_date().cmp(&b.photo.original_date()),
            Self::Custom(compare) => compare(&a.photo, &b.photo),
        }
    }
}

impl fmt::Debug for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileName => write!(f, "FileName"),
            Self::LastModified => write!(f, "LastModified"),
            Self::FileSize => write!(f, "FileSize"),
            Self::Favorite => write!(f, "Favorite"),
            Self::Tags => write!(f, "Tags"),
            Self::DuplicateGroups => write!(f, "DuplicateGroups"),
            Self::CaptureDate => write!(f, "CaptureDate"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One displayed photo with its duplicate status
#[derive(Debug, Clone)]
pub struct ViewRow {
    pub photo: Photo,

    /// Number of photos with the same content, itself included
    pub duplicates: usize,

    /// Whether this is the canonical copy of its content
    pub canonical: bool,
}

impl ViewRow {
    fn new(photo: Photo, duplicates: &DuplicateIndex) -> Self {
        Self {
            duplicates: duplicates.num_duplicates(&photo),
            canonical: duplicates.is_canonical_copy(&photo),
            photo,
        }
    }
}

/// Filtered and sorted rows of a catalog, owned by a single display thread
pub struct CatalogView {
    catalog: Arc<Catalog>,
    events: Receiver<CatalogEvent>,
    filter: Filter,
    sort: Option<SortKey>,
    direction: SortDirection,
    rows: Vec<ViewRow>,
}

impl CatalogView {
    /// A view over `catalog` showing every photo in catalog order
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_options(catalog, Filter::default(), None, SortDirection::Ascending)
    }

    /// A view with its filter and ordering set up front, computed once
    pub fn with_options(
        catalog: Arc<Catalog>,
        filter: Filter,
        sort: Option<SortKey>,
        direction: SortDirection,
    ) -> Self {
        let events = catalog.subscribe();
        let mut view = Self {
            catalog,
            events,
            filter,
            sort,
            direction,
            rows: Vec::new(),
        };
        view.recompute();
        view
    }

    pub fn rows(&self) -> &[ViewRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.recompute();
    }

    pub fn sort(&self) -> Option<&SortKey> {
        self.sort.as_ref()
    }

    /// `None` keeps catalog order
    pub fn set_sort(&mut self, sort: Option<SortKey>) {
        self.sort = sort;
        self.recompute();
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.direction
    }

    pub fn set_sort_direction(&mut self, direction: SortDirection) {
        self.direction = direction;
        self.recompute();
    }

    /// Rebuild the rows from a fresh catalog snapshot
    pub fn recompute(&mut self) {
        let snapshot = self.catalog.snapshot();
        let duplicates = &snapshot.duplicates;

        let mut rows: Vec<ViewRow> = snapshot
            .photos
            .into_iter()
            .filter(|photo| self.filter.matches(photo, duplicates))
            .map(|photo| ViewRow::new(photo, duplicates))
            .collect();

        if let Some(key) = &self.sort {
            rows.sort_by(|a, b| key.compare(a, b));
        }
        if self.direction == SortDirection::Descending {
            rows.reverse();
        }

        self.rows = rows;
    }

    /// Apply one catalog notification
    pub fn handle_event(&mut self, event: &CatalogEvent) {
        match event {
            CatalogEvent::Changed => self.recompute(),
            CatalogEvent::PhotoChanged(path) => self.refresh_row(path),
        }
    }

    /// Drain queued catalog notifications, recomputing at most once. Returns
    /// the number of notifications handled.
    pub fn process_events(&mut self) -> usize {
        let pending: Vec<CatalogEvent> = self.events.try_iter().collect();
        if pending.contains(&CatalogEvent::Changed) {
            self.recompute();
        } else {
            for event in &pending {
                self.handle_event(event);
            }
        }
        pending.len()
    }

    fn refresh_row(&mut self, path: &Path) {
        let Some(row) = self.rows.iter_mut().find(|row| row.photo.path() == path) else {
            return;
        };
        if let Some(photo) = self.catalog.photo(path) {
            row.photo = photo;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Result;
    use crate::metadata::{MetadataReader, MetadataTag};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    struct NoMetadata;

    impl MetadataReader for NoMetadata {
        fn read_tags(&self, _path: &Path) -> Result<Vec<MetadataTag>> {
            Ok(Vec::new())
        }
    }

    fn catalog_with(dir: &TempDir, files: &[(&str, &[u8])]) -> (Arc<Catalog>, Vec<PathBuf>) {
        let config = Config {
            threads: 2,
            generate_thumbnails: false,
            ..Default::default()
        };
        let catalog = Arc::new(Catalog::with_reader(config, Arc::new(NoMetadata)).unwrap());
        let paths: Vec<PathBuf> = files
            .iter()
            .map(|(name, content)| {
                let path = dir.path().join(name);
                fs::write(&path, content).unwrap();
                path
            })
            .collect();
        catalog.add_files(&paths);
        (catalog, paths)
    }

    fn row_paths(view: &CatalogView) -> Vec<PathBuf> {
        view.rows()
            .iter()
            .map(|row| row.photo.path().to_path_buf())
            .collect()
    }

    #[test]
    fn test_filters_are_combined() {
        let dir = tempdir().unwrap();
        let (catalog, paths) = catalog_with(
            &dir,
            &[
                ("fav_tagged.jpg", b"1"),
                ("fav.jpg", b"2"),
                ("tagged.jpg", b"3"),
                ("plain.jpg", b"4"),
            ],
        );
        catalog.set_favorite(&paths[0], true).unwrap();
        catalog.add_tag(&paths[0], "x").unwrap();
        catalog.set_favorite(&paths[1], true).unwrap();
        catalog.add_tag(&paths[2], "x").unwrap();

        let mut view = CatalogView::new(catalog);
        assert_eq!(view.len(), 4);

        view.set_filter(Filter {
            favorites_only: true,
            tagged_only: true,
            ..Default::default()
        });
        assert_eq!(row_paths(&view), vec![paths[0].clone()]);

        view.set_filter(Filter {
            untagged_only: true,
            ..Default::default()
        });
        assert_eq!(row_paths(&view), vec![paths[1].clone(), paths[3].clone()]);

        view.set_filter(Filter {
            tag: Some("x".to_string()),
            ..Default::default()
        });
        assert_eq!(row_paths(&view), vec![paths[0].clone(), paths[2].clone()]);
    }

    #[test]
    fn test_duplicate_filters() {
        let dir = tempdir().unwrap();
        let (catalog, paths) = catalog_with(
            &dir,
            &[("a.jpg", b"same"), ("b.jpg", b"same"), ("c.jpg", b"other")],
        );
        let mut view = CatalogView::new(catalog);

        view.set_filter(Filter {
            duplicates_only: true,
            ..Default::default()
        });
        assert_eq!(row_paths(&view), vec![paths[0].clone(), paths[1].clone()]);
        assert!(view.rows().iter().all(|row| row.duplicates == 2));

        view.set_filter(Filter {
            canonical_only: true,
            ..Default::default()
        });
        assert_eq!(row_paths(&view), vec![paths[0].clone(), paths[2].clone()]);

        view.set_filter(Filter {
            non_canonical_only: true,
            ..Default::default()
        });
        assert_eq!(row_paths(&view), vec![paths[1].clone()]);
    }

    #[test]
    fn test_descending_reverses_ascending() {
        let dir = tempdir().unwrap();
        let (catalog, _) = catalog_with(
            &dir,
            &[("b.jpg", b"12"), ("c.jpg", b"1"), ("a.jpg", b"123")],
        );
        let mut view = CatalogView::new(catalog);

        view.set_sort(Some(SortKey::FileName));
        let ascending = row_paths(&view);
        assert!(ascending[0].ends_with("a.jpg"));

        view.set_sort_direction(SortDirection::Descending);
        let mut descending = row_paths(&view);
        descending.reverse();
        assert_eq!(descending, ascending);

        view.set_sort(Some(SortKey::FileSize));
        assert!(view.rows()[0].photo.path().ends_with("a.jpg"));
    }

    #[test]
    fn test_descending_without_sort_key_reverses_catalog_order() {
        let dir = tempdir().unwrap();
        let (catalog, paths) = catalog_with(
            &dir,
            &[("a.jpg", b"1"), ("b.jpg", b"2"), ("c.jpg", b"3")],
        );
        let mut view = CatalogView::new(catalog.clone());

        view.set_sort_direction(SortDirection::Descending);
        assert!(view.sort().is_none());
        assert_eq!(
            row_paths(&view),
            vec![paths[2].clone(), paths[1].clone(), paths[0].clone()]
        );

        let view = CatalogView::with_options(
            catalog,
            Filter::default(),
            None,
            SortDirection::Descending,
        );
        assert_eq!(row_paths(&view)[0], paths[2]);
    }

    #[test]
    fn test_file_name_sort_uses_full_path() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        fs::create_dir_all(dir.path().join("y")).unwrap();
        let (catalog, paths) = catalog_with(
            &dir,
            &[("y/a.jpg", b"1"), ("x/b.jpg", b"2"), ("x/a.jpg", b"3")],
        );

        let view = CatalogView::with_options(
            catalog,
            Filter::default(),
            Some(SortKey::FileName),
            SortDirection::Ascending,
        );
        assert_eq!(
            row_paths(&view),
            vec![paths[2].clone(), paths[1].clone(), paths[0].clone()]
        );
    }

    #[test]
    fn test_duplicate_grouping_puts_canonical_last() {
        let dir = tempdir().unwrap();
        let (catalog, paths) = catalog_with(
            &dir,
            &[("a.jpg", b"same"), ("b.jpg", b"other"), ("c.jpg", b"same")],
        );
        let mut view = CatalogView::new(catalog);
        view.set_sort(Some(SortKey::DuplicateGroups));

        let rows = row_paths(&view);
        let a = rows.iter().position(|p| *p == paths[0]).unwrap();
        let c = rows.iter().position(|p| *p == paths[2]).unwrap();
        assert_eq!(a, c + 1);
    }

    #[test]
    fn test_custom_sort() {
        let dir = tempdir().unwrap();
        let (catalog, paths) = catalog_with(&dir, &[("a.jpg", b"1"), ("b.jpg", b"2")]);
        let mut view = CatalogView::new(catalog);

        view.set_sort(Some(SortKey::Custom(Arc::new(|a, b| b.path().cmp(a.path())))));
        assert_eq!(row_paths(&view), vec![paths[1].clone(), paths[0].clone()]);
    }

    #[test]
    fn test_events_update_rows() {
        let dir = tempdir().unwrap();
        let (catalog, paths) = catalog_with(&dir, &[("a.jpg", b"1"), ("b.jpg", b"2")]);
        let mut view = CatalogView::new(catalog.clone());
        view.set_filter(Filter {
            untagged_only: true,
            ..Default::default()
        });

        // A per-photo change refreshes the row without filtering it out
        catalog.add_tag(&paths[0], "x").unwrap();
        assert_eq!(view.process_events(), 1);
        assert_eq!(view.len(), 2);
        assert!(view.rows()[0].photo.has_tag("x"));

        // A structural change recomputes
        catalog.delete_items(&[&paths[1]]);
        view.process_events();
        assert!(view.is_empty());
    }
}
