//! Content-hash index used to flag duplicate photos.
//!
//! Every distinct hash maps to the photo that was inserted first with that
//! hash (the canonical copy) and the number of photos sharing it. The index
//! only supports insertion; removals are handled by rebuilding it over the
//! surviving photos, since dropping the canonical copy changes which photo
//! represents the group.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::photo::Photo;

/// Canonical copy and copy count for one content hash
#[derive(Debug, Clone, PartialEq, Eq)]
struct DuplicateEntry {
    /// Path of the first photo inserted with this hash
    canonical: PathBuf,

    /// Number of photos sharing this hash
    count: usize,
}

/// A group of photos with identical content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub hash: u32,
    pub canonical: PathBuf,
    /// All members in catalog order, canonical included
    pub members: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    entries: HashMap<u32, DuplicateEntry>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from photos in iteration order
    pub fn build<'a>(photos: impl IntoIterator<Item = &'a Photo>) -> Self {
        let mut index = Self::new();
        for photo in photos {
            index.insert(photo);
        }
        index
    }

    /// Count `photo` under its hash, making it canonical if the hash is new
    pub fn insert(&mut self, photo: &Photo) {
        self.entries
            .entry(photo.hash())
            .and_modify(|entry| entry.count += 1)
            .or_insert_with(|| DuplicateEntry {
                canonical: photo.path().to_path_buf(),
                count: 1,
            });
    }

    /// Discard the current contents and re-insert `photos` in order
    pub fn rebuild<'a>(&mut self, photos: impl IntoIterator<Item = &'a Photo>) {
        self.entries.clear();
        for photo in photos {
            self.insert(photo);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of photos sharing `photo`'s hash, 0 if the hash is not indexed
    pub fn num_duplicates(&self, photo: &Photo) -> usize {
        self.entries
            .get(&photo.hash())
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    /// Whether `photo` is the canonical copy for its hash
    pub fn is_canonical_copy(&self, photo: &Photo) -> bool {
        self.entries
            .get(&photo.hash())
            .map(|entry| entry.canonical.as_path() == photo.path())
            .unwrap_or(false)
    }

    /// Number of distinct hashes
    pub fn num_distinct(&self) -> usize {
        self.entries.len()
    }

    /// Group `photos` by hash, keeping only hashes with more than one copy
    pub fn groups<'a>(&self, photos: impl IntoIterator<Item = &'a Photo>) -> Vec<DuplicateGroup> {
        let mut groups: Vec<DuplicateGroup> = Vec::new();
        let mut positions: HashMap<u32, usize> = HashMap::new();

        for photo in photos {
            let Some(entry) = self.entries.get(&photo.hash()) else {
                continue;
            };
            if entry.count < 2 {
                continue;
            }
            let position = *positions.entry(photo.hash()).or_insert_with(|| {
                groups.push(DuplicateGroup {
                    hash: photo.hash(),
                    canonical: entry.canonical.clone(),
                    members: Vec::with_capacity(entry.count),
                });
                groups.len() - 1
            });
            groups[position].members.push(photo.path().to_path_buf());
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::PhotoRecord;

    fn photo(path: &str, hash: u32) -> Photo {
        PhotoRecord {
            hash,
            ..PhotoRecord::new(path)
        }
        .into_photo()
    }

    #[test]
    fn test_first_inserted_is_canonical() {
        let a = photo("/photos/a.jpg", 7);
        let b = photo("/photos/b.jpg", 7);
        let index = DuplicateIndex::build([&a, &b]);

        assert!(index.is_canonical_copy(&a));
        assert!(!index.is_canonical_copy(&b));
        assert_eq!(index.num_duplicates(&a), 2);
        assert_eq!(index.num_duplicates(&b), 2);
        assert_eq!(index.num_distinct(), 1);
    }

    #[test]
    fn test_unknown_hash_reports_zero() {
        let a = photo("/photos/a.jpg", 1);
        let stranger = photo("/photos/other.jpg", 2);
        let index = DuplicateIndex::build([&a]);

        assert_eq!(index.num_duplicates(&stranger), 0);
        assert!(!index.is_canonical_copy(&stranger));
    }

    #[test]
    fn test_rebuild_reassigns_canonical() {
        let a = photo("/photos/a.jpg", 9);
        let b = photo("/photos/b.jpg", 9);
        let c = photo("/photos/c.jpg", 9);
        let mut index = DuplicateIndex::build([&a, &b, &c]);
        assert!(index.is_canonical_copy(&a));

        index.rebuild([&b, &c]);
        assert!(index.is_canonical_copy(&b));
        assert!(!index.is_canonical_copy(&c));
        assert_eq!(index.num_duplicates(&c), 2);
        assert_eq!(index.num_distinct(), 1);
    }

    #[test]
    fn test_groups_skip_unique_hashes() {
        let a = photo("/photos/a.jpg", 1);
        let b = photo("/photos/b.jpg", 2);
        let c = photo("/photos/c.jpg", 1);
        let index = DuplicateIndex::build([&a, &b, &c]);

        let groups = index.groups([&a, &b, &c]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].hash, 1);
        assert_eq!(groups[0].canonical, PathBuf::from("/photos/a.jpg"));
        assert_eq!(
            groups[0].members,
            vec![PathBuf::from("/photos/a.jpg"), PathBuf::from("/photos/c.jpg")]
        );
    }
}
