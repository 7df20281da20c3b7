mod common;

use std::fs;

use common::*;
use phototag_core::{Error, ProgressSender};
use tempfile::tempdir;

#[test]
fn test_save_and_load_restores_persisted_fields() {
    let dir = tempdir().unwrap();
    let a = create_jpeg(dir.path(), "a.jpg", 10);
    let b = copy_file(&a, dir.path(), "b.jpg");
    let c = create_jpeg(dir.path(), "c.jpg", 99);

    let catalog = test_catalog();
    catalog.add_files(&[&a, &b, &c]);
    catalog.set_favorite(&a, true).unwrap();
    catalog.set_caption(&b, Some("Copy of a".to_string())).unwrap();
    catalog.add_tag(&c, "lake").unwrap();
    catalog.add_tag(&a, "lake").unwrap();
    catalog.rotate_right(&c).unwrap();

    let db = dir.path().join("db.json");
    catalog.save_to_file(&db).unwrap();
    assert!(!catalog.was_changed_since_save());

    let restored = test_catalog();
    let task = restored.spawn_load_from_file(&db);
    assert_eq!(task.wait().unwrap(), 3);

    assert_eq!(persisted_fields(&restored), persisted_fields(&catalog));
    assert!(!restored.was_changed_since_save());

    // Indices are rebuilt and transient state recomputed
    assert_eq!(restored.num_distinct(), 2);
    assert_eq!(restored.tag_count("lake"), 2);
    let photo = restored.photo(&a).unwrap();
    assert!(restored.is_canonical_copy(&photo));
    assert!(photo.thumbnail().is_some());
    assert!(!photo.is_missing());
}

#[test]
fn test_loading_twice_skips_present_photos() {
    let dir = tempdir().unwrap();
    let a = create_jpeg(dir.path(), "a.jpg", 10);
    let catalog = test_catalog();
    catalog.import_file(&a);

    let mut out = Vec::new();
    catalog.write(&mut out).unwrap();

    let events = catalog.subscribe();
    let added = catalog.read(out.as_slice(), &ProgressSender::detached()).unwrap();
    assert_eq!(added, 0);
    assert_eq!(catalog.size(), 1);
    // One notification even when nothing was added
    assert_eq!(events.try_iter().count(), 1);
}

#[test]
fn test_load_reports_missing_files() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("db.json");
    fs::write(
        &db,
        r#"[
            {
                "file": "/gone/photo.jpg",
                "favorite": true,
                "lastModified": "2020-01-02T03:04:05Z",
                "hash": 42,
                "tags": ["old"],
                "originalDate": "2019-12-31T23:59:00",
                "thumbnailCache": "ignored"
            }
        ]"#,
    )
    .unwrap();

    let catalog = test_catalog();
    let added = catalog
        .load_from_file(&db, &ProgressSender::detached())
        .unwrap();
    assert_eq!(added, 1);

    let photo = catalog.get().remove(0);
    assert!(photo.is_missing());
    assert!(photo.is_favorite());
    assert_eq!(photo.hash(), 42);
    assert_eq!(photo.tags(), &["old".to_string()]);
    assert_eq!(photo.width(), -1);
    assert!(photo.original_date().is_some());
    assert_eq!(catalog.tag_count("old"), 1);
}

#[test]
fn test_malformed_catalog_is_an_error() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("db.json");
    fs::write(&db, "{ \"not\": \"an array\" }").unwrap();

    let catalog = test_catalog();
    let result = catalog.load_from_file(&db, &ProgressSender::detached());
    assert!(matches!(result, Err(Error::Json(_))));
    assert!(catalog.is_empty());
}

#[test]
fn test_save_overwrites_previous_file() {
    let dir = tempdir().unwrap();
    let a = create_jpeg(dir.path(), "a.jpg", 10);
    let b = create_jpeg(dir.path(), "b.jpg", 20);
    let db = dir.path().join("db.json");

    let catalog = test_catalog();
    catalog.add_files(&[&a, &b]);
    catalog.save_to_file(&db).unwrap();

    catalog.delete_items(&[&a]);
    assert!(catalog.was_changed_since_save());
    catalog.save_to_file(&db).unwrap();

    let restored = test_catalog();
    restored
        .load_from_file(&db, &ProgressSender::detached())
        .unwrap();
    assert_eq!(restored.size(), 1);
    assert!(restored.contains(&b));
    assert!(!dir.path().join("db.json.tmp").exists());
}

#[test]
fn test_search_roots_survive_save_and_load() {
    let dir = tempdir().unwrap();
    let pictures = dir.path().join("pictures");
    fs::create_dir_all(&pictures).unwrap();
    create_jpeg(&pictures, "a.jpg", 10);
    let db = dir.path().join("photos.json");

    let catalog = test_catalog();
    catalog
        .add_search_root(&pictures, &ProgressSender::detached())
        .unwrap();
    catalog.save_to_file(&db).unwrap();
    assert!(dir.path().join("photos.roots.json").exists());

    // A later session picks up files added since the scan
    create_jpeg(&pictures, "b.jpg", 20);
    let restored = test_catalog();
    restored
        .load_from_file(&db, &ProgressSender::detached())
        .unwrap();
    assert_eq!(restored.search_roots(), vec![pictures.clone()]);
    assert!(!restored.was_changed_since_save());

    let task = restored.spawn_rescan();
    assert_eq!(task.wait().unwrap(), 1);
    assert_eq!(restored.size(), 2);
    assert!(restored.contains(&pictures.join("b.jpg")));
}

#[test]
fn test_catalog_without_roots_file_loads() {
    let dir = tempdir().unwrap();
    let a = create_jpeg(dir.path(), "a.jpg", 10);
    let db = dir.path().join("photos.json");

    let catalog = test_catalog();
    catalog.import_file(&a);
    catalog.save_to_file(&db).unwrap();
    fs::remove_file(dir.path().join("photos.roots.json")).unwrap();

    let restored = test_catalog();
    let added = restored
        .load_from_file(&db, &ProgressSender::detached())
        .unwrap();
    assert_eq!(added, 1);
    assert!(restored.search_roots().is_empty());
}
