use folio::storage::models::ObjectMeta;
use folio::storage::Database;

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

#[test]
fn test_put_and_get_object_meta() {
    let (_dir, db) = test_db();
    let meta = ObjectMeta::new(Some("image/webp"), 2048);

    db.put_object_meta("thumbnails/family.webp", &meta).unwrap();

    let loaded = db.get_object_meta("thumbnails/family.webp").unwrap().unwrap();
    assert_eq!(loaded.content_type.as_deref(), Some("image/webp"));
    assert_eq!(loaded.byte_size, 2048);
    assert_eq!(loaded.updated_at, meta.updated_at);
}

#[test]
fn test_get_missing_object_meta() {
    let (_dir, db) = test_db();
    assert!(db.get_object_meta("nope").unwrap().is_none());
}

#[test]
fn test_overwrite_object_meta() {
    let (_dir, db) = test_db();

    db.put_object_meta("data/gallery.json", &ObjectMeta::new(Some("text/plain"), 10))
        .unwrap();
    db.put_object_meta("data/gallery.json", &ObjectMeta::new(None, 20))
        .unwrap();

    let loaded = db.get_object_meta("data/gallery.json").unwrap().unwrap();
    assert_eq!(loaded.content_type, None);
    assert_eq!(loaded.byte_size, 20);
}

#[test]
fn test_object_meta_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");

    {
        let db = Database::open(&data_dir).unwrap();
        db.put_object_meta("full/a.png", &ObjectMeta::new(Some("image/png"), 3))
            .unwrap();
    }

    let db = Database::open(&data_dir).unwrap();
    let loaded = db.get_object_meta("full/a.png").unwrap().unwrap();
    assert_eq!(loaded.content_type.as_deref(), Some("image/png"));
}
