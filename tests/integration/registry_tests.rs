use std::fs;
use std::path::Path;

use dlpwatch::registry::{RecordSource, Registry};
use tempfile::tempdir;

#[test]
fn test_records_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested/state/hash_store.db");

    let id = {
        let registry = Registry::open(&db).unwrap();
        registry
            .upsert("report.pdf", "h1", "blake3", Path::new("/secure"))
            .unwrap()
            .id
    };

    let reopened = Registry::open(&db).unwrap();
    let record = reopened.find_by_hash("h1").unwrap().unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.filename, "report.pdf");
    assert_eq!(record.hash_algorithm, "blake3");
    assert_eq!(record.expected_path(), Path::new("/secure/report.pdf"));
}

#[test]
fn test_hash_is_unique_key() {
    let registry = Registry::in_memory().unwrap();
    registry
        .upsert("a.pdf", "h1", "blake3", Path::new("/one"))
        .unwrap();
    registry
        .upsert("b.pdf", "h1", "blake3", Path::new("/two"))
        .unwrap();
    registry
        .upsert("c.pdf", "h2", "blake3", Path::new("/two"))
        .unwrap();

    assert_eq!(registry.count().unwrap(), 2);
    let h1 = registry.find_by_hash("h1").unwrap().unwrap();
    assert_eq!(h1.filename, "b.pdf");
    assert_eq!(h1.allowed_directory, Path::new("/two"));
}

#[test]
fn test_list_is_newest_first_and_delete_by_id() {
    let registry = Registry::in_memory().unwrap();
    let first = registry
        .upsert("a.pdf", "h1", "blake3", Path::new("/s"))
        .unwrap();
    let second = registry
        .upsert("b.pdf", "h2", "blake3", Path::new("/s"))
        .unwrap();

    let ids: Vec<i64> = registry.list().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(registry.list_all().unwrap().len(), 2);

    assert!(registry.delete(first.id).unwrap());
    assert!(!registry.delete(first.id).unwrap());
    assert!(registry.find_by_hash("h1").unwrap().is_none());
    assert_eq!(registry.count().unwrap(), 1);
}

#[test]
fn test_open_rejects_non_database_file() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hash_store.db");
    fs::write(&db, b"this is not sqlite, just some text padding it out").unwrap();

    assert!(Registry::open(&db).is_err());
}
