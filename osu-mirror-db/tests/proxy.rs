// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Tests for writes routed through the background write proxy.
//!
//! The worker uses its own connection, so these run against a database file
//! in a temporary directory.

use osu_mirror_db::{
    ConcurrentStore, ConflictPolicy, DOWNLOADED_TABLE, DownloadedMarker, EntitySchema, Error,
    Field, FieldType, OpenMode, Record, Store, StoreOptions, Value,
};
use tempfile::TempDir;

fn sequence_schema() -> EntitySchema {
    EntitySchema::new(
        "seq",
        vec![
            Field::new("n", FieldType::Integer).not_null().primary_key(),
            Field::new("label", FieldType::Text),
        ],
    )
    .unwrap()
}

fn open(dir: &TempDir) -> ConcurrentStore {
    let mut store = ConcurrentStore::open(dir.path().join("db.sqlite"), StoreOptions::default()).unwrap();
    store.register_schema(sequence_schema()).unwrap();
    store.initialize_schemas().unwrap();
    store
}

/// Queued inserts land in submission order.
#[test]
fn test_writes_apply_in_submission_order() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let schema = sequence_schema();

    let mut pending = Vec::new();
    for n in 0..50 {
        let record = Record::new(&schema).with("n", n).with("label", format!("#{n}"));
        pending.push(store.insert(&record, ConflictPolicy::Abort).unwrap());
    }
    store.flush().unwrap();
    for write in pending {
        assert_eq!(write.wait().unwrap(), 1);
    }

    let rows = store.select(&Record::new(&schema)).unwrap();
    let order: Vec<_> = rows.iter().map(|r| r.get("n").cloned()).collect();
    let expected: Vec<_> = (0..50).map(|n| Some(Value::Integer(n))).collect();
    assert_eq!(order, expected);
}

/// A failing task is reported through its handle, and later tasks still run.
#[test]
fn test_failure_surfaces_through_handle() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let schema = sequence_schema();
    let record = Record::new(&schema).with("n", 1);

    store.insert(&record, ConflictPolicy::Abort).unwrap().wait().unwrap();
    let err = store
        .insert(&record, ConflictPolicy::Abort)
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(matches!(err, Error::WorkerTask { .. }));
    assert!(err.is_constraint_violation());

    let next = Record::new(&schema).with("n", 2);
    store.insert(&next, ConflictPolicy::Abort).unwrap().wait().unwrap();
    assert_eq!(store.count("seq").unwrap(), 2);
}

/// A batch that fails part way leaves none of its rows behind, even though
/// the worker commits right after it.
#[test]
fn test_failed_batch_is_rolled_back() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let schema = sequence_schema();
    let existing = Record::new(&schema).with("n", 3);
    store.insert(&existing, ConflictPolicy::Abort).unwrap().wait().unwrap();

    let records: Vec<Record<'_>> = (1..=4).map(|n| Record::new(&schema).with("n", n)).collect();
    let err = store
        .insert_many(&records, ConflictPolicy::Abort)
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(err.is_constraint_violation(), "got {err:?}");
    assert_eq!(store.count("seq").unwrap(), 1);

    let next = Record::new(&schema).with("n", 9);
    store.insert(&next, ConflictPolicy::Abort).unwrap().wait().unwrap();
    let rows = store.select(&Record::new(&schema)).unwrap();
    let order: Vec<_> = rows.iter().map(|r| r.get("n").cloned()).collect();
    assert_eq!(order, [Some(Value::Integer(3)), Some(Value::Integer(9))]);
}

/// A table's batch stays committed when the next table's batch fails.
#[test]
fn test_batches_before_a_failing_one_stay_committed() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let schema = sequence_schema();
    let existing = Record::new(&schema).with("n", 2);
    store.insert(&existing, ConflictPolicy::Abort).unwrap().wait().unwrap();

    let records = vec![
        DownloadedMarker::downloaded(10).to_record(),
        DownloadedMarker::downloaded(20).to_record(),
        Record::new(&schema).with("n", 1),
        Record::new(&schema).with("n", 2),
    ];
    let err = store
        .insert_many(&records, ConflictPolicy::Abort)
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(matches!(err, Error::WorkerTask { .. }));

    assert_eq!(store.count(DOWNLOADED_TABLE).unwrap(), 2);
    assert!(store.is_group_downloaded(20).unwrap());
    assert_eq!(store.count("seq").unwrap(), 1);
}

/// Missing required fields are reported before anything is queued.
#[test]
fn test_missing_required_field_is_synchronous() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let schema = sequence_schema();

    let err = store
        .insert(&Record::new(&schema).with("label", "no key"), ConflictPolicy::Abort)
        .unwrap_err();
    assert!(matches!(err, Error::MissingRequiredField { .. }));
    store.flush().unwrap();
    assert_eq!(store.count("seq").unwrap(), 0);
}

/// Markers queued through the proxy are visible to reads after a flush,
/// and to a separate connection once the store is gone.
#[test]
fn test_flagged_sets_visible_after_flush() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db.sqlite");
    {
        let store = open(&dir);
        let (marker, pending) = store.flag_as_downloaded(42, ConflictPolicy::Ignore).unwrap();
        assert_eq!(marker, DownloadedMarker::downloaded(42));
        let (_, again) = store.flag_as_downloaded("42", ConflictPolicy::Ignore).unwrap();

        let (markers, bulk) = store
            .bulk_flag_as_downloaded([7_i64, 8, 42], ConflictPolicy::Ignore)
            .unwrap();
        assert_eq!(markers.len(), 3);

        assert_eq!(pending.wait().unwrap(), 1);
        assert_eq!(again.wait().unwrap(), 0);
        assert_eq!(bulk.wait().unwrap(), 2);

        assert!(store.is_group_downloaded(42).unwrap());
        assert!(store.call_immediate(|s| s.is_group_downloaded(7)).unwrap());
        assert_eq!(store.count(DOWNLOADED_TABLE).unwrap(), 3);
    }

    let reopened = Store::open(&path, OpenMode::ReadWrite, StoreOptions::default()).unwrap();
    assert!(reopened.is_group_downloaded(8).unwrap());
}

/// Dropping the store commits what was queued without waiting.
#[test]
fn test_drop_commits_fire_and_forget_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db.sqlite");
    {
        let store = open(&dir);
        let schema = sequence_schema();
        for n in 0..5 {
            let record = Record::new(&schema).with("n", n);
            drop(store.insert(&record, ConflictPolicy::Abort).unwrap());
        }
    }

    let mut reopened = Store::open(&path, OpenMode::ReadWrite, StoreOptions::default()).unwrap();
    reopened.register_schema(sequence_schema()).unwrap();
    assert_eq!(reopened.count("seq").unwrap(), 5);
}
