//! Tests for the record store.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use super::*;
use crate::audit::AuditEntry;
use crate::principal::Principal;
use crate::record::NewRecord;

/// Helper to create a temporary on-disk store for testing.
fn temp_store() -> (RegisterStore, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("test_register.db");
    let store = RegisterStore::open(&path).expect("failed to open store");
    (store, dir)
}

fn new_record(code: &str, name: &str) -> NewRecord {
    NewRecord {
        code: code.to_string(),
        name: name.to_string(),
        district: "North".to_string(),
        taluk: "Central".to_string(),
        designation: "Lecturer".to_string(),
        group: "A".to_string(),
        branch: "Science".to_string(),
        sanctioned: 50,
        working: 45,
        deputation: 2,
        deputation_target_code: None,
        remarks: None,
    }
}

#[test]
fn create_and_find() {
    let (store, _dir) = temp_store();

    let created = store
        .create(new_record("COL001", "Alpha"), "admin-1")
        .expect("create must succeed");
    assert_eq!(created.vacant, 3, "vacant derived at create time");

    let found = store.find_by_code("COL001").expect("record must exist");
    assert_eq!(found.code, "COL001");
    assert_eq!(found.name, "Alpha");
    assert_eq!(found.sanctioned, 50);
    assert_eq!(found.working, 45);
    assert_eq!(found.vacant, 3);
    assert_eq!(found.deputation, 2);
    assert_eq!(found.last_modified_by, "admin-1");
}

#[test]
fn in_memory_store() {
    let store = RegisterStore::in_memory().expect("failed to create in-memory store");

    let stats = store.stats().expect("failed to get stats");
    assert_eq!(stats.record_count, 0);
    assert_eq!(stats.audit_entry_count, 0);
}

#[test]
fn duplicate_code_rejected() {
    let store = RegisterStore::in_memory().expect("store");
    store
        .create(new_record("COL001", "Alpha"), "admin-1")
        .expect("first create must succeed");

    let err = store
        .create(new_record("COL001", "Beta"), "admin-1")
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { ref code } if code == "COL001"));
}

#[test]
fn find_missing_code() {
    let store = RegisterStore::in_memory().expect("store");
    let err = store.find_by_code("COL404").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { ref code } if code == "COL404"));
}

#[test]
fn find_all_orders_by_name_and_paginates() {
    let store = RegisterStore::in_memory().expect("store");
    store
        .create(new_record("COL003", "Charlie"), "admin-1")
        .expect("create");
    store
        .create(new_record("COL001", "Alpha"), "admin-1")
        .expect("create");
    store
        .create(new_record("COL002", "Beta"), "admin-1")
        .expect("create");

    let page = store
        .find_all(&RecordFilter::default(), 1, 2)
        .expect("list must succeed");
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].name, "Alpha");
    assert_eq!(page.items[1].name, "Beta");

    let page = store
        .find_all(&RecordFilter::default(), 2, 2)
        .expect("second page");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "Charlie");
}

#[test]
fn find_all_clamps_page_and_limit() {
    let store = RegisterStore::in_memory().expect("store");
    store
        .create(new_record("COL001", "Alpha"), "admin-1")
        .expect("create");

    let page = store
        .find_all(&RecordFilter::default(), 0, 0)
        .expect("clamped list");
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, 1);

    let page = store
        .find_all(&RecordFilter::default(), 1, 10_000)
        .expect("clamped list");
    assert_eq!(page.limit, MAX_PAGE_LIMIT);
}

#[test]
fn find_all_filters() {
    let store = RegisterStore::in_memory().expect("store");
    let mut southern = new_record("GPT001", "Delta");
    southern.district = "South".to_string();
    store.create(southern, "admin-1").expect("create");
    store
        .create(new_record("COL001", "Alpha"), "admin-1")
        .expect("create");

    let filter = RecordFilter {
        district: Some("South".to_string()),
        ..RecordFilter::default()
    };
    let page = store.find_all(&filter, 1, 10).expect("filtered list");
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].code, "GPT001");

    let filter = RecordFilter {
        code_prefix: Some("COL".to_string()),
        ..RecordFilter::default()
    };
    let page = store.find_all(&filter, 1, 10).expect("prefix list");
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].code, "COL001");
}

#[test]
fn conditional_update_roundtrip() {
    let store = RegisterStore::in_memory().expect("store");
    let mut record = store
        .create(new_record("COL001", "Alpha"), "admin-1")
        .expect("create");

    record.working = 40;
    record.vacant = 8;
    record.last_modified_by = "college-1".to_string();
    store
        .conditional_update(&record)
        .expect("update must succeed");

    let found = store.find_by_code("COL001").expect("record");
    assert_eq!(found.working, 40);
    assert_eq!(found.vacant, 8);
    assert_eq!(found.last_modified_by, "college-1");
}

#[test]
fn conditional_update_missing_record() {
    let store = RegisterStore::in_memory().expect("store");
    let record = new_record("COL404", "Ghost").into_record("admin-1", Utc::now());

    let err = store.conditional_update(&record).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { ref code } if code == "COL404"));
}

#[test]
fn delete_record() {
    let store = RegisterStore::in_memory().expect("store");
    store
        .create(new_record("COL001", "Alpha"), "admin-1")
        .expect("create");

    store.delete("COL001").expect("delete must succeed");
    assert!(store.find_by_code("COL001").is_err());

    let err = store.delete("COL001").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn audit_entries_filter_and_order() {
    let store = RegisterStore::in_memory().expect("store");
    let actor = Principal::admin("admin-1");

    let mut first = AuditEntry::record_created("COL001", &actor, "10.0.0.1");
    first.created_at = Utc::now() - Duration::minutes(10);
    let mut second = AuditEntry::record_created("COL002", &actor, "10.0.0.1");
    second.created_at = Utc::now() - Duration::minutes(5);
    let third = AuditEntry::record_created("COL001", &actor, "10.0.0.1");

    for entry in [&first, &second, &third] {
        store.append_audit(entry).expect("append must succeed");
    }

    // Newest first, no filter.
    let page = store
        .audit_entries(&AuditFilter::default(), 1, 10)
        .expect("list");
    assert_eq!(page.total, 3);
    assert_eq!(page.items[0].record_code, "COL001");
    assert_eq!(page.items[1].record_code, "COL002");

    // By record code.
    let filter = AuditFilter {
        record_code: Some("COL001".to_string()),
        ..AuditFilter::default()
    };
    let page = store.audit_entries(&filter, 1, 10).expect("list");
    assert_eq!(page.total, 2);

    // By date range: only the two recent entries.
    let filter = AuditFilter {
        from: Some(Utc::now() - Duration::minutes(7)),
        ..AuditFilter::default()
    };
    let page = store.audit_entries(&filter, 1, 10).expect("list");
    assert_eq!(page.total, 2);
}

#[test]
fn stats_count_both_tables() {
    let store = RegisterStore::in_memory().expect("store");
    let actor = Principal::admin("admin-1");

    store
        .create(new_record("COL001", "Alpha"), "admin-1")
        .expect("create");
    store
        .append_audit(&AuditEntry::record_created("COL001", &actor, "10.0.0.1"))
        .expect("append");

    let stats = store.stats().expect("stats");
    assert_eq!(stats.record_count, 1);
    assert_eq!(stats.audit_entry_count, 1);
}

#[test]
fn reopen_preserves_rows() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("register.db");

    {
        let store = RegisterStore::open(&path).expect("open");
        store
            .create(new_record("COL001", "Alpha"), "admin-1")
            .expect("create");
    }

    let store = RegisterStore::open(&path).expect("reopen");
    let found = store.find_by_code("COL001").expect("record survives reopen");
    assert_eq!(found.name, "Alpha");
}
