use super::*;
use crate::DatabaseBuilder;
use config::{IndexDescriptor, RowDescriptor, TableOptions, Value};
use tempfile::TempDir;

fn row(id: u32, email: &str) -> Vec<u8> {
    let mut bytes = id.to_le_bytes().to_vec();
    bytes.extend_from_slice(email.as_bytes());
    bytes
}

fn users_descriptor() -> RowDescriptor {
    RowDescriptor::new(|row: &[u8]| row[0..4].to_vec()).with_index(IndexDescriptor::new(
        "email",
        true,
        |row: &[u8]| Value::Str(String::from_utf8_lossy(&row[4..]).into_owned()),
    ))
}

fn open(dir: &TempDir) -> Database {
    DatabaseBuilder::new(dir.path())
        .register_table("users", users_descriptor(), TableOptions::default())
        .open()
        .unwrap()
}

// -------------------- upsert / get round trip --------------------

#[test]
fn upsert_then_get_round_trips() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    assert_eq!(db.get("users", &1u32.to_le_bytes()).unwrap(), Some(row(1, "a@x.com")));
}

#[test]
fn upsert_same_pk_replaces_value() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    db.upsert("users", &row(1, "a2@x.com")).unwrap();
    assert_eq!(db.get("users", &1u32.to_le_bytes()).unwrap(), Some(row(1, "a2@x.com")));
}

// -------------------- unique index enforcement --------------------

#[test]
fn upsert_rejects_duplicate_unique_value() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    let err = db.upsert("users", &row(2, "a@x.com")).unwrap_err();
    assert!(matches!(err, WalnutError::UniqueViolation { .. }));
    // The failed upsert must not have left row 2 behind.
    assert_eq!(db.get("users", &2u32.to_le_bytes()).unwrap(), None);
}

#[test]
fn upsert_rejected_by_unique_violation_releases_its_reservation() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    let _ = db.upsert("users", &row(2, "a@x.com"));
    // Row 1 can still be re-upserted with the same email afterward (its own
    // reservation was never released, but a later same-owner upsert must
    // not self-deadlock against a leftover reservation from the rejected
    // attempt).
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    assert_eq!(db.get("users", &1u32.to_le_bytes()).unwrap(), Some(row(1, "a@x.com")));
}

#[test]
fn changing_unique_value_to_a_free_one_succeeds_and_frees_the_old_one() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    db.upsert("users", &row(1, "b@x.com")).unwrap();
    // a@x.com is free again.
    db.upsert("users", &row(2, "a@x.com")).unwrap();
    assert_eq!(db.get("users", &2u32.to_le_bytes()).unwrap(), Some(row(2, "a@x.com")));
}

#[test]
fn delete_then_reuse_of_unique_value_succeeds() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    db.delete("users", &1u32.to_le_bytes()).unwrap();
    db.upsert("users", &row(2, "a@x.com")).unwrap();
    assert_eq!(db.get("users", &2u32.to_le_bytes()).unwrap(), Some(row(2, "a@x.com")));
}

#[test]
fn unique_violation_survives_a_checkpoint() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    db.checkpoint().unwrap();
    let err = db.upsert("users", &row(2, "a@x.com")).unwrap_err();
    assert!(matches!(err, WalnutError::UniqueViolation { .. }));
}

// -------------------- delete --------------------

#[test]
fn delete_removes_row_and_its_index_entry() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    db.delete("users", &1u32.to_le_bytes()).unwrap();
    assert_eq!(db.get("users", &1u32.to_le_bytes()).unwrap(), None);

    let hint = crate::IndexHint {
        index: "email".to_string(),
        start: Some(Value::Str("a@x.com".to_string())),
        end: None,
        asc: true,
        skip: 0,
        take: 10,
    };
    assert!(db.query("users", &hint).unwrap().is_empty());
}

#[test]
fn delete_of_missing_row_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.delete("users", &99u32.to_le_bytes()).unwrap();
}

// -------------------- drop_table --------------------

#[test]
fn drop_table_clears_rows_and_frees_unique_values() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    db.checkpoint().unwrap();
    db.drop_table("users").unwrap();

    assert_eq!(db.get("users", &1u32.to_le_bytes()).unwrap(), None);
    assert!(!db.segment_path("users").exists());
    assert!(!db.segment_path("__index__users__email").exists());
}

#[test]
fn recreating_table_after_drop_allows_reusing_its_unique_values() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.upsert("users", &row(1, "a@x.com")).unwrap();
    db.checkpoint().unwrap();
    db.drop_table("users").unwrap();
    db.upsert("users", &row(2, "a@x.com")).unwrap();
    assert_eq!(db.get("users", &2u32.to_le_bytes()).unwrap(), Some(row(2, "a@x.com")));
}

// -------------------- transaction rollback --------------------

#[test]
fn dropping_an_uncommitted_transaction_runs_rollbacks() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    {
        let ran = ran.clone();
        let mut tx = db.begin();
        tx.add_rollback(move || ran.store(true, std::sync::atomic::Ordering::SeqCst));
        // tx dropped here without commit
    }
    assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
}

#[test]
fn committed_transaction_does_not_run_rollbacks() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let ran_clone = ran.clone();
    let mut tx = db.begin();
    tx.add_rollback(move || ran_clone.store(true, std::sync::atomic::Ordering::SeqCst));
    tx.commit(Durability::Safe).unwrap();
    assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
}
