use super::*;

#[test]
fn first_reservation_succeeds() {
    let reg = UniqueGuardRegistry::new();
    assert!(reg.try_reserve("idx_email", b"a@x", b"pk1", |_| true));
    assert!(reg.is_owner("idx_email", b"a@x", b"pk1"));
}

#[test]
fn same_owner_reserving_again_succeeds() {
    let reg = UniqueGuardRegistry::new();
    assert!(reg.try_reserve("idx_email", b"a@x", b"pk1", |_| true));
    assert!(reg.try_reserve("idx_email", b"a@x", b"pk1", |_| true));
}

#[test]
fn distinct_pk_reserving_live_prefix_fails() {
    let reg = UniqueGuardRegistry::new();
    assert!(reg.try_reserve("idx_email", b"a@x", b"pk1", |_| true));
    assert!(!reg.try_reserve("idx_email", b"a@x", b"pk2", |_| true));
    assert!(reg.is_owner("idx_email", b"a@x", b"pk1"));
}

#[test]
fn stale_owner_is_swept_and_reservation_succeeds() {
    let reg = UniqueGuardRegistry::new();
    assert!(reg.try_reserve("idx_email", b"a@x", b"pk1", |_| true));
    // pk1 no longer owns the row; still_owns reports false.
    assert!(reg.try_reserve("idx_email", b"a@x", b"pk2", |owner| owner != b"pk1"));
    assert!(reg.is_owner("idx_email", b"a@x", b"pk2"));
}

#[test]
fn release_only_succeeds_for_current_owner() {
    let reg = UniqueGuardRegistry::new();
    reg.try_reserve("idx_email", b"a@x", b"pk1", |_| true);
    reg.release("idx_email", b"a@x", b"pk2");
    assert!(reg.is_owner("idx_email", b"a@x", b"pk1"));
    reg.release("idx_email", b"a@x", b"pk1");
    assert!(!reg.is_owner("idx_email", b"a@x", b"pk1"));
}

#[test]
fn different_prefixes_are_independent() {
    let reg = UniqueGuardRegistry::new();
    assert!(reg.try_reserve("idx_email", b"a@x", b"pk1", |_| true));
    assert!(reg.try_reserve("idx_email", b"b@x", b"pk2", |_| true));
    assert!(reg.is_owner("idx_email", b"a@x", b"pk1"));
    assert!(reg.is_owner("idx_email", b"b@x", b"pk2"));
}

#[test]
fn different_indices_with_same_prefix_are_independent() {
    let reg = UniqueGuardRegistry::new();
    assert!(reg.try_reserve("idx_email", b"v", b"pk1", |_| true));
    assert!(reg.try_reserve("idx_phone", b"v", b"pk2", |_| true));
    assert!(reg.is_owner("idx_email", b"v", b"pk1"));
    assert!(reg.is_owner("idx_phone", b"v", b"pk2"));
}

#[test]
fn clear_for_index_only_removes_that_index() {
    let reg = UniqueGuardRegistry::new();
    reg.try_reserve("idx_email", b"a@x", b"pk1", |_| true);
    reg.try_reserve("idx_phone", b"555", b"pk1", |_| true);
    reg.clear_for_index("idx_email");
    assert!(!reg.is_owner("idx_email", b"a@x", b"pk1"));
    assert!(reg.is_owner("idx_phone", b"555", b"pk1"));
}

#[test]
fn seed_overwrites_without_owner_check() {
    let reg = UniqueGuardRegistry::new();
    reg.seed("idx_email", b"a@x", b"pk1");
    reg.seed("idx_email", b"a@x", b"pk2");
    assert!(reg.is_owner("idx_email", b"a@x", b"pk2"));
    assert!(!reg.is_owner("idx_email", b"a@x", b"pk1"));
}

#[test]
fn empty_registry_reports_empty() {
    let reg = UniqueGuardRegistry::new();
    assert!(reg.is_empty());
    reg.try_reserve("idx_email", b"a@x", b"pk1", |_| true);
    assert_eq!(reg.len(), 1);
}
