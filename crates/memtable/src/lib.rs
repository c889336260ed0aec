//! In-memory, sorted, mutable write buffer sitting in front of segment files.
//!
//! A `MemTable` holds every mutation applied to a logical name since the
//! last checkpoint, including tombstones for deletes: readers need to be
//! able to tell "never written" apart from "written, then deleted" so that
//! a tombstone can mask a live value still sitting in the segment file.
//!
//! Snapshots (`snapshot_all`/`snapshot_range`) copy the sorted key set out
//! from under the lock before iterating, so a long-running scan never holds
//! the lock and two snapshots taken at different times need not agree with
//! each other.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// One slot in the table: a live value or a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Option<Vec<u8>>,
}

impl Entry {
    pub fn live(value: Vec<u8>) -> Self {
        Entry { value: Some(value) }
    }

    pub fn tombstone() -> Self {
        Entry { value: None }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// Sorted in-memory map guarded by a reader-writer lock.
///
/// The lock only protects the map's internal consistency; the rule that at
/// most one writer applies mutations at a time is enforced by the engine's
/// single-writer apply path above this layer, not by this type.
#[derive(Debug, Default)]
pub struct MemTable {
    inner: RwLock<BTreeMap<Vec<u8>, Entry>>,
}

impl MemTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Writes a live entry. After this call, `try_get(key) == Some(value)`.
    pub fn upsert(&self, key: Vec<u8>, value: Vec<u8>) {
        self.inner.write().insert(key, Entry::live(value));
    }

    /// Writes a tombstone unconditionally, even if `key` was never seen.
    pub fn delete(&self, key: Vec<u8>) {
        self.inner.write().insert(key, Entry::tombstone());
    }

    /// `Some(value)` for a live entry, `None` if missing or tombstoned.
    pub fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.read().get(key).and_then(|e| e.value.clone())
    }

    /// The raw entry (live or tombstone), or `None` if `key` was never written.
    pub fn get_entry(&self, key: &[u8]) -> Option<Entry> {
        self.inner.read().get(key).cloned()
    }

    /// True iff `key` holds an exact tombstone (distinct from "absent").
    pub fn has_tombstone_exact(&self, key: &[u8]) -> bool {
        matches!(self.inner.read().get(key), Some(e) if e.is_tombstone())
    }

    /// Lex-ordered snapshot of every entry, optionally starting strictly
    /// after `after_exclusive`. The returned vector is a point-in-time copy;
    /// mutations after this call do not affect it.
    pub fn snapshot_all(&self, after_exclusive: Option<&[u8]>) -> Vec<(Vec<u8>, Entry)> {
        self.snapshot_range(None, None, after_exclusive)
    }

    /// Lex-ordered snapshot over `[from_inclusive, to_exclusive)`, optionally
    /// starting strictly after `after_exclusive`. `None` on either bound
    /// means unbounded on that side.
    pub fn snapshot_range(
        &self,
        from_inclusive: Option<&[u8]>,
        to_exclusive: Option<&[u8]>,
        after_exclusive: Option<&[u8]>,
    ) -> Vec<(Vec<u8>, Entry)> {
        let guard = self.inner.read();
        let lower = match from_inclusive {
            Some(b) => Bound::Included(b.to_vec()),
            None => Bound::Unbounded,
        };
        let upper = match to_exclusive {
            Some(b) => Bound::Excluded(b.to_vec()),
            None => Bound::Unbounded,
        };
        guard
            .range::<Vec<u8>, _>((lower, upper))
            .filter(|(k, _)| match after_exclusive {
                Some(after) => k.as_slice() > after,
                None => true,
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Atomically swaps in a fresh empty map and returns the frozen old one.
    /// This is the freeze half of a checkpoint's freeze-swap-merge step.
    pub fn swap(&self) -> BTreeMap<Vec<u8>, Entry> {
        std::mem::take(&mut *self.inner.write())
    }

    /// Clears the table in place, discarding its contents.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}
