//! Freeze-swap-merge-replace-truncate checkpoint, and `defragment` (a full
//! index rebuild) (spec.md §4.6, SPEC_FULL §3.3).

use crate::index;
use crate::recovery;
use crate::state::TableState;
use crate::{Database, Result, TableEntry};
use config::Encryptor;
use memtable::Entry;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

impl Database {
    /// Runs steps 1-4 of spec.md §4.6: freeze every MemTable under the
    /// single-writer lock, merge each with its previous segment outside the
    /// lock, publish the merged segments, then flush and truncate the WAL.
    ///
    /// Idempotent: an all-empty freeze still re-publishes identical
    /// segments and truncates an already-empty WAL without error.
    pub fn checkpoint(&self) -> Result<()> {
        let frozen = self.freeze_all();

        for (name, frozen_mem) in frozen {
            self.merge_and_publish(&name, frozen_mem)?;
        }

        self.wal.flush()?;
        self.wal.truncate()?;
        Ok(())
    }

    /// Rebuilds every registered index from its base table's current rows,
    /// runs a checkpoint, then re-derives the unique-guard registry from the
    /// freshly published state (SPEC_FULL §3.3: `defragment` is a full
    /// rebuild, not an in-place compaction).
    pub fn defragment(&self) -> Result<()> {
        let descriptors: Vec<(String, Arc<TableEntry>)> = self
            .descriptors
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        for (table, entry) in &descriptors {
            for idx in &entry.descriptor.indices {
                index::rebuild_index(self, table, idx)?;
            }
        }

        self.checkpoint()?;
        recovery::seed_unique_guards(self)?;
        Ok(())
    }

    /// Step 1: under `apply_lock`, swaps every known logical name's
    /// MemTable with a fresh empty one and captures the frozen contents.
    fn freeze_all(&self) -> Vec<(String, BTreeMap<Vec<u8>, Entry>)> {
        let _guard = self.apply_lock.lock();
        let states: Vec<Arc<TableState>> = self.tables.read().values().cloned().collect();
        states
            .into_iter()
            .map(|state| (state.name.clone(), state.mem.swap()))
            .collect()
    }

    /// Steps 2-3 for a single logical name: build the merged stream (the
    /// unique-index strategy if this name is a registered unique index,
    /// otherwise the plain mask-by-key strategy) and publish it.
    fn merge_and_publish(&self, name: &str, frozen_mem: BTreeMap<Vec<u8>, Entry>) -> Result<()> {
        let state = self.table_state(name);
        let old_entries: Vec<(Vec<u8>, Vec<u8>)> = match state.segment.read().as_ref() {
            Some(reader) => reader.scan_range(None, None)?,
            None => Vec::new(),
        };

        let merged = if self.unique_index_names.read().contains(name) {
            merge_unique(&frozen_mem, old_entries)
        } else {
            let encryptor = self
                .descriptors
                .read()
                .get(name)
                .and_then(|e| e.options.encryption.clone());
            merge_normal(&frozen_mem, old_entries, name, encryptor.as_deref())
        };

        let path = self.segment_path(name);
        sstable::write_segment(&path, merged)?;
        let reader = sstable::SstReader::open(&path)?;
        *state.segment.write() = Some(reader);
        Ok(())
    }
}

/// Non-index / non-unique-index merge (spec.md §4.6 step 2a): Mem masks the
/// previous segment by exact key — a live entry overwrites, a tombstone
/// hides. New Mem values are plaintext and get encrypted on the way into
/// the segment; carried-over segment values are already ciphertext and are
/// passed through untouched.
fn merge_normal(
    frozen_mem: &BTreeMap<Vec<u8>, Entry>,
    old_entries: Vec<(Vec<u8>, Vec<u8>)>,
    name: &str,
    encryptor: Option<&dyn Encryptor>,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = old_entries.into_iter().collect();

    for (key, entry) in frozen_mem {
        match &entry.value {
            Some(plaintext) => {
                let on_disk = match encryptor {
                    Some(enc) => enc.encrypt(plaintext, name, key),
                    None => plaintext.clone(),
                };
                merged.insert(key.clone(), on_disk);
            }
            None => {
                merged.remove(key);
            }
        }
    }

    merged.into_iter().collect()
}

/// Unique-index merge (spec.md §4.6 step 2b): dedupe by `value_prefix`
/// (the composite key's prefix segment) — a live Mem entry wins the
/// prefix outright; otherwise the first segment record for that prefix
/// (in key order) wins, unless Mem holds an exact tombstone for it.
fn merge_unique(
    frozen_mem: &BTreeMap<Vec<u8>, Entry>,
    old_entries: Vec<(Vec<u8>, Vec<u8>)>,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut winner_by_prefix: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
    let mut mem_claimed_prefixes: HashSet<Vec<u8>> = HashSet::new();

    for (key, entry) in frozen_mem {
        if entry.is_tombstone() {
            continue;
        }
        let prefix = bytekey::extract_prefix(key);
        mem_claimed_prefixes.insert(prefix.clone());
        winner_by_prefix.entry(prefix).or_insert_with(|| key.clone());
    }

    for (key, _) in old_entries {
        let prefix = bytekey::extract_prefix(&key);
        if mem_claimed_prefixes.contains(&prefix) {
            continue;
        }
        if matches!(frozen_mem.get(&key), Some(entry) if entry.is_tombstone()) {
            continue;
        }
        winner_by_prefix.entry(prefix).or_insert_with(|| key.clone());
    }

    winner_by_prefix
        .into_values()
        .map(|key| (key, Vec::new()))
        .collect()
}
