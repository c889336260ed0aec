//! Transactions, single-writer apply, and the upsert/delete/drop-table
//! protocols (spec.md §4.5, §4.8, §4.9).

use crate::naming;
use crate::{Database, Result, WalnutError};
use config::{Durability, IndexDescriptor};
use std::time::{Duration, Instant};

/// Bounded spin window for a contested unique-index reservation
/// (spec.md §4.8 step 1: "bounded spin, e.g. up to 300 ms").
const RESERVE_SPIN_WINDOW: Duration = Duration::from_millis(300);
const RESERVE_SPIN_BACKOFF: Duration = Duration::from_millis(2);

/// A staged set of WAL frames plus the in-memory mutations they represent.
/// Becomes visible only when [`Transaction::commit`] succeeds; dropping it
/// uncommitted runs every staged rollback in reverse order (spec.md §4.5).
pub struct Transaction<'db> {
    db: &'db Database,
    tx_id: u64,
    seq_no: u64,
    body_frames: Vec<u8>,
    ops_count: u32,
    applies: Vec<Box<dyn FnOnce() + Send + 'db>>,
    rollbacks: Vec<Box<dyn FnOnce() + Send + 'db>>,
    consumed: bool,
}

impl<'db> Transaction<'db> {
    /// Stages a `Put`: the WAL frame carries `wal_value` (ciphertext if the
    /// table is encrypted); the apply closure writes `plain_value` into the
    /// MemTable, which always holds plaintext.
    pub fn add_put(&mut self, table: &str, key: Vec<u8>, wal_value: Vec<u8>, plain_value: Vec<u8>) {
        self.body_frames
            .extend(wal::encode_put(self.tx_id, table, &key, &wal_value));
        self.ops_count += 1;
        let state = self.db.table_state(table);
        self.applies.push(Box::new(move || state.mem.upsert(key, plain_value)));
    }

    pub fn add_delete(&mut self, table: &str, key: Vec<u8>) {
        self.body_frames
            .extend(wal::encode_delete(self.tx_id, table, &key));
        self.ops_count += 1;
        let state = self.db.table_state(table);
        self.applies.push(Box::new(move || state.mem.delete(key)));
    }

    pub fn add_drop_table(&mut self, table: &str) {
        self.body_frames
            .extend(wal::encode_drop_table(self.tx_id, table));
        self.ops_count += 1;
    }

    pub fn add_apply(&mut self, f: impl FnOnce() + Send + 'db) {
        self.applies.push(Box::new(f));
    }

    pub fn add_rollback(&mut self, f: impl FnOnce() + Send + 'db) {
        self.rollbacks.push(Box::new(f));
    }

    fn run_rollbacks(&mut self) {
        for rollback in std::mem::take(&mut self.rollbacks).into_iter().rev() {
            rollback();
        }
    }

    /// Prepends `Begin`, appends `Commit`, submits to the WAL writer, and —
    /// once durability is satisfied — runs every staged apply closure under
    /// the single-writer lock. A WAL failure rolls back immediately instead
    /// of applying anything.
    pub fn commit(mut self, durability: Durability) -> Result<()> {
        let mut frames = wal::encode_begin(self.tx_id, self.seq_no);
        frames.extend(std::mem::take(&mut self.body_frames));
        frames.extend(wal::encode_commit(self.tx_id, self.ops_count));

        if let Err(e) = self.db.wal.append(frames, durability) {
            self.run_rollbacks();
            self.consumed = true;
            return Err(e.into());
        }

        {
            let _guard = self.db.apply_lock.lock();
            for apply in std::mem::take(&mut self.applies) {
                apply();
            }
        }
        self.consumed = true;
        Ok(())
    }
}

impl<'db> Drop for Transaction<'db> {
    fn drop(&mut self) {
        if !self.consumed {
            self.run_rollbacks();
        }
    }
}

impl Database {
    /// Starts a transaction: a random 64-bit `tx_id` and a monotonically
    /// increasing `seq_no` (spec.md §4.5).
    pub fn begin(&self) -> Transaction<'_> {
        Transaction {
            db: self,
            tx_id: rand::random(),
            seq_no: self.next_seq_no(),
            body_frames: Vec::new(),
            ops_count: 0,
            applies: Vec::new(),
            rollbacks: Vec::new(),
            consumed: false,
        }
    }

    /// Inserts or replaces a row, deriving its primary key from `row` via
    /// the table's registered [`config::RowDescriptor::pk_extract`] and
    /// maintaining every secondary index (spec.md §4.8).
    pub fn upsert(&self, table: &str, row: &[u8]) -> Result<()> {
        let entry = self.descriptor_for(table)?;
        let pk = (entry.descriptor.pk_extract)(row);
        let durability = entry.options.durability;
        let previous = self.get(table, &pk)?;

        let wal_value = match &entry.options.encryption {
            Some(enc) => enc.encrypt(row, table, &pk),
            None => row.to_vec(),
        };

        let mut tx = self.begin();
        let mut reserved: Vec<(String, Vec<u8>)> = Vec::new();

        for index in &entry.descriptor.indices {
            let idx_name = naming::index_table_name(table, &index.name);
            let current_value = (index.extract)(row);
            let new_prefix = bytekey::encode_value(&current_value, index.scale);

            if let Some(prefix) = &new_prefix {
                if index.unique {
                    if !self.reserve_unique_with_spin(&idx_name, prefix, &pk, table) {
                        self.release_all(&reserved, &pk);
                        return Err(WalnutError::UniqueViolation {
                            index: index.name.clone(),
                        });
                    }
                    reserved.push((idx_name.clone(), prefix.clone()));

                    // Steps 2+3 (spec.md §4.8): Mem-range then Segment-range
                    // (masked by Mem tombstones) for a conflicting pk under
                    // this prefix. `merged_range` folds both into one scan.
                    if self.check_unique_range(&idx_name, prefix, &pk)? {
                        self.release_all(&reserved, &pk);
                        return Err(WalnutError::UniqueViolation {
                            index: index.name.clone(),
                        });
                    }
                }

                let composite = bytekey::compose_index_entry(prefix, &pk);
                tx.add_put(&idx_name, composite, Vec::new(), Vec::new());
            }

            // Step 5: if the value changed, retract the stale composite and
            // release the stale reservation it held (if unique).
            //
            // Step 6 ("unique sweep" for any other pk sharing this prefix)
            // is a deliberate no-op here: step 1's reservation plus steps
            // 2-3's violation scan already prove no other live pk shares
            // `prefix` by the time we reach this point, so there is nothing
            // left to sweep.
            self.retract_previous_if_changed(
                &mut tx,
                &idx_name,
                index,
                &previous,
                &pk,
                new_prefix.as_deref(),
            );
        }

        tx.add_put(table, pk.clone(), wal_value, row.to_vec());

        for (idx_name, prefix) in reserved {
            let pk_owned = pk.clone();
            tx.add_rollback(move || self.guards.release(&idx_name, &prefix, &pk_owned));
        }

        tx.commit(durability)
    }

    /// Deletes a row by primary key, retracting every index composite it
    /// owned and releasing any unique reservations.
    pub fn delete(&self, table: &str, pk: &[u8]) -> Result<()> {
        let entry = self.descriptor_for(table)?;
        let previous = self.get(table, pk)?;

        let mut tx = self.begin();
        if let Some(prev_row) = &previous {
            for index in &entry.descriptor.indices {
                let idx_name = naming::index_table_name(table, &index.name);
                let prev_value = (index.extract)(prev_row);
                if let Some(prefix) = bytekey::encode_value(&prev_value, index.scale) {
                    let composite = bytekey::compose_index_entry(&prefix, pk);
                    tx.add_delete(&idx_name, composite);
                    if index.unique {
                        let pk_owned = pk.to_vec();
                        tx.add_apply(move || self.guards.release(&idx_name, &prefix, &pk_owned));
                    }
                }
            }
        }
        tx.add_delete(table, pk.to_vec());
        tx.commit(entry.options.durability)
    }

    /// Deletes a row given its full current value instead of its bare key,
    /// deriving the key the same way `upsert` does.
    pub fn delete_row(&self, table: &str, row: &[u8]) -> Result<()> {
        let entry = self.descriptor_for(table)?;
        let pk = (entry.descriptor.pk_extract)(row);
        self.delete(table, &pk)
    }

    /// Drop-table protocol (spec.md §4.9): a single `DropTable` WAL frame,
    /// then — atomically under the apply lock — clear every MemTable and
    /// segment reader for the table and its derived index tables, release
    /// their unique guards, and finally delete the now-unreferenced segment
    /// files from disk.
    pub fn drop_table(&self, table: &str) -> Result<()> {
        let entry = self.descriptor_for(table)?;
        let idx_names: Vec<String> = entry
            .descriptor
            .indices
            .iter()
            .map(|idx| naming::index_table_name(table, &idx.name))
            .collect();

        let mut tx = self.begin();
        tx.add_drop_table(table);

        let table_owned = table.to_string();
        let idx_names_for_apply = idx_names.clone();
        tx.add_apply(move || {
            let state = self.table_state(&table_owned);
            state.mem.clear();
            *state.segment.write() = None;
            for idx_name in &idx_names_for_apply {
                let idx_state = self.table_state(idx_name);
                idx_state.mem.clear();
                *idx_state.segment.write() = None;
                self.guards.clear_for_index(idx_name);
            }
        });

        tx.commit(Durability::Safe)?;

        self.delete_segment_files(table)?;
        for idx_name in &idx_names {
            self.delete_segment_files(idx_name)?;
        }
        Ok(())
    }

    fn delete_segment_files(&self, logical_name: &str) -> Result<()> {
        let path = self.segment_path(logical_name);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let mut sidecar = path.into_os_string();
        sidecar.push(".sxi");
        let sidecar = std::path::PathBuf::from(sidecar);
        if sidecar.exists() {
            std::fs::remove_file(&sidecar)?;
        }
        Ok(())
    }

    fn release_all(&self, reserved: &[(String, Vec<u8>)], pk: &[u8]) {
        for (idx_name, prefix) in reserved {
            self.guards.release(idx_name, prefix, pk);
        }
    }

    /// Bounded spin around [`uniqueguard::UniqueGuardRegistry::try_reserve`]:
    /// the registry's own internal retries only cover a *stale* owner, this
    /// loop covers a genuinely live contender that may release shortly.
    fn reserve_unique_with_spin(
        &self,
        idx_name: &str,
        prefix: &[u8],
        pk: &[u8],
        table: &str,
    ) -> bool {
        let deadline = Instant::now() + RESERVE_SPIN_WINDOW;
        loop {
            let still_owns = |owner: &[u8]| self.unique_owner_still_valid(table, idx_name, prefix, owner);
            if self.guards.try_reserve(idx_name, prefix, pk, still_owns) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(RESERVE_SPIN_BACKOFF);
        }
    }

    /// spec.md §4.4: a guard's owner is still valid only if it exists in the
    /// base table AND its index entry is still live in Mem ∪ Segment.
    fn unique_owner_still_valid(&self, table: &str, idx_name: &str, prefix: &[u8], owner_pk: &[u8]) -> bool {
        let Ok(Some(_)) = self.get(table, owner_pk) else {
            return false;
        };
        let composite = bytekey::compose_index_entry(prefix, owner_pk);
        matches!(self.get(idx_name, &composite), Ok(Some(_)))
    }

    /// True if some pk other than `pk` currently owns `prefix` in `idx_name`
    /// (spec.md §4.8 steps 2+3, folded into one Mem+Segment merged scan).
    fn check_unique_range(&self, idx_name: &str, prefix: &[u8], pk: &[u8]) -> Result<bool> {
        let header = bytekey::compose_index_entry(prefix, &[]);
        let upper = bytekey::prefix_upper_bound(&header);
        let composites = self.merged_range(idx_name, Some(&header), upper.as_deref(), None)?;
        for (composite, _) in composites {
            if bytekey::extract_pk(&composite) != pk {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Retracts `index`'s previous composite for `pk` if the indexed value
    /// changed since `previous` (spec.md §4.8 step 5).
    fn retract_previous_if_changed<'a>(
        &'a self,
        tx: &mut Transaction<'a>,
        idx_name: &str,
        index: &IndexDescriptor,
        previous: &Option<Vec<u8>>,
        pk: &[u8],
        new_prefix: Option<&[u8]>,
    ) {
        let Some(prev_row) = previous else {
            return;
        };
        let prev_value = (index.extract)(prev_row);
        let prev_prefix = bytekey::encode_value(&prev_value, index.scale);
        if prev_prefix.as_deref() == new_prefix {
            return;
        }
        if let Some(prev_prefix) = prev_prefix {
            let composite = bytekey::compose_index_entry(&prev_prefix, pk);
            tx.add_delete(idx_name, composite);
            if index.unique {
                let idx_name_owned = idx_name.to_string();
                let pk_owned = pk.to_vec();
                tx.add_apply(move || self.guards.release(&idx_name_owned, &prev_prefix, &pk_owned));
            }
        }
    }
}

#[cfg(test)]
mod tests;
