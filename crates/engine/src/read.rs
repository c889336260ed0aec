//! Merged-view reads: point get, range scan, index scan with staleness
//! filtering, and time-series query helpers (spec.md §4.7, §6.3).

use crate::naming;
use crate::{Database, Result, WalnutError};
use config::{IndexDescriptor, Value};
use std::collections::BTreeMap;
use std::fs;

/// Paging hint for [`Database::query`]: scan a named index's values in
/// `[start, end)`, ascending or descending, with `skip`/`take` applied.
#[derive(Debug, Clone)]
pub struct IndexHint {
    pub index: String,
    pub start: Option<Value>,
    pub end: Option<Value>,
    pub asc: bool,
    pub skip: usize,
    pub take: usize,
}

/// Read-only, internally-useful counters (spec.md §6.3's "stats" — not a
/// stand-in for the external stats-reporting collaborator spec.md §1 excludes).
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub table_count: usize,
    pub total_mem_entries: usize,
    pub total_segment_records: u32,
    pub wal_len_bytes: u64,
}

/// Keeps only the last `skip + take` items for descending order before
/// reversing, per spec.md §4.7 ("descending mode buffers at most skip+take
/// items and reverses"), then applies skip/take uniformly.
fn paginate<T>(mut rows: Vec<T>, asc: bool, skip: usize, take: usize) -> Vec<T> {
    if !asc {
        let bound = skip.saturating_add(take).min(rows.len());
        let start = rows.len() - bound;
        rows = rows.split_off(start);
        rows.reverse();
    }
    rows.into_iter().skip(skip).take(take).collect()
}

/// Encodes `value` into a composite-key range bound: the escaped prefix with
/// no trailing pk, which sorts immediately before any real composite sharing
/// that prefix (see `bytekey::index_key`'s escaping invariant).
fn value_bound(value: &Value, scale: Option<u32>) -> Option<Vec<u8>> {
    bytekey::encode_value(value, scale).map(|prefix| bytekey::compose_index_entry(&prefix, &[]))
}

fn decode_ticks(series_id: &[u8], key: &[u8]) -> i64 {
    let tick_bytes = &key[series_id.len()..];
    let mut arr = [0u8; 8];
    arr.copy_from_slice(tick_bytes);
    bytekey::decode_i64(arr)
}

impl Database {
    /// Point lookup (spec.md §4.7 steps 1-3): Mem live wins, Mem tombstone
    /// hides the segment, otherwise the segment (decrypted) is authoritative.
    pub fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.table_state(table);
        if let Some(entry) = state.mem.get_entry(key) {
            return Ok(entry.value);
        }
        let ciphertext = {
            let guard = state.segment.read();
            match guard.as_ref() {
                Some(reader) => reader.try_get(key)?,
                None => None,
            }
        };
        match ciphertext {
            None => Ok(None),
            Some(bytes) => {
                let encryptor = self
                    .descriptors
                    .read()
                    .get(table)
                    .and_then(|e| e.options.encryption.clone());
                match encryptor {
                    Some(enc) => enc.decrypt(&bytes, table, key).map(Some).ok_or_else(|| {
                        WalnutError::DecryptionFailed {
                            table: table.to_string(),
                        }
                    }),
                    None => Ok(Some(bytes)),
                }
            }
        }
    }

    /// Streaming two-way merge of Mem and Segment over `[from, to)`,
    /// optionally skipping everything at or before `after` (spec.md §4.7).
    /// Segment values are decrypted before merging so masking operates on
    /// plaintext uniformly.
    pub(crate) fn merged_range(
        &self,
        name: &str,
        from_inclusive: Option<&[u8]>,
        to_exclusive: Option<&[u8]>,
        after_exclusive: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let state = self.table_state(name);
        let encryptor = self
            .descriptors
            .read()
            .get(name)
            .and_then(|e| e.options.encryption.clone());

        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        if let Some(reader) = state.segment.read().as_ref() {
            let mut entries = reader.scan_range(from_inclusive, to_exclusive)?;
            if let Some(after) = after_exclusive {
                entries.retain(|(k, _)| k.as_slice() > after);
            }
            for (key, value) in entries {
                let plaintext = match &encryptor {
                    Some(enc) => enc.decrypt(&value, name, &key).ok_or_else(|| {
                        WalnutError::DecryptionFailed {
                            table: name.to_string(),
                        }
                    })?,
                    None => value,
                };
                merged.insert(key, Some(plaintext));
            }
        }
        for (key, entry) in state
            .mem
            .snapshot_range(from_inclusive, to_exclusive, after_exclusive)
        {
            merged.insert(key, entry.value);
        }

        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|val| (k, val)))
            .collect())
    }

    /// Key-range scan with ascending/descending paging.
    pub fn scan(
        &self,
        table: &str,
        from_inclusive: Option<&[u8]>,
        to_exclusive: Option<&[u8]>,
        asc: bool,
        skip: usize,
        take: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let rows = self.merged_range(table, from_inclusive, to_exclusive, None)?;
        Ok(paginate(rows, asc, skip, take))
    }

    /// Index range scan with staleness filtering (spec.md §4.7): a composite
    /// survives only if the owning row's current indexed value still encodes
    /// to the composite's prefix.
    fn scan_index(
        &self,
        table: &str,
        index: &IndexDescriptor,
        start: Option<&Value>,
        end: Option<&Value>,
        asc: bool,
        skip: usize,
        take: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let idx_name = naming::index_table_name(table, &index.name);
        let from = start.and_then(|v| value_bound(v, index.scale));
        let to = end.and_then(|v| value_bound(v, index.scale));
        let composites = self.merged_range(&idx_name, from.as_deref(), to.as_deref(), None)?;

        let mut rows = Vec::with_capacity(composites.len());
        for (composite, _) in composites {
            let prefix = bytekey::extract_prefix(&composite);
            let pk = bytekey::extract_pk(&composite);
            let Some(value) = self.get(table, &pk)? else {
                continue;
            };
            let current = (index.extract)(&value);
            if bytekey::encode_value(&current, index.scale).as_deref() != Some(prefix.as_slice()) {
                continue;
            }
            rows.push((pk, value));
        }
        Ok(paginate(rows, asc, skip, take))
    }

    /// Queries a table's named index with an [`IndexHint`].
    pub fn query(&self, table: &str, hint: &IndexHint) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let entry = self.descriptor_for(table)?;
        let index = entry
            .descriptor
            .indices
            .iter()
            .find(|i| i.name == hint.index)
            .ok_or_else(|| WalnutError::TableNotFound(format!("{table}.{}", hint.index)))?
            .clone();
        self.scan_index(
            table,
            &index,
            hint.start.as_ref(),
            hint.end.as_ref(),
            hint.asc,
            hint.skip,
            hint.take,
        )
    }

    /// First row in key order, or the first match of an index hint.
    pub fn get_first(
        &self,
        table: &str,
        hint: Option<&IndexHint>,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let rows = match hint {
            Some(h) => self.query(table, h)?,
            None => self.scan(table, None, None, true, 0, 1)?,
        };
        Ok(rows.into_iter().next())
    }

    /// Appends one time-series sample keyed by `series_id ‖ encode_i64(ticks)`
    /// (spec.md §1: the key composition is in scope, ergonomics are not).
    pub fn ts_append(&self, table: &str, series_id: &[u8], ticks: i64, value: &[u8]) -> Result<()> {
        let mut key = series_id.to_vec();
        key.extend_from_slice(&bytekey::encode_i64(ticks));

        let entry = self.descriptors.read().get(table).cloned();
        let durability = entry
            .as_ref()
            .map(|e| e.options.durability)
            .unwrap_or_default();
        let wal_value = match entry.as_ref().and_then(|e| e.options.encryption.clone()) {
            Some(enc) => enc.encrypt(value, table, &key),
            None => value.to_vec(),
        };

        let mut tx = self.begin();
        tx.add_put(table, key, wal_value, value.to_vec());
        tx.commit(durability)
    }

    /// Samples with `ticks` in `[from_ticks, to_ticks_exclusive)`, ascending.
    pub fn ts_query(
        &self,
        table: &str,
        series_id: &[u8],
        from_ticks: i64,
        to_ticks_exclusive: i64,
    ) -> Result<Vec<(i64, Vec<u8>)>> {
        let mut from_key = series_id.to_vec();
        from_key.extend_from_slice(&bytekey::encode_i64(from_ticks));
        let mut to_key = series_id.to_vec();
        to_key.extend_from_slice(&bytekey::encode_i64(to_ticks_exclusive));

        let rows = self.merged_range(table, Some(&from_key), Some(&to_key), None)?;
        Ok(rows
            .into_iter()
            .map(|(k, v)| (decode_ticks(series_id, &k), v))
            .collect())
    }

    /// The last `n` samples for `series_id`, most recent first.
    pub fn ts_query_tail(
        &self,
        table: &str,
        series_id: &[u8],
        n: usize,
    ) -> Result<Vec<(i64, Vec<u8>)>> {
        let upper = bytekey::prefix_upper_bound(series_id);
        let rows = self.merged_range(table, Some(series_id), upper.as_deref(), None)?;
        let mut rows: Vec<(i64, Vec<u8>)> = rows
            .into_iter()
            .map(|(k, v)| (decode_ticks(series_id, &k), v))
            .collect();
        let start = rows.len().saturating_sub(n);
        let mut tail = rows.split_off(start);
        tail.reverse();
        Ok(tail)
    }

    /// Read-only counters over the current in-memory/on-disk state.
    pub fn stats(&self) -> Stats {
        let tables = self.tables.read();
        let mut total_mem_entries = 0usize;
        let mut total_segment_records = 0u32;
        for state in tables.values() {
            total_mem_entries += state.mem.len();
            if let Some(reader) = state.segment.read().as_ref() {
                total_segment_records += reader.len();
            }
        }
        let wal_len_bytes = fs::metadata(&self.wal_path).map(|m| m.len()).unwrap_or(0);
        Stats {
            table_count: tables.len(),
            total_mem_entries,
            total_segment_records,
            wal_len_bytes,
        }
    }
}

#[cfg(test)]
mod tests;
