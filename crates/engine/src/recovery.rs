//! Bring-up: WAL replay, segment discovery, unique-guard seeding, and
//! self-healing index rebuild (spec.md §4.2 recovery, §4.4 startup seeding,
//! §4.9 drop-table-during-replay, §4.10 self-healing).

use crate::index;
use crate::naming;
use crate::state::TableState;
use crate::{Database, Result, TableEntry};
use config::{Durability, RowDescriptor, TableOptions};
use parking_lot::{Mutex, RwLock};
use sstable::SstReader;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use wal::Op;

/// Bound on a single legacy-cleanup mini-transaction's delete count
/// (spec.md §4.4 "bound batch size, e.g. 32").
const DANGLING_CLEANUP_BATCH: usize = 32;

pub(crate) fn open(
    root: PathBuf,
    registered: Vec<(String, RowDescriptor, TableOptions)>,
) -> Result<Database> {
    fs::create_dir_all(&root)?;
    let sst_dir = root.join("sst");
    fs::create_dir_all(&sst_dir)?;
    let wal_path = root.join("wal.log");

    cleanup_tmp_files(&sst_dir)?;

    let mut index_names_by_table: HashMap<String, Vec<String>> = HashMap::new();
    let mut descriptors_map: HashMap<String, Arc<TableEntry>> = HashMap::new();
    let mut unique_index_names: HashSet<String> = HashSet::new();
    for (table, descriptor, options) in registered {
        let idx_names: Vec<String> = descriptor
            .indices
            .iter()
            .map(|idx| naming::index_table_name(&table, &idx.name))
            .collect();
        for idx in descriptor.unique_indices() {
            unique_index_names.insert(naming::index_table_name(&table, &idx.name));
        }
        index_names_by_table.insert(table.clone(), idx_names);
        descriptors_map.insert(table.clone(), Arc::new(TableEntry { descriptor, options }));
    }

    let mut discovered: HashMap<String, Option<SstReader>> = HashMap::new();
    for entry in fs::read_dir(&sst_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        let Some(stem) = name.strip_suffix(".sst") else {
            continue;
        };
        let Some(logical) = naming::decode_logical_name(stem) else {
            tracing::warn!(file = %name, "segment file name does not decode to a logical name");
            continue;
        };
        match SstReader::open(&entry.path()) {
            Ok(reader) => {
                discovered.insert(logical, Some(reader));
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "segment file unreadable, treating as missing");
                discovered.insert(logical, None);
            }
        }
    }

    let committed = wal::recover(&wal_path)?;
    let mut acc: HashMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>> = HashMap::new();
    let mut dropped: HashSet<String> = HashSet::new();
    for tx in committed {
        for op in tx.ops {
            match op {
                Op::Put { table, key, value } => {
                    acc.entry(table).or_default().insert(key, Some(value));
                }
                Op::Delete { table, key } => {
                    acc.entry(table).or_default().insert(key, None);
                }
                Op::DropTable { table } => {
                    acc.entry(table.clone()).or_default().clear();
                    dropped.insert(table.clone());
                    if let Some(idx_names) = index_names_by_table.get(&table) {
                        for idx_name in idx_names {
                            acc.entry(idx_name.clone()).or_default().clear();
                            dropped.insert(idx_name.clone());
                        }
                    }
                }
            }
        }
    }

    // Open the writer only after replay finishes reading the file.
    let wal = wal::WalWriter::open(&wal_path)?;

    for name in &dropped {
        discovered.remove(name);
        let _ = fs::remove_file(segment_path(&sst_dir, name));
        let _ = fs::remove_file(sidecar_path(&sst_dir, name));
    }

    let mut tables: HashMap<String, Arc<TableState>> = HashMap::new();
    for (name, segment) in discovered {
        tables.insert(name.clone(), Arc::new(TableState::with_segment(name, segment)));
    }
    for (name, entries) in acc {
        let state = tables
            .entry(name.clone())
            .or_insert_with(|| Arc::new(TableState::new(name.clone())))
            .clone();
        for (key, value) in entries {
            match value {
                Some(v) => state.mem.upsert(key, v),
                None => state.mem.delete(key),
            }
        }
    }

    let db = Database {
        root,
        sst_dir,
        wal_path,
        wal,
        tables: RwLock::new(tables),
        descriptors: RwLock::new(descriptors_map),
        guards: uniqueguard::UniqueGuardRegistry::new(),
        apply_lock: Mutex::new(()),
        seq_no: AtomicU64::new(0),
        unique_index_names: RwLock::new(unique_index_names),
    };

    seed_unique_guards(&db)?;
    self_heal(&db)?;

    Ok(db)
}

fn segment_path(sst_dir: &Path, logical_name: &str) -> PathBuf {
    sst_dir.join(format!("{}.sst", naming::encode_logical_name(logical_name)))
}

fn sidecar_path(sst_dir: &Path, logical_name: &str) -> PathBuf {
    sst_dir.join(format!("{}.sst.sxi", naming::encode_logical_name(logical_name)))
}

fn cleanup_tmp_files(sst_dir: &Path) -> Result<()> {
    for entry in fs::read_dir(sst_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".sst.tmp") || name.ends_with(".sst.tmp.sxi") {
            let _ = fs::remove_file(entry.path());
        }
    }
    Ok(())
}

/// Seeds the unique-guard registry from Mem ∪ Segment and collects every
/// dangling composite (owning pk no longer alive in the base table) for
/// cleanup (spec.md §4.4 startup seeding + legacy cleanup).
pub(crate) fn seed_unique_guards(db: &Database) -> Result<()> {
    let idx_names: Vec<String> = db.unique_index_names.read().iter().cloned().collect();
    for idx_name in idx_names {
        let Some((table, _)) = naming::split_index_table_name(&idx_name) else {
            continue;
        };
        let composites = db.merged_range(&idx_name, None, None, None)?;
        let mut dangling = Vec::new();
        for (composite, _) in composites {
            let prefix = bytekey::extract_prefix(&composite);
            let pk = bytekey::extract_pk(&composite);
            if db.get(table, &pk)?.is_some() {
                db.guards.seed(&idx_name, &prefix, &pk);
            } else {
                dangling.push(composite);
            }
        }
        if !dangling.is_empty() {
            cleanup_dangling_entries(db, &idx_name, dangling)?;
        }
    }
    Ok(())
}

/// Deletes dangling index composites in bounded batches, each its own
/// committed WAL transaction applied immediately (no concurrent writers
/// exist yet during recovery).
fn cleanup_dangling_entries(db: &Database, idx_name: &str, dangling: Vec<Vec<u8>>) -> Result<()> {
    tracing::warn!(
        index = idx_name,
        count = dangling.len(),
        "cleaning up dangling unique index entries left by a prior crash"
    );
    let state = db.table_state(idx_name);
    for chunk in dangling.chunks(DANGLING_CLEANUP_BATCH) {
        let tx_id = rand::random::<u64>();
        let seq_no = db.next_seq_no();
        let mut frames = wal::encode_begin(tx_id, seq_no);
        for composite in chunk {
            frames.extend(wal::encode_delete(tx_id, idx_name, composite));
        }
        frames.extend(wal::encode_commit(tx_id, chunk.len() as u32));
        db.wal.append(frames, Durability::Safe)?;
        for composite in chunk {
            state.mem.delete(composite.clone());
        }
    }
    Ok(())
}

/// Rebuilds any index that a base table outgrew without it (spec.md §4.10):
/// live base rows with no index presence at all, or an index segment that
/// failed to open.
fn self_heal(db: &Database) -> Result<()> {
    let descriptors: Vec<(String, Arc<TableEntry>)> = db
        .descriptors
        .read()
        .iter()
        .map(|(k, v)| (k.clone(), Arc::clone(v)))
        .collect();

    let mut rebuilt_any = false;
    for (table, entry) in descriptors {
        for idx in &entry.descriptor.indices {
            let idx_name = naming::index_table_name(&table, &idx.name);
            let state = db.table_state(&idx_name);
            let has_mem_entries = !state.mem.is_empty();
            let has_usable_segment = state.segment.read().is_some();
            if has_mem_entries || has_usable_segment {
                continue;
            }
            let base_has_rows = !db.merged_range(&table, None, None, None)?.is_empty();
            if !base_has_rows {
                continue;
            }
            tracing::warn!(table, index = idx.name, "rebuilding index with no live state");
            index::rebuild_index(db, &table, idx)?;
            rebuilt_any = true;
        }
    }

    if rebuilt_any {
        db.checkpoint()?;
    }
    Ok(())
}
