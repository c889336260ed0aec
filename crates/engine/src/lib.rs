//! # engine — WalnutDB storage engine
//!
//! The central orchestrator tying [`memtable`], [`wal`], [`sstable`] and
//! [`uniqueguard`] into a crash-safe, single-process key/value store.
//!
//! ## Architecture
//!
//! ```text
//! Transaction
//!   |
//!   v
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Database                         │
//! │                                                          │
//! │ write.rs  → WAL frames → group-commit fsync → apply     │
//! │              under apply_lock: MemTable + index MemTables│
//! │                                                          │
//! │ checkpoint.rs → freeze MemTables → merge with prior     │
//! │                  segment → publish <name>.sst            │
//! │                                                          │
//! │ read.rs   → Mem ∪ Segment merge, tombstone masking,      │
//! │              decrypt-on-read, index staleness filtering  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module         | Purpose                                                |
//! |----------------|---------------------------------------------------------|
//! | [`lib`]        | `Database`/`DatabaseBuilder`, table registry, lazy state |
//! | [`recovery`]   | WAL replay, segment discovery, guard seeding, self-heal  |
//! | [`write`]      | `Transaction`, upsert/delete/drop-table protocols        |
//! | [`checkpoint`] | Freeze-swap-merge-replace-truncate, `defragment`         |
//! | [`read`]       | `get`/`scan`/`query`/time-series, merged-view assembly    |
//! | [`index`]      | Index-table naming, self-healing rebuild                 |
//! | [`naming`]     | Logical-name canonicalization (`encode`/`decode`)         |
//! | [`diagnostics`]| Read-only WAL/segment integrity scanners                 |
//!
//! ## Crash safety
//!
//! Every mutation is framed and durably appended to the WAL before its apply
//! closures run under `apply_lock`. Checkpoint publishes segments via
//! rename-replace and only truncates the WAL once every segment for that
//! checkpoint round is on disk — a crash mid-checkpoint leaves the WAL intact
//! and replay reconstructs the same state on the next open.

mod checkpoint;
pub mod diagnostics;
mod error;
mod index;
mod naming;
mod read;
mod recovery;
mod state;
mod write;

pub use config::{
    Durability, Encryptor, IndexDescriptor, RowDescriptor, TableOptions, TypeNaming, Value,
};
pub use error::{Result, WalnutError};
pub use read::{IndexHint, Stats};
pub use write::Transaction;

use parking_lot::{Mutex, RwLock};
use state::TableState;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uniqueguard::UniqueGuardRegistry;
use wal::WalWriter;

/// A registered table's schema-equivalent: how to pull pk/indices/timestamp
/// out of a row's plaintext bytes, plus its table-open options.
pub(crate) struct TableEntry {
    pub descriptor: RowDescriptor,
    pub options: TableOptions,
}

/// Builds a [`Database`], registering every table's [`RowDescriptor`] and
/// [`TableOptions`] up front so that recovery and self-healing (spec.md
/// §4.10) have full descriptor knowledge before `open` returns.
pub struct DatabaseBuilder {
    root: PathBuf,
    tables: Vec<(String, RowDescriptor, TableOptions)>,
}

impl DatabaseBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tables: Vec::new(),
        }
    }

    /// Registers a table's descriptor and options before `open`. Calling
    /// this more than once for the same `name` keeps only the last call.
    pub fn register_table(
        mut self,
        name: impl Into<String>,
        descriptor: RowDescriptor,
        options: TableOptions,
    ) -> Self {
        let name = name.into();
        self.tables.retain(|(existing, _, _)| existing != &name);
        self.tables.push((name, descriptor, options));
        self
    }

    /// Performs recovery (WAL replay, segment discovery, unique-guard
    /// seeding, self-healing) and returns a ready-to-use [`Database`].
    pub fn open(self) -> Result<Database> {
        recovery::open(self.root, self.tables)
    }
}

/// The embedded storage engine: one WAL, one directory of segment files, one
/// `MemTable`/segment pair per logical name (base tables and their derived
/// index tables alike).
pub struct Database {
    pub(crate) root: PathBuf,
    pub(crate) sst_dir: PathBuf,
    pub(crate) wal_path: PathBuf,
    pub(crate) wal: WalWriter,
    pub(crate) tables: RwLock<HashMap<String, Arc<TableState>>>,
    pub(crate) descriptors: RwLock<HashMap<String, Arc<TableEntry>>>,
    pub(crate) guards: UniqueGuardRegistry,
    /// Serializes transaction apply and checkpoint's freeze step (spec.md §4.5/§4.6).
    pub(crate) apply_lock: Mutex<()>,
    pub(crate) seq_no: AtomicU64,
    /// Logical names of every registered unique index, tracked so
    /// `defragment`/self-heal can enumerate them without walking descriptors.
    pub(crate) unique_index_names: RwLock<HashSet<String>>,
}

impl Database {
    /// Convenience entry point for opening with no tables pre-registered
    /// (no self-healing is possible without descriptors; useful only for
    /// inspecting an existing root, e.g. via [`diagnostics`]).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        DatabaseBuilder::new(root).open()
    }

    pub fn builder(root: impl Into<PathBuf>) -> DatabaseBuilder {
        DatabaseBuilder::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every registered base table name, or every logical name including
    /// derived index tables when `include_indices` is true.
    pub fn list_tables(&self, include_indices: bool) -> Vec<String> {
        let mut names: Vec<String> = if include_indices {
            self.tables.read().keys().cloned().collect()
        } else {
            self.descriptors.read().keys().cloned().collect()
        };
        names.sort();
        names
    }

    /// Lazily fetches (creating if absent) the runtime state for a logical
    /// name. Base tables and index tables alike are created this way; base
    /// tables registered via [`DatabaseBuilder`] already exist by the time
    /// `open` returns.
    pub(crate) fn table_state(&self, name: &str) -> Arc<TableState> {
        if let Some(state) = self.tables.read().get(name) {
            return Arc::clone(state);
        }
        Arc::clone(
            self.tables
                .write()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(TableState::new(name.to_string()))),
        )
    }

    pub(crate) fn descriptor_for(&self, table: &str) -> Result<Arc<TableEntry>> {
        self.descriptors
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| WalnutError::TableNotFound(table.to_string()))
    }

    pub(crate) fn segment_path(&self, logical_name: &str) -> PathBuf {
        self.sst_dir
            .join(format!("{}.sst", naming::encode_logical_name(logical_name)))
    }

    pub(crate) fn next_seq_no(&self) -> u64 {
        self.seq_no.fetch_add(1, Ordering::SeqCst)
    }

    /// Forces an immediate durable WAL flush without checkpointing.
    pub fn flush(&self) -> Result<()> {
        self.wal.flush()?;
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let should_checkpoint = self
            .descriptors
            .read()
            .values()
            .any(|entry| entry.options.checkpoint_on_dispose);
        if should_checkpoint {
            if let Err(e) = self.checkpoint() {
                tracing::warn!(error = %e, "checkpoint on dispose failed");
            }
        }
    }
}
