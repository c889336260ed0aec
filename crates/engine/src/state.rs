//! Per-logical-name runtime state: a MemTable plus its published segment.
//!
//! One `TableState` exists per logical name — a base table or a derived
//! index table — and is created lazily the first time that name is
//! referenced (by recovery, by a write, or by table registration).

use memtable::MemTable;
use parking_lot::RwLock;
use sstable::SstReader;

pub(crate) struct TableState {
    pub name: String,
    pub mem: MemTable,
    pub segment: RwLock<Option<SstReader>>,
}

impl TableState {
    pub fn new(name: String) -> Self {
        Self {
            name,
            mem: MemTable::new(),
            segment: RwLock::new(None),
        }
    }

    pub fn with_segment(name: String, segment: Option<SstReader>) -> Self {
        Self {
            name,
            mem: MemTable::new(),
            segment: RwLock::new(segment),
        }
    }
}
