//! Index-table naming is in [`crate::naming`]; this module holds the
//! self-healing rebuild used by both recovery (spec.md §4.10) and
//! `defragment` (SPEC_FULL §3.3).

use crate::naming;
use crate::{Database, Result};
use config::IndexDescriptor;

/// Re-emits every index composite for `table`'s current rows (Mem ∪
/// Segment) into the index's own MemTable, replacing whatever was there.
/// The caller is responsible for running a checkpoint afterward so the
/// rebuilt composites are durable (spec.md §4.10).
pub(crate) fn rebuild_index(db: &Database, table: &str, idx: &IndexDescriptor) -> Result<()> {
    let idx_name = naming::index_table_name(table, &idx.name);
    let state = db.table_state(&idx_name);
    state.mem.clear();

    for (pk, value) in db.merged_range(table, None, None, None)? {
        let extracted = (idx.extract)(&value);
        if let Some(prefix) = bytekey::encode_value(&extracted, idx.scale) {
            let composite = bytekey::compose_index_entry(&prefix, &pk);
            state.mem.upsert(composite, Vec::new());
        }
    }
    Ok(())
}
