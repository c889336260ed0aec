/// Durability policy for a single transaction commit.
///
/// Controls how the WAL writer's group-commit loop handles fsync relative
/// to the caller's `commit` returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Wait for the batch containing this commit's frames to be fsynced
    /// before `commit` returns. Safest, one fsync per batch (which may
    /// contain several committers' frames).
    #[default]
    Safe,
    /// Same fsync behavior as `Safe`; the distinction exists for callers
    /// that want to express "this commit doesn't need to be first in line"
    /// without changing durability semantics. Batched with other pending
    /// commits exactly like `Safe`.
    Group,
    /// Do not wait for the fsync of the batch this commit's frames land
    /// in — the completion is signalled as soon as the frames are appended
    /// to the writer's buffer. The data still becomes durable at the next
    /// batch boundary; a crash before then loses it.
    Fast,
}

impl Durability {
    /// Whether `commit` must block until the containing batch is fsynced.
    pub fn waits_for_fsync(self) -> bool {
        !matches!(self, Durability::Fast)
    }
}
