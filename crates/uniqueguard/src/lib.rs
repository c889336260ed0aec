//! Process-wide unique-index reservation registry.
//!
//! A unique index's on-disk truth lives in Mem ∪ Segment like everything
//! else, but enforcing "exactly one pk per value prefix" across two racing
//! upserts needs a place to serialize on *before* either transaction's WAL
//! frames land. This registry is that place: an in-process map from
//! `(index_name, value_prefix)` to the pk that currently owns it.
//!
//! It is deliberately not persisted — [`UniqueGuardRegistry::new`] always
//! starts empty and the engine reseeds it from Mem+Segment on open (see
//! `engine::recovery`). A guard surviving past the row it was reserved for
//! (the row was later deleted without releasing the guard, or the process
//! crashed mid-transaction) is "stale"; callers pass a `still_owns` check so
//! staleness can be resolved against current engine state without this
//! crate knowing anything about tables or WAL frames.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use parking_lot::RwLock;
use std::collections::HashMap;

/// `(index_name, value_prefix) -> owning pk`.
#[derive(Default)]
pub struct UniqueGuardRegistry {
    owners: RwLock<HashMap<String, Vec<u8>>>,
}

/// Bound on the remove-stale-and-retry loop inside [`UniqueGuardRegistry::try_reserve`].
/// One retry covers the realistic case (a single stale guard left by a prior
/// crash); the bound only exists so a pathological `still_owns` callback that
/// always claims staleness can't spin forever.
const MAX_STALE_RETRIES: usize = 8;

impl UniqueGuardRegistry {
    pub fn new() -> Self {
        Self {
            owners: RwLock::new(HashMap::new()),
        }
    }

    fn key(index_name: &str, value_prefix: &[u8]) -> String {
        let mut k = String::with_capacity(index_name.len() + 1 + value_prefix.len() * 4 / 3 + 4);
        k.push_str(index_name);
        k.push('|');
        k.push_str(&URL_SAFE_NO_PAD.encode(value_prefix));
        k
    }

    /// Attempts to reserve `(index_name, value_prefix)` for `pk`.
    ///
    /// Returns `true` if `pk` now owns (or already owned) the prefix.
    /// Returns `false` if another pk owns it and `still_owns` confirms that
    /// owner is still valid. If the existing owner is stale — `still_owns`
    /// returns `false` — the guard is removed and reservation is retried,
    /// bounded by [`MAX_STALE_RETRIES`].
    pub fn try_reserve(
        &self,
        index_name: &str,
        value_prefix: &[u8],
        pk: &[u8],
        still_owns: impl Fn(&[u8]) -> bool,
    ) -> bool {
        let key = Self::key(index_name, value_prefix);
        for _ in 0..MAX_STALE_RETRIES {
            {
                let mut owners = self.owners.write();
                match owners.get(&key) {
                    None => {
                        owners.insert(key, pk.to_vec());
                        return true;
                    }
                    Some(owner) if owner.as_slice() == pk => return true,
                    Some(_) => {}
                }
            }
            // Another pk holds the guard; re-check it outside the lock
            // (the callback may need to scan Mem/Segment).
            let owner = self.owners.read().get(&key).cloned();
            match owner {
                Some(owner) if !still_owns(&owner) => {
                    let mut owners = self.owners.write();
                    // Only remove if still the same stale owner: another
                    // thread may have already replaced or released it.
                    if owners.get(&key) == Some(&owner) {
                        owners.remove(&key);
                    }
                    continue;
                }
                _ => return false,
            }
        }
        false
    }

    /// Unconditionally installs `pk` as the owner, overwriting any prior
    /// owner. Used only for startup seeding from Mem+Segment, where the
    /// registry is known to be empty or being rebuilt from scratch.
    pub fn seed(&self, index_name: &str, value_prefix: &[u8], pk: &[u8]) {
        let key = Self::key(index_name, value_prefix);
        self.owners.write().insert(key, pk.to_vec());
    }

    pub fn is_owner(&self, index_name: &str, value_prefix: &[u8], pk: &[u8]) -> bool {
        let key = Self::key(index_name, value_prefix);
        matches!(self.owners.read().get(&key), Some(owner) if owner.as_slice() == pk)
    }

    /// Releases the guard only if `pk` is the current owner; a no-op
    /// otherwise (in particular, a no-op if someone else already reserved
    /// the prefix after a stale-owner sweep).
    pub fn release(&self, index_name: &str, value_prefix: &[u8], pk: &[u8]) {
        let key = Self::key(index_name, value_prefix);
        let mut owners = self.owners.write();
        if owners.get(&key).map(|o| o.as_slice()) == Some(pk) {
            owners.remove(&key);
        }
    }

    /// Removes every guard belonging to `index_name`, e.g. on drop-table.
    pub fn clear_for_index(&self, index_name: &str) {
        let prefix = format!("{index_name}|");
        self.owners.write().retain(|k, _| !k.starts_with(&prefix));
    }

    /// Number of currently held guards, across every index. Diagnostic only.
    pub fn len(&self) -> usize {
        self.owners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.read().is_empty()
    }
}

#[cfg(test)]
mod tests;
