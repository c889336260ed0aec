//! Logical-name -> on-disk file-name canonicalization (spec.md §3 invariant 6, §6.1).
//!
//! A logical table/index name becomes the stem of its segment file
//! (`sst/<encoded>.sst`). Decoding must be the exact inverse of encoding, so
//! that segment discovery at startup (`recovery::discover_segments`) can
//! recover the logical name a file on disk belongs to. A name is passed
//! through unchanged when it is already filesystem-safe; anything else is
//! fully base64url-encoded behind a `b64_` tag so the transform stays a true
//! bijection (see DESIGN.md for why this departs from spec.md §6.1's lossy
//! `_`-substitution wording).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

const MAX_SAFE_LEN: usize = 180;
const ENCODED_PREFIX: &str = "b64_";

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn is_filesystem_safe(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_SAFE_LEN {
        return false;
    }
    if name.ends_with('.') {
        return false;
    }
    if name.starts_with(ENCODED_PREFIX) {
        // Would be ambiguous with an encoded name on decode.
        return false;
    }
    let upper = name.to_ascii_uppercase();
    let bare = upper.split('.').next().unwrap_or(&upper);
    if RESERVED_DEVICE_NAMES.contains(&bare) {
        return false;
    }
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

/// Encodes a logical name into the stem used for its on-disk files.
pub fn encode_logical_name(name: &str) -> String {
    if is_filesystem_safe(name) {
        name.to_string()
    } else {
        format!("{ENCODED_PREFIX}{}", URL_SAFE_NO_PAD.encode(name.as_bytes()))
    }
}

/// Inverse of [`encode_logical_name`]. Returns `None` if `encoded` is not a
/// well-formed output of that function (malformed base64 behind the tag).
pub fn decode_logical_name(encoded: &str) -> Option<String> {
    match encoded.strip_prefix(ENCODED_PREFIX) {
        Some(b64) => {
            let bytes = URL_SAFE_NO_PAD.decode(b64).ok()?;
            String::from_utf8(bytes).ok()
        }
        None => Some(encoded.to_string()),
    }
}

/// The derived logical name of the index table `idx_name` on `table`
/// (spec.md §3: "Index Table (derived name `__index__<table>__<indexName>`)").
pub fn index_table_name(table: &str, idx_name: &str) -> String {
    format!("__index__{table}__{idx_name}")
}

/// True iff `name` is a derived index-table name, in which case the base
/// table and index name are returned.
pub fn split_index_table_name(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix("__index__")?;
    let (table, idx) = rest.split_once("__")?;
    if table.is_empty() || idx.is_empty() {
        return None;
    }
    Some((table, idx))
}

#[cfg(test)]
mod tests;
