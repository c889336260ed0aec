//! Composite index key codec.
//!
//! A secondary index row is keyed by `encode(value) ‖ primary_key` so that
//! range/prefix scans over the encoded value are ordinary byte-range scans,
//! and the owning primary key can still be recovered from a composite that
//! matched a scan or a unique-guard check.
//!
//! The encoded value segment is *escaped* so the composite stays
//! self-delimiting for an arbitrary-length, arbitrary-content primary key:
//! every `0x00` byte in the value segment is doubled to `0x00 0xFF`, and the
//! segment is terminated with `0x00 0x00`. Because `0x00 < 0xFF`, the
//! terminator always sorts before a continuation of the same segment, and
//! because escaping only ever inserts bytes *after* an existing `0x00`, the
//! byte order of the escaped segment matches the byte order of the raw
//! value prefix. This is the same trick FoundationDB's tuple layer and
//! CockroachDB's key encoding use to concatenate order-preserving segments.

/// Escapes `segment` for safe concatenation ahead of further composite
/// bytes, terminating it with `0x00 0x00`.
fn escape_segment(segment: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(segment.len() + 2);
    for &b in segment {
        out.push(b);
        if b == 0x00 {
            out.push(0xFF);
        }
    }
    out.push(0x00);
    out.push(0x00);
    out
}

/// Finds the byte offset of the `0x00 0x00` terminator introduced by
/// [`escape_segment`], scanning `data` from the front.
///
/// Returns the offset of the terminator's first byte, i.e. the length of
/// the (still-escaped) segment payload.
fn find_terminator(data: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < data.len() {
        if data[i] == 0x00 {
            if i + 1 < data.len() && data[i + 1] == 0x00 {
                return Some(i);
            }
            // Escaped literal zero: `0x00 0xFF`, skip both.
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

fn unescape_segment(escaped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut i = 0;
    while i < escaped.len() {
        out.push(escaped[i]);
        if escaped[i] == 0x00 {
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

/// Composes a composite index entry from an encoded value `prefix` and the
/// owning row's primary key.
///
/// `prefix` is typically the output of
/// [`crate::encoding::encode_value`][super::encode_value].
pub fn compose_index_entry(prefix: &[u8], pk: &[u8]) -> Vec<u8> {
    let mut out = escape_segment(prefix);
    out.extend_from_slice(pk);
    out
}

/// Recovers the (still order-preserving, unescaped) value prefix from a
/// composite index key produced by [`compose_index_entry`].
pub fn extract_prefix(composite: &[u8]) -> Vec<u8> {
    match find_terminator(composite) {
        Some(end) => unescape_segment(&composite[..end]),
        None => unescape_segment(composite),
    }
}

/// Recovers the primary key from a composite index key produced by
/// [`compose_index_entry`].
pub fn extract_pk(composite: &[u8]) -> Vec<u8> {
    match find_terminator(composite) {
        Some(end) => composite[end + 2..].to_vec(),
        None => Vec::new(),
    }
}
