//! Order-preserving scalar encoders.
//!
//! Every encoder here produces a byte string whose unsigned lexicographic
//! order matches the logical order of the input, including across the
//! negative/positive boundary. The technique is the standard one: flip the
//! sign bit of two's-complement integers, and for IEEE-754 floats flip the
//! sign bit for positive values or every bit for negative values (so that
//! more-negative floats, which have larger magnitude bit patterns, sort
//! before less-negative ones).

use std::cmp::Ordering;

/// A dynamically typed value accepted by [`crate::compose_index_entry`] and
/// the engine's column extractors.
///
/// This mirrors the set of primitive types the source system's reflection
/// layer can discover on a row (int/float/decimal/string/bytes/guid/
/// datetime); WalnutDB's core never interprets these beyond encoding them to
/// bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed 64-bit integer.
    Int(i64),
    /// IEEE-754 double.
    Float(f64),
    /// Decimal value truncated to `scale` fractional digits before encoding.
    Decimal(f64),
    /// UTF-8 string.
    Str(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// 16-byte canonical GUID representation.
    Guid([u8; 16]),
    /// Ticks since a fixed epoch (caller-defined resolution).
    DateTime(i64),
    /// Absence of an indexed value (exempt from unique enforcement).
    Null,
}

/// Encodes `value` into an order-preserving byte prefix.
///
/// `scale` is only consulted for [`Value::Decimal`] and gives the number of
/// fractional digits retained; the value is truncated (not rounded) to that
/// scale before being encoded as a sign-flipped big-endian integer.
///
/// Returns `None` for [`Value::Null`] — callers (unique index maintenance)
/// treat a `None` prefix as "no value to index", which is how nulls stay
/// exempt from uniqueness checks.
pub fn encode_value(value: &Value, scale: Option<u32>) -> Option<Vec<u8>> {
    match value {
        Value::Int(v) => Some(encode_i64(*v).to_vec()),
        Value::Float(v) => Some(encode_f64(*v).to_vec()),
        Value::Decimal(v) => Some(encode_decimal(*v, scale.unwrap_or(0)).to_vec()),
        Value::Str(s) => Some(s.as_bytes().to_vec()),
        Value::Bytes(b) => Some(b.clone()),
        Value::Guid(g) => Some(g.to_vec()),
        Value::DateTime(ticks) => Some(encode_i64(*ticks).to_vec()),
        Value::Null => None,
    }
}

/// Sign-flips a two's-complement `i64` so unsigned big-endian byte order
/// matches signed numeric order.
pub fn encode_i64(v: i64) -> [u8; 8] {
    let flipped = (v as u64) ^ (1u64 << 63);
    flipped.to_be_bytes()
}

/// Inverse of [`encode_i64`].
pub fn decode_i64(bytes: [u8; 8]) -> i64 {
    let raw = u64::from_be_bytes(bytes) ^ (1u64 << 63);
    raw as i64
}

/// Order-preserving IEEE-754 double encoding.
///
/// Positive numbers (including `+0.0`) get their sign bit flipped so they
/// sort above negatives. Negative numbers get every bit flipped, which
/// reverses their bit-pattern order (larger magnitude -> smaller bit
/// pattern -> sorts first, matching numeric order for negatives).
pub fn encode_f64(v: f64) -> [u8; 8] {
    let bits = v.to_bits();
    let flipped = if bits & (1u64 << 63) != 0 {
        !bits
    } else {
        bits | (1u64 << 63)
    };
    flipped.to_be_bytes()
}

/// Inverse of [`encode_f64`].
pub fn decode_f64(bytes: [u8; 8]) -> f64 {
    let raw = u64::from_be_bytes(bytes);
    let bits = if raw & (1u64 << 63) != 0 {
        raw & !(1u64 << 63)
    } else {
        !raw
    };
    f64::from_bits(bits)
}

/// Truncates `v` to `scale` fractional digits and encodes the resulting
/// scaled integer with [`encode_i64`].
///
/// Truncation is toward zero (`-1.239` at scale 2 truncates to `-1.23`, not
/// `-1.24`), matching "truncate-to-scale" rather than "round-to-scale".
pub fn encode_decimal(v: f64, scale: u32) -> [u8; 8] {
    let factor = 10f64.powi(scale as i32);
    let scaled = (v * factor).trunc() as i64;
    encode_i64(scaled)
}

/// Returns the least byte string strictly greater than every string with
/// prefix `p`, or `None` if no such finite string exists (an empty prefix,
/// or a prefix consisting entirely of `0xFF` bytes).
///
/// Used to turn a prefix match into a half-open range scan:
/// `[p, prefix_upper_bound(p))`.
pub fn prefix_upper_bound(p: &[u8]) -> Option<Vec<u8>> {
    let mut out = p.to_vec();
    while let Some(&last) = out.last() {
        if last == 0xFF {
            out.pop();
            continue;
        }
        *out.last_mut().unwrap() += 1;
        return Some(out);
    }
    None
}

/// Lexicographic byte comparison, exposed for callers that want to avoid
/// importing `Ord` on `&[u8]` indirectly (kept mostly for readability at
/// call sites that compare keys as a named operation).
pub fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests;
