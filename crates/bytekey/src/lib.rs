//! # bytekey — order-preserving byte encoding
//!
//! WalnutDB stores everything as raw, lexicographically ordered byte
//! strings: memtables are `BTreeMap<Vec<u8>, _>`, segment files are sorted
//! sequences of `(key, value)`, and range scans are just byte-range scans.
//! This crate is the only place in the workspace that knows how to turn a
//! typed value (integer, float, decimal, string, bytes, GUID, timestamp)
//! into a byte string whose `Ord` matches the value's logical order, and
//! back.
//!
//! It also owns the *index key codec*: the composite
//! `encode(value) ‖ primary_key` layout used by secondary indexes, which
//! has to stay self-delimiting (so an arbitrary-length primary key can be
//! recovered from the tail of a composite) while still sorting primarily by
//! the encoded value.
//!
//! Everything here is pure and allocation-light; there is no I/O in this
//! crate.

mod encoding;
mod index_key;

pub use encoding::{
    compare_bytes, decode_f64, decode_i64, encode_decimal, encode_f64, encode_i64, encode_value,
    prefix_upper_bound, Value,
};
pub use index_key::{compose_index_entry, extract_pk, extract_prefix};
