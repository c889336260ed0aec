//! Immutable, sorted, on-disk segment (SST) files.
//!
//! A checkpoint freezes a logical name's [`memtable::MemTable`], merges it
//! with the logical name's previous segment, and publishes the result as a
//! new segment via [`write_segment`]. Segments are read-only from the
//! moment they're published: [`SstReader`] serves point lookups and range
//! scans and tolerates the file being atomically replaced out from under it
//! at the next checkpoint.
//!
//! ## File layout
//!
//! ```text
//! magic "SSTv1\0\0\0" (8B) | records... | trailer: count:u32
//! ```
//!
//! Each record is `key_len:u32 | value_len:u32 | key | value`, with keys
//! strictly increasing in lex order. The optional `<name>.sst.sxi` sidecar
//! holds a sparse `(key, file_offset)` index sampled every
//! [`format::SIDECAR_SAMPLE_RATE`]th record for faster-than-linear seeks; it
//! is advisory and fully reconstructible from the data section alone.

mod format;
mod reader;
mod writer;

pub use format::MAGIC;
pub use reader::SstReader;
pub use writer::write_segment;

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SstError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("segment magic mismatch or truncated header")]
    InvalidHeader,
    #[error("segment shorter than header + trailer")]
    Truncated,
}

#[cfg(test)]
mod tests;
