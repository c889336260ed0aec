//! Write-ahead log: binary frame codec, group-commit writer, and recovery.
//!
//! Every durable state transition in the engine passes through here first.
//! Frames are `len:u32 | payload:len bytes | crc32:u32` (see
//! [`frame::wrap_frame`]); [`WalWriter`] batches concurrent commits behind a
//! single fsync, and [`recover`] replays committed transactions back into
//! caller-supplied apply closures while truncating any torn tail.

mod frame;
mod recovery;
mod writer;

pub use frame::{
    decode_payload, encode_begin, encode_commit, encode_delete, encode_drop_table, encode_put,
    read_frame, wrap_frame, FrameReadError, Payload,
};
pub use recovery::{recover, CommittedTx, Op};
pub use writer::WalWriter;

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("wal writer has been disposed")]
    Disposed,
}

impl WalError {
    pub(crate) fn io_kind(&self) -> io::ErrorKind {
        match self {
            WalError::Io(e) => e.kind(),
            WalError::Disposed => io::ErrorKind::Other,
        }
    }
}
