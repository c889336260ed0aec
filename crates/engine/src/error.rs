//! Engine-level error taxonomy.
//!
//! Every lower crate's narrow error enum (`wal::WalError`, `sstable::SstError`)
//! is folded in here via `#[from]`; callers only ever see `WalnutError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalnutError {
    #[error("wal error: {0}")]
    Wal(#[from] wal::WalError),

    #[error("segment error: {0}")]
    Segment(#[from] sstable::SstError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("unique index violation on index {index}")]
    UniqueViolation { index: String },

    #[error("decryption failed for table {table}")]
    DecryptionFailed { table: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("transaction already consumed")]
    TransactionConsumed,
}

pub type Result<T> = std::result::Result<T, WalnutError>;
