//! # config — public contracts and options
//!
//! The types an embedding application touches when it opens a WalnutDB
//! database: durability policy, per-table options, logical-name derivation,
//! the row descriptor an application supplies in place of reflection, and
//! the `Encryptor` trait the engine calls through for at-rest encryption.
//!
//! Nothing in this crate performs I/O; it is pure configuration plumbing
//! consumed by `engine`.

mod descriptor;
mod durability;
mod encryptor;
mod naming;
mod options;

pub use descriptor::{IndexDescriptor, RowDescriptor};
pub use durability::Durability;
pub use encryptor::Encryptor;
pub use naming::TypeNaming;
pub use options::TableOptions;

pub use bytekey::Value;
