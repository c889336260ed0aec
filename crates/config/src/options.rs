use crate::{Durability, Encryptor, TypeNaming};
use std::sync::Arc;

/// Per-table options supplied at table-open time.
#[derive(Clone)]
pub struct TableOptions {
    pub durability: Durability,
    pub encryption: Option<Arc<dyn Encryptor>>,
    pub type_naming: TypeNaming,
    /// Run a checkpoint when the table handle is dropped/closed.
    pub checkpoint_on_dispose: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            durability: Durability::default(),
            encryption: None,
            type_naming: TypeNaming::default(),
            checkpoint_on_dispose: false,
        }
    }
}

impl std::fmt::Debug for TableOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableOptions")
            .field("durability", &self.durability)
            .field("encrypted", &self.encryption.is_some())
            .field("type_naming", &self.type_naming)
            .field("checkpoint_on_dispose", &self.checkpoint_on_dispose)
            .finish()
    }
}

impl TableOptions {
    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    pub fn with_encryption(mut self, encryptor: Arc<dyn Encryptor>) -> Self {
        self.encryption = Some(encryptor);
        self
    }

    pub fn with_type_naming(mut self, naming: TypeNaming) -> Self {
        self.type_naming = naming;
        self
    }

    pub fn with_checkpoint_on_dispose(mut self, checkpoint_on_dispose: bool) -> Self {
        self.checkpoint_on_dispose = checkpoint_on_dispose;
        self
    }
}
