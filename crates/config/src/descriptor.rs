use crate::Value;
use std::sync::Arc;

/// Describes one secondary index over a table.
///
/// `extract` pulls the indexed [`Value`] out of a row's *plaintext* value
/// bytes (decryption, if configured, has already happened by the time this
/// runs). Object-to-bytes serialization stays external to the core: the
/// closure is free to decode however the caller serialized the row — the
/// core never inspects the bytes itself.
#[derive(Clone)]
pub struct IndexDescriptor {
    pub name: String,
    pub unique: bool,
    /// Fractional-digit scale passed through to [`bytekey::encoding::encode_decimal`]
    /// when `extract` returns [`Value::Decimal`]. Ignored for other variants.
    pub scale: Option<u32>,
    pub extract: Arc<dyn Fn(&[u8]) -> Value + Send + Sync>,
}

impl std::fmt::Debug for IndexDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDescriptor")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .field("scale", &self.scale)
            .finish()
    }
}

impl IndexDescriptor {
    pub fn new(
        name: impl Into<String>,
        unique: bool,
        extract: impl Fn(&[u8]) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            unique,
            scale: None,
            extract: Arc::new(extract),
        }
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Explicit replacement for the source system's reflection-based attribute
/// discovery: the caller states, once per table, how to pull the primary
/// key, indexed values, and (optionally) a timestamp out of a row's
/// plaintext value bytes.
#[derive(Clone)]
pub struct RowDescriptor {
    pub pk_extract: Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>,
    pub indices: Vec<IndexDescriptor>,
    pub timestamp_extract: Option<Arc<dyn Fn(&[u8]) -> i64 + Send + Sync>>,
}

impl std::fmt::Debug for RowDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowDescriptor")
            .field("indices", &self.indices)
            .field("has_timestamp", &self.timestamp_extract.is_some())
            .finish()
    }
}

impl RowDescriptor {
    pub fn new(pk_extract: impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static) -> Self {
        Self {
            pk_extract: Arc::new(pk_extract),
            indices: Vec::new(),
            timestamp_extract: None,
        }
    }

    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.indices.push(index);
        self
    }

    pub fn with_timestamp(
        mut self,
        extract: impl Fn(&[u8]) -> i64 + Send + Sync + 'static,
    ) -> Self {
        self.timestamp_extract = Some(Arc::new(extract));
        self
    }

    pub fn unique_indices(&self) -> impl Iterator<Item = &IndexDescriptor> {
        self.indices.iter().filter(|i| i.unique)
    }
}
