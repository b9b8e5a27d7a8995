use crate::error::Result;
use std::sync::Arc;

/// Abstract interface for the key-value persistence primitive.
///
/// Values are opaque strings (JSON documents in practice). Implementations
/// must make `set` all-or-nothing: a reader sees either the old or the new
/// value, never a partial write.
pub trait KvBackend: Send + Sync {
    /// Returns Ok(None) if the key has never been set or was removed.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<B: KvBackend + ?Sized> KvBackend for Arc<B> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}
