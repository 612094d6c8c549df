//! In-memory implementation of [`TextStore`].

use std::collections::BTreeMap;

use crate::error::StorageError;
use crate::traits::TextStore;

/// Ephemeral backend holding everything in a sorted map. Semantics match
/// the SQLite backend exactly (including lexicographic `list` order).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: BTreeMap<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }
}

impl TextStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}
