use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::{KeyValueStore, StorageError};

/// In-process store. Clones share contents, so a caller can keep a handle
/// for inspection after moving one into a [`HistoryStore`](super::HistoryStore).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, Value>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.writes).unwrap_or(0)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))?;
        Ok(inner.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<(), StorageError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))?;
        inner.values.insert(key.to_string(), value.clone());
        inner.writes += 1;
        Ok(())
    }
}
