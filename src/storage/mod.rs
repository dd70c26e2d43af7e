pub mod database;
pub mod history;
pub mod memory;
pub mod settings_db;

pub use history::{HistoryLoad, HistoryStore};
pub use memory::MemoryStore;
pub use settings_db::SettingsDatabase;

use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("malformed stored value: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value settings store holding JSON values.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&mut self, key: &str, value: &Value) -> Result<(), StorageError>;
}

/// Ensure the parent directory of a database file exists
pub fn ensure_parent_dir(path: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
