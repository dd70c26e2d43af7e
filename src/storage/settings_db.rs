use rusqlite::{OptionalExtension, Result as SqlResult, params};
use serde_json::Value;
use std::path::Path;

use super::database::Database;
use super::{KeyValueStore, StorageError};

/// SQLite-backed settings store: one row per key, JSON text values.
pub struct SettingsDatabase {
    db: Database,
}

impl SettingsDatabase {
    /// Open (or create) the settings database at `path`
    pub fn with_path<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let db = Database::new(path)?;
        let settings_db = Self { db };
        settings_db.init_schema()?;
        Ok(settings_db)
    }

    pub fn in_memory() -> SqlResult<Self> {
        let settings_db = Self {
            db: Database::in_memory()?,
        };
        settings_db.init_schema()?;
        Ok(settings_db)
    }

    fn init_schema(&self) -> SqlResult<()> {
        let conn = self.db.connection();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )?;
        Ok(())
    }

    /// Raw JSON text stored under `key`
    fn read_raw(&self, key: &str) -> SqlResult<Option<String>> {
        let conn = self.db.connection();
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    }

    fn write_raw(&self, key: &str, value: &str) -> SqlResult<()> {
        let conn = self.db.connection();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))",
            params![key, value],
        )?;
        Ok(())
    }
}

impl KeyValueStore for SettingsDatabase {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        match self.read_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.write_raw(key, &raw)?;
        Ok(())
    }
}
