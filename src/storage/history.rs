use serde_json::Value;

use crate::common::Note;

use super::{KeyValueStore, StorageError};

/// Settings key holding the persisted note array.
pub const HISTORY_KEY: &str = "history";

/// Result of reading the persisted snapshot. A failed read still yields a
/// (possibly empty) list; the error is handed back as a warning.
#[derive(Debug)]
pub struct HistoryLoad {
    pub notes: Vec<Note>,
    pub warning: Option<StorageError>,
}

/// Bounded, insertion-ordered log of delivered notes.
///
/// The in-memory list is the source of truth for the process lifetime. Every
/// mutation rewrites the whole snapshot when persistence is enabled and this
/// store belongs to the GM; write failures are logged and otherwise ignored.
pub struct HistoryStore {
    notes: Vec<Note>,
    limit: usize,
    persist: bool,
    authoritative: bool,
    store: Box<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(
        store: Box<dyn KeyValueStore>,
        limit: usize,
        persist: bool,
        authoritative: bool,
    ) -> Self {
        Self {
            notes: Vec::new(),
            limit: limit.max(1),
            persist,
            authoritative,
            store,
        }
    }

    /// Reads the persisted snapshot without touching the in-memory log.
    pub fn load(&self) -> HistoryLoad {
        if !self.persist {
            return HistoryLoad {
                notes: Vec::new(),
                warning: None,
            };
        }

        match self.store.get(HISTORY_KEY) {
            Ok(Some(value @ Value::Array(_))) => match serde_json::from_value(value) {
                Ok(notes) => HistoryLoad {
                    notes,
                    warning: None,
                },
                Err(err) => {
                    log::warn!("Failed to decode stored history: {err}");
                    HistoryLoad {
                        notes: Vec::new(),
                        warning: Some(err.into()),
                    }
                }
            },
            Ok(_) => HistoryLoad {
                notes: Vec::new(),
                warning: None,
            },
            Err(err) => {
                log::warn!("Failed to load history: {err}");
                HistoryLoad {
                    notes: Vec::new(),
                    warning: Some(err),
                }
            }
        }
    }

    /// Replaces the in-memory log with the persisted snapshot, keeping the
    /// newest `limit` entries.
    pub fn restore(&mut self) -> Option<StorageError> {
        let HistoryLoad { notes, warning } = self.load();
        self.notes = notes;
        self.evict_overflow();
        if !self.notes.is_empty() {
            log::info!("Restored {} notes from history", self.notes.len());
        }
        warning
    }

    pub fn append(&mut self, note: Note) {
        self.notes.push(note);
        self.evict_overflow();
        self.save();
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.save();
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    fn evict_overflow(&mut self) {
        if self.notes.len() > self.limit {
            let excess = self.notes.len() - self.limit;
            self.notes.drain(..excess);
        }
    }

    fn save(&mut self) {
        if !self.persist || !self.authoritative {
            return;
        }

        let result = serde_json::to_value(&self.notes)
            .map_err(StorageError::from)
            .and_then(|value| self.store.set(HISTORY_KEY, &value));
        if let Err(err) = result {
            log::warn!("Failed to save history: {err}");
        }
    }
}
