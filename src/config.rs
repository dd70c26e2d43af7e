use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::Role;

pub const DEFAULT_CONFIG_PATH: &str = "config/ninja_notes.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub identity: String,
    pub auto_open_panel: bool,
    pub play_sound: bool,
    pub max_notes_per_window: u32,
    pub window_seconds: u64,
    pub persist_history: bool,
    pub history_limit: usize,
    pub max_message_chars: usize,
    pub database_path: String,
    pub listen_addr: String,
    pub participants: Vec<ParticipantEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            identity: String::new(),
            auto_open_panel: true,
            play_sound: true,
            max_notes_per_window: 3,
            window_seconds: 60,
            persist_history: true,
            history_limit: 100,
            max_message_chars: 2000,
            database_path: "data/ninja_notes.db".to_string(),
            listen_addr: "/ip4/0.0.0.0/tcp/0".to_string(),
            participants: Vec::new(),
        }
    }
}

/// Throttle parameters shared by the sender precheck and the GM enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub limit: usize,
    pub window: Duration,
}

impl AppConfig {
    /// Clamps numeric options into their supported ranges.
    pub fn normalized(mut self) -> Self {
        self.max_notes_per_window = self.max_notes_per_window.clamp(1, 10);
        self.window_seconds = self.window_seconds.max(1);
        self.history_limit = self.history_limit.clamp(10, 500);
        self.max_message_chars = self.max_message_chars.max(1);
        self
    }

    pub fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig {
            limit: self.max_notes_per_window as usize,
            window: Duration::from_secs(self.window_seconds),
        }
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    let config = match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    };
    config.normalized()
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.max_notes_per_window, 3);
        assert_eq!(config.history_limit, 100);
        assert!(config.persist_history);
        assert_eq!(
            config.throttle(),
            ThrottleConfig {
                limit: 3,
                window: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn reads_camel_case_keys_and_clamps_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        fs::write(
            &path,
            r##"{
                "identity": "p1",
                "maxNotesPerWindow": 40,
                "windowSeconds": 0,
                "historyLimit": 3,
                "persistHistory": false,
                "participants": [
                    { "id": "gm", "name": "Game Master", "color": "#ff0000", "role": "gm" },
                    { "id": "p1", "name": "Kestrel", "role": "player" }
                ]
            }"##,
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.identity, "p1");
        assert_eq!(config.max_notes_per_window, 10);
        assert_eq!(config.window_seconds, 1);
        assert_eq!(config.history_limit, 10);
        assert!(!config.persist_history);
        assert!(config.play_sound);
        assert_eq!(config.participants.len(), 2);
        assert_eq!(config.participants[0].role, Role::Gm);
        assert_eq!(config.participants[1].color, "");
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(path.to_str().unwrap()).window_seconds, 60);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/notes.json");
        let path = path.to_str().unwrap();
        let config = AppConfig {
            identity: "gm".into(),
            history_limit: 250,
            ..AppConfig::default()
        };
        save_config(path, &config).unwrap();
        let loaded = load_config(path);
        assert_eq!(loaded.identity, "gm");
        assert_eq!(loaded.history_limit, 250);
    }
}
