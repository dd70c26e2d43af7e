use serde::{Deserialize, Serialize};

/// A delivered note. Field names match the persisted snapshot format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Milliseconds since the epoch, assigned by the receiving GM.
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(rename = "senderName")]
    pub sender_name: String,
    #[serde(rename = "senderColor")]
    pub sender_color: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Gm,
    Player,
}

impl Role {
    /// Whether this role accepts, stores and alerts on incoming notes.
    pub fn is_authoritative(self) -> bool {
        matches!(self, Role::Gm)
    }
}

/// Entry in the participant directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub color: String,
    pub role: Role,
    pub active: bool,
}
