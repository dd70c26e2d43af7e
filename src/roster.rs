use std::collections::HashMap;
use std::hash::Hash;

use crate::common::{Participant, Role};
use crate::config::{AppConfig, ParticipantEntry};

const FALLBACK_COLOR: &str = "#000000";

/// Live participant directory consulted at acceptance time.
pub trait Directory {
    fn resolve(&self, participant_id: &str) -> Option<Participant>;

    /// Whether any GM is currently active.
    fn authoritative_online(&self) -> bool;
}

/// Participants declared in the config, with liveness learned at runtime.
#[derive(Debug, Clone)]
pub struct Roster {
    local_id: String,
    participants: HashMap<String, Participant>,
}

impl Roster {
    pub fn new(local_id: impl Into<String>, entries: &[ParticipantEntry]) -> Self {
        let local_id = local_id.into();
        let participants = entries
            .iter()
            .map(|entry| {
                let participant = Participant {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    color: normalize_color(&entry.color),
                    role: entry.role,
                    active: entry.id == local_id,
                };
                (entry.id.clone(), participant)
            })
            .collect();

        Self {
            local_id,
            participants,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.identity.clone(), &config.participants)
    }

    pub fn local(&self) -> Option<&Participant> {
        self.participants.get(&self.local_id)
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Marks a participant active or inactive. Returns `true` if anything changed.
    /// The local participant always stays active.
    pub fn set_active(&mut self, participant_id: &str, active: bool) -> bool {
        if participant_id == self.local_id {
            return false;
        }
        match self.participants.get_mut(participant_id) {
            Some(participant) if participant.active != active => {
                participant.active = active;
                true
            }
            _ => false,
        }
    }

    /// Participants sorted GM first, then by name.
    pub fn participants(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> = self.participants.values().cloned().collect();
        list.sort_by(|a, b| {
            b.role
                .is_authoritative()
                .cmp(&a.role.is_authoritative())
                .then_with(|| a.name.cmp(&b.name))
        });
        list
    }
}

impl Directory for Roster {
    fn resolve(&self, participant_id: &str) -> Option<Participant> {
        self.participants.get(participant_id).cloned()
    }

    fn authoritative_online(&self) -> bool {
        self.participants
            .values()
            .any(|participant| participant.role == Role::Gm && participant.active)
    }
}

/// Which participant each connected peer announced itself as.
///
/// Several peers may claim the same participant (one player on two
/// machines); the participant stays active until the last of them leaves.
#[derive(Debug)]
pub struct PeerPresence<P> {
    peers: HashMap<P, String>,
}

impl<P: Eq + Hash> PeerPresence<P> {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }

    /// Records `peer` as `participant_id`. Returns `true` if the roster changed.
    pub fn announce(&mut self, roster: &mut Roster, peer: P, participant_id: &str) -> bool {
        if roster.resolve(participant_id).is_none() {
            log::debug!("Ignoring presence from unknown participant {participant_id}");
            return false;
        }

        let mut changed = false;
        let previous = self.peers.insert(peer, participant_id.to_string());
        if let Some(previous) = previous.filter(|previous| previous != participant_id) {
            if !self.is_claimed(&previous) {
                changed |= roster.set_active(&previous, false);
            }
        }
        roster.set_active(participant_id, true) || changed
    }

    /// Forgets `peer`. Returns `true` if the roster changed.
    pub fn depart(&mut self, roster: &mut Roster, peer: &P) -> bool {
        let Some(participant_id) = self.peers.remove(peer) else {
            return false;
        };
        !self.is_claimed(&participant_id) && roster.set_active(&participant_id, false)
    }

    fn is_claimed(&self, participant_id: &str) -> bool {
        self.peers.values().any(|claimed| claimed == participant_id)
    }
}

impl<P: Eq + Hash> Default for PeerPresence<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalizes `#rgb` / `#rrggbb` (hash optional) to lowercase `#rrggbb`.
pub fn normalize_color(raw: &str) -> String {
    let digits = raw.trim().trim_start_matches('#');
    let expanded = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => digits.to_string(),
        _ => return FALLBACK_COLOR.to_string(),
    };

    match hex::decode(&expanded) {
        Ok(bytes) => format!("#{}", hex::encode(bytes)),
        Err(_) => FALLBACK_COLOR.to_string(),
    }
}

/// Parses a normalized colour into RGB components.
pub fn color_components(color: &str) -> Option<[u8; 3]> {
    let bytes = hex::decode(color.trim_start_matches('#')).ok()?;
    <[u8; 3]>::try_from(bytes.as_slice()).ok()
}
