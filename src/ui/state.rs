use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};

use crate::common::{Note, NoticeLevel, Participant, Role};

const FLASH_DURATION: Duration = Duration::from_secs(2);
const NOTICE_LIFETIME: Duration = Duration::from_secs(6);
const MAX_NOTICES: usize = 5;

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub shown_at: Instant,
}

/// Local UI state.
pub struct PanelState {
    pub role: Role,
    pub notes: Vec<Note>,
    pub participants: Vec<Participant>,
    pub notices: Vec<Notice>,
    pub input_text: String,
    pub panel_open: bool,
    pub flash_until: Option<Instant>,
}

impl PanelState {
    pub fn new(role: Role, auto_open_panel: bool) -> Self {
        let panel_open = role.is_authoritative() && auto_open_panel;
        Self {
            role,
            notes: Vec::new(),
            participants: Vec::new(),
            notices: Vec::new(),
            input_text: String::new(),
            panel_open,
            flash_until: panel_open.then(|| Instant::now() + FLASH_DURATION),
        }
    }

    pub fn set_history(&mut self, notes: Vec<Note>) {
        self.notes = notes;
    }

    /// A new note brings the panel up and flashes it.
    pub fn note_arrived(&mut self, now: Instant) {
        if self.role.is_authoritative() {
            self.panel_open = true;
            self.flash_until = Some(now + FLASH_DURATION);
        }
    }

    pub fn open_panel(&mut self, now: Instant) {
        if !self.role.is_authoritative() {
            self.push_notice(
                NoticeLevel::Warn,
                "Only GMs can open the Ninja Notes panel.".to_string(),
                now,
            );
            return;
        }
        self.panel_open = true;
        self.flash_until = Some(now + FLASH_DURATION);
    }

    pub fn is_flashing(&self, now: Instant) -> bool {
        self.flash_until.is_some_and(|until| now < until)
    }

    pub fn push_notice(&mut self, level: NoticeLevel, text: String, now: Instant) {
        self.notices.push(Notice {
            level,
            text,
            shown_at: now,
        });
        if self.notices.len() > MAX_NOTICES {
            let excess = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..excess);
        }
    }

    pub fn expire_notices(&mut self, now: Instant) {
        self.notices
            .retain(|notice| now.duration_since(notice.shown_at) < NOTICE_LIFETIME);
    }

    pub fn gm_online(&self) -> bool {
        self.participants
            .iter()
            .any(|participant| participant.role == Role::Gm && participant.active)
    }
}

/// `HH:MM` in local time.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default()
}
