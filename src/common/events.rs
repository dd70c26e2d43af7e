use super::types::{Note, Participant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
}

/// Events the node sends up to the UI.
#[derive(Debug, Clone)]
pub enum NoteEvent {
    /// Full GM history after any change.
    HistoryChanged(Vec<Note>),
    /// A note was accepted; the UI flashes and chimes.
    NoteArrived(Note),
    Notice { level: NoticeLevel, text: String },
    RosterChanged(Vec<Participant>),
}

impl NoteEvent {
    pub fn info(text: impl Into<String>) -> Self {
        NoteEvent::Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        NoteEvent::Notice {
            level: NoticeLevel::Warn,
            text: text.into(),
        }
    }
}
