pub mod commands;
pub mod envelope;
pub mod events;
pub mod types;

pub use commands::{ChatCommand, NoteCommand};
pub use envelope::{NoteRequest, ThrottleNotice, WireMessage};
pub use events::{NoteEvent, NoticeLevel};
pub use types::{Note, Participant, Role};
