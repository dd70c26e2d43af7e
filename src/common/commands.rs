use std::sync::LazyLock;

use regex::Regex;

static NOTE_COMMAND: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?is)^/(?:nn|ninja)\s+(.+)$"));
static HELP_COMMAND: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)^/nnhelp$"));

/// A pattern that fails to compile disables its command instead of panicking.
fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            log::error!("Invalid chat command pattern {pattern}: {err}");
            None
        }
    }
}

/// Commands the UI sends down to the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteCommand {
    SendNote(String),
    ShowHelp,
    ClearHistory,
}

/// A line typed into the chat input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// `/nn <text>` or `/ninja <text>`
    Note(String),
    /// `/nnhelp`
    Help,
    /// Anything else; left to the regular chat.
    Passthrough,
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let text = line.trim();

        if let Some(captures) = NOTE_COMMAND.as_ref().and_then(|regex| regex.captures(text)) {
            let message = captures[1].trim();
            return if message.is_empty() {
                ChatCommand::Passthrough
            } else {
                ChatCommand::Note(message.to_string())
            };
        }

        if HELP_COMMAND.as_ref().is_some_and(|regex| regex.is_match(text)) {
            return ChatCommand::Help;
        }

        ChatCommand::Passthrough
    }

    pub fn into_note_command(self) -> Option<NoteCommand> {
        match self {
            ChatCommand::Note(message) => Some(NoteCommand::SendNote(message)),
            ChatCommand::Help => Some(NoteCommand::ShowHelp),
            ChatCommand::Passthrough => None,
        }
    }
}
