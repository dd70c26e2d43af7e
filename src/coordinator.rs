use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::common::envelope::{Rejection, normalize_message};
use crate::common::{Note, NoteEvent, NoteRequest, Role, ThrottleNotice, WireMessage};
use crate::config::{AppConfig, ThrottleConfig};
use crate::presenter::Presenter;
use crate::roster::Directory;
use crate::storage::{HistoryStore, KeyValueStore, StorageError};
use crate::throttle::{Clock, SlidingWindowThrottle};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Broadcast-only channel shared by every peer.
pub trait Broadcast {
    fn broadcast(&mut self, message: &WireMessage) -> Result<(), TransportError>;
}

/// Result of a local send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent { receiver_online: bool },
    Throttled { retry_after: Duration },
    Empty,
    TooLong { chars: usize, max: usize },
    /// The GM tried to send a note to themselves.
    NotAllowed,
    Undelivered(String),
}

/// Result of handling one inbound wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Accepted(Note),
    /// The sender exceeded the GM-side limit; a `throttled` notice went out.
    SenderThrottled {
        sender_id: String,
        retry_after: Duration,
    },
    Discarded(Rejection),
    /// A `throttled` notice addressed to this peer.
    LocalThrottled { retry_after: Duration },
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub throttle: ThrottleConfig,
    pub receiver_online: bool,
}

/// Owns both throttle registries, the note history and the presenter for one
/// peer, and runs the send and receive sides of the note protocol.
pub struct DeliveryCoordinator {
    local_id: String,
    role: Role,
    throttle: ThrottleConfig,
    max_message_chars: usize,
    sender_throttle: SlidingWindowThrottle,
    receiver_throttle: SlidingWindowThrottle,
    history: HistoryStore,
    presenter: Box<dyn Presenter>,
    clock: Arc<dyn Clock>,
}

impl DeliveryCoordinator {
    pub fn new(
        local_id: impl Into<String>,
        role: Role,
        config: &AppConfig,
        store: Box<dyn KeyValueStore>,
        presenter: Box<dyn Presenter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let history = HistoryStore::new(
            store,
            config.history_limit,
            config.persist_history,
            role.is_authoritative(),
        );
        Self {
            local_id: local_id.into(),
            role,
            throttle: config.throttle(),
            max_message_chars: config.max_message_chars,
            sender_throttle: SlidingWindowThrottle::new(clock.clone()),
            receiver_throttle: SlidingWindowThrottle::new(clock.clone()),
            history,
            presenter,
            clock,
        }
    }

    /// Restores persisted history on the GM and renders it.
    pub fn startup(&mut self) -> Option<StorageError> {
        if !self.role.is_authoritative() {
            return None;
        }
        let warning = self.history.restore();
        self.presenter.render(self.history.notes());
        warning
    }

    pub fn submit(
        &mut self,
        raw_message: &str,
        directory: &dyn Directory,
        channel: &mut dyn Broadcast,
    ) -> SubmitOutcome {
        if self.role.is_authoritative() {
            return SubmitOutcome::NotAllowed;
        }

        let message = match normalize_message(raw_message, self.max_message_chars) {
            Ok(message) => message,
            Err(Rejection::TooLong { chars, max }) => return SubmitOutcome::TooLong { chars, max },
            Err(_) => return SubmitOutcome::Empty,
        };

        let ThrottleConfig { limit, window } = self.throttle;
        if !self.sender_throttle.try_acquire(&self.local_id, limit, window) {
            let retry_after = self.sender_throttle.remaining_cooldown(&self.local_id, window);
            log::info!("Local send throttled for {retry_after:?}");
            return SubmitOutcome::Throttled { retry_after };
        }

        let receiver_online = directory.authoritative_online();
        if !receiver_online {
            log::warn!("No GM online; note will wait in history until one connects");
        }

        let request = WireMessage::NewNote(NoteRequest {
            sender_id: self.local_id.clone(),
            message,
        });
        match channel.broadcast(&request) {
            Ok(()) => SubmitOutcome::Sent { receiver_online },
            Err(err) => {
                log::warn!("Failed to transmit note: {err}");
                SubmitOutcome::Undelivered(err.to_string())
            }
        }
    }

    pub fn handle_wire(
        &mut self,
        message: WireMessage,
        directory: &dyn Directory,
        channel: &mut dyn Broadcast,
    ) -> ReceiveOutcome {
        match message {
            WireMessage::NewNote(request) => self.receive_note(request, directory, channel),
            WireMessage::Throttled(notice) => self.receive_throttle_notice(notice),
            WireMessage::Presence(_) => ReceiveOutcome::Ignored,
        }
    }

    fn receive_note(
        &mut self,
        request: NoteRequest,
        directory: &dyn Directory,
        channel: &mut dyn Broadcast,
    ) -> ReceiveOutcome {
        if !self.role.is_authoritative() {
            return ReceiveOutcome::Ignored;
        }

        // Unknown senders are dropped before they can touch throttle state.
        let Some(sender) = directory.resolve(&request.sender_id) else {
            log::debug!("Dropping note from unknown sender {}", request.sender_id);
            return ReceiveOutcome::Discarded(Rejection::UnknownSender(request.sender_id));
        };

        let ThrottleConfig { limit, window } = self.throttle;
        if !self.receiver_throttle.try_acquire(&sender.id, limit, window) {
            let retry_after = self.receiver_throttle.remaining_cooldown(&sender.id, window);
            let notice = WireMessage::Throttled(ThrottleNotice {
                target_id: sender.id.clone(),
                retry_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            });
            if let Err(err) = channel.broadcast(&notice) {
                log::warn!("Failed to notify {} about throttling: {err}", sender.id);
            }
            return ReceiveOutcome::SenderThrottled {
                sender_id: sender.id,
                retry_after,
            };
        }

        let message = match normalize_message(&request.message, self.max_message_chars) {
            Ok(message) => message,
            Err(rejection) => {
                log::debug!("Dropping note from {}: {rejection}", sender.id);
                return ReceiveOutcome::Discarded(rejection);
            }
        };

        let note = Note {
            timestamp: self.clock.now_ms(),
            sender_id: sender.id,
            sender_name: sender.name,
            sender_color: sender.color,
            message,
        };
        log::info!("Accepted note from {}", note.sender_name);

        self.history.append(note.clone());
        self.presenter.render(self.history.notes());
        if let Err(err) = self.presenter.alert(&note) {
            log::warn!("Note alert failed: {err}");
        }

        ReceiveOutcome::Accepted(note)
    }

    fn receive_throttle_notice(&self, notice: ThrottleNotice) -> ReceiveOutcome {
        if notice.target_id != self.local_id {
            return ReceiveOutcome::Ignored;
        }
        let retry_after = if notice.retry_ms == 0 {
            self.throttle.window
        } else {
            Duration::from_millis(notice.retry_ms)
        };
        ReceiveOutcome::LocalThrottled { retry_after }
    }

    /// Empties the GM history. Returns `false` for non-GM peers.
    pub fn clear_history(&mut self) -> bool {
        if !self.role.is_authoritative() {
            return false;
        }
        self.history.clear();
        self.presenter.render(self.history.notes());
        true
    }

    /// Forgets throttle keys idle for a full window.
    pub fn prune_idle(&mut self) -> usize {
        let window = self.throttle.window;
        self.sender_throttle.prune_idle(window) + self.receiver_throttle.prune_idle(window)
    }

    pub fn status(&self, directory: &dyn Directory) -> Status {
        Status {
            throttle: self.throttle,
            receiver_online: directory.authoritative_online(),
        }
    }

    pub fn notes(&self) -> &[Note] {
        self.history.notes()
    }
}

impl SubmitOutcome {
    /// User-facing notices for this outcome.
    pub fn notices(&self) -> Vec<NoteEvent> {
        match self {
            SubmitOutcome::Sent {
                receiver_online: true,
            } => vec![NoteEvent::info("Ninja Note sent!")],
            SubmitOutcome::Sent {
                receiver_online: false,
            } => vec![
                NoteEvent::warn(
                    "No GM is online. Your note will only be seen when a GM logs in.",
                ),
                NoteEvent::info("Ninja Note sent!"),
            ],
            SubmitOutcome::Throttled { retry_after } => vec![NoteEvent::warn(format!(
                "Please wait {} seconds before sending another note.",
                whole_seconds(*retry_after)
            ))],
            SubmitOutcome::Empty => Vec::new(),
            SubmitOutcome::TooLong { chars, max } => vec![NoteEvent::warn(format!(
                "Notes are limited to {max} characters ({chars} given)."
            ))],
            SubmitOutcome::NotAllowed => {
                vec![NoteEvent::info("GMs cannot send notes to themselves!")]
            }
            SubmitOutcome::Undelivered(err) => {
                vec![NoteEvent::warn(format!("Could not send note: {err}"))]
            }
        }
    }
}

impl ReceiveOutcome {
    pub fn notices(&self) -> Vec<NoteEvent> {
        match self {
            ReceiveOutcome::Accepted(note) => {
                vec![NoteEvent::info(format!("Ninja Note from {}", note.sender_name))]
            }
            ReceiveOutcome::LocalThrottled { retry_after } => vec![NoteEvent::warn(format!(
                "Sending too fast! Wait {} seconds.",
                whole_seconds(*retry_after)
            ))],
            _ => Vec::new(),
        }
    }
}

impl Status {
    pub fn help_text(&self) -> String {
        format!(
            concat!(
                "Ninja Notes\n",
                "  /nn <message>  send a secret note to the GM\n",
                "  /nnhelp        show this help\n",
                "Limits: {} notes per {} seconds\n",
                "GM status: {}",
            ),
            self.throttle.limit,
            self.throttle.window.as_secs(),
            if self.receiver_online { "online" } else { "offline" }
        )
    }
}

/// Rounds up to whole seconds for display.
pub fn whole_seconds(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis().div_ceil(1000)).unwrap_or(u64::MAX)
}
