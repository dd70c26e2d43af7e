use std::io::{self, Write};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::common::{Note, NoteEvent};

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("no async runtime available for alerting")]
    NoRuntime,
    #[error("presentation channel closed")]
    Closed,
}

/// What the delivery core needs from whatever displays notes.
///
/// Clearing flows the other way: the display sends
/// [`NoteCommand::ClearHistory`](crate::common::NoteCommand::ClearHistory)
/// and the node calls back into the coordinator.
pub trait Presenter: Send {
    fn render(&mut self, notes: &[Note]);

    /// Sound/flash for a freshly accepted note. Must not block; errors are
    /// logged by the caller and never affect the stored note.
    fn alert(&mut self, note: &Note) -> Result<(), PresentError>;
}

/// Forwards history and alerts to the egui window over the event channel.
pub struct ChannelPresenter {
    events: mpsc::Sender<NoteEvent>,
    play_sound: bool,
}

impl ChannelPresenter {
    pub fn new(events: mpsc::Sender<NoteEvent>, play_sound: bool) -> Self {
        Self { events, play_sound }
    }
}

impl Presenter for ChannelPresenter {
    fn render(&mut self, notes: &[Note]) {
        if let Err(err) = self
            .events
            .try_send(NoteEvent::HistoryChanged(notes.to_vec()))
        {
            log::warn!("Failed to push history to panel: {err}");
        }
    }

    fn alert(&mut self, note: &Note) -> Result<(), PresentError> {
        if self.events.is_closed() {
            return Err(PresentError::Closed);
        }
        let runtime = Handle::try_current().map_err(|_| PresentError::NoRuntime)?;
        let events = self.events.clone();
        let note = note.clone();
        let play_sound = self.play_sound;

        runtime.spawn(async move {
            if play_sound {
                if let Err(err) = chime() {
                    log::warn!("Failed to play note chime: {err}");
                }
            }
            if let Err(err) = events.send(NoteEvent::NoteArrived(note)).await {
                log::warn!("Failed to flash panel: {err}");
            }
        });
        Ok(())
    }
}

/// Headless display: notes go to the log.
pub struct LogPresenter {
    play_sound: bool,
}

impl LogPresenter {
    pub fn new(play_sound: bool) -> Self {
        Self { play_sound }
    }
}

impl Presenter for LogPresenter {
    fn render(&mut self, notes: &[Note]) {
        log::debug!("History now holds {} notes", notes.len());
    }

    fn alert(&mut self, note: &Note) -> Result<(), PresentError> {
        log::info!("[{}] {}", note.sender_name, note.message);
        if self.play_sound {
            if let Err(err) = chime() {
                log::warn!("Failed to play note chime: {err}");
            }
        }
        Ok(())
    }
}

/// Terminal bell.
fn chime() -> io::Result<()> {
    let mut stderr = io::stderr();
    stderr.write_all(b"\x07")?;
    stderr.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note() -> Note {
        Note {
            timestamp: 1,
            sender_id: "p1".into(),
            sender_name: "Kestrel".into(),
            sender_color: "#336699".into(),
            message: "psst".into(),
        }
    }

    #[tokio::test]
    async fn channel_presenter_forwards_history_and_alerts() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut presenter = ChannelPresenter::new(tx, false);

        presenter.render(&[note()]);
        assert!(matches!(
            rx.recv().await,
            Some(NoteEvent::HistoryChanged(notes)) if notes.len() == 1
        ));

        presenter.alert(&note()).unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(NoteEvent::NoteArrived(arrived)) if arrived.message == "psst"
        ));
    }

    #[test]
    fn alert_without_runtime_fails_softly() {
        let (tx, _rx) = mpsc::channel(8);
        let mut presenter = ChannelPresenter::new(tx, false);
        assert!(matches!(presenter.alert(&note()), Err(PresentError::NoRuntime)));
    }

    #[test]
    fn alert_after_ui_closed_is_an_error() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let mut presenter = ChannelPresenter::new(tx, false);
        assert!(matches!(presenter.alert(&note()), Err(PresentError::Closed)));
    }
}
