use std::sync::{Arc, Mutex};
use std::time::Duration;

use ninja_notes::common::envelope::{NoteRequest, Rejection, ThrottleNotice};
use ninja_notes::common::{Note, NoteEvent, NoticeLevel, Role, WireMessage};
use ninja_notes::config::{AppConfig, ParticipantEntry};
use ninja_notes::coordinator::{
    Broadcast, DeliveryCoordinator, ReceiveOutcome, SubmitOutcome, TransportError,
};
use ninja_notes::presenter::{PresentError, Presenter};
use ninja_notes::roster::Roster;
use ninja_notes::storage::{KeyValueStore, MemoryStore};
use ninja_notes::throttle::ManualClock;

#[derive(Default)]
struct RecordingChannel {
    sent: Vec<WireMessage>,
}

impl Broadcast for RecordingChannel {
    fn broadcast(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        self.sent.push(message.clone());
        Ok(())
    }
}

struct DeadChannel;

impl Broadcast for DeadChannel {
    fn broadcast(&mut self, _message: &WireMessage) -> Result<(), TransportError> {
        Err(TransportError::Publish("no peers".into()))
    }
}

#[derive(Default)]
struct PanelLog {
    renders: Vec<usize>,
    alerts: Vec<String>,
}

#[derive(Clone, Default)]
struct RecordingPresenter {
    log: Arc<Mutex<PanelLog>>,
    broken_alerts: bool,
}

impl Presenter for RecordingPresenter {
    fn render(&mut self, notes: &[Note]) {
        self.log.lock().unwrap().renders.push(notes.len());
    }

    fn alert(&mut self, note: &Note) -> Result<(), PresentError> {
        if self.broken_alerts {
            return Err(PresentError::Closed);
        }
        self.log.lock().unwrap().alerts.push(note.message.clone());
        Ok(())
    }
}

struct Table {
    config: AppConfig,
    clock: ManualClock,
    store: MemoryStore,
    presenter: RecordingPresenter,
}

impl Table {
    fn new(max_notes: u32, window_seconds: u64) -> Self {
        Self {
            config: AppConfig {
                max_notes_per_window: max_notes,
                window_seconds,
                participants: vec![
                    entry("gm", "Game Master", Role::Gm),
                    entry("p1", "Kestrel", Role::Player),
                    entry("p2", "Brannoc", Role::Player),
                ],
                ..AppConfig::default()
            },
            clock: ManualClock::starting_at(0),
            store: MemoryStore::new(),
            presenter: RecordingPresenter::default(),
        }
    }

    fn roster(&self, local_id: &str) -> Roster {
        Roster::new(local_id, &self.config.participants)
    }

    fn coordinator(&self, local_id: &str, role: Role) -> DeliveryCoordinator {
        DeliveryCoordinator::new(
            local_id,
            role,
            &self.config,
            Box::new(self.store.clone()),
            Box::new(self.presenter.clone()),
            Arc::new(self.clock.clone()),
        )
    }
}

fn entry(id: &str, name: &str, role: Role) -> ParticipantEntry {
    ParticipantEntry {
        id: id.into(),
        name: name.into(),
        color: "#3a7".into(),
        role,
    }
}

fn new_note(sender_id: &str, message: &str) -> WireMessage {
    WireMessage::NewNote(NoteRequest {
        sender_id: sender_id.into(),
        message: message.into(),
    })
}

#[test]
fn sender_precheck_rejects_fourth_rapid_note() {
    let table = Table::new(3, 60);
    let mut roster = table.roster("p1");
    roster.set_active("gm", true);
    let mut player = table.coordinator("p1", Role::Player);
    let mut channel = RecordingChannel::default();

    let mut outcomes = Vec::new();
    for t in 0..4 {
        table.clock.set(t);
        outcomes.push(player.submit("the innkeeper is a vampire", &roster, &mut channel));
    }

    assert_eq!(channel.sent.len(), 3);
    for outcome in &outcomes[..3] {
        assert_eq!(
            *outcome,
            SubmitOutcome::Sent {
                receiver_online: true
            }
        );
    }
    assert_eq!(
        outcomes[3],
        SubmitOutcome::Throttled {
            retry_after: Duration::from_millis(59_997)
        }
    );
    assert!(matches!(
        &outcomes[3].notices()[0],
        NoteEvent::Notice { level: NoticeLevel::Warn, text } if text.contains("wait 60 seconds")
    ));
}

#[test]
fn receiver_throttles_third_note_and_notifies_sender() {
    let table = Table::new(2, 1);
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();

    let mut outcomes = Vec::new();
    for t in [0, 100, 200] {
        table.clock.set(t);
        let note = new_note("p1", &format!("note at {t}"));
        outcomes.push(gm.handle_wire(note, &roster, &mut channel));
    }

    assert!(matches!(outcomes[0], ReceiveOutcome::Accepted(_)));
    assert!(matches!(outcomes[1], ReceiveOutcome::Accepted(_)));
    assert_eq!(
        outcomes[2],
        ReceiveOutcome::SenderThrottled {
            sender_id: "p1".into(),
            retry_after: Duration::from_millis(800),
        }
    );
    assert_eq!(gm.notes().len(), 2);
    assert_eq!(
        channel.sent,
        vec![WireMessage::Throttled(ThrottleNotice {
            target_id: "p1".into(),
            retry_ms: 800,
        })]
    );
}

#[test]
fn accepted_note_uses_directory_identity_and_receiver_clock() {
    let table = Table::new(3, 60);
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();

    table.clock.set(1_700_000_000_000);
    let outcome = gm.handle_wire(new_note("p2", "  I palm the key  "), &roster, &mut channel);

    let expected = Note {
        timestamp: 1_700_000_000_000,
        sender_id: "p2".into(),
        sender_name: "Brannoc".into(),
        sender_color: "#33aa77".into(),
        message: "I palm the key".into(),
    };
    assert_eq!(outcome, ReceiveOutcome::Accepted(expected.clone()));
    assert_eq!(gm.notes(), [expected]);
    assert!(channel.sent.is_empty());

    let log = table.presenter.log.lock().unwrap();
    assert_eq!(log.alerts, ["I palm the key"]);
    assert_eq!(log.renders.last(), Some(&1));
}

#[test]
fn history_keeps_newest_notes_in_arrival_order() {
    let mut table = Table::new(10, 60);
    table.config.history_limit = 3;
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();

    for n in 1..=5 {
        table.clock.set(n);
        gm.handle_wire(new_note("p1", &format!("N{n}")), &roster, &mut channel);
    }

    let kept: Vec<&str> = gm.notes().iter().map(|note| note.message.as_str()).collect();
    assert_eq!(kept, ["N3", "N4", "N5"]);

    let mut restarted = table.coordinator("gm", Role::Gm);
    assert!(restarted.startup().is_none());
    assert_eq!(restarted.notes(), gm.notes());
}

#[test]
fn disabled_persistence_never_writes_or_restores() {
    let mut table = Table::new(10, 60);
    table.config.persist_history = false;
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();

    assert!(gm.startup().is_none());
    gm.handle_wire(new_note("p1", "one"), &roster, &mut channel);
    gm.handle_wire(new_note("p2", "two"), &roster, &mut channel);
    assert!(gm.clear_history());
    gm.handle_wire(new_note("p1", "three"), &roster, &mut channel);

    assert_eq!(table.store.write_count(), 0);
    assert_eq!(table.store.get("history").unwrap(), None);

    let mut restarted = table.coordinator("gm", Role::Gm);
    restarted.startup();
    assert!(restarted.notes().is_empty());
}

#[test]
fn blank_messages_never_become_notes() {
    let table = Table::new(3, 60);
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();

    let outcome = gm.handle_wire(new_note("p1", " \n\t "), &roster, &mut channel);
    assert_eq!(outcome, ReceiveOutcome::Discarded(Rejection::EmptyMessage));
    assert!(gm.notes().is_empty());
    assert_eq!(table.store.write_count(), 0);

    let player_roster = table.roster("p1");
    let mut player = table.coordinator("p1", Role::Player);
    assert_eq!(
        player.submit("   ", &player_roster, &mut channel),
        SubmitOutcome::Empty
    );
    assert!(channel.sent.is_empty());
}

#[test]
fn unknown_sender_is_dropped_without_notice_even_when_flooding() {
    let table = Table::new(2, 60);
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();

    for _ in 0..5 {
        let outcome = gm.handle_wire(new_note("ghost", "boo"), &roster, &mut channel);
        assert_eq!(
            outcome,
            ReceiveOutcome::Discarded(Rejection::UnknownSender("ghost".into()))
        );
    }
    assert!(gm.notes().is_empty());
    assert!(channel.sent.is_empty());
}

#[test]
fn oversized_notes_are_refused_on_both_sides() {
    let mut table = Table::new(3, 60);
    table.config.max_message_chars = 5;
    let mut channel = RecordingChannel::default();

    let mut player = table.coordinator("p1", Role::Player);
    assert_eq!(
        player.submit("too long", &table.roster("p1"), &mut channel),
        SubmitOutcome::TooLong { chars: 8, max: 5 }
    );
    assert!(channel.sent.is_empty());

    let mut gm = table.coordinator("gm", Role::Gm);
    let outcome = gm.handle_wire(new_note("p1", "too long"), &table.roster("gm"), &mut channel);
    assert_eq!(
        outcome,
        ReceiveOutcome::Discarded(Rejection::TooLong { chars: 8, max: 5 })
    );
}

#[test]
fn throttle_notice_is_acted_on_only_by_its_target() {
    let table = Table::new(3, 60);
    let mut channel = RecordingChannel::default();
    let notice = WireMessage::Throttled(ThrottleNotice {
        target_id: "p1".into(),
        retry_ms: 4_200,
    });

    let mut target = table.coordinator("p1", Role::Player);
    let outcome = target.handle_wire(notice.clone(), &table.roster("p1"), &mut channel);
    assert_eq!(
        outcome,
        ReceiveOutcome::LocalThrottled {
            retry_after: Duration::from_millis(4_200)
        }
    );
    assert!(matches!(
        &outcome.notices()[0],
        NoteEvent::Notice { level: NoticeLevel::Warn, text }
            if text == "Sending too fast! Wait 5 seconds."
    ));

    let mut bystander = table.coordinator("p2", Role::Player);
    assert_eq!(
        bystander.handle_wire(notice.clone(), &table.roster("p2"), &mut channel),
        ReceiveOutcome::Ignored
    );
    let mut gm = table.coordinator("gm", Role::Gm);
    assert_eq!(
        gm.handle_wire(notice, &table.roster("gm"), &mut channel),
        ReceiveOutcome::Ignored
    );
}

#[test]
fn missing_retry_falls_back_to_window() {
    let table = Table::new(3, 60);
    let mut player = table.coordinator("p1", Role::Player);
    let outcome = player.handle_wire(
        WireMessage::Throttled(ThrottleNotice {
            target_id: "p1".into(),
            retry_ms: 0,
        }),
        &table.roster("p1"),
        &mut RecordingChannel::default(),
    );
    assert_eq!(
        outcome,
        ReceiveOutcome::LocalThrottled {
            retry_after: Duration::from_secs(60)
        }
    );
}

#[test]
fn null_retry_on_the_wire_still_warns_with_the_window() {
    let table = Table::new(3, 60);
    let mut player = table.coordinator("p1", Role::Player);
    let notice =
        WireMessage::decode(br#"{"type":"throttled","payload":{"targetId":"p1","retryMs":null}}"#)
            .expect("lenient notice decodes");

    let outcome = player.handle_wire(
        notice,
        &table.roster("p1"),
        &mut RecordingChannel::default(),
    );
    assert!(matches!(
        &outcome.notices()[0],
        NoteEvent::Notice { level: NoticeLevel::Warn, text }
            if text == "Sending too fast! Wait 60 seconds."
    ));
}

#[test]
fn players_ignore_note_requests() {
    let table = Table::new(3, 60);
    let mut player = table.coordinator("p2", Role::Player);
    let mut channel = RecordingChannel::default();
    assert_eq!(
        player.handle_wire(new_note("p1", "psst"), &table.roster("p2"), &mut channel),
        ReceiveOutcome::Ignored
    );
    assert!(player.notes().is_empty());
}

#[test]
fn offline_gm_still_gets_the_note_sent() {
    let table = Table::new(3, 60);
    let roster = table.roster("p1");
    let mut player = table.coordinator("p1", Role::Player);
    let mut channel = RecordingChannel::default();

    let outcome = player.submit("for later", &roster, &mut channel);
    assert_eq!(
        outcome,
        SubmitOutcome::Sent {
            receiver_online: false
        }
    );
    assert_eq!(channel.sent, vec![new_note("p1", "for later")]);
    assert_eq!(outcome.notices().len(), 2);
}

#[test]
fn gm_cannot_send_notes() {
    let table = Table::new(3, 60);
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();
    assert_eq!(
        gm.submit("hello me", &table.roster("gm"), &mut channel),
        SubmitOutcome::NotAllowed
    );
    assert!(channel.sent.is_empty());
}

#[test]
fn transport_failure_is_reported_not_retried() {
    let table = Table::new(3, 60);
    let mut player = table.coordinator("p1", Role::Player);
    let outcome = player.submit("into the void", &table.roster("p1"), &mut DeadChannel);
    assert_eq!(outcome, SubmitOutcome::Undelivered("publish failed: no peers".into()));
}

#[test]
fn failing_alert_does_not_lose_the_note() {
    let mut table = Table::new(3, 60);
    table.presenter.broken_alerts = true;
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();

    let outcome = gm.handle_wire(new_note("p1", "still here"), &roster, &mut channel);
    assert!(matches!(outcome, ReceiveOutcome::Accepted(_)));
    assert_eq!(gm.notes().len(), 1);
    assert_eq!(table.store.write_count(), 1);
}

#[test]
fn senders_are_throttled_independently_at_the_gm() {
    let table = Table::new(1, 60);
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();

    assert!(matches!(
        gm.handle_wire(new_note("p1", "a"), &roster, &mut channel),
        ReceiveOutcome::Accepted(_)
    ));
    assert!(matches!(
        gm.handle_wire(new_note("p2", "b"), &roster, &mut channel),
        ReceiveOutcome::Accepted(_)
    ));
    assert!(matches!(
        gm.handle_wire(new_note("p1", "c"), &roster, &mut channel),
        ReceiveOutcome::SenderThrottled { .. }
    ));
}

#[test]
fn clear_is_gm_only_and_persists_empty_history() {
    let table = Table::new(3, 60);
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();
    gm.handle_wire(new_note("p1", "gone soon"), &roster, &mut channel);

    let mut player = table.coordinator("p1", Role::Player);
    assert!(!player.clear_history());

    assert!(gm.clear_history());
    assert!(gm.notes().is_empty());
    assert_eq!(
        table.store.get("history").unwrap(),
        Some(serde_json::json!([]))
    );
}

#[test]
fn help_reflects_throttle_and_gm_presence() {
    let table = Table::new(4, 30);
    let mut roster = table.roster("p1");
    let player = table.coordinator("p1", Role::Player);

    let offline = player.status(&roster).help_text();
    assert!(offline.contains("4 notes per 30 seconds"));
    assert!(offline.contains("GM status: offline"));

    roster.set_active("gm", true);
    assert!(player.status(&roster).help_text().contains("GM status: online"));
}

#[test]
fn prune_idle_forgets_quiet_senders() {
    let table = Table::new(3, 60);
    let roster = table.roster("gm");
    let mut gm = table.coordinator("gm", Role::Gm);
    let mut channel = RecordingChannel::default();

    gm.handle_wire(new_note("p1", "hi"), &roster, &mut channel);
    table.clock.set(30_000);
    assert_eq!(gm.prune_idle(), 0);
    table.clock.set(60_000);
    assert_eq!(gm.prune_idle(), 1);
}
