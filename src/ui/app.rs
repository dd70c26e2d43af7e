use std::time::{Duration, Instant};

use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ChatCommand, NoteCommand, NoteEvent, Role};

use super::components::{composer, notes_panel, notices, sidebar};
use super::state::PanelState;

pub struct NotesApp {
    state: PanelState,
    command_sender: mpsc::Sender<NoteCommand>,
    event_receiver: mpsc::Receiver<NoteEvent>,
}

impl NotesApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        role: Role,
        auto_open_panel: bool,
        command_sender: mpsc::Sender<NoteCommand>,
        event_receiver: mpsc::Receiver<NoteEvent>,
    ) -> Self {
        Self {
            state: PanelState::new(role, auto_open_panel),
            command_sender,
            event_receiver,
        }
    }

    fn handle_node_events(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        while let Ok(event) = self.event_receiver.try_recv() {
            match event {
                NoteEvent::HistoryChanged(notes) => self.state.set_history(notes),
                NoteEvent::NoteArrived(_) => {
                    self.state.note_arrived(now);
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                }
                NoteEvent::Notice { level, text } => self.state.push_notice(level, text, now),
                NoteEvent::RosterChanged(participants) => self.state.participants = participants,
            }
        }
        self.state.expire_notices(now);
    }

    fn send_command(&mut self, command: NoteCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to node: {err}");
        }
    }

    /// Composer text is a note unless it is a recognised chat command.
    fn submit_input(&mut self, text: String) {
        let command = ChatCommand::parse(&text)
            .into_note_command()
            .unwrap_or(NoteCommand::SendNote(text));
        self.send_command(command);
    }

    fn show_gm_panel(&mut self, ui: &mut egui::Ui, now: Instant) {
        if !self.state.panel_open {
            ui.label(egui::RichText::new("Ninja Notes panel is closed.").weak());
            return;
        }

        let flashing = self.state.is_flashing(now);
        let actions = notes_panel::render(ui, &self.state.notes, flashing);
        if actions.clear {
            self.send_command(NoteCommand::ClearHistory);
        }
        if actions.close {
            self.state.panel_open = false;
        }
    }

    fn show_player_composer(&mut self, ui: &mut egui::Ui) {
        ui.heading("Send Ninja Note");
        ui.separator();
        let gm_online = self.state.gm_online();
        if let Some(text) = composer::render(ui, &mut self.state.input_text, gm_online) {
            self.submit_input(text);
        }
        if ui.button("Help").clicked() {
            self.send_command(NoteCommand::ShowHelp);
        }
    }
}

impl eframe::App for NotesApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_node_events(ctx);
        let now = Instant::now();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            if ui.button("Open Ninja Notes").clicked() {
                self.state.open_panel(now);
            }
        });

        egui::SidePanel::left("participants")
            .resizable(true)
            .default_width(180.0)
            .show(ctx, |ui| {
                sidebar::render(ui, &self.state.participants);
            });

        egui::TopBottomPanel::bottom("notices").show(ctx, |ui| {
            notices::render(ui, &self.state.notices);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.state.role.is_authoritative() {
                self.show_gm_panel(ui, now);
            } else {
                self.show_player_composer(ui);
            }
        });

        ctx.request_repaint_after(Duration::from_millis(250));
    }
}
