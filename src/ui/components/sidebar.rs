use crate::common::{Participant, Role};
use eframe::egui;

pub fn render(ui: &mut egui::Ui, participants: &[Participant]) {
    ui.heading("Table");
    ui.separator();

    if participants.is_empty() {
        ui.label("No participants configured");
        return;
    }

    for participant in participants {
        ui.horizontal(|ui| {
            let dot = if participant.active {
                egui::Color32::GREEN
            } else {
                egui::Color32::DARK_GRAY
            };
            ui.colored_label(dot, "●");
            ui.label(&participant.name);
            if participant.role == Role::Gm {
                ui.label(egui::RichText::new("(GM)").weak());
            }
        });
    }
}
