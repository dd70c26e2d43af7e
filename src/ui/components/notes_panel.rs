use eframe::egui;

use crate::common::Note;
use crate::roster::color_components;
use crate::ui::state::format_timestamp;

#[derive(Debug, Default)]
pub struct PanelActions {
    pub clear: bool,
    pub close: bool,
}

/// GM panel: every stored note, oldest first.
pub fn render(ui: &mut egui::Ui, notes: &[Note], flashing: bool) -> PanelActions {
    let mut actions = PanelActions::default();

    ui.horizontal(|ui| {
        let title = egui::RichText::new("Ninja Notes").heading();
        if flashing {
            ui.label(title.color(egui::Color32::GOLD));
        } else {
            ui.label(title);
        }
        if ui.button("🗑 Clear All").clicked() {
            actions.clear = true;
        }
        if ui.button("Close").clicked() {
            actions.close = true;
        }
    });
    ui.separator();

    if notes.is_empty() {
        ui.label(egui::RichText::new("No notes yet").weak());
        return actions;
    }

    egui::ScrollArea::vertical()
        .stick_to_bottom(true)
        .show(ui, |ui| {
            for note in notes {
                let color = color_components(&note.sender_color)
                    .map(|[r, g, b]| egui::Color32::from_rgb(r, g, b))
                    .unwrap_or(egui::Color32::WHITE);

                ui.horizontal_wrapped(|ui| {
                    ui.label(egui::RichText::new(format_timestamp(note.timestamp)).weak());
                    ui.label(egui::RichText::new(&note.sender_name).strong().color(color));
                });
                // Plain label: egui never interprets note text as markup.
                ui.label(&note.message);
                ui.separator();
            }
        });

    actions
}
