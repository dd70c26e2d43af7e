use eframe::egui;

/// Player note composer. Returns the text when the player hits Send.
pub fn render(ui: &mut egui::Ui, input_text: &mut String, gm_online: bool) -> Option<String> {
    ui.label("Secret message to GM:");
    ui.add(
        egui::TextEdit::multiline(input_text)
            .desired_rows(6)
            .desired_width(f32::INFINITY)
            .hint_text("/nn works here too; /nnhelp for help"),
    );

    let mut send = false;
    ui.horizontal(|ui| {
        if ui.button("Send").clicked() {
            send = true;
        }
        if ui.input(|i| i.key_pressed(egui::Key::Enter) && i.modifiers.command) {
            send = true;
        }

        let (color, status) = if gm_online {
            (egui::Color32::GREEN, "GM Online: Yes")
        } else {
            (egui::Color32::RED, "GM Online: No")
        };
        ui.colored_label(color, "●");
        ui.label(egui::RichText::new(status).weak());
    });

    if send && !input_text.trim().is_empty() {
        let message = input_text.trim().to_string();
        input_text.clear();
        return Some(message);
    }

    None
}
