use eframe::egui;

use crate::common::NoticeLevel;
use crate::ui::state::Notice;

pub fn render(ui: &mut egui::Ui, notices: &[Notice]) {
    for notice in notices.iter().rev() {
        let color = match notice.level {
            NoticeLevel::Info => egui::Color32::LIGHT_BLUE,
            NoticeLevel::Warn => egui::Color32::YELLOW,
        };
        ui.colored_label(color, &notice.text);
    }
}
