pub mod composer;
pub mod notes_panel;
pub mod notices;
pub mod sidebar;
