// TUI widget modules for each screen zone.

pub mod draw_panel;
pub mod error_banner;
pub mod help_bar;
pub mod identity;
pub mod insight;
pub mod loading;
pub mod quit_confirm;
pub mod status_bar;
