// Screen layout: panel arrangement and sizing.
//
// +--------------------------------------------------+
// | Status Bar (1 row)                                |
// +--------------------------------------------------+
// | Error Banner (3 rows, only while an error shows)  |
// +-----------------------------+--------------------+
// | Main Panel (60%)            | Insight (40%)      |
// +-----------------------------+--------------------+
// | Help Bar (1 row)                                  |
// +--------------------------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Resolved screen areas for each zone.
#[derive(Debug, Clone)]
pub struct AppLayout {
    /// Top row: backend status, draw progress, last reload time.
    pub status_bar: Rect,
    pub error_banner: Option<Rect>,
    /// Identify list or draw area.
    pub main_panel: Rect,
    pub insight_panel: Rect,
    /// Bottom row: keyboard shortcut hints.
    pub help_bar: Rect,
}

pub fn build_layout(area: Rect, show_error: bool) -> AppLayout {
    let banner_height = if show_error { 3 } else { 0 };
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // status bar
            Constraint::Length(banner_height), // error banner
            Constraint::Min(6),                // main + insight
            Constraint::Length(1),             // help bar
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(vertical[2]);

    AppLayout {
        status_bar: vertical[0],
        error_banner: show_error.then_some(vertical[1]),
        main_panel: horizontal[0],
        insight_panel: horizontal[1],
        help_bar: vertical[3],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_area() -> Rect {
        Rect::new(0, 0, 120, 40)
    }

    #[test]
    fn fixed_rows_have_expected_heights() {
        let layout = build_layout(test_area(), true);
        assert_eq!(layout.status_bar.height, 1);
        assert_eq!(layout.help_bar.height, 1);
        assert_eq!(layout.error_banner.unwrap().height, 3);
        assert_eq!(layout.status_bar.y, 0);
        assert_eq!(layout.help_bar.y, 39);
    }

    #[test]
    fn banner_absent_without_error() {
        let with = build_layout(test_area(), true);
        let without = build_layout(test_area(), false);
        assert!(without.error_banner.is_none());
        assert_eq!(without.main_panel.height, with.main_panel.height + 3);
    }

    #[test]
    fn main_and_insight_split_the_width() {
        let layout = build_layout(test_area(), false);
        assert_eq!(layout.main_panel.width, 72);
        assert_eq!(layout.insight_panel.width, 48);
        assert_eq!(layout.main_panel.y, layout.insight_panel.y);
        assert_eq!(layout.insight_panel.x, layout.main_panel.x + layout.main_panel.width);
    }

    #[test]
    fn small_terminal_does_not_panic() {
        let layout = build_layout(Rect::new(0, 0, 10, 5), true);
        assert!(layout.main_panel.width <= 10);
    }
}
