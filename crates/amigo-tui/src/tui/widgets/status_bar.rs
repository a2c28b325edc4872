// Status bar widget: app title, draw progress, reload indicator.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use amigo_core::participant::Snapshot;

use crate::tui::ViewState;

/// Render the status bar into the given area.
///
/// Layout: [title] [progress] [reload state]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut spans = vec![Span::styled(
        " Amigo Secreto ",
        Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD),
    )];

    if let Some(snapshot) = &state.snapshot {
        let (text, color) = progress(snapshot);
        spans.push(Span::raw(" "));
        spans.push(Span::styled(text, Style::default().fg(color)));
    }

    spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
    spans.push(reload_span(state));

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Progress text and color for a snapshot.
pub fn progress(snapshot: &Snapshot) -> (String, Color) {
    if snapshot.is_empty() {
        return ("no participants".to_string(), Color::DarkGray);
    }
    let text = format!("{}/{} drawn", snapshot.assigned_count(), snapshot.len());
    let color = if snapshot.is_complete() {
        Color::Green
    } else {
        Color::White
    };
    (text, color)
}

fn reload_span(state: &ViewState) -> Span<'static> {
    if state.loading {
        return Span::styled("loading...", Style::default().fg(Color::Yellow));
    }
    match state.loaded_at {
        Some(at) => Span::styled(
            format!("updated {}", at.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        ),
        None => Span::styled("not loaded", Style::default().fg(Color::DarkGray)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::widgets::test_support::render_text;
    use amigo_core::participant::Participant;

    #[test]
    fn progress_counts_drawn_participants() {
        let bea = Participant::new(2, "Bea");
        let snapshot = Snapshot::new(vec![Participant::new(1, "Ana").assigned_to(&bea), bea]);
        assert_eq!(progress(&snapshot), ("1/2 drawn".to_string(), Color::White));
    }

    #[test]
    fn progress_complete_is_green() {
        let ana = Participant::new(1, "Ana");
        let bea = Participant::new(2, "Bea");
        let snapshot = Snapshot::new(vec![ana.clone().assigned_to(&bea), bea.assigned_to(&ana)]);
        assert_eq!(progress(&snapshot).1, Color::Green);
    }

    #[test]
    fn progress_empty() {
        assert_eq!(progress(&Snapshot::empty()).0, "no participants");
    }

    #[test]
    fn render_shows_loading_indicator() {
        let state = ViewState {
            loading: true,
            ..ViewState::default()
        };
        let text = render_text(60, 1, |frame, area| render(frame, area, &state));
        assert!(text.contains("Amigo Secreto"));
        assert!(text.contains("loading..."));
    }
}
