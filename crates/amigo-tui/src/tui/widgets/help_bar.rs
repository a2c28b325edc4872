// Help bar widget: key hints for the current screen.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::tui::{Screen, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        hints(state),
        Style::default().fg(Color::White).add_modifier(Modifier::DIM),
    )))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

/// Key hints for the current screen. Only keys that would do something
/// right now are listed.
pub fn hints(state: &ViewState) -> String {
    let mut parts: Vec<&str> = Vec::new();
    match state.screen() {
        Screen::Loading => {}
        Screen::Identify => parts.extend(["↑↓:Move", "Enter:Select"]),
        Screen::Draw => {
            let session = &state.session;
            if session.target.is_none() {
                parts.push("d:Draw");
            } else if !session.revealed && !session.saving {
                parts.push("c:Reveal and confirm");
            }
            if !session.saving {
                parts.push("l:Logout");
            }
        }
    }
    parts.extend(["r:Reload", "i:Insight", "q:Quit"]);
    format!(" {}", parts.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use amigo_core::participant::{Participant, Snapshot};

    fn draw_state() -> ViewState {
        let mut state = ViewState {
            snapshot: Some(Snapshot::empty()),
            ..ViewState::default()
        };
        state.session.actor = Some(Participant::new(1, "Ana"));
        state
    }

    #[test]
    fn identify_hints() {
        let state = ViewState {
            snapshot: Some(Snapshot::empty()),
            ..ViewState::default()
        };
        assert_eq!(
            hints(&state),
            " ↑↓:Move | Enter:Select | r:Reload | i:Insight | q:Quit"
        );
    }

    #[test]
    fn draw_hints_follow_session() {
        let mut state = draw_state();
        assert!(hints(&state).contains("d:Draw"));

        state.session.target = Some(Participant::new(2, "Bea"));
        let pending = hints(&state);
        assert!(pending.contains("c:Reveal and confirm"));
        assert!(!pending.contains("d:Draw"));

        state.session.saving = true;
        let saving = hints(&state);
        assert!(!saving.contains("c:"));
        assert!(!saving.contains("l:Logout"));
    }
}
