// Identify screen: pick your own name from the participants who have not
// drawn yet.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

use crate::tui::ViewState;

pub const EVERYONE_DRAWN: &str = "Everyone has already drawn!";
pub const NO_PARTICIPANTS: &str = "No participants found.";

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            " Who are you? ",
            Style::default().add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [hint_area, list_area] =
        Layout::vertical([Constraint::Length(2), Constraint::Min(1)]).areas(inner);

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            " Your name only appears if you have not drawn yet.",
            Style::default().fg(Color::DarkGray),
        ))),
        hint_area,
    );

    let candidates = state.selectable();
    if candidates.is_empty() {
        let message = empty_message(state);
        frame.render_widget(
            Paragraph::new(format!(" {message}")).style(Style::default().fg(Color::Yellow)),
            list_area,
        );
        return;
    }

    let items: Vec<ListItem> = candidates
        .iter()
        .map(|p| ListItem::new(p.name.clone()))
        .collect();
    let list = List::new(items)
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut list_state = ListState::default().with_selected(Some(state.selected));
    frame.render_stateful_widget(list, list_area, &mut list_state);
}

/// Message for an empty selection list.
fn empty_message(state: &ViewState) -> &'static str {
    match &state.snapshot {
        Some(s) if s.is_complete() => EVERYONE_DRAWN,
        _ => NO_PARTICIPANTS,
    }
}
