// Draw area: greeting, the hidden result box, and the reveal/confirm
// progression.
//
// The drawn name stays masked until the save has succeeded.

use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::protocol::SessionView;
use crate::tui::ViewState;

const HIDDEN_NAME: &str = "? ? ? ? ?";

/// Stage of the draw as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStage {
    /// Nothing drawn yet.
    Ready,
    /// A name is drawn but hidden until confirmed.
    Hidden,
    Saving,
    Revealed,
}

pub fn stage(session: &SessionView) -> DrawStage {
    match (&session.target, session.revealed, session.saving) {
        (None, _, _) => DrawStage::Ready,
        (Some(_), true, _) => DrawStage::Revealed,
        (Some(_), false, true) => DrawStage::Saving,
        (Some(_), false, false) => DrawStage::Hidden,
    }
}

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let session = &state.session;
    let actor = session.actor.as_ref().map(|a| a.name.as_str()).unwrap_or("");

    let mut lines = vec![
        Line::from(vec![
            Span::raw(" Hello, "),
            Span::styled(
                actor.to_string(),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw("!"),
        ]),
        Line::default(),
        Line::from(Span::styled(
            " You drew:",
            Style::default().fg(Color::DarkGray),
        )),
        result_line(session),
        Line::default(),
    ];
    lines.push(instruction_line(stage(session)));

    let border = match stage(session) {
        DrawStage::Revealed => Style::default().fg(Color::Green),
        DrawStage::Saving => Style::default().fg(Color::Yellow),
        _ => Style::default(),
    };

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(" Draw "),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn result_line(session: &SessionView) -> Line<'static> {
    let style = Style::default().add_modifier(Modifier::BOLD);
    let span = match (&session.target, session.revealed) {
        (Some(target), true) => Span::styled(target.name.to_uppercase(), style.fg(Color::Green)),
        _ => Span::styled(HIDDEN_NAME, style.fg(Color::DarkGray)),
    };
    Line::from(span).alignment(Alignment::Center)
}

fn instruction_line(stage: DrawStage) -> Line<'static> {
    let (text, color) = match stage {
        DrawStage::Ready => (" Press d to draw your secret friend.", Color::White),
        DrawStage::Hidden => (" Press c to reveal and confirm.", Color::White),
        DrawStage::Saving => (" Saving...", Color::Yellow),
        DrawStage::Revealed => (" Saved! Keep it a secret.", Color::Green),
    };
    Line::from(Span::styled(text, Style::default().fg(color)))
}
