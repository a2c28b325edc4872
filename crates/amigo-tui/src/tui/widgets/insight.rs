// Insight panel: optional AI commentary about the group.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use amigo_llm::Insight;

use crate::tui::{InsightStatus, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (status_text, status_color) = status_indicator(&state.insight);
    let title = Line::from(vec![
        Span::styled(" Insight", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(" -- ", Style::default().fg(Color::DarkGray)),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw(" "),
    ]);

    let lines = match &state.insight {
        InsightStatus::Ready(insight) => insight_lines(insight),
        InsightStatus::Idle => vec![dim(" Press i for a fun look at the group.")],
        InsightStatus::Loading => vec![dim(" Thinking...")],
        InsightStatus::Unavailable => vec![dim(" No insight available right now.")],
    };

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Status text and color for the panel title.
pub fn status_indicator(status: &InsightStatus) -> (&'static str, Color) {
    match status {
        InsightStatus::Idle => ("idle", Color::DarkGray),
        InsightStatus::Loading => ("loading...", Color::Yellow),
        InsightStatus::Ready(_) => ("ready", Color::Green),
        InsightStatus::Unavailable => ("unavailable", Color::Red),
    }
}

fn insight_lines(insight: &Insight) -> Vec<Line<'static>> {
    let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    vec![
        Line::from(Span::raw(insight.summary.clone())),
        Line::default(),
        Line::from(Span::styled("Funny fact", heading)),
        Line::from(Span::raw(insight.funny_fact.clone())),
        Line::default(),
        Line::from(Span::styled("Tip", heading)),
        Line::from(Span::raw(insight.recommendation.clone())),
    ]
}

fn dim(text: &'static str) -> Line<'static> {
    Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::widgets::test_support::render_text;

    #[test]
    fn status_indicator_values() {
        assert_eq!(status_indicator(&InsightStatus::Idle).0, "idle");
        assert_eq!(status_indicator(&InsightStatus::Loading).1, Color::Yellow);
        assert_eq!(status_indicator(&InsightStatus::Unavailable).1, Color::Red);
    }

    #[test]
    fn render_ready_insight() {
        let state = ViewState {
            insight: InsightStatus::Ready(Insight {
                summary: "A lively group.".into(),
                funny_fact: "Two people share a birthday.".into(),
                recommendation: "Bring cake.".into(),
            }),
            ..ViewState::default()
        };
        let text = render_text(60, 12, |frame, area| render(frame, area, &state));
        assert!(text.contains("ready"));
        assert!(text.contains("A lively group."));
        assert!(text.contains("Bring cake."));
    }

    #[test]
    fn render_unavailable() {
        let state = ViewState {
            insight: InsightStatus::Unavailable,
            ..ViewState::default()
        };
        let text = render_text(60, 6, |frame, area| render(frame, area, &state));
        assert!(text.contains("No insight available"));
    }
}
