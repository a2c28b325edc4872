// Placeholder shown until the first participant list arrives.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(frame: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new("  Loading participants...")
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title("Amigo Secreto"));
    frame.render_widget(paragraph, area);
}
