use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, InputMode};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let Some(mode) = app.input_mode else {
        return;
    };

    let title = match mode {
        InputMode::Search => " Search (enter keep, esc clear) ",
        InputMode::NewTicket => " New ticket title (enter create, esc cancel) ",
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);

    let paragraph = Paragraph::new(Line::raw(app.input_buffer.as_str())).block(block);
    f.render_widget(paragraph, area);

    // Cursor sits at the end of the buffer
    let cursor = app.input_buffer.chars().count() as u16;
    let x = area.x + 1 + cursor;
    let y = area.y + 1;
    f.set_cursor_position((x.min(area.x + area.width.saturating_sub(2)), y));
}
