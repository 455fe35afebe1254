use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let hints = Line::from(vec![
        hint("↑↓", "select"),
        hint("←→", "page"),
        hint("/", "search"),
        hint("s", "status"),
        hint("p", "priority"),
        hint("m", "mine"),
        hint("o/a", "sort"),
        hint("+/-", "size"),
        hint("c", "clear"),
        hint("n", "new"),
        hint("x", "resolve"),
        hint("X", "delete"),
        hint("r", "refresh"),
        hint("q", "quit"),
    ]);

    let mut spans = Vec::new();

    let user = app
        .session
        .current()
        .map(|s| format!(" {} ({}) ", s.display_name(), s.role))
        .unwrap_or_else(|| " signed out ".into());
    spans.push(Span::styled(user, Style::default().fg(Color::Black).bg(Color::DarkGray)));

    spans.push(Span::raw(format!(" {} ", app.board.criteria().describe())));
    let sort = app
        .board
        .sort()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unsorted".into());
    spans.push(Span::styled(format!("[{sort}] "), Style::default().fg(Color::Gray)));
    spans.push(Span::styled(
        format!("{}/page", app.board.pagination().page_size()),
        Style::default().fg(Color::Gray),
    ));
    if app.mutations_in_flight > 0 {
        spans.push(Span::styled("  saving...", Style::default().fg(Color::Cyan)));
    }

    // Flash message
    if let Some((msg, _)) = &app.flash_message {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(msg, Style::default().fg(Color::Yellow)));
    } else if let Some(err) = &app.board.tickets.error {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(err, Style::default().fg(Color::Red)));
    }

    f.render_widget(Paragraph::new(vec![Line::from(spans), hints]), area);
}

fn hint(key: &str, desc: &str) -> Span<'static> {
    Span::styled(format!(" {key}:{desc} "), Style::default().fg(Color::DarkGray))
}
