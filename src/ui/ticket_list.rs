use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

use crate::app::App;
use crate::ui::theme::{priority_color, status_color};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let page = app.board.page();
    let selected_row = app.board.selected_row();

    let mut items: Vec<ListItem> = page
        .rows
        .iter()
        .enumerate()
        .map(|(i, ticket)| {
            let selected = i == selected_row;

            let id_span = Span::styled(
                format!("{:<8} ", ticket.id),
                Style::default().fg(Color::DarkGray),
            );
            let status_span = Span::styled(
                format!("{:<12}", ticket.status.label()),
                Style::default().fg(status_color(ticket.status)),
            );
            let priority_span = Span::styled(
                format!("{:<9}", ticket.priority.label()),
                Style::default().fg(priority_color(ticket.priority)),
            );

            // Truncate title to fit
            let max_title = area.width.saturating_sub(34) as usize;
            let title: String = ticket.title.chars().take(max_title).collect();
            let title_style = if selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            ListItem::new(Line::from(vec![
                id_span,
                status_span,
                priority_span,
                Span::styled(title, title_style),
            ]))
        })
        .collect();

    if items.is_empty() && !app.board.tickets.loading {
        let text = if app.board.tickets.items.is_empty() {
            "No tickets"
        } else {
            "No tickets match the current filters"
        };
        items.push(ListItem::new(Span::styled(text, Style::default().fg(Color::DarkGray))));
    }

    let mut title = format!(
        " Tickets {}/{} ({} matching) ",
        page.number, page.total_pages, page.total_matching
    );
    if app.board.tickets.loading {
        title.push_str("(loading...) ");
    } else if let Some(at) = app.board.tickets.loaded_at {
        title.push_str(&format!("@ {} ", at.with_timezone(&chrono::Local).format("%H:%M:%S")));
    }
    let border = if app.board.tickets.error.is_some() {
        Color::Red
    } else {
        Color::Cyan
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title),
    );

    f.render_widget(list, area);
}
