use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::ui::theme::{priority_color, status_color};

fn field<'a>(label: &'static str, value: Span<'a>) -> Line<'a> {
    Line::from(vec![Span::styled(label, Style::default().fg(Color::Gray)), value])
}

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Details ");

    let Some(ticket) = app.board.selected_ticket() else {
        f.render_widget(block, area);
        return;
    };

    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            ticket.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        field(
            "Status: ",
            Span::styled(ticket.status.label(), Style::default().fg(status_color(ticket.status))),
        ),
        field(
            "Priority: ",
            Span::styled(
                ticket.priority.label(),
                Style::default().fg(priority_color(ticket.priority)),
            ),
        ),
    ];

    if let Some(category) = &ticket.category {
        lines.push(field("Category: ", Span::raw(category.clone())));
    }
    lines.push(field(
        "Assignee: ",
        Span::raw(ticket.assignee.clone().unwrap_or_else(|| "unassigned".into())),
    ));
    if let Some(requester) = &ticket.requester {
        lines.push(field("Requester: ", Span::raw(requester.clone())));
    }
    if !ticket.tags.is_empty() {
        lines.push(field("Tags: ", Span::raw(ticket.tags.join(", "))));
    }
    lines.push(field(
        "Created: ",
        Span::raw(ticket.created_at.format("%Y-%m-%d %H:%M").to_string()),
    ));
    lines.push(field(
        "Updated: ",
        Span::raw(ticket.updated_at.format("%Y-%m-%d %H:%M").to_string()),
    ));

    if !ticket.description.is_empty() {
        lines.push(Line::raw(""));
        let truncated: String = ticket.description.chars().take(300).collect();
        lines.push(Line::raw(truncated));
    }

    if !ticket.attachments.is_empty() {
        lines.push(Line::raw(""));
        lines.push(Line::styled("Attachments", Style::default().fg(Color::Gray)));
        for a in &ticket.attachments {
            lines.push(Line::raw(format!("  {} ({} bytes)", a.name, a.size)));
        }
    }

    if !ticket.comments.is_empty() {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            format!("Comments ({})", ticket.comments.len()),
            Style::default().fg(Color::Gray),
        ));
        for c in &ticket.comments {
            let mut header = vec![Span::styled(
                format!("{} · {}", c.author, c.created_at.format("%Y-%m-%d %H:%M")),
                Style::default().fg(Color::Blue),
            )];
            if c.internal {
                header.push(Span::styled(" internal", Style::default().fg(Color::Yellow)));
            }
            lines.push(Line::from(header));
            lines.push(Line::raw(format!("  {}", c.content)));
        }
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}
