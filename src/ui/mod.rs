pub mod command_bar;
pub mod detail_panel;
pub mod footer;
pub mod theme;
pub mod ticket_list;

use ratatui::{
    layout::{Constraint, Direction, Flex, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

pub fn render(f: &mut Frame, app: &App) {
    let size = f.area();

    // Command bar (3) when input active, else footer (2)
    let bottom_height = if app.input_mode.is_some() { 3 } else { 2 };

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(bottom_height)])
        .split(size);

    // Tickets (60%) + Detail (40%)
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(vertical[0]);

    ticket_list::render(f, horizontal[0], app);
    detail_panel::render(f, horizontal[1], app);

    if app.input_mode.is_some() {
        command_bar::render(f, vertical[1], app);
    } else {
        footer::render(f, vertical[1], app);
    }

    if let Some(message) = &app.alert {
        render_alert(f, size, message);
    }
}

fn render_alert(f: &mut Frame, area: Rect, message: &str) {
    let [area] = Layout::horizontal([Constraint::Percentage(60)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([Constraint::Length(7)])
        .flex(Flex::Center)
        .areas(area);

    let body = Paragraph::new(format!("{message}\n\n(enter to dismiss)"))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Error "),
        );
    f.render_widget(Clear, area);
    f.render_widget(body, area);
}
