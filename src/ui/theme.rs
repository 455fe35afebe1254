use ratatui::style::Color;

use crate::model::ticket::{TicketPriority, TicketStatus};

pub fn priority_color(priority: TicketPriority) -> Color {
    match priority {
        TicketPriority::Critical => Color::Red,
        TicketPriority::High => Color::Yellow,
        TicketPriority::Medium => Color::Blue,
        TicketPriority::Low => Color::Gray,
    }
}

pub fn status_color(status: TicketStatus) -> Color {
    match status {
        TicketStatus::Open => Color::Cyan,
        TicketStatus::InProgress => Color::Blue,
        TicketStatus::Pending => Color::Yellow,
        TicketStatus::Resolved => Color::Green,
        TicketStatus::Closed => Color::DarkGray,
        TicketStatus::Escalated => Color::Red,
    }
}
