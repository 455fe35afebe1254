use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};

use crate::app::Action;
use crate::store::SessionEvent;

/// Multiplex terminal input, the redraw tick, the reload poll and session
/// changes onto the action channel. Returns when the receiver is gone or
/// the terminal stream ends.
pub async fn run_event_loop(
    tx: mpsc::UnboundedSender<Action>,
    poll_interval: Duration,
    mut session_rx: broadcast::Receiver<SessionEvent>,
) {
    let mut reader = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    let mut poll = tokio::time::interval(poll_interval);
    // The first poll fires immediately; the initial load is issued by main.
    poll.tick().await;
    let mut session_open = true;

    loop {
        let action = tokio::select! {
            _ = tick.tick() => Action::Tick,
            _ = poll.tick() => Action::Poll,
            event = session_rx.recv(), if session_open => match event {
                Ok(event) => Action::SessionChanged(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "session events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    session_open = false;
                    continue;
                }
            },
            maybe_event = reader.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => match key_to_action(key) {
                    Some(action) => action,
                    None => continue,
                },
                // Terminal will re-render on next frame
                Some(Ok(Event::Resize(_, _))) => Action::Tick,
                Some(Err(_)) | None => break,
                _ => continue,
            },
        };
        if tx.send(action).is_err() {
            break;
        }
    }
}

fn key_to_action(key: KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    // Ctrl+C always quits
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }

    let key = match key.code {
        KeyCode::Up => KeyAction::Up,
        KeyCode::Down => KeyAction::Down,
        KeyCode::Left => KeyAction::Left,
        KeyCode::Right => KeyAction::Right,
        KeyCode::Enter => KeyAction::Select,
        KeyCode::Esc => KeyAction::Escape,
        KeyCode::Backspace => KeyAction::Backspace,
        KeyCode::Char(c) => KeyAction::Char(c),
        _ => return None,
    };
    Some(Action::Key(key))
}

/// Keys are interpreted by the app, since the same character is a command
/// on the board and text inside the input bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Up,
    Down,
    Left,
    Right,
    Select,
    Escape,
    Char(char),
    Backspace,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn ctrl_c_quits_but_plain_c_is_a_char() {
        assert!(matches!(
            key_to_action(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        ));
        assert!(matches!(
            key_to_action(press(KeyCode::Char('c'), KeyModifiers::NONE)),
            Some(Action::Key(KeyAction::Char('c')))
        ));
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        assert!(key_to_action(press(KeyCode::F(5), KeyModifiers::NONE)).is_none());
        assert!(matches!(
            key_to_action(press(KeyCode::Enter, KeyModifiers::NONE)),
            Some(Action::Key(KeyAction::Select))
        ));
    }
}
