use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::backend::retry::RetryPolicy;
use crate::backend::Backend;
use crate::config::AppConfig;
use crate::error::DeskError;
use crate::event::KeyAction;
use crate::model::ticket::{NewTicket, Ticket, TicketPatch, TicketPriority, TicketStatus};
use crate::query::{Criteria, Sort, SortField};
use crate::store::{SessionEvent, SessionStore};
use crate::tickets::{Fetcher, TicketBoard, TicketDispatcher};

const PAGE_SIZES: [usize; 5] = [5, 10, 20, 50, 100];

#[derive(Debug)]
pub enum Action {
    Key(KeyAction),
    /// Redraw tick; expires the flash message.
    Tick,
    /// Fixed-interval reload.
    Poll,
    TicketsLoaded(Result<Vec<Ticket>, DeskError>),
    MutationFinished {
        what: String,
        result: Result<(), DeskError>,
    },
    SessionChanged(SessionEvent),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Search,
    NewTicket,
}

pub struct App {
    pub board: TicketBoard,
    pub session: SessionStore,
    pub flash_message: Option<(String, Instant)>,
    /// Blocking message, dismissed with enter or esc.
    pub alert: Option<String>,
    pub input_mode: Option<InputMode>,
    pub input_buffer: String,
    pub mutations_in_flight: usize,
    pub should_quit: bool,
    pub action_tx: mpsc::UnboundedSender<Action>,
    fetcher: Fetcher,
    dispatcher: TicketDispatcher,
    /// A reload was asked for while one was running. The running fetch may
    /// predate the latest write, so another one follows it.
    reload_pending: bool,
}

impl App {
    pub fn new(
        config: &AppConfig,
        backend: Arc<dyn Backend>,
        session: SessionStore,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            board: TicketBoard::new(config.board.page_size),
            session,
            flash_message: None,
            alert: None,
            input_mode: None,
            input_buffer: String::new(),
            mutations_in_flight: 0,
            should_quit: false,
            action_tx,
            fetcher: Fetcher::new(backend.clone(), retry),
            dispatcher: TicketDispatcher::new(backend, retry),
            reload_pending: false,
        }
    }

    fn flash(&mut self, msg: impl Into<String>) {
        self.flash_message = Some((msg.into(), Instant::now()));
    }

    pub fn update(&mut self, action: Action) {
        // Clear flash message after 3 seconds
        if let Some((_, t)) = &self.flash_message {
            if t.elapsed().as_secs() >= 3 {
                self.flash_message = None;
            }
        }

        match action {
            Action::Key(key) => self.handle_key(key),
            Action::Tick => {}
            Action::Poll => self.refresh(),
            Action::TicketsLoaded(result) => {
                if let Err(e) = &result {
                    self.flash(format!("Fetch error: {e} (r to retry)"));
                }
                self.board.apply_fetch(result);
                if std::mem::take(&mut self.reload_pending) {
                    self.refresh();
                }
            }
            Action::MutationFinished { what, result } => {
                self.mutations_in_flight = self.mutations_in_flight.saturating_sub(1);
                match result {
                    Ok(()) => {
                        self.flash(what);
                        self.refresh();
                    }
                    Err(e) if e.is_not_found() => {
                        // Someone else removed it; show the current state.
                        tracing::warn!("{what} failed: {e}");
                        self.flash(format!("{what} failed: ticket no longer exists"));
                        self.refresh();
                    }
                    Err(e) => {
                        tracing::error!("{what} failed: {e}");
                        self.alert = Some(format!("{what} failed: {e}"));
                    }
                }
            }
            Action::SessionChanged(event) => match event {
                SessionEvent::SignedIn(s) => self.flash(format!("Signed in as {}", s.display_name())),
                SessionEvent::Updated(s) => self.flash(format!("Profile updated: {}", s.display_name())),
                SessionEvent::SignedOut => self.flash("Signed out"),
            },
            Action::Quit => {
                self.should_quit = true;
            }
        }
    }

    /// Re-fetch the ticket collection in the background. While a fetch is
    /// running, the request is queued behind it instead.
    pub fn refresh(&mut self) {
        if !self.board.tickets.begin() {
            self.reload_pending = true;
            return;
        }
        let fetcher = self.fetcher.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.tickets().await;
            let _ = tx.send(Action::TicketsLoaded(result));
        });
    }

    fn handle_key(&mut self, key: KeyAction) {
        if self.alert.is_some() {
            if matches!(key, KeyAction::Select | KeyAction::Escape) {
                self.alert = None;
            }
            return;
        }
        if let Some(mode) = self.input_mode {
            self.handle_input_key(mode, key);
            return;
        }

        match key {
            KeyAction::Up => self.board.select_prev(),
            KeyAction::Down => self.board.select_next(),
            KeyAction::Left => {
                self.board.prev_page();
            }
            KeyAction::Right => {
                self.board.next_page();
            }
            KeyAction::Select | KeyAction::Escape | KeyAction::Backspace => {}
            KeyAction::Char(c) => self.handle_command(c),
        }
    }

    fn handle_command(&mut self, c: char) {
        match c {
            'q' => self.should_quit = true,
            'r' => self.refresh(),
            '/' => {
                self.input_mode = Some(InputMode::Search);
                self.input_buffer = self.board.criteria().search.clone();
            }
            'n' => {
                self.input_mode = Some(InputMode::NewTicket);
                self.input_buffer.clear();
            }
            's' => {
                let keys: Vec<&str> = TicketStatus::ALL.iter().map(|s| s.as_str()).collect();
                self.board.update_criteria(|c| cycle_single(&mut c.statuses, &keys));
            }
            'p' => {
                let keys: Vec<&str> = TicketPriority::ALL.iter().map(|p| p.as_str()).collect();
                self.board.update_criteria(|c| cycle_single(&mut c.priorities, &keys));
            }
            'm' => {
                let Some(me) = self.session.current().map(|s| s.display_name().to_string()) else {
                    self.flash("Sign in to filter by your tickets");
                    return;
                };
                self.board
                    .update_criteria(|c| Criteria::toggle(&mut c.assignees, &me));
            }
            'c' => {
                self.board.update_criteria(Criteria::clear);
                self.board.set_sort(None);
                self.flash("Filters cleared");
            }
            'o' => {
                let next = match self.board.sort() {
                    None => Some(Sort::default()),
                    // Title is the last field; one more press turns sorting off.
                    Some(s) if s.field == SortField::Title => None,
                    Some(s) => Some(Sort::new(s.field.next(), s.direction)),
                };
                self.board.set_sort(next);
            }
            'a' => {
                if let Some(mut sort) = self.board.sort() {
                    sort.direction = sort.direction.flip();
                    self.board.set_sort(Some(sort));
                }
            }
            '+' | '-' => {
                let current = self.board.pagination().page_size();
                let idx = PAGE_SIZES.iter().position(|s| *s >= current).unwrap_or(1);
                let idx = if c == '+' {
                    (idx + 1).min(PAGE_SIZES.len() - 1)
                } else {
                    idx.saturating_sub(1)
                };
                self.board.set_page_size(PAGE_SIZES[idx]);
            }
            'x' => self.resolve_selected(),
            'X' => self.delete_selected(),
            'L' => {
                if let Err(e) = self.session.sign_out() {
                    self.alert = Some(format!("Sign out failed: {e}"));
                }
            }
            _ => {}
        }
    }

    fn handle_input_key(&mut self, mode: InputMode, key: KeyAction) {
        match key {
            KeyAction::Char(c) => {
                self.input_buffer.push(c);
                if mode == InputMode::Search {
                    self.apply_search();
                }
            }
            KeyAction::Backspace => {
                self.input_buffer.pop();
                if mode == InputMode::Search {
                    self.apply_search();
                }
            }
            KeyAction::Escape => {
                if mode == InputMode::Search {
                    self.input_buffer.clear();
                    self.apply_search();
                }
                self.input_mode = None;
            }
            KeyAction::Select => {
                self.input_mode = None;
                if mode == InputMode::NewTicket {
                    let title = std::mem::take(&mut self.input_buffer);
                    self.create_ticket(title);
                }
            }
            _ => {}
        }
    }

    fn apply_search(&mut self) {
        let text = self.input_buffer.clone();
        self.board.update_criteria(|c| c.search = text);
    }

    fn spawn_mutation<F>(&mut self, what: String, fut: F)
    where
        F: std::future::Future<Output = Result<(), DeskError>> + Send + 'static,
    {
        self.mutations_in_flight += 1;
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let result = fut.await;
            let _ = tx.send(Action::MutationFinished { what, result });
        });
    }

    fn create_ticket(&mut self, title: String) {
        let title = title.trim().to_string();
        if title.is_empty() {
            return;
        }
        let mut new = NewTicket::new(title.clone());
        new.requester = self.session.current().map(|s| s.display_name().to_string());
        let dispatcher = self.dispatcher.clone();
        self.spawn_mutation(format!("Created \"{title}\""), async move {
            dispatcher.create(&new).await.map(|_| ())
        });
    }

    fn resolve_selected(&mut self) {
        let Some(ticket) = self.board.selected_ticket() else {
            return;
        };
        let id = ticket.id.clone();
        let dispatcher = self.dispatcher.clone();
        self.spawn_mutation(format!("{id} resolved"), async move {
            dispatcher
                .update(&id, &TicketPatch::status(TicketStatus::Resolved))
                .await
                .map(|_| ())
        });
    }

    fn delete_selected(&mut self) {
        let Some(ticket) = self.board.selected_ticket() else {
            return;
        };
        let id = ticket.id.clone();
        let dispatcher = self.dispatcher.clone();
        self.spawn_mutation(format!("{id} deleted"), async move { dispatcher.delete(&id).await });
    }
}

/// Step a single-value filter through `keys`: none → first → ... → last → none.
fn cycle_single(set: &mut std::collections::BTreeSet<String>, keys: &[&str]) {
    let current = if set.len() == 1 {
        set.iter().next().and_then(|v| keys.iter().position(|k| k == v))
    } else {
        None
    };
    set.clear();
    let next = match current {
        None => Some(0),
        Some(i) if i + 1 < keys.len() => Some(i + 1),
        Some(_) => None,
    };
    if let Some(i) = next {
        set.insert(keys[i].to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::tests::ticket_row;
    use crate::backend::Collection;
    use crate::model::session::{Role, Session};

    fn app_with(rows: usize) -> (App, mpsc::UnboundedReceiver<Action>, tempfile::TempDir) {
        let (app, rx, dir, _) = app_with_backend(rows);
        (app, rx, dir)
    }

    fn app_with_backend(
        rows: usize,
    ) -> (App, mpsc::UnboundedReceiver<Action>, tempfile::TempDir, Arc<dyn Backend>) {
        let rows = (0..rows)
            .map(|i| {
                ticket_row(
                    &format!("T{i}"),
                    &format!("ticket {i}"),
                    if i % 2 == 0 { "open" } else { "pending" },
                    &format!("2024-01-{:02}T00:00:00Z", i + 1),
                )
            })
            .collect();
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new().with_rows(Collection::Tickets, rows));
        let dir = tempfile::tempdir().unwrap();
        let session = SessionStore::init(dir.path().join("session.json")).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut config = AppConfig::default();
        config.retry.max_attempts = 1;
        (App::new(&config, backend.clone(), session, tx), rx, dir, backend)
    }

    async fn pump(app: &mut App, rx: &mut mpsc::UnboundedReceiver<Action>) {
        let action = rx.recv().await.unwrap();
        app.update(action);
    }

    fn key(c: char) -> Action {
        Action::Key(KeyAction::Char(c))
    }

    #[tokio::test]
    async fn refresh_loads_into_board_and_gates_reentry() {
        let (mut app, mut rx, _dir) = app_with(12);
        app.refresh();
        app.refresh();
        assert!(app.board.tickets.loading);
        pump(&mut app, &mut rx).await;
        assert_eq!(app.board.page().rows.len(), 10);

        // The second request ran once, after the first finished.
        assert!(app.board.tickets.loading);
        pump(&mut app, &mut rx).await;
        assert!(!app.board.tickets.loading);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reload_after_mutation_waits_for_running_fetch() {
        let (mut app, mut rx, _dir, backend) = app_with_backend(3);

        // A poll fetch reads the collection before the write lands.
        app.update(Action::Poll);
        let stale = rx.recv().await.unwrap();

        TicketDispatcher::new(backend, RetryPolicy::from(&AppConfig::default().retry))
            .update("T0", &TicketPatch::status(TicketStatus::Resolved))
            .await
            .unwrap();
        app.update(Action::MutationFinished {
            what: "T0 resolved".into(),
            result: Ok(()),
        });
        assert!(app.reload_pending);

        app.update(stale);
        assert!(app.board.tickets.loading);
        pump(&mut app, &mut rx).await;

        let t0 = app.board.tickets.items.iter().find(|t| t.id == "T0").unwrap();
        assert_eq!(t0.status, TicketStatus::Resolved);
        assert!(!app.reload_pending);
        assert!(!app.board.tickets.loading);
    }

    #[tokio::test]
    async fn status_cycle_and_clear() {
        let (mut app, mut rx, _dir) = app_with(6);
        app.refresh();
        pump(&mut app, &mut rx).await;

        app.update(key('s'));
        assert_eq!(app.board.page().total_matching, 3);
        app.update(key('s'));
        assert_eq!(app.board.page().total_matching, 0);
        app.update(key('c'));
        assert_eq!(app.board.page().total_matching, 6);
    }

    #[tokio::test]
    async fn search_input_filters_live_and_esc_clears() {
        let (mut app, mut rx, _dir) = app_with(12);
        app.refresh();
        pump(&mut app, &mut rx).await;

        app.update(key('/'));
        for c in "ticket 11".chars() {
            app.update(key(c));
        }
        assert_eq!(app.board.page().total_matching, 1);
        app.update(Action::Key(KeyAction::Escape));
        assert!(app.input_mode.is_none());
        assert_eq!(app.board.page().total_matching, 12);
    }

    #[tokio::test]
    async fn resolve_then_reload_reflects_change() {
        let (mut app, mut rx, _dir) = app_with(3);
        app.refresh();
        pump(&mut app, &mut rx).await;
        let id = app.board.selected_ticket().unwrap().id.clone();

        app.update(key('x'));
        pump(&mut app, &mut rx).await; // mutation finished, triggers reload
        pump(&mut app, &mut rx).await; // reload landed

        let t = app.board.tickets.items.iter().find(|t| t.id == id).unwrap();
        assert_eq!(t.status, TicketStatus::Resolved);
        assert_eq!(app.mutations_in_flight, 0);
    }

    #[tokio::test]
    async fn new_ticket_uses_session_as_requester() {
        let (mut app, mut rx, _dir) = app_with(0);
        app.session
            .sign_in(Session::new("kim@example.com", "Kim", Role::Agent), "t".into())
            .unwrap();
        app.update(key('n'));
        for c in "Monitor flickers".chars() {
            app.update(key(c));
        }
        app.update(Action::Key(KeyAction::Select));
        pump(&mut app, &mut rx).await;
        pump(&mut app, &mut rx).await;

        let items = &app.board.tickets.items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Monitor flickers");
        assert_eq!(items[0].requester.as_deref(), Some("Kim"));
    }

    #[tokio::test]
    async fn missing_ticket_reloads_instead_of_alerting() {
        let (mut app, mut rx, _dir) = app_with(2);
        app.update(Action::MutationFinished {
            what: "T7 deleted".into(),
            result: Err(DeskError::not_found("ticket T7")),
        });
        assert!(app.alert.is_none());
        assert!(app.board.tickets.loading);
        pump(&mut app, &mut rx).await;
        assert_eq!(app.board.tickets.items.len(), 2);
    }

    #[tokio::test]
    async fn my_tickets_toggle_needs_a_session() {
        let (mut app, mut rx, _dir) = app_with(3);
        app.refresh();
        pump(&mut app, &mut rx).await;

        app.update(key('m'));
        assert!(app.board.criteria().is_empty());

        app.session
            .sign_in(Session::new("kim@example.com", "Kim", Role::Agent), "t".into())
            .unwrap();
        app.update(key('m'));
        assert!(app.board.criteria().assignees.contains("Kim"));
        assert_eq!(app.board.page().total_matching, 0);
        app.update(key('m'));
        assert!(app.board.criteria().is_empty());
    }

    #[tokio::test]
    async fn failed_mutation_raises_blocking_alert() {
        let (mut app, _rx, _dir) = app_with(0);
        app.update(Action::MutationFinished {
            what: "T7 deleted".into(),
            result: Err(DeskError::Backend {
                status: 403,
                message: "permission denied".into(),
            }),
        });
        assert!(app.alert.as_deref().unwrap().contains("permission denied"));
        app.update(key('q'));
        assert!(!app.should_quit);
        app.update(Action::Key(KeyAction::Escape));
        assert!(app.alert.is_none());
        app.update(key('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn cycle_single_walks_then_clears() {
        let mut set = std::collections::BTreeSet::new();
        let keys = ["a", "b"];
        cycle_single(&mut set, &keys);
        assert!(set.contains("a"));
        cycle_single(&mut set, &keys);
        assert!(set.contains("b") && set.len() == 1);
        cycle_single(&mut set, &keys);
        assert!(set.is_empty());
    }
}
