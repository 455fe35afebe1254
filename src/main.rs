mod app;
mod backend;
mod cli;
mod config;
mod error;
mod event;
mod logging;
mod model;
mod query;
mod store;
mod tickets;
mod ui;

use std::io;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;

use app::{Action, App};
use backend::Backend;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is best-effort; a read-only home must not stop the client.
    if let Err(e) = logging::init() {
        eprintln!("warning: logging disabled: {e:#}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(args.first().map(String::as_str), Some("help" | "-h" | "--help")) {
        cli::print_help();
        return Ok(());
    }

    let config = config::load_config()?;
    let backend: Arc<dyn Backend> = Arc::from(backend::create_backend(&config)?);
    tracing::info!(backend = backend.name(), "starting");

    if !args.is_empty() {
        return cli::run(&args, &config, backend).await;
    }

    let session = store::SessionStore::new()?;
    let session_rx = session.subscribe();

    // Set up action channel
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let mut app = App::new(&config, backend, session, action_tx.clone());

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend)?;
    terminal.hide_cursor()?;

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // Spawn event reader
    let event_tx = action_tx.clone();
    let poll_interval = Duration::from_secs(config.board.poll_interval_secs.max(1));
    tokio::spawn(async move {
        event::run_event_loop(event_tx, poll_interval, session_rx).await;
    });

    // Initial fetch
    app.refresh();

    // Main loop
    loop {
        terminal.draw(|f| ui::render(f, &app))?;

        if let Some(action) = action_rx.recv().await {
            app.update(action);
            if app.should_quit {
                break;
            }
        } else {
            break;
        }
    }

    // Restore terminal
    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    tracing::info!("exiting");
    Ok(())
}
