//! Interactive TUI for dlq.
//!
//! Shows the engine's download queue and history, keeps the queue current
//! through the engine's change notifications, and offers add, retry, delete
//! and open-folder actions.

mod app;
mod input;
mod ui;

use std::io::{self, stdout};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::debug;

use crate::client::RpcEngine;
use app::TuiApp;

/// Run the TUI connected to the daemon at the given address.
pub async fn run(addr: SocketAddr) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut app = TuiApp::new(Arc::new(RpcEngine::new(addr)), events_tx);
    let result = run_app(&mut terminal, &mut app, events_rx).await;
    app.shutdown();

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
    mut events: mpsc::UnboundedReceiver<app::AppEvent>,
) -> Result<()> {
    app.init().await;
    let mut keys = spawn_input_reader();

    while app.running {
        terminal.draw(|frame| ui::render(frame, app))?;

        tokio::select! {
            key = keys.recv() => match key {
                Some(Ok(event)) => {
                    if let Some(action) = input::handle_event(event, app.view) {
                        app.handle_action(action).await;
                    }
                }
                Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                None => break,
            },
            Some(event) = events.recv() => app.handle_event(event),
        }
    }

    Ok(())
}

/// Read terminal events on a dedicated thread. The thread exits once the
/// receiver is dropped.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<io::Result<Event>> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        while !tx.is_closed() {
            match event::poll(Duration::from_millis(200)) {
                Ok(true) => {
                    if tx.send(event::read()).is_err() {
                        break;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
        debug!("Input reader stopped");
    });

    rx
}
