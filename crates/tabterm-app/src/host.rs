//! Terminal host: owns the real terminal and wires it to the tab manager.
//!
//! Three parts run concurrently:
//!
//! - the `key-input` thread, which polls crossterm for keys and resizes and
//!   posts them to the manager's queue. Resizes and mouse events also go to
//!   the UI loop;
//! - the manager task, which owns all tab state;
//! - the UI loop on this task, which applies `UiEvent`s to the [`View`],
//!   turns tab-bar clicks into `TabEvent`s and redraws.
//!
//! The host exits once the manager reports that every session has closed.

use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, MouseEvent};
use crossterm::execute;
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use tabterm_core::{Config, EventSender, TabEvent, TabManager};
use tabterm_pty::{NativeTransport, TermSize};
use tokio::sync::mpsc;

use crate::keys;
use crate::render::{View, TAB_BAR_ROWS};

const INPUT_POLL: Duration = Duration::from_millis(100);

/// Raw mode and the alternate screen, restored on drop.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)
            .context("failed to set up terminal")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(
            io::stdout(),
            DisableMouseCapture,
            LeaveAlternateScreen,
            crossterm::cursor::Show
        );
        let _ = disable_raw_mode();
    }
}

/// Terminal input the UI loop needs to see itself.
enum HostInput {
    Resize(TermSize),
    Mouse(MouseEvent),
}

fn session_size(cols: u16, rows: u16) -> TermSize {
    TermSize::new(cols.max(1), rows.saturating_sub(TAB_BAR_ROWS).max(1))
}

pub async fn run(mut config: Config) -> Result<()> {
    let (cols, rows) = terminal::size().context("failed to get terminal size")?;
    let size = session_size(cols, rows);
    config.session.cols = size.cols;
    config.session.rows = size.rows;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let (host_tx, mut host_rx) = mpsc::unbounded_channel();

    let mut manager = TabManager::new(&config, Arc::new(NativeTransport), events_tx.clone(), ui_tx)
        .context("invalid configuration")?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_input = Arc::clone(&stop);
    manager.on_all_sessions_closed(move || {
        log::info!("last tab closed, exiting");
        stop_input.store(true, Ordering::SeqCst);
    });

    let _guard = TerminalGuard::enter()?;
    let input = spawn_input_thread(events_tx.clone(), host_tx, Arc::clone(&stop))?;

    // The first tab; `run` only returns once it and every later tab are gone.
    let _ = events_tx.send(TabEvent::NewSession);
    let manager_task = tokio::spawn(manager.run(events_rx));

    let mut stdout = io::stdout();
    let mut view = View::new(size.cols, size.rows);
    redraw(&view, &mut stdout);

    // `ui_rx` closes when the manager task ends and drops its sender.
    loop {
        tokio::select! {
            event = ui_rx.recv() => match event {
                Some(event) => view.apply(event),
                None => break,
            },
            Some(input) = host_rx.recv() => match input {
                HostInput::Resize(size) => view.resize(size.cols, size.rows),
                HostInput::Mouse(mouse) => {
                    if let Some(event) = view.on_mouse(&mouse) {
                        let _ = events_tx.send(event);
                    }
                }
            },
        }
        // Coalesce whatever else is already queued before drawing.
        while let Ok(event) = ui_rx.try_recv() {
            view.apply(event);
        }
        redraw(&view, &mut stdout);
    }

    stop.store(true, Ordering::SeqCst);
    manager_task.await.context("tab manager task failed")?;
    if input.join().is_err() {
        log::error!("key input thread panicked");
    }
    Ok(())
}

fn redraw(view: &View, stdout: &mut Stdout) {
    if let Err(err) = view.draw(stdout) {
        log::warn!("redraw failed: {err}");
    }
}

/// Poll crossterm until `stop` is set or the manager is gone. Losing the
/// terminal closes every tab.
fn spawn_input_thread(
    events: EventSender,
    host: mpsc::UnboundedSender<HostInput>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("key-input".into())
        .spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                match event::poll(INPUT_POLL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(err) => {
                        log::error!("terminal input failed: {err}");
                        break;
                    }
                }
                let posted = match event::read() {
                    Ok(Event::Key(key)) => match keys::translate(key) {
                        Some(input) => events.send(TabEvent::Key(input)).is_ok(),
                        None => true,
                    },
                    Ok(Event::Resize(cols, rows)) => {
                        let size = session_size(cols, rows);
                        let _ = host.send(HostInput::Resize(size));
                        events.send(TabEvent::Resize(size)).is_ok()
                    }
                    Ok(Event::Mouse(mouse)) => host.send(HostInput::Mouse(mouse)).is_ok(),
                    Ok(_) => true,
                    Err(err) => {
                        log::error!("terminal input failed: {err}");
                        false
                    }
                };
                if !posted {
                    break;
                }
            }
            if !stop.load(Ordering::SeqCst) {
                // Without input the tabs cannot be used; treat it as the
                // window going away.
                let _ = events.send(TabEvent::CloseAll);
            }
            log::debug!("key input stopped");
        })
        .context("failed to spawn key input thread")
}
