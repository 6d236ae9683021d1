//! The tab manager: lifecycle coordination for every session.
//!
//! `TabManager` is owned by a single task and is the only thing that mutates
//! the registry, the sessions and the focus router. Transport threads and
//! spawn tasks post onto its queue instead (see [`crate::event`]).
//!
//! All close triggers (tab close, widget close, process exit, transport
//! failure, window close) go through one teardown path. When the last tab is
//! gone the manager fires the all-sessions-closed hook exactly once and stops
//! accepting registry changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tabterm_pty::{SessionId, TermSize, Transport, TransportHandle};

use crate::config::{Config, ConfigError};
use crate::error::{invariant_violated, SpawnError, TransportError};
use crate::event::{
    CloseReason, EventReceiver, EventSender, KeyInput, QueueListener, TabEvent, UiEvent, UiSender,
};
use crate::focus::{FocusRouter, Mutation};
use crate::registry::TabRegistry;
use crate::session::Session;
use crate::shell::{Platform, ShellResolver};
use crate::shortcut::{Dispatch, ShortcutDispatcher, TabAction};

type AllClosedHook = Box<dyn FnOnce() + Send>;

pub struct TabManager {
    registry: TabRegistry,
    /// Sessions that have a tab. Every key here is in `registry`.
    sessions: HashMap<SessionId, Session>,
    /// Sessions whose spawn has not resolved yet, including ones already
    /// closed while waiting.
    starting: HashMap<SessionId, Session>,
    focus: FocusRouter,
    shortcuts: ShortcutDispatcher,
    resolver: ShellResolver,
    transport: Arc<dyn Transport>,
    events: EventSender,
    ui: UiSender,
    size: TermSize,
    spawn_timeout: Duration,
    next_id: SessionId,
    all_closed: Option<AllClosedHook>,
    finished: bool,
}

impl TabManager {
    /// Create a manager that spawns through `transport`.
    ///
    /// `events` must be the sending half of the queue later passed to
    /// [`run`](Self::run); transport callbacks are posted there.
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        events: EventSender,
        ui: UiSender,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            registry: TabRegistry::new(),
            sessions: HashMap::new(),
            starting: HashMap::new(),
            focus: FocusRouter::new(),
            shortcuts: config.keys.dispatcher()?,
            resolver: ShellResolver::from_config(Platform::current(), &config.shell),
            transport,
            events,
            ui,
            size: TermSize::new(config.session.cols, config.session.rows),
            spawn_timeout: config.session.spawn_timeout(),
            next_id: 1,
            all_closed: None,
            finished: false,
        })
    }

    /// Replace the shell resolver (platform and shell choice).
    pub fn with_resolver(mut self, resolver: ShellResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Register the hook run once when the last session has closed.
    pub fn on_all_sessions_closed<F>(&mut self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.all_closed = Some(Box::new(hook));
    }

    /// Drain the event queue until every session has closed or all senders
    /// are gone.
    pub async fn run(mut self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle(event);
            if self.finished {
                break;
            }
        }
        log::debug!("tab manager stopped");
    }

    /// Apply one event.
    pub fn handle(&mut self, event: TabEvent) {
        log::trace!("handling {event:?}");
        match event {
            TabEvent::NewSession => {
                self.new_session();
            }
            TabEvent::CloseSession(id) => self.close_session(id),
            TabEvent::CloseRequested(id) => self.close_with_reason(id, CloseReason::Widget),
            TabEvent::CloseSelected => self.close_selected(),
            TabEvent::CloseAll => self.close_all(),
            TabEvent::Select(position) => {
                self.select(position);
            }
            TabEvent::SelectNext => {
                self.select_next();
            }
            TabEvent::SelectPrevious => {
                self.select_previous();
            }
            TabEvent::Key(input) => self.handle_key(input),
            TabEvent::Resize(size) => self.resize(size),
            TabEvent::Spawned { id, result } => self.on_spawned(id, result),
            TabEvent::Output { id, bytes } => self.on_output(id, bytes),
            TabEvent::TitleChanged { id, title } => self.on_title(id, title),
            TabEvent::ProcessExited { id, status } => {
                let session = match self.sessions.get_mut(&id) {
                    Some(session) => Some(session),
                    None => self.starting.get_mut(&id),
                };
                match session.map(|session| session.notify_exit(&status)) {
                    Some(true) => self.close_with_reason(id, CloseReason::ProcessExit),
                    Some(false) => log::debug!("session {id}: duplicate exit ignored"),
                    None => log::debug!("exit of unknown session {id} ignored"),
                }
            }
            TabEvent::TransportFailed { id, error } => {
                let err = TransportError { id, source: error };
                log::warn!("{err}");
                self.close_with_reason(id, CloseReason::TransportError);
            }
        }
        self.flush_focus();
    }

    /// Start a new session. Its tab appears once the shell has started.
    ///
    /// Returns the id of the starting session, or `None` once the manager has
    /// finished.
    pub fn new_session(&mut self) -> Option<SessionId> {
        if self.finished {
            log::debug!("new session refused: all sessions already closed");
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut session = Session::new(id);
        session.on_exit(|id, status| match (status.code, &status.signal) {
            (_, Some(signal)) => log::info!("session {id} killed by {signal}"),
            (Some(code), None) => log::info!("session {id} exited with code {code}"),
            (None, None) => log::info!("session {id} exited"),
        });
        self.starting.insert(id, session);

        let command = self.resolver.resolve(std::env::vars());
        log::debug!("starting session {id}: {:?}", command.argv);

        let transport = Arc::clone(&self.transport);
        let listener = QueueListener::new(id, self.events.clone());
        let events = self.events.clone();
        let size = self.size;
        let timeout = self.spawn_timeout;
        tokio::spawn(async move {
            let mut spawn = tokio::task::spawn_blocking(move || {
                transport.spawn(id, &command, size, listener)
            });
            let result = match tokio::time::timeout(timeout, &mut spawn).await {
                Ok(Ok(result)) => result.map_err(SpawnError::from),
                Ok(Err(join_err)) => Err(SpawnError::Failed(format!("spawn task failed: {join_err}"))),
                Err(_) => Err(SpawnError::TimedOut(timeout)),
            };
            let timed_out = matches!(result, Err(SpawnError::TimedOut(_)));
            let _ = events.send(TabEvent::Spawned { id, result });

            // The tab is already abandoned; a process that shows up late is
            // terminated here.
            if timed_out {
                if let Ok(Ok(handle)) = spawn.await {
                    log::debug!("session {id} started after its spawn timed out; terminating");
                    handle.terminate();
                }
            }
        });

        Some(id)
    }

    /// Close a session from a user action.
    pub fn close_session(&mut self, id: SessionId) {
        self.close_with_reason(id, CloseReason::User);
        self.flush_focus();
    }

    /// The single teardown path. Safe to call any number of times for the
    /// same session, from any trigger.
    fn close_with_reason(&mut self, id: SessionId, reason: CloseReason) {
        if let Some(session) = self.starting.get_mut(&id) {
            // Stays in `starting` until the spawn resolves; `attach` then
            // kills the late process.
            if session.request_close() {
                log::info!("session {id} closed before it started ({reason})");
            }
            return;
        }

        let Some(mut session) = self.sessions.remove(&id) else {
            log::debug!("session {id} already closed ({reason})");
            return;
        };
        session.request_close();

        match self.registry.remove_by_session(id) {
            Ok(position) => {
                self.focus
                    .on_registry_mutated(Mutation::Removed(position), self.registry.count());
                self.emit(UiEvent::TabClosed { id, position });
                log::info!(
                    "session {id} closed at position {position}, {reason} (remaining: {})",
                    self.registry.count()
                );
            }
            Err(err) => invariant_violated!("{err}"),
        }

        // Must stay last: it has to see the registry after removal.
        self.finish_if_empty();
    }

    fn close_selected(&mut self) {
        if let Some(id) = self.focus.selected().and_then(|p| self.registry.session_at(p)) {
            self.close_session(id);
        }
    }

    /// Close every session, as when the window itself is closed.
    pub fn close_all(&mut self) {
        for session in self.starting.values_mut() {
            session.request_close();
        }
        let ids: Vec<SessionId> = self.registry.sessions().rev().collect();
        for id in ids {
            self.close_with_reason(id, CloseReason::WindowClosed);
        }
        self.finish_if_empty();
    }

    /// Select the tab at `position`. Returns `false` if there is none.
    pub fn select(&mut self, position: usize) -> bool {
        if self.finished || position >= self.registry.count() {
            return false;
        }
        self.focus.on_selection_changed(position);
        self.flush_focus();
        true
    }

    /// Select the tab to the right of the selection; no-op on the last tab.
    pub fn select_next(&mut self) -> bool {
        match self.focus.selected() {
            Some(position) if position + 1 < self.registry.count() => self.select(position + 1),
            _ => false,
        }
    }

    /// Select the tab to the left of the selection; no-op on the first tab.
    pub fn select_previous(&mut self) -> bool {
        match self.focus.selected() {
            Some(position) if position > 0 => self.select(position - 1),
            _ => false,
        }
    }

    pub fn count(&self) -> usize {
        self.registry.count()
    }

    pub fn selected(&self) -> Option<usize> {
        self.focus.selected()
    }

    pub fn selected_session(&self) -> Option<SessionId> {
        self.focus.selected().and_then(|p| self.registry.session_at(p))
    }

    pub fn session_at(&self, position: usize) -> Option<&Session> {
        self.registry
            .session_at(position)
            .and_then(|id| self.sessions.get(&id))
    }

    pub fn position_of(&self, id: SessionId) -> Option<usize> {
        self.registry.position_of(id)
    }

    /// Number of sessions whose shell is still starting.
    pub fn starting_count(&self) -> usize {
        self.starting.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn perform(&mut self, action: TabAction) {
        match action {
            TabAction::NewTab => {
                self.new_session();
            }
            TabAction::NextTab => {
                self.select_next();
            }
            TabAction::PreviousTab => {
                self.select_previous();
            }
            TabAction::CloseTab => self.close_selected(),
        }
    }

    /// Shortcuts first; anything they do not claim goes to the selected
    /// session.
    fn handle_key(&mut self, input: KeyInput) {
        match self.shortcuts.dispatch(&input.chord) {
            Dispatch::Consumed(action) => {
                log::debug!("{} -> {action:?}", input.chord);
                self.perform(action);
            }
            Dispatch::Forward => {
                let Some(id) = self.selected_session() else {
                    return;
                };
                let result = match self.sessions.get_mut(&id) {
                    Some(session) => session.write_input(&input.bytes),
                    None => Ok(()),
                };
                if let Err(err) = result {
                    log::warn!("{err}");
                    self.close_with_reason(id, CloseReason::TransportError);
                }
            }
        }
    }

    fn resize(&mut self, size: TermSize) {
        self.size = size;
        let mut failed = Vec::new();
        for session in self.sessions.values_mut() {
            if let Err(err) = session.resize(size) {
                log::warn!("{err}");
                failed.push(session.id());
            }
        }
        for id in failed {
            self.close_with_reason(id, CloseReason::TransportError);
        }
    }

    fn on_spawned(&mut self, id: SessionId, result: Result<Box<dyn TransportHandle>, SpawnError>) {
        let Some(mut session) = self.starting.remove(&id) else {
            invariant_violated!("spawn result for unknown session {id}");
            if let Ok(handle) = result {
                handle.terminate();
            }
            return;
        };

        let handle = match result {
            Ok(handle) => handle,
            Err(err) => {
                log::warn!("session {id} failed to start: {err}");
                session.request_close();
                self.emit(UiEvent::SpawnFailed {
                    message: err.to_string(),
                });
                self.finish_if_empty();
                return;
            }
        };

        if !session.attach(handle) {
            log::debug!("session {id} started after it was closed; process terminated");
            self.finish_if_empty();
            return;
        }
        if let Err(err) = session.resize(self.size) {
            log::debug!("initial resize failed: {err}");
        }

        let position = match self.registry.insert(id) {
            Ok(position) => position,
            Err(err) => {
                invariant_violated!("{err}");
                session.request_close();
                return;
            }
        };
        let ui = self.ui.clone();
        session.on_title_change(move |id, title| {
            let _ = ui.send(UiEvent::TitleChanged {
                id,
                title: title.to_string(),
            });
        });
        let title = session.title().to_string();
        let early_output = session.take_early_output();
        self.sessions.insert(id, session);

        self.emit(UiEvent::TabOpened { id, position, title });
        if !early_output.is_empty() {
            self.emit(UiEvent::Output {
                id,
                bytes: early_output,
            });
        }
        self.focus
            .on_registry_mutated(Mutation::Inserted(position), self.registry.count());
        self.focus.on_selection_changed(position);
        log::info!(
            "session {id} opened at position {position} (total: {})",
            self.registry.count()
        );
    }

    fn on_output(&mut self, id: SessionId, bytes: Vec<u8>) {
        if self.sessions.contains_key(&id) {
            self.emit(UiEvent::Output { id, bytes });
        } else if let Some(session) = self.starting.get_mut(&id) {
            session.buffer_output(&bytes);
        } else {
            log::trace!("dropping output of closed session {id}");
        }
    }

    /// Titles of a starting session ride along in `TabOpened`; after that the
    /// session's title listener reports them.
    fn on_title(&mut self, id: SessionId, title: String) {
        let session = match self.sessions.get_mut(&id) {
            Some(session) => Some(session),
            None => self.starting.get_mut(&id),
        };
        match session {
            Some(session) => session.set_title(title),
            None => log::trace!("title of closed session {id} ignored"),
        }
    }

    /// Deliver a pending focus change. Runs only after the mutation that
    /// caused it has completed.
    fn flush_focus(&mut self) {
        let Some(position) = self.focus.take_pending_focus() else {
            return;
        };
        match self.registry.session_at(position) {
            Some(id) => self.emit(UiEvent::Focus { id, position }),
            None => invariant_violated!("selected position {position} has no session"),
        }
    }

    fn finish_if_empty(&mut self) {
        if self.finished || !self.registry.is_empty() || !self.starting.is_empty() {
            return;
        }
        self.finished = true;
        log::info!("all sessions closed");
        self.emit(UiEvent::AllSessionsClosed);
        if let Some(hook) = self.all_closed.take() {
            hook();
        }
    }

    fn emit(&self, event: UiEvent) {
        if self.ui.send(event).is_err() {
            log::trace!("host is gone; UI event dropped");
        }
    }
}

impl Drop for TabManager {
    fn drop(&mut self) {
        for session in self.sessions.values_mut().chain(self.starting.values_mut()) {
            session.request_close();
        }
    }
}
