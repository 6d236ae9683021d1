use tabterm_pty::{ExitStatus, SessionId, TermSize, TransportHandle};

use crate::error::{invariant_violated, TransportError};

/// Lifecycle of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Spawn in flight; no transport yet.
    Starting,
    Running,
    /// Terminal. The transport, if there ever was one, has been released.
    Closed,
}

type ExitObserver = Box<dyn FnOnce(SessionId, &ExitStatus) + Send>;
type TitleListener = Box<dyn FnMut(SessionId, &str) + Send>;

/// One shell conversation and the transport it exclusively owns.
///
/// Sessions are created `Starting` because spawning happens off the owning
/// task. [`attach`](Session::attach) hands over the transport once it exists.
/// Both close paths (an explicit close and the process exiting) end in
/// [`request_close`](Session::request_close), which releases the transport at
/// most once.
pub struct Session {
    id: SessionId,
    title: String,
    state: SessionState,
    exit_notified: bool,
    transport: Option<Box<dyn TransportHandle>>,
    exit_observers: Vec<ExitObserver>,
    title_listener: Option<TitleListener>,
    /// Output that arrived before the tab was shown.
    early_output: Vec<u8>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            title: String::new(),
            state: SessionState::Starting,
            exit_notified: false,
            transport: None,
            exit_observers: Vec::new(),
            title_listener: None,
            early_output: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_exit_notified(&self) -> bool {
        self.exit_notified
    }

    pub fn process_id(&self) -> Option<u32> {
        self.transport.as_ref().and_then(|t| t.process_id())
    }

    /// Hand over the transport of a freshly spawned process.
    ///
    /// Returns `true` when the session is now `Running`. A session that was
    /// closed while starting terminates the handle right away and stays
    /// `Closed`, so a late spawn never leaves an orphaned process.
    pub fn attach(&mut self, handle: Box<dyn TransportHandle>) -> bool {
        match self.state {
            SessionState::Starting => {
                self.transport = Some(handle);
                self.state = SessionState::Running;
                true
            }
            SessionState::Closed => {
                handle.terminate();
                false
            }
            SessionState::Running => {
                invariant_violated!("session {} attached twice", self.id);
                handle.terminate();
                false
            }
        }
    }

    /// Register a callback for the process exit.
    pub fn on_exit<F>(&mut self, observer: F)
    where
        F: FnOnce(SessionId, &ExitStatus) + Send + 'static,
    {
        self.exit_observers.push(Box::new(observer));
    }

    /// Register the title-change listener, replacing any previous one.
    pub fn on_title_change<F>(&mut self, listener: F)
    where
        F: FnMut(SessionId, &str) + Send + 'static,
    {
        self.title_listener = Some(Box::new(listener));
    }

    /// Deliver the process exit to the registered observers.
    ///
    /// Only the first call does anything; it returns `false` afterwards.
    pub fn notify_exit(&mut self, status: &ExitStatus) -> bool {
        if self.exit_notified {
            return false;
        }
        self.exit_notified = true;
        for observer in self.exit_observers.drain(..) {
            observer(self.id, status);
        }
        true
    }

    /// Close the session. Idempotent.
    ///
    /// The first call moves to `Closed` and terminates the transport. Returns
    /// whether this call performed the transition.
    pub fn request_close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        self.early_output.clear();
        if let Some(transport) = self.transport.take() {
            transport.terminate();
        }
        true
    }

    /// Store a new title and notify the title listener.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        if let Some(listener) = self.title_listener.as_mut() {
            listener(self.id, &self.title);
        }
    }

    /// Send input to the process. Input for a session that is not running is
    /// dropped.
    pub fn write_input(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        match self.transport.as_mut() {
            Some(transport) => transport
                .write(bytes)
                .map_err(|source| TransportError { id: self.id, source }),
            None => Ok(()),
        }
    }

    pub fn resize(&mut self, size: TermSize) -> Result<(), TransportError> {
        match self.transport.as_mut() {
            Some(transport) => transport
                .resize(size)
                .map_err(|source| TransportError { id: self.id, source }),
            None => Ok(()),
        }
    }

    pub(crate) fn buffer_output(&mut self, bytes: &[u8]) {
        if self.state != SessionState::Closed {
            self.early_output.extend_from_slice(bytes);
        }
    }

    pub(crate) fn take_early_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.early_output)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("state", &self.state)
            .field("exit_notified", &self.exit_notified)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHandle;
    use std::sync::{Arc, Mutex};

    fn running(id: SessionId) -> (Session, Arc<crate::testing::HandleLog>) {
        let mut session = Session::new(id);
        let (handle, log) = FakeHandle::new();
        assert!(session.attach(Box::new(handle)));
        (session, log)
    }

    #[test]
    fn test_new_session_is_starting_with_empty_title() {
        let session = Session::new(1);
        assert_eq!(session.id(), 1);
        assert_eq!(session.state(), SessionState::Starting);
        assert_eq!(session.title(), "");
        assert!(!session.is_exit_notified());
    }

    #[test]
    fn test_attach_moves_to_running() {
        let (session, log) = running(1);
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.process_id(), Some(4242));
        assert_eq!(log.terminations(), 0);
    }

    #[test]
    fn test_request_close_terminates_once() {
        let (mut session, log) = running(1);
        assert!(session.request_close());
        assert!(!session.request_close());
        assert!(!session.request_close());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(log.terminations(), 1);
    }

    #[test]
    fn test_exit_then_close_terminates_once() {
        let (mut session, log) = running(1);
        assert!(session.notify_exit(&ExitStatus::code(0)));
        assert!(session.request_close());
        assert!(!session.request_close());
        assert_eq!(log.terminations(), 1);
    }

    #[test]
    fn test_close_while_starting_kills_late_transport() {
        let mut session = Session::new(1);
        assert!(session.request_close());
        assert_eq!(session.state(), SessionState::Closed);

        let (handle, log) = FakeHandle::new();
        assert!(!session.attach(Box::new(handle)));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(log.terminations(), 1);

        // Nothing left to release.
        assert!(!session.request_close());
        assert_eq!(log.terminations(), 1);
    }

    #[test]
    fn test_exit_observers_fire_exactly_once() {
        let (mut session, _log) = running(7);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            session.on_exit(move |id, status| seen.lock().unwrap().push((id, status.code)));
        }

        assert!(session.notify_exit(&ExitStatus::code(2)));
        assert!(!session.notify_exit(&ExitStatus::code(3)));

        assert_eq!(*seen.lock().unwrap(), vec![(7, Some(2)), (7, Some(2))]);
        assert!(session.is_exit_notified());
    }

    #[test]
    fn test_set_title_notifies_listener() {
        let (mut session, _log) = running(3);
        let titles = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&titles);
        session.on_title_change(move |id, title| sink.lock().unwrap().push(format!("{id}:{title}")));

        session.set_title("vim");
        session.set_title("");

        assert_eq!(session.title(), "");
        assert_eq!(*titles.lock().unwrap(), vec!["3:vim".to_string(), "3:".to_string()]);
    }

    #[test]
    fn test_write_input_reaches_transport() {
        let (mut session, log) = running(1);
        session.write_input(b"ls\r").unwrap();
        assert_eq!(log.written(), b"ls\r");
    }

    #[test]
    fn test_write_failure_is_transport_error() {
        let mut session = Session::new(9);
        let (mut handle, _log) = FakeHandle::new();
        handle.fail_writes = true;
        session.attach(Box::new(handle));

        let err = session.write_input(b"x").unwrap_err();
        assert_eq!(err.id, 9);
    }

    #[test]
    fn test_input_after_close_is_dropped() {
        let (mut session, log) = running(1);
        session.request_close();
        assert!(session.write_input(b"late").is_ok());
        assert!(log.written().is_empty());
    }

    #[test]
    fn test_early_output_is_buffered_until_taken() {
        let mut session = Session::new(1);
        session.buffer_output(b"hello ");
        session.buffer_output(b"world");
        assert_eq!(session.take_early_output(), b"hello world");
        assert!(session.take_early_output().is_empty());
    }
}
