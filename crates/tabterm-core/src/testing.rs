//! In-memory transport for lifecycle tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tabterm_pty::{
    ExitStatus, PtyError, SessionId, ShellCommand, TermSize, Transport, TransportHandle,
    TransportListener,
};

/// What a fake process has had done to it.
#[derive(Debug, Default)]
pub struct HandleLog {
    pub terminations: AtomicUsize,
    pub written: Mutex<Vec<u8>>,
    pub sizes: Mutex<Vec<TermSize>>,
}

impl HandleLog {
    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }
}

pub struct FakeHandle {
    pub log: Arc<HandleLog>,
    pub fail_writes: bool,
}

impl FakeHandle {
    pub fn new() -> (Self, Arc<HandleLog>) {
        let log = Arc::new(HandleLog::default());
        (
            Self {
                log: Arc::clone(&log),
                fail_writes: false,
            },
            log,
        )
    }
}

impl TransportHandle for FakeHandle {
    fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        if self.fail_writes {
            return Err(PtyError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe closed",
            )));
        }
        self.log.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, size: TermSize) -> Result<(), PtyError> {
        self.log.sizes.lock().unwrap().push(size);
        Ok(())
    }

    fn process_id(&self) -> Option<u32> {
        Some(4242)
    }

    fn terminate(self: Box<Self>) {
        self.log.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeState {
    listeners: HashMap<SessionId, Arc<dyn TransportListener>>,
    logs: HashMap<SessionId, Arc<HandleLog>>,
    commands: Vec<ShellCommand>,
}

/// Transport whose processes exist only as listeners and logs.
///
/// Tests drive the "process side" through `exit`, `output`, `title` and
/// `fail`, which call the listener the way the PTY threads would.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
    fail_with: Arc<Mutex<Option<String>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    broken_writes: Arc<Mutex<bool>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following spawn fail with a not-found error.
    pub fn fail_spawns(&self, program: &str) {
        *self.fail_with.lock().unwrap() = Some(program.to_string());
    }

    pub fn succeed_spawns(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    /// Make every following spawn block for `delay` before returning.
    pub fn delay_spawns(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Handles spawned from now on fail every write.
    pub fn break_writes(&self) {
        *self.broken_writes.lock().unwrap() = true;
    }

    pub fn log(&self, id: SessionId) -> Arc<HandleLog> {
        Arc::clone(&self.state.lock().unwrap().logs[&id])
    }

    pub fn commands(&self) -> Vec<ShellCommand> {
        self.state.lock().unwrap().commands.clone()
    }

    fn listener(&self, id: SessionId) -> Arc<dyn TransportListener> {
        Arc::clone(&self.state.lock().unwrap().listeners[&id])
    }

    pub fn exit(&self, id: SessionId, code: u32) {
        self.listener(id).on_exit(ExitStatus::code(code));
    }

    pub fn output(&self, id: SessionId, bytes: &[u8]) {
        self.listener(id).on_output(bytes);
    }

    pub fn title(&self, id: SessionId, title: &str) {
        self.listener(id).on_title(title.to_string());
    }

    pub fn fail(&self, id: SessionId) {
        self.listener(id).on_error(PtyError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "read failed",
        )));
    }
}

impl Transport for FakeTransport {
    fn spawn(
        &self,
        id: SessionId,
        command: &ShellCommand,
        _size: TermSize,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Box<dyn TransportHandle>, PtyError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock().unwrap();
        state.commands.push(command.clone());
        state.listeners.insert(id, listener);

        if let Some(program) = self.fail_with.lock().unwrap().clone() {
            return Err(PtyError::NotFound(program));
        }

        let (mut handle, log) = FakeHandle::new();
        handle.fail_writes = *self.broken_writes.lock().unwrap();
        state.logs.insert(id, log);
        Ok(Box::new(handle))
    }
}
