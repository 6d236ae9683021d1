//! The narrow interface the tab manager uses to reach child processes.
//!
//! A [`Transport`] spawns processes; each spawn yields a [`TransportHandle`]
//! owned by exactly one session. Everything the process does afterwards
//! (output, title changes, exit, I/O failure) arrives through the
//! [`TransportListener`] passed to `spawn`, on the transport's own threads.

use std::sync::Arc;

use crate::command::{ShellCommand, TermSize};
use crate::pty::PtyError;

/// Unique identifier for a terminal session.
pub type SessionId = u64;

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code, if the process could be waited on.
    pub code: Option<u32>,
    /// Name of the terminating signal, if any.
    pub signal: Option<String>,
}

impl ExitStatus {
    pub fn code(code: u32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }
}

impl From<portable_pty::ExitStatus> for ExitStatus {
    fn from(status: portable_pty::ExitStatus) -> Self {
        Self {
            code: Some(status.exit_code()),
            signal: status.signal().map(str::to_string),
        }
    }
}

/// Receives everything a running process reports.
///
/// Called from transport threads, never from the owner of the handle.
/// `on_exit` is called at most once per spawned process.
pub trait TransportListener: Send + Sync {
    fn on_output(&self, bytes: &[u8]);
    fn on_title(&self, title: String);
    fn on_exit(&self, status: ExitStatus);
    fn on_error(&self, error: PtyError);
}

/// Exclusive handle to one running process.
pub trait TransportHandle: Send {
    /// Write input bytes to the process.
    fn write(&mut self, data: &[u8]) -> Result<(), PtyError>;

    fn resize(&mut self, size: TermSize) -> Result<(), PtyError>;

    fn process_id(&self) -> Option<u32>;

    /// Terminate the process and release the handle's resources.
    ///
    /// Consumes the handle, so a handle can only ever be released once.
    fn terminate(self: Box<Self>);
}

/// Spawns processes behind terminal transports.
pub trait Transport: Send + Sync {
    /// Start `command` and return its handle.
    ///
    /// May block while the process starts; callers bound it with a timeout.
    fn spawn(
        &self,
        id: SessionId,
        command: &ShellCommand,
        size: TermSize,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Box<dyn TransportHandle>, PtyError>;
}
