//! Messages into and out of the tab manager.
//!
//! Everything that wants to change tab state posts a [`TabEvent`] on the
//! manager's queue: the host (keys, clicks, resizes) as well as transport
//! threads (output, titles, exits). The manager drains the queue on a single
//! task, which is what serialises all mutation. What the host should show
//! comes back as [`UiEvent`]s.

use std::fmt;
use std::sync::Arc;

use tabterm_pty::{ExitStatus, PtyError, SessionId, TermSize, TransportHandle, TransportListener};
use tokio::sync::mpsc;

use crate::error::SpawnError;
use crate::shortcut::KeyChord;

pub type EventSender = mpsc::UnboundedSender<TabEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TabEvent>;
pub type UiSender = mpsc::UnboundedSender<UiEvent>;
pub type UiReceiver = mpsc::UnboundedReceiver<UiEvent>;

/// A key press as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub chord: KeyChord,
    /// The bytes the host's key translation produced for the session.
    pub bytes: Vec<u8>,
}

/// Why a session is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close action from the tab bar or a shortcut.
    User,
    /// The session's own widget asked to be closed.
    Widget,
    ProcessExit,
    TransportError,
    WindowClosed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::User => "closed by user",
            CloseReason::Widget => "closed by widget",
            CloseReason::ProcessExit => "process exited",
            CloseReason::TransportError => "transport error",
            CloseReason::WindowClosed => "window closed",
        };
        f.write_str(reason)
    }
}

pub enum TabEvent {
    // From the host.
    NewSession,
    CloseSession(SessionId),
    CloseRequested(SessionId),
    CloseSelected,
    CloseAll,
    Select(usize),
    SelectNext,
    SelectPrevious,
    Key(KeyInput),
    Resize(TermSize),

    // From spawn tasks and transport threads.
    Spawned {
        id: SessionId,
        result: Result<Box<dyn TransportHandle>, SpawnError>,
    },
    Output {
        id: SessionId,
        bytes: Vec<u8>,
    },
    TitleChanged {
        id: SessionId,
        title: String,
    },
    ProcessExited {
        id: SessionId,
        status: ExitStatus,
    },
    TransportFailed {
        id: SessionId,
        error: PtyError,
    },
}

impl fmt::Debug for TabEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabEvent::NewSession => f.write_str("NewSession"),
            TabEvent::CloseSession(id) => write!(f, "CloseSession({id})"),
            TabEvent::CloseRequested(id) => write!(f, "CloseRequested({id})"),
            TabEvent::CloseSelected => f.write_str("CloseSelected"),
            TabEvent::CloseAll => f.write_str("CloseAll"),
            TabEvent::Select(position) => write!(f, "Select({position})"),
            TabEvent::SelectNext => f.write_str("SelectNext"),
            TabEvent::SelectPrevious => f.write_str("SelectPrevious"),
            TabEvent::Key(input) => write!(f, "Key({})", input.chord),
            TabEvent::Resize(size) => write!(f, "Resize({}x{})", size.cols, size.rows),
            TabEvent::Spawned { id, result } => match result {
                Ok(_) => write!(f, "Spawned({id}, ok)"),
                Err(err) => write!(f, "Spawned({id}, {err})"),
            },
            TabEvent::Output { id, bytes } => write!(f, "Output({id}, {} bytes)", bytes.len()),
            TabEvent::TitleChanged { id, title } => write!(f, "TitleChanged({id}, {title:?})"),
            TabEvent::ProcessExited { id, status } => {
                write!(f, "ProcessExited({id}, {:?})", status.code)
            }
            TabEvent::TransportFailed { id, error } => write!(f, "TransportFailed({id}, {error})"),
        }
    }
}

/// What the host should reflect on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    TabOpened {
        id: SessionId,
        position: usize,
        title: String,
    },
    TabClosed {
        id: SessionId,
        position: usize,
    },
    TitleChanged {
        id: SessionId,
        title: String,
    },
    /// Give input focus to this tab and show it.
    Focus {
        id: SessionId,
        position: usize,
    },
    Output {
        id: SessionId,
        bytes: Vec<u8>,
    },
    SpawnFailed {
        message: String,
    },
    /// The last session is gone; nothing further will be sent.
    AllSessionsClosed,
}

/// Forwards a session's transport callbacks onto the manager's queue.
///
/// Transport threads never touch tab state; they only post.
pub struct QueueListener {
    id: SessionId,
    events: EventSender,
}

impl QueueListener {
    pub fn new(id: SessionId, events: EventSender) -> Arc<Self> {
        Arc::new(Self { id, events })
    }

    fn post(&self, event: TabEvent) {
        // Fails only once the manager has shut down.
        if self.events.send(event).is_err() {
            log::trace!("session {}: event queue closed", self.id);
        }
    }
}

impl TransportListener for QueueListener {
    fn on_output(&self, bytes: &[u8]) {
        self.post(TabEvent::Output {
            id: self.id,
            bytes: bytes.to_vec(),
        });
    }

    fn on_title(&self, title: String) {
        self.post(TabEvent::TitleChanged { id: self.id, title });
    }

    fn on_exit(&self, status: ExitStatus) {
        self.post(TabEvent::ProcessExited { id: self.id, status });
    }

    fn on_error(&self, error: PtyError) {
        self.post(TabEvent::TransportFailed { id: self.id, error });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_posts_to_queue() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = QueueListener::new(3, tx);

        listener.on_output(b"hi");
        listener.on_title("top".to_string());
        listener.on_exit(ExitStatus::code(1));

        assert!(matches!(rx.try_recv(), Ok(TabEvent::Output { id: 3, ref bytes }) if bytes == b"hi"));
        assert!(matches!(rx.try_recv(), Ok(TabEvent::TitleChanged { id: 3, ref title }) if title == "top"));
        assert!(matches!(
            rx.try_recv(),
            Ok(TabEvent::ProcessExited { id: 3, ref status }) if status.code == Some(1)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_listener_survives_closed_queue() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let listener = QueueListener::new(1, tx);
        listener.on_exit(ExitStatus::unknown());
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::ProcessExit.to_string(), "process exited");
    }
}
