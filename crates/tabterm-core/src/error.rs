//! Error types for the tab manager.
//!
//! None of these escape `TabManager`: a spawn failure means the tab never
//! appears, a transport failure means the tab goes away.

use std::time::Duration;

use tabterm_pty::{PtyError, SessionId};
use thiserror::Error;

/// A session's process could not be started.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("shell not found: {0}")]
    NotFound(String),
    #[error("could not start shell: {0}")]
    Failed(String),
    #[error("shell did not start within {0:?}")]
    TimedOut(Duration),
}

impl From<PtyError> for SpawnError {
    fn from(err: PtyError) -> Self {
        match err {
            PtyError::NotFound(program) => SpawnError::NotFound(program),
            other => SpawnError::Failed(other.to_string()),
        }
    }
}

/// I/O failure on a session that was already running.
#[derive(Debug, Error)]
#[error("session {id}: {source}")]
pub struct TransportError {
    pub id: SessionId,
    #[source]
    pub source: PtyError,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session {0} is not in the tab registry")]
    NotFound(SessionId),
    #[error("session {0} is already in the tab registry")]
    Duplicate(SessionId),
}

/// Report a broken internal invariant.
///
/// Correct callers never trigger this, so debug builds panic. Release builds
/// log and carry on.
macro_rules! invariant_violated {
    ($($arg:tt)*) => {{
        log::error!("invariant violated: {}", format_args!($($arg)*));
        debug_assert!(false, $($arg)*);
    }};
}

pub(crate) use invariant_violated;
