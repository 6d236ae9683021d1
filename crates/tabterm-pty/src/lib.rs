//! tabterm-pty: the process transport behind every tab.
//!
//! This crate spawns shells on pseudo-terminals and reports what they do.
//! It knows nothing about tabs; the tab manager reaches it only through the
//! traits in [`transport`].
//!
//! # Architecture
//!
//! - [`ShellCommand`] / [`TermSize`]: what to run and how big the terminal is.
//! - [`Transport`] / [`TransportHandle`] / [`TransportListener`]: the seam
//!   between the tab manager and processes.
//! - [`NativeTransport`] / [`PtyHandle`]: the `portable-pty` implementation,
//!   with one reader thread and one exit watcher thread per process.

pub mod command;
pub mod pty;
pub mod transport;

pub use command::{ShellCommand, TermSize};
pub use pty::{NativeTransport, PtyError, PtyHandle};
pub use transport::{ExitStatus, SessionId, Transport, TransportHandle, TransportListener};
