//! tabterm-core: tabs of shell sessions and their lifecycle.
//!
//! # Architecture
//!
//! - [`TabManager`] owns everything below and is driven by [`TabEvent`]s
//!   from a single queue. It answers with [`UiEvent`]s.
//! - [`Session`] is one shell and the transport it owns.
//! - [`TabRegistry`] maps tab positions to sessions.
//! - [`FocusRouter`] keeps exactly one tab selected and defers focus changes
//!   until a mutation has committed.
//! - [`ShortcutDispatcher`] turns tab chords into [`TabAction`]s before any
//!   key reaches a session.
//! - [`ShellResolver`] picks the shell command line for the platform.
//! - [`Config`] is the user's `config.toml`.

pub mod config;
pub mod error;
pub mod event;
pub mod focus;
pub mod manager;
pub mod registry;
pub mod session;
pub mod shell;
pub mod shortcut;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError, KeyBindings, SessionConfig, ShellConfig};
pub use error::{RegistryError, SpawnError, TransportError};
pub use event::{
    CloseReason, EventReceiver, EventSender, KeyInput, QueueListener, TabEvent, UiEvent,
    UiReceiver, UiSender,
};
pub use focus::{FocusRouter, Mutation};
pub use manager::TabManager;
pub use registry::TabRegistry;
pub use session::{Session, SessionState};
pub use shell::{Platform, ShellResolver};
pub use shortcut::{Dispatch, Key, KeyChord, Modifiers, ShortcutDispatcher, TabAction};
