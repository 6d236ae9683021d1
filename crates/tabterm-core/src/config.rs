//! User configuration.
//!
//! Loaded from `<config dir>/tabterm/config.toml`. A missing file means
//! defaults; every section and field is optional.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shell::DEFAULT_TERM;
use crate::shortcut::{ChordParseError, KeyChord, ShortcutDispatcher, TabAction};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid key binding for {action}: {source}")]
    Binding {
        action: &'static str,
        #[source]
        source: ChordParseError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shell: ShellConfig,
    pub session: SessionConfig,
    pub keys: KeyBindings,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Config =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tabterm").join("config.toml"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Replaces the platform's default shell command line.
    pub command: Option<Vec<String>>,
    /// `TERM` value forced into non-Windows sessions.
    pub term: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            command: None,
            term: DEFAULT_TERM.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a shell may take to start before the tab is abandoned.
    pub spawn_timeout_ms: u64,
    pub cols: u16,
    pub rows: u16,
}

impl SessionConfig {
    pub fn spawn_timeout(&self) -> Duration {
        Duration::from_millis(self.spawn_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            spawn_timeout_ms: 5_000,
            cols: 80,
            rows: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub new_tab: String,
    pub next_tab: String,
    pub previous_tab: String,
    pub close_tab: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            new_tab: "ctrl+t".to_string(),
            next_tab: "ctrl+pagedown".to_string(),
            previous_tab: "ctrl+pageup".to_string(),
            close_tab: "ctrl+shift+w".to_string(),
        }
    }
}

impl KeyBindings {
    /// Build the dispatcher for these bindings.
    pub fn dispatcher(&self) -> Result<ShortcutDispatcher, ConfigError> {
        let mut dispatcher = ShortcutDispatcher::new();
        let bindings = [
            ("new_tab", &self.new_tab, TabAction::NewTab),
            ("next_tab", &self.next_tab, TabAction::NextTab),
            ("previous_tab", &self.previous_tab, TabAction::PreviousTab),
            ("close_tab", &self.close_tab, TabAction::CloseTab),
        ];
        for (action, chord, tab_action) in bindings {
            let chord: KeyChord = chord
                .parse()
                .map_err(|source| ConfigError::Binding { action, source })?;
            dispatcher.bind(chord, tab_action);
        }
        Ok(dispatcher)
    }
}
