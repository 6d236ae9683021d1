//! Shell resolution: what a new tab runs.
//!
//! Resolution is pure. It decides the command line and environment for a
//! session's child process and never spawns anything itself.

use std::collections::BTreeMap;

use tabterm_pty::ShellCommand;

use crate::config::ShellConfig;

/// Native command interpreter on Windows.
pub const WINDOWS_SHELL: &str = "cmd.exe";

/// Login shell used everywhere else.
pub const LOGIN_SHELL: [&str; 2] = ["/bin/bash", "--login"];

/// Truecolor-capable terminal type forced into non-Windows environments.
pub const DEFAULT_TERM: &str = "xterm-256color";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// Resolve the default session command for `platform`.
///
/// Windows gets `cmd.exe` with the inherited environment untouched. Every
/// other platform gets a bash login shell, with `TERM` forced to
/// `xterm-256color` whatever the inherited value was.
pub fn resolve<I>(platform: Platform, inherited: I) -> ShellCommand
where
    I: IntoIterator<Item = (String, String)>,
{
    ShellResolver::new(platform).resolve(inherited)
}

/// [`resolve`] plus the user's shell configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellResolver {
    platform: Platform,
    command: Option<Vec<String>>,
    term: String,
}

impl ShellResolver {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            command: None,
            term: DEFAULT_TERM.to_string(),
        }
    }

    /// Apply a configured command override and terminal type.
    ///
    /// An empty override list is ignored.
    pub fn from_config(platform: Platform, config: &ShellConfig) -> Self {
        let command = config.command.clone().filter(|argv| !argv.is_empty());
        Self {
            platform,
            command,
            term: config.term.clone(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn resolve<I>(&self, inherited: I) -> ShellCommand
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut env: BTreeMap<String, String> = inherited.into_iter().collect();

        let argv = match (&self.command, self.platform) {
            (Some(argv), _) => argv.clone(),
            (None, Platform::Windows) => vec![WINDOWS_SHELL.to_string()],
            (None, Platform::Unix) => LOGIN_SHELL.iter().map(|s| s.to_string()).collect(),
        };

        if self.platform == Platform::Unix {
            env.insert("TERM".to_string(), self.term.clone());
        }

        ShellCommand { argv, env }
    }
}
