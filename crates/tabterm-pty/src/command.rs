use std::collections::BTreeMap;

/// Command line and environment for a session's child process.
///
/// The environment is complete: the child sees exactly these variables and
/// nothing inherited implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ShellCommand {
    pub fn new<I, S>(argv: I, env: BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env,
        }
    }

    /// The executable, i.e. the first element of `argv`.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }
}

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl TermSize {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for TermSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_and_args() {
        let cmd = ShellCommand::new(["/bin/bash", "--login"], BTreeMap::new());
        assert_eq!(cmd.program(), Some("/bin/bash"));
        assert_eq!(cmd.args(), &["--login".to_string()]);
    }

    #[test]
    fn test_empty_command() {
        let cmd = ShellCommand::new(Vec::<String>::new(), BTreeMap::new());
        assert_eq!(cmd.program(), None);
        assert!(cmd.args().is_empty());
    }
}
