mod host;
mod keys;
mod render;

use std::fs::{self, OpenOptions};
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tabterm_core::Config;

/// Tabbed shell sessions in one terminal.
#[derive(Debug, Parser)]
#[command(name = "tabterm", version)]
struct Args {
    /// Config file to use instead of the default location.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Shell command line for new tabs, e.g. "/usr/bin/zsh -l".
    #[arg(long, value_name = "COMMAND")]
    shell: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if !std::io::stdin().is_terminal() {
        anyhow::bail!("tabterm must be run in an interactive terminal");
    }

    init_logging();

    let mut config = Config::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(shell) = args.shell {
        let argv = shell_argv(&shell)?;
        if !argv.is_empty() {
            config.shell.command = Some(argv);
        }
    }

    host::run(config).await
}

/// Split a `--shell` command line with shell quoting rules.
fn shell_argv(command: &str) -> Result<Vec<String>> {
    shell_words::split(command).context("invalid --shell command")
}

/// Log to a file: the terminal itself belongs to the tabs.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Without a writable
/// state directory nothing is logged.
fn init_logging() {
    let Some(dir) = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|d| d.join("tabterm"))
    else {
        return;
    };
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("tabterm.log"))
    else {
        return;
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
}
