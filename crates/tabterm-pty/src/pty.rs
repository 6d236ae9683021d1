use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::Arc;

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tabterm_vt::TitleTracker;
use thiserror::Error;

use crate::command::{ShellCommand, TermSize};
use crate::transport::{ExitStatus, SessionId, Transport, TransportHandle, TransportListener};

/// Errors from PTY operations.
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("no command to spawn")]
    EmptyCommand,
    #[error("executable not found: {0}")]
    NotFound(String),
    #[error("PTY spawn failed: {0}")]
    SpawnFailed(String),
    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PTY resize failed: {0}")]
    ResizeFailed(String),
}

/// Owns the master side of a PTY and a killer for its child process.
///
/// The child itself is owned by the exit watcher thread, which blocks in
/// `wait()` and reports the exit to the listener.
pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
    terminated: bool,
}

impl PtyHandle {
    /// Spawn `command` on a fresh PTY and start its reader and exit watcher
    /// threads.
    pub fn spawn(
        id: SessionId,
        command: &ShellCommand,
        size: TermSize,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Self, PtyError> {
        let program = command.program().ok_or(PtyError::EmptyCommand)?;
        if program.contains('/') && !Path::new(program).exists() {
            return Err(PtyError::NotFound(program.to_string()));
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(to_pty_size(size))
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(command.args());
        cmd.env_clear();
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn {program}: {e}")))?;
        // Only the child may hold the slave, otherwise the reader never sees EOF.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to clone reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to take writer: {e}")))?;

        let mut handle = Self {
            master: pair.master,
            writer,
            killer: child.clone_killer(),
            pid: child.process_id(),
            terminated: false,
        };

        // From here on a failure must not leave the child running; dropping
        // `handle` kills it.
        start_reader_thread(id, reader, Arc::clone(&listener))?;
        if let Err(err) = start_wait_thread(id, child, listener) {
            handle.kill();
            return Err(err);
        }

        log::debug!("spawned {program} for session {id} (pid {:?})", handle.pid);
        Ok(handle)
    }

    fn kill(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        // Fails when the child already exited, which is fine.
        if let Err(err) = self.killer.kill() {
            log::debug!("kill of pid {:?} failed: {err}", self.pid);
        }
    }
}

impl TransportHandle for PtyHandle {
    fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn resize(&mut self, size: TermSize) -> Result<(), PtyError> {
        self.master
            .resize(to_pty_size(size))
            .map_err(|e| PtyError::ResizeFailed(format!("{e}")))
    }

    fn process_id(&self) -> Option<u32> {
        self.pid
    }

    fn terminate(mut self: Box<Self>) {
        self.kill();
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Spawns sessions on the platform's native PTY system.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTransport;

impl Transport for NativeTransport {
    fn spawn(
        &self,
        id: SessionId,
        command: &ShellCommand,
        size: TermSize,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Box<dyn TransportHandle>, PtyError> {
        let handle = PtyHandle::spawn(id, command, size, listener)?;
        Ok(Box::new(handle))
    }
}

fn to_pty_size(size: TermSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Blocking read loop on a dedicated OS thread.
///
/// Output and title changes go straight to the listener. EOF and EIO (what
/// Linux returns once the child side closes) end the loop quietly; the exit
/// itself is reported by the wait thread.
fn start_reader_thread(
    id: SessionId,
    mut reader: Box<dyn Read + Send>,
    listener: Arc<dyn TransportListener>,
) -> Result<(), PtyError> {
    std::thread::Builder::new()
        .name(format!("pty-io-{id}"))
        .spawn(move || {
            let mut buf = [0u8; 65536];
            let mut titles = TitleTracker::new();
            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) => return,
                    Ok(n) => n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) if is_closed_pty(&err) => return,
                    Err(err) => {
                        listener.on_error(PtyError::Io(err));
                        return;
                    }
                };
                if let Some(title) = titles.feed(&buf[..n]) {
                    listener.on_title(title);
                }
                listener.on_output(&buf[..n]);
            }
        })?;
    Ok(())
}

fn start_wait_thread(
    id: SessionId,
    mut child: Box<dyn Child + Send + Sync>,
    listener: Arc<dyn TransportListener>,
) -> Result<(), PtyError> {
    std::thread::Builder::new()
        .name(format!("pty-wait-{id}"))
        .spawn(move || {
            let status = match child.wait() {
                Ok(status) => ExitStatus::from(status),
                Err(err) => {
                    log::warn!("waiting on session {id} failed: {err}");
                    ExitStatus::unknown()
                }
            };
            listener.on_exit(status);
        })?;
    Ok(())
}

#[cfg(unix)]
fn is_closed_pty(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_closed_pty(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::BrokenPipe)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug)]
    enum Seen {
        Output(Vec<u8>),
        Title(String),
        Exit(ExitStatus),
        Error(String),
    }

    struct Recorder {
        tx: Mutex<mpsc::Sender<Seen>>,
    }

    impl Recorder {
        fn new() -> (Arc<Self>, mpsc::Receiver<Seen>) {
            let (tx, rx) = mpsc::channel();
            (Arc::new(Self { tx: Mutex::new(tx) }), rx)
        }

        fn send(&self, seen: Seen) {
            let _ = self.tx.lock().unwrap().send(seen);
        }
    }

    impl TransportListener for Recorder {
        fn on_output(&self, bytes: &[u8]) {
            self.send(Seen::Output(bytes.to_vec()));
        }
        fn on_title(&self, title: String) {
            self.send(Seen::Title(title));
        }
        fn on_exit(&self, status: ExitStatus) {
            self.send(Seen::Exit(status));
        }
        fn on_error(&self, error: PtyError) {
            self.send(Seen::Error(error.to_string()));
        }
    }

    fn sh(script: &str) -> ShellCommand {
        let env: BTreeMap<String, String> =
            [("PATH".to_string(), "/usr/bin:/bin".to_string())].into();
        ShellCommand::new(["/bin/sh", "-c", script], env)
    }

    fn wait_for_exit(rx: &mpsc::Receiver<Seen>) -> (Vec<u8>, Vec<String>, ExitStatus) {
        let mut output = Vec::new();
        let mut titles = Vec::new();
        loop {
            match rx.recv_timeout(Duration::from_secs(5)).expect("no exit within 5s") {
                Seen::Output(bytes) => output.extend(bytes),
                Seen::Title(title) => titles.push(title),
                Seen::Exit(status) => return (output, titles, status),
                Seen::Error(err) => panic!("unexpected transport error: {err}"),
            }
        }
    }

    #[test]
    fn test_spawn_reports_exit_code() {
        let (listener, rx) = Recorder::new();
        let handle = PtyHandle::spawn(1, &sh("exit 3"), TermSize::default(), listener);
        assert!(handle.is_ok(), "Failed to spawn PTY: {:?}", handle.err());

        let (_, _, status) = wait_for_exit(&rx);
        assert_eq!(status.code, Some(3));
    }

    #[test]
    fn test_output_and_title_are_reported() {
        let (listener, rx) = Recorder::new();
        let _handle = PtyHandle::spawn(
            2,
            &sh("printf '\\033]0;build\\007'; echo TABTERM_OK; sleep 0.2"),
            TermSize::default(),
            listener,
        )
        .unwrap();

        let (output, titles, _) = wait_for_exit(&rx);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("TABTERM_OK"), "got output: {text}");
        assert!(titles.contains(&"build".to_string()), "got titles: {titles:?}");
    }

    #[test]
    fn test_environment_is_passed_exactly() {
        let mut cmd = sh("echo \"term=$TERM\"; sleep 0.2");
        cmd.env.insert("TERM".to_string(), "xterm-256color".to_string());

        let (listener, rx) = Recorder::new();
        let _handle = PtyHandle::spawn(3, &cmd, TermSize::default(), listener).unwrap();

        let (output, _, _) = wait_for_exit(&rx);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("term=xterm-256color"), "got output: {text}");
    }

    #[test]
    fn test_terminate_ends_process_once() {
        let (listener, rx) = Recorder::new();
        let handle: Box<dyn TransportHandle> = Box::new(
            PtyHandle::spawn(4, &sh("sleep 30"), TermSize::default(), listener).unwrap(),
        );
        assert!(handle.process_id().is_some());

        handle.terminate();

        let (_, _, status) = wait_for_exit(&rx);
        assert_ne!(status.code, Some(0));
        // No second exit report follows.
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_missing_executable() {
        let (listener, _rx) = Recorder::new();
        let cmd = ShellCommand::new(["/definitely/not/a/shell"], BTreeMap::new());
        let result = PtyHandle::spawn(5, &cmd, TermSize::default(), listener);
        assert!(matches!(result, Err(PtyError::NotFound(_))));
    }

    #[test]
    fn test_empty_command() {
        let (listener, _rx) = Recorder::new();
        let cmd = ShellCommand::new(Vec::<String>::new(), BTreeMap::new());
        let result = PtyHandle::spawn(6, &cmd, TermSize::default(), listener);
        assert!(matches!(result, Err(PtyError::EmptyCommand)));
    }

    #[test]
    fn test_resize() {
        let (listener, _rx) = Recorder::new();
        let mut handle = PtyHandle::spawn(7, &sh("sleep 1"), TermSize::default(), listener).unwrap();
        let result = handle.resize(TermSize::new(120, 40));
        assert!(result.is_ok(), "Resize failed: {:?}", result.err());
    }
}
