//! External video player processes
//!
//! Video is handed to a slave-mode player embedded into a renderer surface.
//! The player reports progress on stdout one line at a time and accepts
//! newline-terminated commands on stdin.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;

use crossbeam::channel::{self, Receiver};

use crate::error::{PlayerError, Result};

/// Default player binary
pub const DEFAULT_PLAYER: &str = "mplayer";

/// What to play and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerArgs {
    pub path: PathBuf,
    /// Native window to embed into
    pub window: u64,
    pub mute: bool,
}

impl PlayerArgs {
    /// Command line for a slave-mode mplayer
    pub fn mplayer_args(&self) -> Vec<String> {
        let mut args = vec![
            "-slave".to_string(),
            "-identify".to_string(),
            "-input".to_string(),
            "nodefault-bindings:conf=/dev/null".to_string(),
            "-wid".to_string(),
            self.window.to_string(),
            self.path.display().to_string(),
        ];
        if self.mute {
            args.extend(["-ao".to_string(), "null".to_string()]);
        }
        args
    }
}

/// A line of player output that matters to playback
#[derive(Debug, Clone, PartialEq)]
pub enum StatusLine {
    /// Frames are being shown
    Started,
    /// Clip length in seconds
    Length(f64),
    Other,
}

pub fn parse_status_line(line: &str) -> StatusLine {
    let line = line.trim();
    if line.starts_with("Starting playback") {
        return StatusLine::Started;
    }
    match line.split_once('=') {
        Some(("ID_LENGTH", value)) => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(StatusLine::Length)
            .unwrap_or(StatusLine::Other),
        _ => StatusLine::Other,
    }
}

/// A running player
pub trait PlayerProcess: Send {
    /// Write one command; the newline is appended here
    fn send_command(&mut self, command: &str) -> Result<()>;

    /// `Some(code)` once the process has exited
    fn try_wait(&mut self) -> Result<Option<i32>>;

    /// Terminate and reap the process
    fn kill(&mut self) -> Result<()>;
}

/// Starts players
pub trait ProcessLauncher: Send + Sync {
    /// Spawn a player; status lines arrive on the receiver, which disconnects
    /// when the player closes its stdout
    fn spawn(&self, args: &PlayerArgs) -> Result<(Box<dyn PlayerProcess>, Receiver<String>)>;
}

/// Launches mplayer with `std::process`
#[derive(Debug, Clone)]
pub struct MplayerLauncher {
    program: String,
}

impl Default for MplayerLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER)
    }
}

impl MplayerLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ProcessLauncher for MplayerLauncher {
    fn spawn(&self, args: &PlayerArgs) -> Result<(Box<dyn PlayerProcess>, Receiver<String>)> {
        let mut child = Command::new(&self.program)
            .args(args.mplayer_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PlayerError::Process(format!("failed to start {}: {}", self.program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlayerError::Process("player stdout not captured".to_string()))?;
        let stdin = child.stdin.take();
        let pid = child.id();

        let (tx, rx) = channel::unbounded();
        let reader = thread::Builder::new()
            .name(format!("player-{}", pid))
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(pid, "player stdout closed: {}", e);
                            break;
                        }
                    }
                }
            });
        reap_on_error(&mut child, reader)?;

        tracing::debug!(pid, path = %args.path.display(), "player started");
        Ok((Box::new(MplayerProcess { child, stdin }), rx))
    }
}

/// Kill and reap `child` when a follow-up step of starting it failed
fn reap_on_error<T>(child: &mut Child, result: std::io::Result<T>) -> Result<T> {
    result.map_err(|e| {
        if let Err(kill) = child.kill().and_then(|_| child.wait()) {
            tracing::warn!(pid = child.id(), "Failed to reap player: {}", kill);
        }
        PlayerError::Process(format!("failed to start player reader: {}", e))
    })
}

struct MplayerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl PlayerProcess for MplayerProcess {
    fn send_command(&mut self, command: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| PlayerError::Process("player stdin closed".to_string()))?;
        stdin.write_all(command.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    fn try_wait(&mut self) -> Result<Option<i32>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| status.code().unwrap_or(-1)))
    }

    fn kill(&mut self) -> Result<()> {
        self.stdin = None;
        if self.child.try_wait()?.is_none() {
            self.child.kill()?;
        }
        self.child.wait()?;
        Ok(())
    }
}
