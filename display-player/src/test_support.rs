//! Fakes shared by the unit tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::layout::{MediaKind, MediaSpec};
use crate::process::{PlayerArgs, PlayerProcess, ProcessLauncher};

pub fn fast_config(save_dir: &Path) -> PlayerConfig {
    PlayerConfig {
        save_dir: save_dir.to_path_buf(),
        teardown_tries: 5,
        teardown_interval: Duration::from_millis(10),
        close_tries: 3,
        close_interval: Duration::from_millis(1),
        video_start_timeout: Duration::from_millis(100),
        video_stop_grace: Duration::from_millis(50),
        default_duration: Duration::from_millis(50),
        failure_backoff: Duration::from_millis(10),
        poll_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

pub fn image_spec(id: &str, duration: f64) -> MediaSpec {
    let mut options = HashMap::new();
    options.insert("uri".to_string(), format!("{}.png", id));
    MediaSpec {
        id: id.to_string(),
        kind: MediaKind::Image,
        raw_type: "image".to_string(),
        duration,
        render: "native".to_string(),
        options,
        raws: HashMap::new(),
    }
}

pub fn video_spec(id: &str, duration: f64) -> MediaSpec {
    let mut spec = image_spec(id, duration);
    spec.kind = MediaKind::Video;
    spec.raw_type = "video".to_string();
    spec.options.insert("uri".to_string(), format!("{}.mp4", id));
    spec
}

/// Launcher whose players print a fixed script
#[derive(Default)]
pub struct FakeLauncher {
    script: Vec<String>,
    fail: bool,
    exit_after_script: bool,
    spawned: Mutex<Vec<PlayerArgs>>,
    commands: Arc<Mutex<Vec<String>>>,
    killed: Arc<AtomicBool>,
}

impl FakeLauncher {
    pub fn scripted(lines: &[&str]) -> Self {
        Self {
            script: lines.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Close stdout right after the script, as a crashing player would
    pub fn exit_after_script(mut self) -> Self {
        self.exit_after_script = true;
        self
    }

    pub fn spawned(&self) -> Vec<PlayerArgs> {
        self.spawned.lock().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

impl ProcessLauncher for FakeLauncher {
    fn spawn(&self, args: &PlayerArgs) -> Result<(Box<dyn PlayerProcess>, Receiver<String>)> {
        if self.fail {
            return Err(PlayerError::Process("no such player".to_string()));
        }
        self.spawned.lock().push(args.clone());

        let (tx, rx) = channel::unbounded();
        for line in &self.script {
            let _ = tx.send(line.clone());
        }

        let process = FakeProcess {
            commands: Arc::clone(&self.commands),
            killed: Arc::clone(&self.killed),
            exited: self.exit_after_script,
            stdout: (!self.exit_after_script).then_some(tx),
        };
        Ok((Box::new(process), rx))
    }
}

struct FakeProcess {
    commands: Arc<Mutex<Vec<String>>>,
    killed: Arc<AtomicBool>,
    exited: bool,
    stdout: Option<Sender<String>>,
}

impl PlayerProcess for FakeProcess {
    fn send_command(&mut self, command: &str) -> Result<()> {
        self.commands.lock().push(command.to_string());
        if command == "quit" {
            self.exited = true;
            self.stdout = None;
        }
        Ok(())
    }

    fn try_wait(&mut self) -> Result<Option<i32>> {
        Ok(self.exited.then_some(0))
    }

    fn kill(&mut self) -> Result<()> {
        if !self.exited {
            self.killed.store(true, Ordering::SeqCst);
        }
        self.exited = true;
        self.stdout = None;
        Ok(())
    }
}
