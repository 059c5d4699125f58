use crate::error::{KioskError, Result};
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// The four operations the controller drives, plus final release
#[async_trait]
pub trait PlaybackEngine: Send {
    async fn load(&mut self, path: &Path) -> Result<()>;
    async fn play(&mut self) -> Result<()>;
    async fn pause(&mut self) -> Result<()>;
    async fn stop(&mut self) -> Result<()>;

    /// Give up the engine for good; called once on shutdown
    async fn release(&mut self) -> Result<()> {
        self.stop().await
    }
}

/// Plays a clip by running an external player process per clip.
/// Pause suspends or resumes the process, stop kills and reaps it.
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
    media: Option<PathBuf>,
    child: Option<Child>,
    suspended: bool,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            media: None,
            child: None,
            suspended: false,
        }
    }

    /// Check the player binary can be started at all
    pub async fn probe(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| KioskError::Player(format!("{} not available: {}", self.program, e)))?;

        if !output.status.success() {
            warn!("{} --version exited with {}", self.program, output.status);
        }

        let version = String::from_utf8_lossy(&output.stdout);
        Ok(version.lines().next().unwrap_or("unknown").to_string())
    }

    pub fn is_running(&mut self) -> bool {
        self.reap_finished();
        self.child.is_some()
    }

    /// Forget a player that exited on its own (end of clip)
    fn reap_finished(&mut self) {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Player exited with {}", status);
                    self.child = None;
                    self.suspended = false;
                }
                Ok(None) => {}
                Err(e) => warn!("Could not poll player process: {}", e),
            }
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn signal(&self, signal: Signal) -> Result<()> {
        let Some(pid) = self.child.as_ref().and_then(Child::id) else {
            return Ok(());
        };
        kill(Pid::from_raw(pid as i32), signal)
            .map_err(|e| KioskError::Player(format!("failed to send {:?} to player {}: {}", signal, pid, e)))
    }
}

#[async_trait]
impl PlaybackEngine for ProcessEngine {
    async fn load(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            warn!("Clip {} does not exist, the player may fail", path.display());
        }
        self.media = Some(path.to_path_buf());
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        self.reap_finished();
        if self.child.is_some() {
            self.signal(Signal::SIGCONT)?;
            self.suspended = false;
            return Ok(());
        }

        let media = self
            .media
            .as_ref()
            .ok_or_else(|| KioskError::Player("no media loaded".to_string()))?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(media)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KioskError::Player(format!("failed to start {}: {}", self.program, e)))?;

        debug!("Started {} (pid {:?}) for {}", self.program, child.id(), media.display());
        self.child = Some(child);
        self.suspended = false;
        Ok(())
    }

    /// Toggles: a running player is suspended, a suspended one resumes
    async fn pause(&mut self) -> Result<()> {
        self.reap_finished();
        if self.child.is_none() {
            return Ok(());
        }
        if self.suspended {
            self.signal(Signal::SIGCONT)?;
            debug!("Player resumed");
        } else {
            self.signal(Signal::SIGSTOP)?;
            debug!("Player suspended");
        }
        self.suspended = !self.suspended;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.reap_finished();
        if self.child.is_none() {
            return Ok(());
        }
        // A stopped process must be continued before it can exit
        self.signal(Signal::SIGCONT)?;
        self.suspended = false;
        if let Some(mut child) = self.child.take() {
            child
                .kill()
                .await
                .map_err(|e| KioskError::Player(format!("failed to stop player: {}", e)))?;
        }
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        self.stop().await?;
        self.media = None;
        info!("Player {} released", self.program);
        Ok(())
    }
}
