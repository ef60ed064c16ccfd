use crate::error::{PlayerError, Result};
use crate::library;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{info, warn};

const DEFAULT_PLAYER: &str = "ffplay";

/// Runs one external video player process at a time.
#[derive(Debug)]
pub struct VideoLauncher {
    program: PathBuf,
    child: Option<Child>,
    current: Option<PathBuf>,
}

impl Default for VideoLauncher {
    fn default() -> Self {
        Self::with_program(DEFAULT_PLAYER)
    }
}

impl VideoLauncher {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            child: None,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// True while the last launched player has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_)) | Err(_)) => {
                self.child = None;
                false
            }
            None => false,
        }
    }

    /// Plays `path` fullscreen, closing the player when the video ends.
    pub fn start(&mut self, path: &Path) -> Result<()> {
        if !library::is_video(path) {
            return Err(PlayerError::Video(format!(
                "not a supported video file: {}",
                path.display()
            )));
        }
        self.terminate();
        self.spawn(&["-autoexit", "-fs"], path)
    }

    pub fn terminate(&mut self) -> bool {
        let Some(mut child) = self.child.take() else {
            return false;
        };
        if let Err(err) = child.kill() {
            warn!("failed to stop video player: {err}");
        }
        let _ = child.wait();
        info!("video player stopped");
        true
    }

    /// Replaces a fullscreen player with a windowed one on the same file.
    pub fn restart_windowed(&mut self) -> Result<()> {
        let Some(path) = self.current.clone() else {
            return Err(PlayerError::Video(String::from("no video has been started")));
        };
        self.terminate();
        self.spawn(&[], &path)
    }

    fn spawn(&mut self, flags: &[&str], path: &Path) -> Result<()> {
        let child = Command::new(&self.program)
            .args(flags)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                PlayerError::Video(format!(
                    "failed to launch {}: {err}",
                    self.program.display()
                ))
            })?;
        info!(path = %path.display(), pid = child.id(), "video player started");
        self.child = Some(child);
        self.current = Some(path.to_path_buf());
        Ok(())
    }
}

impl Drop for VideoLauncher {
    fn drop(&mut self) {
        self.terminate();
    }
}
