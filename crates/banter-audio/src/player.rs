//! Playback through an external command such as `ffplay`.

use async_trait::async_trait;
use tracing::{debug, info};

use banter_core::error::BanterError;

use crate::{AudioHandle, AudioPlayer};

/// Plays clips by running `program args... <path>` and waiting for it to
/// exit. The clip is released (and deleted, if temporary) afterwards.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    /// Parse a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> Result<Self, BanterError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| BanterError::Config("player_command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, audio: AudioHandle) -> Result<(), BanterError> {
        debug!(program = %self.program, path = %audio.path().display(), "Starting playback");

        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(audio.path())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| BanterError::Audio(format!("Failed to run {}: {}", self.program, e)))?;

        drop(audio);

        if status.success() {
            info!("Playback finished");
            Ok(())
        } else {
            Err(BanterError::Audio(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}
