//! One-off voice test: synthesize a sample sentence and play it.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tracing::debug;

use crate::synth::{self, SynthTool, ToolError};
use crate::updater::{PackageCommand, UpdateReport};
use crate::voices;

const DIAGNOSTIC_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("could not write test text: {0}")]
    Staging(#[source] io::Error),

    #[error("test failed: {0}")]
    Failed(String),

    #[error("test timed out after {0}s")]
    TimedOut(u64),

    #[error(transparent)]
    Tool(ToolError),

    #[error("test audio was not created or is empty")]
    EmptyOutput,

    #[error("test audio created but could not be played: {0}")]
    Playback(#[source] io::Error),
}

#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub voice: String,
    /// Falls back to a sample sentence in the voice's language.
    pub text: Option<String>,
    pub play: bool,
}

pub struct Preview {
    tool: SynthTool,
    timeout: Duration,
    updater: Option<PackageCommand>,
    staging_dir: PathBuf,
}

impl Preview {
    pub fn new(tool: SynthTool, timeout: Duration) -> Self {
        Self {
            tool,
            timeout,
            updater: None,
            staging_dir: std::env::temp_dir(),
        }
    }

    pub fn with_updater(mut self, updater: PackageCommand) -> Self {
        self.updater = Some(updater);
        self
    }

    pub fn with_staging_dir(mut self, dir: PathBuf) -> Self {
        self.staging_dir = dir;
        self
    }

    /// Returns the path of the generated audio on success.
    pub async fn run(
        &self,
        request: &PreviewRequest,
        mut progress: impl FnMut(String),
    ) -> Result<PathBuf, PreviewError> {
        if let Some(updater) = &self.updater {
            progress(format!("Checking for {} updates...", self.tool.name()));
            let status = updater.upgrade().await;
            progress(
                UpdateReport {
                    tool: self.tool.name(),
                    status: &status,
                }
                .to_string(),
            );
        }

        let text = request
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| voices::sample_text(&request.voice));

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let audio = self.staging_dir.join(format!("test_voice_{stamp}.mp3"));
        let input = self.stage(text, &stamp).map_err(PreviewError::Staging)?;

        progress("Generating test audio...".to_string());
        let result = self
            .tool
            .synthesize(&request.voice, &input, &audio, self.timeout)
            .await;

        if let Err(e) = input.close() {
            debug!("Could not remove test text file: {e}");
        }

        match result {
            Ok(()) => {}
            Err(ToolError::Exited { diagnostic, .. }) => {
                return Err(PreviewError::Failed(synth::excerpt(&diagnostic, DIAGNOSTIC_CHARS)))
            }
            Err(ToolError::TimedOut { secs, .. }) => return Err(PreviewError::TimedOut(secs)),
            Err(e) => return Err(PreviewError::Tool(e)),
        }

        let size = std::fs::metadata(&audio).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(PreviewError::EmptyOutput);
        }

        if request.play {
            progress("Test audio generated, playing...".to_string());
            open_media(&audio).map_err(PreviewError::Playback)?;
        }

        Ok(audio)
    }

    fn stage(&self, text: &str, stamp: &str) -> io::Result<tempfile::TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("test_text_{stamp}_"))
            .suffix(".txt")
            .tempfile_in(&self.staging_dir)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(file.into_temp_path())
    }
}

/// Hand the file to the desktop's default media handler.
pub fn open_media(path: &Path) -> io::Result<()> {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };

    cmd.arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}
