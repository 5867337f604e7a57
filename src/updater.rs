//! Install and upgrade of the synthesis tool through a package manager.
//!
//! Failures here are reported, never fatal: a batch proceeds with whatever
//! version of the tool is already installed.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{InstallConfig, UpdateConfig};
use crate::synth::{self, ToolError};

const ALREADY_CURRENT_MARKER: &str = "Requirement already satisfied";
const EXCERPT_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    AlreadyCurrent,
    Updated,
    Failed(String),
    TimedOut,
    /// The package manager itself could not be started.
    Unavailable(String),
}

/// An `UpdateStatus` paired with the tool name, for log lines.
pub struct UpdateReport<'a> {
    pub tool: &'a str,
    pub status: &'a UpdateStatus,
}

impl fmt::Display for UpdateReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tool = self.tool;
        match self.status {
            UpdateStatus::AlreadyCurrent => write!(f, "{tool} is already up to date."),
            UpdateStatus::Updated => write!(f, "{tool} was updated."),
            UpdateStatus::Failed(msg) => {
                write!(f, "Updating {tool} failed, continuing anyway: {msg}")
            }
            UpdateStatus::TimedOut => write!(f, "Updating {tool} timed out, continuing anyway."),
            UpdateStatus::Unavailable(msg) => {
                write!(f, "Could not check for {tool} updates, continuing anyway: {msg}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackageCommand {
    argv: Vec<String>,
    timeout: Duration,
}

impl PackageCommand {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }

    pub fn upgrade_from_config(config: &UpdateConfig) -> Self {
        Self::new(config.command.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn install_from_config(config: &InstallConfig) -> Self {
        Self::new(config.command.clone(), Duration::from_secs(config.timeout_secs))
    }

    fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("package manager")
    }

    /// Run the upgrade command and classify the result.
    pub async fn upgrade(&self) -> UpdateStatus {
        let output = match self.run().await {
            Ok(output) => output,
            Err(ToolError::TimedOut { .. }) => return UpdateStatus::TimedOut,
            Err(e) => return UpdateStatus::Unavailable(e.to_string()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Upgrade command exited with {}", output.status);
            return UpdateStatus::Failed(synth::excerpt(stderr.trim(), EXCERPT_CHARS));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains(ALREADY_CURRENT_MARKER) {
            UpdateStatus::AlreadyCurrent
        } else {
            UpdateStatus::Updated
        }
    }

    pub async fn install(&self) -> Result<(), ToolError> {
        info!("Running {}", self.argv.join(" "));
        let output = synth::check_status(self.run().await?, self.name())?;
        debug!("Install output: {}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }

    async fn run(&self) -> Result<std::process::Output, ToolError> {
        let cmd = synth::command(&self.argv)?;
        synth::run_captured(cmd, self.name(), self.timeout).await
    }
}
