//! Configuration management for tts-batch.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so a missing or partial file is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Interpreter used for the default pip commands.
fn python() -> String {
    if cfg!(windows) {
        "python".into()
    } else {
        "python3".into()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Command prefix; `--voice ...` etc. are appended to it.
    pub command: Vec<String>,
    /// Name used in log messages.
    pub name: String,
    pub timeout_secs: u64,
    pub test_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Where tool input files are staged; the system temp dir when unset.
    pub staging_dir: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            command: vec!["edge-tts".into()],
            name: "edge-tts".into(),
            timeout_secs: 60,
            test_timeout_secs: 30,
            probe_timeout_secs: 5,
            staging_dir: None,
        }
    }
}

impl ToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub auto_update: bool,
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            auto_update: true,
            command: vec![
                python(),
                "-m".into(),
                "pip".into(),
                "install".into(),
                "--upgrade".into(),
                "edge-tts".into(),
            ],
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            command: vec![
                python(),
                "-m".into(),
                "pip".into(),
                "install".into(),
                "edge-tts".into(),
            ],
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub filter: String,
    pub voice: String,
    pub audio_extension: String,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            filter: crate::filter::DEFAULT_FILTER.into(),
            voice: crate::voices::DEFAULT_VOICE.into(),
            audio_extension: "mp3".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub notifications: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tool: ToolConfig,
    pub update: UpdateConfig,
    pub install: InstallConfig,
    pub convert: ConvertConfig,
    pub feedback: FeedbackConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./tts-batch.yaml
    /// 2. ~/.config/tts-batch/config.yaml
    /// 3. /etc/tts-batch/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("tts-batch.yaml")),
                dirs::config_dir().map(|c| c.join("tts-batch/config.yaml")),
                Some(PathBuf::from("/etc/tts-batch/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}
