//! Checks that the synthesis tool can run before any work starts.
//!
//! A missing tool can be installed on demand; the tool is probed again
//! afterwards and the command only proceeds if that probe succeeds.

use std::io::{BufRead, IsTerminal, Write};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::synth::{SynthTool, ToolError};
use crate::updater::PackageCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPolicy {
    /// Prompt on an interactive terminal, otherwise don't install.
    Ask,
    Always,
    Never,
}

#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("{tool} is not available: {source}")]
    Unavailable {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("installing {tool} failed: {source}")]
    InstallFailed {
        tool: String,
        #[source]
        source: ToolError,
    },
}

/// Probe the tool, installing it first if the policy allows.
/// Returns the tool's version line.
pub async fn ensure_available(
    tool: &SynthTool,
    probe_timeout: Duration,
    installer: &PackageCommand,
    policy: InstallPolicy,
) -> Result<String, PreflightError> {
    let probe_error = match tool.probe_version(probe_timeout).await {
        Ok(version) => {
            info!("{} available: {version}", tool.name());
            return Ok(version);
        }
        Err(e) => e,
    };
    warn!("{} probe failed: {probe_error}", tool.name());

    let install = match policy {
        InstallPolicy::Always => true,
        InstallPolicy::Never => false,
        InstallPolicy::Ask => {
            let question = format!(
                "{} may not be installed or is not on PATH ({probe_error}).\nTry to install it now? [Y/n] ",
                tool.name()
            );
            confirm(question).await
        }
    };

    if !install {
        return Err(PreflightError::Unavailable {
            tool: tool.name().to_string(),
            source: probe_error,
        });
    }

    info!("Installing {}...", tool.name());
    if let Err(source) = installer.install().await {
        warn!("Install of {} failed: {source}", tool.name());
        return Err(PreflightError::InstallFailed {
            tool: tool.name().to_string(),
            source,
        });
    }
    info!("Install of {} finished", tool.name());

    tool.probe_version(probe_timeout)
        .await
        .map_err(|source| PreflightError::Unavailable {
            tool: tool.name().to_string(),
            source,
        })
}

/// Yes/no question on stderr; Enter means yes. Non-interactive stdin is a no.
async fn confirm(question: String) -> bool {
    if !std::io::stdin().is_terminal() {
        return false;
    }

    tokio::task::spawn_blocking(move || {
        eprint!("{question}");
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
    })
    .await
    .unwrap_or(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    /// A tool whose `--version` only succeeds once `installed` exists.
    fn installable_tool(dir: &Path) -> SynthTool {
        let script = dir.join("tool.sh");
        std::fs::write(
            &script,
            "[ -f \"$(dirname \"$0\")/installed\" ] || { echo 'command not found' >&2; exit 127; }\necho 'edge-tts 7.0.2'\n",
        )
        .unwrap();
        SynthTool::new(
            vec!["sh".into(), script.to_string_lossy().to_string()],
            "edge-tts",
        )
    }

    fn installer(script: String) -> PackageCommand {
        PackageCommand::new(vec!["sh".into(), "-c".into(), script], Duration::from_secs(5))
    }

    #[tokio::test]
    async fn available_tool_passes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("installed"), "").unwrap();
        let tool = installable_tool(dir.path());

        let version = ensure_available(
            &tool,
            Duration::from_secs(5),
            &installer("exit 1".into()),
            InstallPolicy::Never,
        )
        .await
        .unwrap();
        assert_eq!(version, "edge-tts 7.0.2");
    }

    #[tokio::test]
    async fn missing_tool_without_install_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let tool = installable_tool(dir.path());

        let err = ensure_available(
            &tool,
            Duration::from_secs(5),
            &installer(format!("touch {}/installed", dir.path().display())),
            InstallPolicy::Never,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PreflightError::Unavailable { .. }));
        assert!(!dir.path().join("installed").exists());
    }

    #[tokio::test]
    async fn install_then_reprobe() {
        let dir = tempfile::tempdir().unwrap();
        let tool = installable_tool(dir.path());

        let version = ensure_available(
            &tool,
            Duration::from_secs(5),
            &installer(format!("touch '{}/installed'", dir.path().display())),
            InstallPolicy::Always,
        )
        .await
        .unwrap();
        assert_eq!(version, "edge-tts 7.0.2");
    }

    #[tokio::test]
    async fn failed_install_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let tool = installable_tool(dir.path());

        let err = ensure_available(
            &tool,
            Duration::from_secs(5),
            &installer("echo 'ERROR: No matching distribution' >&2; exit 1".into()),
            InstallPolicy::Always,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PreflightError::InstallFailed { .. }));
    }
}
