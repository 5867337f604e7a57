//! Invocation of the external speech-synthesis command.
//!
//! The tool is called as
//! `<command...> --voice <id> --file <text> --write-media <audio>`.
//! Every child runs with captured output and is killed when its timeout
//! elapses (the wait future owns the child, `kill_on_drop` does the rest).

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::ToolConfig;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("'{program}' was not found (is it installed and on PATH?)")]
    NotFound { program: String },

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },

    #[error("'{program}' failed ({status}): {diagnostic}")]
    Exited {
        program: String,
        status: ExitStatus,
        diagnostic: String,
    },
}

/// Build a command from a `[program, args...]` vector.
pub(crate) fn command(argv: &[String]) -> Result<Command, ToolError> {
    let (program, args) = argv.split_first().ok_or(ToolError::EmptyCommand)?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}

/// Run to completion with captured output, or kill after `timeout`.
pub(crate) async fn run_captured(
    mut cmd: Command,
    name: &str,
    timeout: Duration,
) -> Result<Output, ToolError> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(name, e))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(spawn_error(name, e)),
        Err(_) => Err(ToolError::TimedOut {
            program: name.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Turn a non-zero exit into [`ToolError::Exited`].
pub(crate) fn check_status(output: Output, name: &str) -> Result<Output, ToolError> {
    if output.status.success() {
        return Ok(output);
    }
    Err(ToolError::Exited {
        program: name.to_string(),
        status: output.status,
        diagnostic: diagnostic(&output),
    })
}

fn spawn_error(name: &str, source: io::Error) -> ToolError {
    if source.kind() == io::ErrorKind::NotFound {
        ToolError::NotFound {
            program: name.to_string(),
        }
    } else {
        ToolError::Spawn {
            program: name.to_string(),
            source,
        }
    }
}

/// Stderr if present, else stdout, else "unknown error".
pub fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let (stderr, stdout) = (stderr.trim(), stdout.trim());
    if !stderr.is_empty() {
        stderr.to_string()
    } else if !stdout.is_empty() {
        stdout.to_string()
    } else {
        "unknown error".to_string()
    }
}

/// First `max_chars` characters of `text`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Debug, Clone)]
pub struct SynthTool {
    command: Vec<String>,
    name: String,
}

impl SynthTool {
    pub fn new(command: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            command,
            name: name.into(),
        }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config.command.clone(), config.name.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render `text_file` into `audio_file` with `voice`.
    pub async fn synthesize(
        &self,
        voice: &str,
        text_file: &Path,
        audio_file: &Path,
        timeout: Duration,
    ) -> Result<(), ToolError> {
        let mut cmd = command(&self.command)?;
        cmd.arg("--voice")
            .arg(voice)
            .arg("--file")
            .arg(text_file)
            .arg("--write-media")
            .arg(audio_file);

        debug!("Running {} for {}", self.name, audio_file.display());
        let output = run_captured(cmd, &self.name, timeout).await?;
        check_status(output, &self.name)?;
        Ok(())
    }

    /// `--version` probe. Returns the first line the tool printed.
    pub async fn probe_version(&self, timeout: Duration) -> Result<String, ToolError> {
        let mut cmd = command(&self.command)?;
        cmd.arg("--version");

        let output = check_status(run_captured(cmd, &self.name, timeout).await?, &self.name)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }
}

/// Shell-script stand-ins for the synthesis tool.
#[cfg(all(test, unix))]
pub(crate) mod fake {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::SynthTool;

    /// Copies the staging file to the output and logs the staging path.
    pub const COPY: &str = r#"cp "$in" "$out""#;
    pub const FAIL: &str = r#"echo "No audio was received. Please verify that your parameters are correct." >&2; exit 1"#;
    pub const HANG: &str = "exec sleep 5";
    pub const SLOW_COPY: &str = r#"sleep 0.4; cp "$in" "$out""#;
    pub const NO_OUTPUT: &str = "exit 0";

    pub struct FakeTool {
        pub dir: TempDir,
        pub tool: SynthTool,
    }

    impl FakeTool {
        /// Staging paths the tool was called with, in order.
        pub fn calls(&self) -> Vec<PathBuf> {
            fs::read_to_string(self.dir.path().join("calls.log"))
                .unwrap_or_default()
                .lines()
                .map(PathBuf::from)
                .collect()
        }
    }

    pub fn tool(body: &str) -> FakeTool {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-tts.sh");
        let prelude = r#"
in=""; out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --version) echo "edge-tts 7.0.2"; exit 0 ;;
    --file) in="$2"; shift ;;
    --write-media) out="$2"; shift ;;
  esac
  shift
done
echo "$in" >> "$(dirname "$0")/calls.log"
"#;
        fs::write(&script, format!("{prelude}{body}\n")).unwrap();

        let tool = SynthTool::new(
            vec!["sh".into(), script.to_string_lossy().to_string()],
            "fake-tts",
        );
        FakeTool { dir, tool }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        assert_eq!(excerpt("语音合成失败", 2), "语音");
        assert_eq!(excerpt("short", 100), "short");
    }

    #[cfg(unix)]
    fn output(status: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: ExitStatus::from_raw(status << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn diagnostic_prefers_stderr_then_stdout() {
        assert_eq!(diagnostic(&output(1, "out", "  err\n")), "err");
        assert_eq!(diagnostic(&output(1, "out\n", " \n")), "out");
        assert_eq!(diagnostic(&output(1, "", "")), "unknown error");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(command(&[]), Err(ToolError::EmptyCommand)));
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let tool = SynthTool::new(vec!["definitely-not-a-real-tts-binary".into()], "nope");
        let err = tool.probe_version(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::super::fake;
        use super::*;

        #[tokio::test]
        async fn success_writes_media() {
            let fake = fake::tool(fake::COPY);
            let input = fake.dir.path().join("in.txt");
            let output = fake.dir.path().join("out.mp3");
            std::fs::write(&input, "hello").unwrap();

            fake.tool
                .synthesize("en-US-GuyNeural", &input, &output, Duration::from_secs(10))
                .await
                .unwrap();
            assert_eq!(std::fs::read_to_string(&output).unwrap(), "hello");
            assert_eq!(fake.calls(), vec![input]);
        }

        #[tokio::test]
        async fn non_zero_exit_carries_stderr() {
            let fake = fake::tool(fake::FAIL);
            let input = fake.dir.path().join("in.txt");
            std::fs::write(&input, "hello").unwrap();

            let err = fake
                .tool
                .synthesize("x", &input, &fake.dir.path().join("o.mp3"), Duration::from_secs(10))
                .await
                .unwrap_err();
            match err {
                ToolError::Exited { diagnostic, .. } => {
                    assert!(diagnostic.starts_with("No audio was received"))
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn slow_tool_times_out() {
            let fake = fake::tool(fake::HANG);
            let input = fake.dir.path().join("in.txt");
            std::fs::write(&input, "hello").unwrap();

            let err = fake
                .tool
                .synthesize("x", &input, &fake.dir.path().join("o.mp3"), Duration::from_millis(300))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::TimedOut { .. }));
        }

        #[tokio::test]
        async fn version_probe_reads_first_line() {
            let fake = fake::tool(fake::COPY);
            let version = fake.tool.probe_version(Duration::from_secs(5)).await.unwrap();
            assert_eq!(version, "edge-tts 7.0.2");
        }
    }
}
