//! Sequential batch conversion task.
//!
//! The worker owns the run state and reports through a one-way channel of
//! [`WorkerEvent`]s. Cancellation is cooperative: the flag is checked before
//! each file, so an in-flight tool invocation always runs to completion or
//! timeout.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::filter::FileFilter;
use crate::scanner;
use crate::synth::{self, SynthTool, ToolError};
use crate::updater::{PackageCommand, UpdateReport};

/// Max characters of tool diagnostics kept in a failure outcome.
const DIAGNOSTIC_CHARS: usize = 100;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("directory scan aborted: {0}")]
    Scan(String),

    #[error("event receiver went away")]
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Converted { output: PathBuf },
    SkippedEmpty,
    ReadFailed { reason: String },
    Failed { diagnostic: String },
    TimedOut,
    /// The tool could not be started or the staging file not written.
    Error { reason: String },
}

impl ItemOutcome {
    pub fn log_line(&self, name: &str) -> String {
        match self {
            Self::Converted { output } => {
                let output_name = output
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                format!("✓ Converted: {name} -> {output_name}")
            }
            Self::SkippedEmpty => format!("⚠ Skipped empty file: {name}"),
            Self::ReadFailed { reason } => format!("✗ Read failed: {name} - {reason}"),
            Self::Failed { diagnostic } => format!("✗ Conversion failed: {name} - {diagnostic}"),
            Self::TimedOut => format!("✗ Conversion timed out: {name}"),
            Self::Error { reason } => format!("✗ Error: {name} - {reason}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        self.completed += 1;
        match outcome {
            ItemOutcome::Converted { .. } => self.converted += 1,
            ItemOutcome::SkippedEmpty => self.skipped += 1,
            ItemOutcome::TimedOut => self.timed_out += 1,
            ItemOutcome::ReadFailed { .. } | ItemOutcome::Failed { .. } | ItemOutcome::Error { .. } => {
                self.failed += 1
            }
        }
    }
}

/// Notifications from the worker to whoever presents the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    Log { message: String },
    Started { total: usize },
    ItemStarted { index: usize, source: PathBuf },
    ItemFinished { source: PathBuf, outcome: ItemOutcome },
    Progress { completed: usize, total: usize },
    Fatal { message: String },
    /// Always the last event of a run.
    Finished { summary: RunSummary },
}

/// One file to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobItem {
    pub source: PathBuf,
    pub output: PathBuf,
    pub voice: String,
}

impl JobItem {
    pub fn new(source: PathBuf, filter: &FileFilter, audio_extension: &str, voice: &str) -> Self {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let suffix = filter.matched_suffix(&name).unwrap_or("");
        let output = output_path(&source, suffix, audio_extension);
        Self {
            source,
            output,
            voice: voice.to_string(),
        }
    }
}

/// Same directory and base name, matched suffix swapped for the audio
/// extension. An empty suffix (`*.*`) swaps the file's own extension.
pub fn output_path(source: &Path, matched_suffix: &str, audio_extension: &str) -> PathBuf {
    if matched_suffix.is_empty() {
        return source.with_extension(audio_extension);
    }
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = name.strip_suffix(matched_suffix).unwrap_or(&name);
    source.with_file_name(format!("{stem}.{audio_extension}"))
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub root: PathBuf,
    pub voice: String,
    pub filter: FileFilter,
    pub audio_extension: String,
}

/// Shared stop flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct BatchWorker {
    tool: SynthTool,
    timeout: Duration,
    updater: Option<PackageCommand>,
    staging_dir: PathBuf,
    cancel: CancelFlag,
}

impl BatchWorker {
    pub fn new(tool: SynthTool, timeout: Duration) -> Self {
        Self {
            tool,
            timeout,
            updater: None,
            staging_dir: std::env::temp_dir(),
            cancel: CancelFlag::default(),
        }
    }

    /// Upgrade the tool with `updater` before scanning.
    pub fn with_updater(mut self, updater: PackageCommand) -> Self {
        self.updater = Some(updater);
        self
    }

    pub fn with_staging_dir(mut self, dir: PathBuf) -> Self {
        self.staging_dir = dir;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run on a background task; events arrive on the returned receiver.
    pub fn spawn(
        self,
        request: BatchRequest,
    ) -> (JoinHandle<RunSummary>, mpsc::Receiver<WorkerEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { self.run(request, tx).await });
        (handle, rx)
    }

    pub async fn run(&self, request: BatchRequest, events: mpsc::Sender<WorkerEvent>) -> RunSummary {
        let mut summary = RunSummary::default();

        if let Err(e) = self.run_batch(&request, &events, &mut summary).await {
            warn!("Batch stopped: {e}");
            let _ = events
                .send(WorkerEvent::Fatal {
                    message: e.to_string(),
                })
                .await;
        }

        info!(
            "Batch finished: {}/{} processed, {} converted",
            summary.completed, summary.total, summary.converted
        );
        let _ = events
            .send(WorkerEvent::Finished {
                summary: summary.clone(),
            })
            .await;
        summary
    }

    async fn run_batch(
        &self,
        request: &BatchRequest,
        events: &mpsc::Sender<WorkerEvent>,
        summary: &mut RunSummary,
    ) -> Result<(), WorkerError> {
        if !request.root.is_dir() {
            return Err(WorkerError::NotADirectory(request.root.clone()));
        }

        if let Some(updater) = &self.updater {
            log(events, format!("Checking for {} updates...", self.tool.name())).await?;
            let status = updater.upgrade().await;
            let report = UpdateReport {
                tool: self.tool.name(),
                status: &status,
            };
            log(events, report.to_string()).await?;
        }

        let files = {
            let root = request.root.clone();
            let filter = request.filter.clone();
            tokio::task::spawn_blocking(move || scanner::scan(&root, &filter))
                .await
                .map_err(|e| WorkerError::Scan(e.to_string()))?
        };

        summary.total = files.len();
        send(events, WorkerEvent::Started { total: files.len() }).await?;
        send(
            events,
            WorkerEvent::Progress {
                completed: 0,
                total: files.len(),
            },
        )
        .await?;

        for (index, source) in files.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                info!("Cancellation acknowledged after {} items", summary.completed);
                log(events, "Conversion stopped".to_string()).await?;
                break;
            }

            let name = display_name(&request.root, &source);
            let item = JobItem::new(
                source,
                &request.filter,
                &request.audio_extension,
                &request.voice,
            );

            send(
                events,
                WorkerEvent::ItemStarted {
                    index,
                    source: item.source.clone(),
                },
            )
            .await?;
            log(events, format!("Converting: {name}")).await?;

            let outcome = self.convert(&item).await;
            summary.record(&outcome);

            log(events, outcome.log_line(&name)).await?;
            send(
                events,
                WorkerEvent::ItemFinished {
                    source: item.source,
                    outcome,
                },
            )
            .await?;
            send(
                events,
                WorkerEvent::Progress {
                    completed: summary.completed,
                    total: summary.total,
                },
            )
            .await?;
        }

        Ok(())
    }

    async fn convert(&self, item: &JobItem) -> ItemOutcome {
        let content = match tokio::fs::read_to_string(&item.source).await {
            Ok(content) => content,
            Err(e) => {
                return ItemOutcome::ReadFailed {
                    reason: e.to_string(),
                }
            }
        };

        let content = content.trim();
        if content.is_empty() {
            return ItemOutcome::SkippedEmpty;
        }

        let staging = match self.stage(content) {
            Ok(path) => path,
            Err(e) => {
                return ItemOutcome::Error {
                    reason: format!("could not write staging file: {e}"),
                }
            }
        };

        let result = self
            .tool
            .synthesize(&item.voice, &staging, &item.output, self.timeout)
            .await;

        if let Err(e) = staging.close() {
            debug!("Could not remove staging file: {e}");
        }

        match result {
            Ok(()) => ItemOutcome::Converted {
                output: item.output.clone(),
            },
            Err(ToolError::TimedOut { .. }) => ItemOutcome::TimedOut,
            Err(ToolError::Exited { diagnostic, .. }) => ItemOutcome::Failed {
                diagnostic: synth::excerpt(&diagnostic, DIAGNOSTIC_CHARS),
            },
            Err(e) => ItemOutcome::Error {
                reason: e.to_string(),
            },
        }
    }

    /// Write `content` to a fresh temp file; it is removed when dropped.
    fn stage(&self, content: &str) -> std::io::Result<tempfile::TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix("tts-batch-")
            .suffix(".txt")
            .tempfile_in(&self.staging_dir)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(file.into_temp_path())
    }
}

fn display_name(root: &Path, source: &Path) -> String {
    source
        .strip_prefix(root)
        .unwrap_or(source)
        .to_string_lossy()
        .to_string()
}

async fn send(events: &mpsc::Sender<WorkerEvent>, event: WorkerEvent) -> Result<(), WorkerError> {
    events.send(event).await.map_err(|_| WorkerError::Disconnected)
}

async fn log(events: &mpsc::Sender<WorkerEvent>, message: String) -> Result<(), WorkerError> {
    send(events, WorkerEvent::Log { message }).await
}
