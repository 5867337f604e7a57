//! Terminal front end for a batch run.
//!
//! IDLE → RUNNING → IDLE
//!
//! Consumes the worker's event stream and renders it either as a
//! timestamped log with a progress line, or as JSON lines. First Ctrl-C
//! asks the worker to stop after the current file; a second one aborts the
//! task, which kills the running tool process.

use std::io::{self, Write};
use std::path::Path;

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::estimator::ProgressEstimator;
use crate::filter::FileFilter;
use crate::notifier::Notifier;
use crate::worker::{BatchRequest, BatchWorker, RunSummary, WorkerEvent};

const SEPARATOR_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// `[HH:MM:SS] message`
pub fn stamp(message: &str) -> String {
    format!("[{}] {message}", Local::now().format("%H:%M:%S"))
}

pub struct ConsoleFrontend<W: Write> {
    out: W,
    mode: OutputMode,
    state: RunState,
    estimator: ProgressEstimator,
    notifier: Notifier,
}

impl<W: Write> ConsoleFrontend<W> {
    pub fn new(out: W, mode: OutputMode, notifier: Notifier) -> Self {
        Self {
            out,
            mode,
            state: RunState::Idle,
            estimator: ProgressEstimator::new(),
            notifier,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn set_state(&mut self, state: RunState) {
        if self.state != state {
            info!("State: {} → {state}", self.state);
            self.state = state;
        }
    }

    pub fn header(&mut self, root: &Path, voice: &str, filter: &FileFilter) -> io::Result<()> {
        if self.mode == OutputMode::Json {
            return Ok(());
        }
        writeln!(self.out, "Starting batch conversion...")?;
        writeln!(self.out, "Folder: {}", root.display())?;
        writeln!(self.out, "Voice: {voice}")?;
        writeln!(self.out, "Filter: {filter}")?;
        writeln!(self.out, "{}", "=".repeat(SEPARATOR_WIDTH))
    }

    /// A message from the front end itself (not the worker).
    pub fn notice(&mut self, message: &str) -> io::Result<()> {
        match self.mode {
            OutputMode::Human => writeln!(self.out, "{}", stamp(message)),
            OutputMode::Json => {
                let line = serde_json::json!({ "event": "notice", "message": message });
                writeln!(self.out, "{line}")
            }
        }
    }

    pub fn handle(&mut self, event: &WorkerEvent) -> io::Result<()> {
        match event {
            WorkerEvent::Started { total } => {
                self.estimator.start(*total);
                self.set_state(RunState::Running);
            }
            WorkerEvent::Fatal { message } => self.notifier.batch_failed(message),
            WorkerEvent::Finished { summary } => {
                self.set_state(RunState::Idle);
                self.notifier.batch_finished(summary);
            }
            _ => {}
        }

        match self.mode {
            OutputMode::Json => {
                serde_json::to_writer(&mut self.out, event)?;
                writeln!(self.out)
            }
            OutputMode::Human => self.render(event),
        }
    }

    fn render(&mut self, event: &WorkerEvent) -> io::Result<()> {
        match event {
            WorkerEvent::Log { message } => writeln!(self.out, "{}", stamp(message)),
            WorkerEvent::Started { total } => {
                writeln!(self.out, "{}", stamp(&format!("Found {total} matching files")))
            }
            WorkerEvent::Progress { completed, total } => {
                if *total == 0 {
                    return Ok(());
                }
                let percent = completed * 100 / total;
                let estimate = self.estimator.record(*completed);
                if completed < total {
                    writeln!(
                        self.out,
                        "    {completed}/{total} ({percent}%) · estimated time remaining: {estimate}"
                    )
                } else {
                    writeln!(self.out, "    {completed}/{total} ({percent}%)")
                }
            }
            WorkerEvent::Fatal { message } => writeln!(self.out, "\n✗ Error: {message}"),
            WorkerEvent::Finished { summary } => self.render_summary(summary),
            WorkerEvent::ItemStarted { .. } | WorkerEvent::ItemFinished { .. } => Ok(()),
        }
    }

    fn render_summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        writeln!(self.out, "{}", "=".repeat(SEPARATOR_WIDTH))?;
        if summary.cancelled {
            writeln!(self.out, "Conversion stopped.")?;
        } else {
            writeln!(self.out, "All files converted!")?;
        }
        writeln!(
            self.out,
            "{}/{} processed: {} converted, {} skipped, {} failed, {} timed out",
            summary.completed,
            summary.total,
            summary.converted,
            summary.skipped,
            summary.failed,
            summary.timed_out
        )
    }

    /// Drive `worker` to completion, rendering its events.
    ///
    /// Returns `None` when the task was aborted or panicked.
    pub async fn run(
        &mut self,
        worker: BatchWorker,
        request: BatchRequest,
    ) -> io::Result<Option<RunSummary>> {
        let interrupts = listen_for_interrupts()?;
        self.drive(worker, request, interrupts).await
    }

    /// Like [`run`](Self::run), with interrupts arriving on a channel.
    async fn drive(
        &mut self,
        worker: BatchWorker,
        request: BatchRequest,
        mut interrupts: mpsc::Receiver<()>,
    ) -> io::Result<Option<RunSummary>> {
        let cancel = worker.cancel_flag();
        let (handle, mut events) = worker.spawn(request);
        self.set_state(RunState::Running);

        let mut interrupted = 0;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(&event)?,
                    None => break,
                },
                Some(()) = interrupts.recv() => {
                    interrupted += 1;
                    if interrupted == 1 {
                        cancel.cancel();
                        self.notice("Stop requested, finishing the current file (Ctrl-C again to abort)")?;
                    } else {
                        handle.abort();
                        self.notice("Aborting")?;
                    }
                }
            }
        }

        let result = match handle.await {
            Ok(summary) => Some(summary),
            Err(e) if e.is_cancelled() => {
                warn!("Batch task aborted");
                None
            }
            Err(e) => {
                self.handle(&WorkerEvent::Fatal {
                    message: format!("unexpected error: {e}"),
                })?;
                None
            }
        };
        self.set_state(RunState::Idle);
        Ok(result)
    }
}

/// Ctrl-C presses, queued from one signal listener that lives as long as
/// the receiver.
fn listen_for_interrupts() -> io::Result<mpsc::Receiver<()>> {
    #[cfg(unix)]
    let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    #[cfg(windows)]
    let mut signal = tokio::signal::windows::ctrl_c()?;

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        while signal.recv().await.is_some() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}
