//! tts-batch: batch text-to-speech conversion through the edge-tts CLI.

mod config;
mod estimator;
mod filter;
mod notifier;
mod preflight;
mod preview;
mod scanner;
mod service;
mod synth;
mod updater;
mod voices;
mod worker;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::filter::FileFilter;
use crate::notifier::Notifier;
use crate::preflight::InstallPolicy;
use crate::preview::{Preview, PreviewError, PreviewRequest};
use crate::service::{ConsoleFrontend, OutputMode};
use crate::synth::SynthTool;
use crate::updater::PackageCommand;
use crate::worker::{BatchRequest, BatchWorker};

type BoxError = Box<dyn std::error::Error>;

#[derive(Parser, Debug)]
#[command(name = "tts-batch", version, about = "Batch text-to-speech conversion using edge-tts")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert every matching text file under FOLDER into audio beside it
    Convert {
        folder: PathBuf,

        /// Voice identifier, e.g. en-US-JennyNeural
        #[arg(long)]
        voice: Option<String>,

        /// File filter, e.g. "*.txt;*.md" or "*.*"
        #[arg(short, long)]
        filter: Option<String>,

        /// Print worker events as JSON lines
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        tool: ToolArgs,
    },

    /// Synthesize a sample sentence and play it
    Test {
        /// Text to speak (defaults to a sample sentence)
        text: Option<String>,

        #[arg(long)]
        voice: Option<String>,

        /// Generate the audio but don't open it
        #[arg(long)]
        no_play: bool,

        #[command(flatten)]
        tool: ToolArgs,
    },

    /// Count the files a filter selects under FOLDER
    Scan {
        folder: PathBuf,

        #[arg(short, long)]
        filter: Option<String>,

        /// Print every matching path
        #[arg(long)]
        list: bool,
    },

    /// List the built-in voices
    Voices,

    /// Check that the synthesis tool is installed
    Check {
        /// Install the tool if it is missing
        #[arg(long)]
        install: bool,
    },
}

#[derive(clap::Args, Debug)]
struct ToolArgs {
    /// Don't upgrade the synthesis tool before running
    #[arg(long)]
    no_update: bool,

    /// Install a missing synthesis tool without asking
    #[arg(long, conflicts_with = "no_install")]
    install: bool,

    /// Never offer to install a missing synthesis tool
    #[arg(long)]
    no_install: bool,
}

impl ToolArgs {
    fn policy(&self) -> InstallPolicy {
        if self.install {
            InstallPolicy::Always
        } else if self.no_install {
            InstallPolicy::Never
        } else {
            InstallPolicy::Ask
        }
    }

    fn updater(&self, config: &Config) -> Option<PackageCommand> {
        (config.update.auto_update && !self.no_update)
            .then(|| PackageCommand::upgrade_from_config(&config.update))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // stdout carries the conversion log; diagnostics go to stderr
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.config.as_deref());

    match run(args.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Errors returned here are printed by `main`; a command that already
/// reported its own failure returns `ExitCode::FAILURE` instead.
async fn run(command: Command, config: &Config) -> Result<ExitCode, BoxError> {
    match command {
        Command::Convert {
            folder,
            voice,
            filter,
            json,
            tool,
        } => convert(config, folder, voice, filter, json, &tool).await?,
        Command::Test {
            text,
            voice,
            no_play,
            tool,
        } => return test_voice(config, text, voice, !no_play, &tool).await,
        Command::Scan {
            folder,
            filter,
            list,
        } => scan(config, &folder, filter, list)?,
        Command::Voices => list_voices(config),
        Command::Check { install } => {
            let policy = if install {
                InstallPolicy::Always
            } else {
                InstallPolicy::Never
            };
            let version = ensure_tool(config, policy).await?;
            println!("{} is available: {version}", config.tool.name);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn convert(
    config: &Config,
    folder: PathBuf,
    voice: Option<String>,
    filter: Option<String>,
    json: bool,
    tool_args: &ToolArgs,
) -> Result<(), BoxError> {
    let filter = FileFilter::parse(filter.as_deref().unwrap_or(&config.convert.filter))?;
    if !folder.is_dir() {
        return Err(format!("'{}' is not a directory", folder.display()).into());
    }
    let voice = resolve_voice(voice, config);

    ensure_tool(config, tool_args.policy()).await?;

    let mut worker = BatchWorker::new(SynthTool::from_config(&config.tool), config.tool.timeout())
        .with_staging_dir(config.tool.staging_dir());
    if let Some(updater) = tool_args.updater(config) {
        worker = worker.with_updater(updater);
    }

    let mode = if json { OutputMode::Json } else { OutputMode::Human };
    let mut frontend = ConsoleFrontend::new(
        std::io::stdout(),
        mode,
        Notifier::new(config.feedback.notifications),
    );
    frontend.header(&folder, &voice_display(&voice), &filter)?;

    let request = BatchRequest {
        root: folder,
        voice,
        filter,
        audio_extension: config.convert.audio_extension.clone(),
    };

    match frontend.run(worker, request).await? {
        Some(summary) => info!("Run summary: {summary:?}"),
        None => warn!("Batch did not finish normally"),
    }
    debug!("Front end {}", frontend.state());
    Ok(())
}

async fn test_voice(
    config: &Config,
    text: Option<String>,
    voice: Option<String>,
    play: bool,
    tool_args: &ToolArgs,
) -> Result<ExitCode, BoxError> {
    let voice = resolve_voice(voice, config);
    ensure_tool(config, tool_args.policy()).await?;

    println!("{}", service::stamp(&format!("[Test] Voice: {}", voice_display(&voice))));

    let mut preview = Preview::new(SynthTool::from_config(&config.tool), config.tool.test_timeout())
        .with_staging_dir(config.tool.staging_dir());
    if let Some(updater) = tool_args.updater(config) {
        preview = preview.with_updater(updater);
    }

    let request = PreviewRequest { voice, text, play };
    let result = preview
        .run(&request, |line| println!("{}", service::stamp(&format!("[Test] {line}"))))
        .await;

    let (line, succeeded) = test_report(&result, play);
    println!("{}", service::stamp(&line));
    if let Err(e) = &result {
        debug!("Voice test failed: {e:?}");
    }
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// The closing `[Test]` line for a test result, and whether it succeeded.
fn test_report(result: &Result<PathBuf, PreviewError>, play: bool) -> (String, bool) {
    match result {
        Ok(audio) => {
            let verb = if play { "generated and playing" } else { "generated" };
            (format!("[Test] ✓ Test audio {verb}: {}", audio.display()), true)
        }
        Err(e) => (format!("[Test] ✗ {e}"), false),
    }
}

fn scan(config: &Config, folder: &std::path::Path, filter: Option<String>, list: bool) -> Result<(), BoxError> {
    let filter = FileFilter::parse(filter.as_deref().unwrap_or(&config.convert.filter))?;
    if !folder.is_dir() {
        return Err(format!("'{}' is not a directory", folder.display()).into());
    }

    let found = if list {
        let files = scanner::scan(folder, &filter);
        for file in &files {
            println!("{}", file.display());
        }
        files.len()
    } else {
        scanner::count(folder, &filter)
    };
    println!("Found {found} files matching {filter} in {}", folder.display());
    Ok(())
}

fn list_voices(config: &Config) {
    for voice in voices::VOICES {
        let marker = if voice.id == config.convert.voice { "*" } else { " " };
        println!("{marker} {:<24} {}", voice.id, voice.label);
    }
}

async fn ensure_tool(config: &Config, policy: InstallPolicy) -> Result<String, BoxError> {
    let tool = SynthTool::from_config(&config.tool);
    let installer = PackageCommand::install_from_config(&config.install);
    let version =
        preflight::ensure_available(&tool, config.tool.probe_timeout(), &installer, policy).await?;
    Ok(version)
}

/// CLI flag, else config. Unknown voices are passed through to the tool.
fn resolve_voice(voice: Option<String>, config: &Config) -> String {
    let voice = voice.unwrap_or_else(|| config.convert.voice.clone());
    if voices::find(&voice).is_none() {
        warn!("Voice '{voice}' is not in the built-in list, passing it to the tool as-is");
    }
    voice
}

fn voice_display(voice: &str) -> String {
    match voices::find(voice) {
        Some(v) => format!("{} ({})", v.id, v.label),
        None => voice.to_string(),
    }
}
