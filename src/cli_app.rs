//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use overlay_space_guard::core::config::Config;
use overlay_space_guard::core::errors::OsgError;
use overlay_space_guard::daemon::signals::SignalHandler;
use overlay_space_guard::daemon::watch::{WatchExit, WatchLoop};
use overlay_space_guard::dispatch::Dispatcher;
use overlay_space_guard::monitor::report::{StatusReport, format_bytes};
use overlay_space_guard::monitor::severity::SeverityLevel;
use overlay_space_guard::ui::dialog::select_dialog;
use overlay_space_guard::ui::menu::run_menu;

/// Overlay Space Guard: keeps the root overlay from filling up.
#[derive(Debug, Parser)]
#[command(
    name = "osg",
    author,
    version,
    about = "Overlay Space Guard - watch, clean and relocate to keep the overlay usable",
    long_about = None
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute (defaults to `gui`).
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Open the interactive manager menu.
    Gui,
    /// Show overlay usage and its status tier.
    Status,
    /// Empty caches and trash, trim logs, then show status (root only).
    Clean,
    /// Move large user folders to DEST behind symlinks, then show status (root only).
    Move(MoveArgs),
    /// Poll usage and alert once per new level until stopped.
    Watch,
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct MoveArgs {
    /// Destination root (defaults to the configured one).
    #[arg(value_name = "DEST")]
    destination: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure, including missing privilege and fatal relocation errors.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<OsgError> for CliError {
    fn from(err: OsgError) -> Self {
        match err {
            OsgError::InvalidConfig { .. }
            | OsgError::MissingConfig { .. }
            | OsgError::ConfigParse { .. } => Self::User(err.to_string()),
            OsgError::Serialization { .. } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match cli.command.as_ref().unwrap_or(&Command::Gui) {
        Command::Gui => run_gui(cli),
        Command::Status => run_status(cli),
        Command::Clean => run_clean(cli),
        Command::Move(args) => run_move(cli, args),
        Command::Watch => run_watch(cli),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn dispatcher(cli: &Cli) -> Result<Dispatcher, CliError> {
    let config = Config::load(cli.config.as_deref())?;
    Ok(Dispatcher::from_config(config)?)
}

fn run_gui(cli: &Cli) -> Result<(), CliError> {
    let dispatcher = dispatcher(cli)?;
    let dialog = select_dialog(dispatcher.config().ui.dialog);
    run_menu(dialog.as_ref(), &dispatcher)?;
    Ok(())
}

fn run_status(cli: &Cli) -> Result<(), CliError> {
    let report = dispatcher(cli)?.status()?;
    match output_mode(cli) {
        OutputMode::Human => print_status(&report),
        OutputMode::Json => write_json_line(&json!({
            "command": "status",
            "status": report.to_json(),
        }))?,
    }
    Ok(())
}

fn run_clean(cli: &Cli) -> Result<(), CliError> {
    let outcome = dispatcher(cli)?.clean()?;
    let report = &outcome.report;
    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", report.summary());
            for failure in &report.failures {
                println!("  {} {}: {}", "skipped".yellow(), failure.path.display(), failure.error);
            }
            if let Some(status) = &outcome.status {
                println!();
                print_status(status);
            }
        }
        OutputMode::Json => {
            let failures: Vec<Value> = report
                .failures
                .iter()
                .map(|f| json!({ "path": f.path.to_string_lossy(), "error": f.error }))
                .collect();
            write_json_line(&json!({
                "command": "clean",
                "targets_cleaned": report.targets_cleaned,
                "targets_missing": report.targets_missing,
                "entries_removed": report.entries_removed,
                "logs_truncated": report.logs_truncated,
                "logs_deleted": report.logs_deleted,
                "bytes_freed": report.bytes_freed,
                "failures": failures,
                "duration_ms": u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
                "status": outcome.status.as_ref().map(StatusReport::to_json),
            }))?;
        }
    }
    Ok(())
}

fn run_move(cli: &Cli, args: &MoveArgs) -> Result<(), CliError> {
    let outcome = dispatcher(cli)?.relocate(args.destination.as_deref())?;
    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", outcome.report.summary());
            if let Some(status) = &outcome.status {
                println!();
                print_status(status);
            }
        }
        OutputMode::Json => {
            let mut payload = serde_json::to_value(&outcome.report)?;
            payload["command"] = json!("move");
            payload["status"] = json!(outcome.status.as_ref().map(StatusReport::to_json));
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_watch(cli: &Cli) -> Result<(), CliError> {
    let dispatcher = dispatcher(cli)?;
    let config = dispatcher.config();
    let dialog = select_dialog(config.ui.dialog);
    let exit = WatchLoop::from_config(config, dispatcher.platform(), dialog)
        .with_notifications(dispatcher.notifications())
        .with_activity_log(dispatcher.activity_log())
        .with_signals(SignalHandler::new())
        .with_manager(Box::new(dispatcher.clone()))
        .run()?;

    match (output_mode(cli), exit) {
        (OutputMode::Human, WatchExit::AlreadyRunning { pid }) => {
            println!("osg watch is already running (pid {pid}).");
        }
        (OutputMode::Human, WatchExit::Stopped { ticks }) => {
            println!("osg watch stopped after {ticks} poll(s).");
        }
        (OutputMode::Json, WatchExit::AlreadyRunning { pid }) => {
            write_json_line(&json!({ "command": "watch", "result": "already_running", "pid": pid }))?;
        }
        (OutputMode::Json, WatchExit::Stopped { ticks }) => {
            write_json_line(&json!({ "command": "watch", "result": "stopped", "polls": ticks }))?;
        }
    }
    Ok(())
}

fn print_status(report: &StatusReport) {
    print!("{}", report.render_table());
    let line = report.status_line();
    let line = match report.severity {
        SeverityLevel::Ok => line.green(),
        SeverityLevel::Warning => line.yellow().bold(),
        SeverityLevel::Critical => line.red().bold(),
        SeverityLevel::Unknown => line.dimmed(),
    };
    println!("{line}");
    println!("{}", report.advice());
    println!(
        "Free: {} of {}",
        format_bytes(report.snapshot.available_bytes),
        format_bytes(report.snapshot.total_bytes)
    );
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("OSG_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
