//! SlxRelabel - Relabel localized strings across a SalesLogix project
//!
//! Main entry point for the command line application.
//!
//! # Overview
//!
//! This binary is a thin presentation shell over the library. It initializes:
//! - Configuration ([`ConfigManager`]) from `Relabel Data/Relabel Config.yaml`
//! - Logging infrastructure (file rotation + optional console output)
//! - Tokio runtime (hosts the background worker and signal handling)
//! - State management ([`StateManager`]) and the [`TaskController`]
//!
//! # Execution Flow
//!
//! 1. Parse arguments: project root, `--from`, `--to`
//! 2. Load configuration and set up logging → logs/slx-relabel.<date>
//! 3. Validate the input; report validation failures and exit with code 2
//! 4. Run the relabel on the background worker, printing progress to stderr
//! 5. Ctrl-C requests cooperative cancellation (the current file is finished first)
//! 6. Print the outcome; modified files go to stdout, one per line
//!
//! # Exit Codes
//!
//! - `0`: completed
//! - `1`: failed (unreadable or malformed file, I/O error)
//! - `2`: rejected by validation
//! - `130`: cancelled

use anyhow::Result;
use clap::{ArgAction, Parser, ValueHint};
use slx_relabel::{
    APP_NAME, ConfigManager, Metrics, RunOutcome, StateChange, StateManager, TaskController,
    VERSION,
};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Parser)]
#[command(
    name = "slx-relabel",
    version,
    about = "Replace a label in every string resource of a SalesLogix project"
)]
struct Cli {
    /// Project root; must contain project.info.xml
    #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath)]
    root: String,

    /// Text to search for (literal, case-sensitive)
    #[arg(long, value_name = "TEXT")]
    from: String,

    /// Replacement text
    #[arg(long, value_name = "TEXT")]
    to: String,

    /// Directory holding Relabel Config.yaml
    #[arg(
        long = "config-dir",
        value_name = "DIR",
        default_value = "Relabel Data",
        value_hint = ValueHint::DirPath
    )]
    config_dir: String,

    /// Log at debug level
    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Only print the modified-file list
    #[arg(long, short, action = ArgAction::SetTrue)]
    quiet: bool,
}

const EXIT_FAILED: u8 = 1;
const EXIT_INVALID: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("An error occurred: {:#}", err);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_manager = ConfigManager::new(cli.config_dir.as_str())?;
    let config = config_manager.load_config()?;

    let debug_mode = cli.debug || config.settings.debug_mode;
    let _log_guard = slx_relabel::logging::setup_logging_with_console(
        &config.settings.log_directory,
        APP_NAME,
        debug_mode,
        !cli.quiet,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Using configuration from {}", config_manager.config_path());

    // One blocking worker does the walk; the async side only waits and listens.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("slx-relabel-worker")
        .build()?;

    let state_manager = Arc::new(StateManager::new());
    state_manager.load_from_config(&config);

    let metrics = Arc::new(Metrics::new());
    let controller = TaskController::new(
        Arc::clone(&state_manager),
        Arc::clone(&metrics),
        runtime.handle().clone(),
    );

    let code = runtime.block_on(relabel(&controller, &cli));

    metrics.log_summary();
    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    Ok(code)
}

async fn relabel(controller: &TaskController, cli: &Cli) -> ExitCode {
    let events = controller.subscribe();

    let handle = match controller.start(&cli.root, &cli.from, &cli.to) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(EXIT_INVALID);
        }
    };

    let cancel = controller.cancel_flag();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received - cancelling after the current file");
            cancel.cancel();
        }
    });

    let progress = tokio::spawn(print_progress(events, !cli.quiet));

    let outcome = handle.wait().await;
    interrupt.abort();
    let _ = tokio::time::timeout(Duration::from_millis(500), progress).await;

    report(&outcome, cli.quiet)
}

/// Print coarse progress to stderr until the run finishes
async fn print_progress(mut events: tokio::sync::broadcast::Receiver<StateChange>, enabled: bool) {
    loop {
        match events.recv().await {
            Ok(StateChange::ProgressUpdated {
                files_scanned,
                files_modified,
                ..
            }) if enabled => {
                eprint!(
                    "\rScanned {} file(s), modified {}",
                    files_scanned, files_modified
                );
                let _ = std::io::stderr().flush();
            }
            Ok(StateChange::RunFinished { .. }) => {
                if enabled {
                    eprintln!();
                }
                break;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Progress display skipped {} event(s)", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn report(outcome: &RunOutcome, quiet: bool) -> ExitCode {
    match outcome {
        RunOutcome::Completed(files) => {
            if !quiet {
                eprintln!(
                    "Process completed successfully. {} file(s) modified.",
                    files.len()
                );
            }
            if !files.is_empty() {
                println!("{}", outcome.modified_files_text());
            }
            ExitCode::SUCCESS
        }
        RunOutcome::Cancelled(files) => {
            eprintln!("Process was cancelled by user. Some changes may have already been saved.");
            if !files.is_empty() {
                println!("{}", outcome.modified_files_text());
            }
            ExitCode::from(EXIT_CANCELLED)
        }
        RunOutcome::Failed(err) => {
            eprintln!("An error occurred: {:#}", err);
            if !quiet {
                eprintln!("{:?}", err);
            }
            ExitCode::from(EXIT_FAILED)
        }
    }
}
