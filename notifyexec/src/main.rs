//! notifyexec - run a command whenever a watched directory changes.
//!
//! ```text
//! notifyexec [OPTIONS] <COMMAND> [PARAMS]...
//! ```
//!
//! Run without a command to print usage.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (default: `info`)

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::CommandFactory;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use notifyexec::cli::{Cli, LogFormat};
use notifyexec::config::{WatchConfig, WatchOptions};
use notifyexec::dispatch::CommandDispatcher;
use notifyexec::driver::Driver;
use notifyexec::gate::SystemClock;
use notifyexec::source::NotifySource;

fn main() -> ExitCode {
    let cli = Cli::parse_normalized();

    let Some(options) = cli.watch_options() else {
        // No command is not an error: show how to use the tool.
        if let Err(e) = Cli::command().print_help() {
            eprintln!("{e}");
        }
        return ExitCode::SUCCESS;
    };

    init_logging(cli.log_format);

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: WatchOptions) -> Result<()> {
    // Validate before touching the filesystem.
    let config = WatchConfig::new(options).context("Invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(watch(config))
}

async fn watch(config: WatchConfig) -> Result<()> {
    let watch_path = config.watch_path.clone();
    let mut driver = Driver::new(config, NotifySource::new(), CommandDispatcher, SystemClock);

    tokio::select! {
        result = driver.run() => {
            result.with_context(|| format!("Watch on {} failed", watch_path.display()))?;
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received");
        }
    }

    // Dropping the driver releases the watch on every path.
    drop(driver);
    Ok(())
}

/// Initializes the logging subsystem.
///
/// Logs go to stderr so that the commands' own stdout stays clean.
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
