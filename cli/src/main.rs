//! CLI entrypoint for sandscript
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use sandscript_infrastructure::{ConfigLoader, FileConfig};
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_deref());

    info!("Starting sandscript");

    let config = load_config(&cli)?;

    match cli.command {
        Command::Engines => commands::engines(&config),
        Command::Compile { file, json } => commands::compile(&config, &file, json),
        Command::Run {
            file,
            events,
            region,
            privileged,
            timeout,
        } => commands::run(
            config,
            &file,
            &commands::RunOptions {
                events,
                region,
                privileged,
                timeout: std::time::Duration::from_secs(timeout),
            },
        ),
        Command::Config { validate } => commands::config(&config, cli.config.as_ref(), validate),
    }
}

/// Initialize logging based on verbosity level.
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sandscript.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(EnvFilter::new(level))
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(EnvFilter::new(level))
                .with(console)
                .init();
            None
        }
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    if cli.no_config {
        return Ok(ConfigLoader::load_defaults());
    }
    Ok(ConfigLoader::load(cli.config.as_ref())?)
}
