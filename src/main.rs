mod app;
mod cli;
mod db;
mod paths;
mod player;
mod store;

use std::fs::{self, OpenOptions};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env, Target};
use log::{LevelFilter, debug};

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(&cli)?;
    debug!("command-line args: {cli:?}");
    app::run(cli)
}

/// 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace.
fn verbosity_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// `RUST_LOG` wins over `-v` when set.
fn log_env(level: LevelFilter) -> Env<'static> {
    Env::default().default_filter_or(level.as_str().to_ascii_lowercase())
}

fn log_builder(env: Env<'_>) -> Builder {
    let mut builder = Builder::from_env(env);
    builder.format_timestamp_millis();
    builder
}

/// The playback screen owns the terminal, so `play` logs to a file.
fn init_logging(cli: &Cli) -> Result<()> {
    let env = log_env(verbosity_level(cli.verbose));

    if matches!(cli.command, Some(Command::Play(_))) {
        let log_path = paths::log_file_path()?;
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory {}", parent.display())
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;
        log_builder(env)
            .target(Target::Pipe(Box::new(file)))
            .init();
        return Ok(());
    }

    log_builder(env).init();
    Ok(())
}
