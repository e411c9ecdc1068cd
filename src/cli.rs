//! CLI argument parsing and command dispatch

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Repository Control - Keep generated repository files in sync with one control configuration
#[derive(Parser, Debug)]
#[command(name = "repo-control")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline and write the resulting changes
    Sync(commands::sync::SyncArgs),
    /// Run the pipeline without writing; exit with 1 when changes are pending
    Check(commands::check::CheckArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<ExitCode> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.as_str()),
        )
        .format_timestamp(None)
        .init();

        let output = repo_control::output::OutputConfig::from_env_and_flag(&self.color);
        match self.command {
            Commands::Sync(args) => commands::sync::execute(args, &output),
            Commands::Check(args) => commands::check::execute(args, &output),
        }
    }
}
