//! # Sync Command Implementation
//!
//! Runs the pipeline and writes every pending change to the repository. With
//! `--dry-run` the report is printed and nothing is written.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use repo_control::output::OutputConfig;
use repo_control::phases::apply;

use super::{print_report, run_pipeline, RunArgs};

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Show what would be done without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Execute the sync command
pub fn execute(args: SyncArgs, output: &OutputConfig) -> Result<ExitCode> {
    let (repo_root, outcome) = run_pipeline(&args.run)?;
    print_report(&outcome, output, args.run.all);

    if args.dry_run {
        if outcome.report.has_changes() {
            println!("Dry run: no files were written.");
        }
        return Ok(ExitCode::SUCCESS);
    }

    apply(&outcome.report, &repo_root)?;
    Ok(ExitCode::SUCCESS)
}
