//! # Check Command Implementation
//!
//! Runs the full pipeline without writing anything and reports whether the
//! repository is in sync with its control configuration.
//!
//! ## Exit Codes
//!
//! - 0: In sync (no changes needed)
//! - 1: Changes pending; run `repo-control sync` to apply them
//!
//! Pipeline failures (invalid fragments, conflicts, template errors) are
//! reported as errors and also exit non-zero. This command is a safe,
//! read-only operation suited to CI and pre-commit hooks.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use repo_control::output::OutputConfig;

use super::{print_report, run_pipeline, RunArgs};

/// Check whether the repository is in sync
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

/// Execute the `check` command.
pub fn execute(args: CheckArgs, output: &OutputConfig) -> Result<ExitCode> {
    let (_, outcome) = run_pipeline(&args.run)?;
    print_report(&outcome, output, args.run.all);

    if outcome.report.has_changes() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
