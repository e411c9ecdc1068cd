//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `repo-control` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`, flattening the shared [`RunArgs`].
//! - An `execute` function that runs the pipeline through [`run_pipeline`] and
//!   prints the report.

pub mod check;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use log::debug;

use repo_control::config::Settings;
use repo_control::defaults;
use repo_control::fetch::HttpFetcher;
use repo_control::output::OutputConfig;
use repo_control::phases::{Orchestrator, RunOutcome};
use repo_control::validate::BuiltinValidator;

/// Arguments shared by every pipeline command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Repository root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Settings file (defaults to .repo-control.yaml in the repository root)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Cache file, overriding the `cache.path` setting.
    ///
    /// Can also be set with the `REPO_CONTROL_CACHE` environment variable.
    #[arg(long, value_name = "FILE", env = "REPO_CONTROL_CACHE")]
    pub cache_path: Option<PathBuf>,

    /// Use the per-user cache file (`~/.cache/repo-control/cache.yaml` on Linux)
    #[arg(long, conflicts_with = "cache_path")]
    pub user_cache: bool,

    /// Also list unchanged, disabled and inactive entries
    #[arg(long)]
    pub all: bool,
}

impl RunArgs {
    fn repo_root(&self) -> Result<PathBuf> {
        match &self.repo {
            Some(repo) => Ok(repo.clone()),
            None => std::env::current_dir().context("Failed to determine the current directory"),
        }
    }

    fn cache_override(&self) -> Option<PathBuf> {
        if self.user_cache {
            Some(defaults::default_cache_path())
        } else {
            self.cache_path.clone()
        }
    }
}

/// Load settings and run the pipeline for the selected repository.
pub fn run_pipeline(args: &RunArgs) -> Result<(PathBuf, RunOutcome)> {
    let repo_root = args.repo_root()?;
    let settings = Settings::load(&repo_root, args.settings.as_deref())?;
    debug!("Settings: {:?}", settings);

    let fetcher = HttpFetcher::new()?;
    let validator = BuiltinValidator;
    let outcome = Orchestrator::new(&repo_root, settings, &fetcher, &validator)
        .with_cache_path(args.cache_override())
        .run()
        .with_context(|| format!("Pipeline failed for {}", repo_root.display()))?;
    Ok((repo_root, outcome))
}

/// Print the report lines of `outcome`.
pub fn print_report(outcome: &RunOutcome, output: &OutputConfig, show_all: bool) {
    for line in output.report_lines(&outcome.report, show_all) {
        println!("{}", line);
    }
}
