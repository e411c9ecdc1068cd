//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance,
//! including color and glyph support based on terminal capabilities and user
//! preferences, and for turning a [`ReconciliationReport`] into display lines.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use repo_control::output::OutputConfig;
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! for line in config.report_lines(&report) {
//!     println!("{}", line);
//! }
//! ```

use std::env;

use console::style;

use crate::artifact::ChangeType;
use crate::report::ReconciliationReport;

/// Output configuration for controlling colors and glyphs.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and glyphs should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }

    /// Marker for a change: its glyph, or `[Title]` without color.
    pub fn change_marker(&self, change: ChangeType) -> String {
        if self.use_color {
            change.glyph().to_string()
        } else {
            format!("[{}]", change.title())
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.use_color {
            style(text).bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Display lines for every changed entry of `report`, grouped by section,
    /// followed by the summary.
    ///
    /// Unchanged, disabled and inactive entries are listed only when
    /// `show_all` is set.
    pub fn report_lines(&self, report: &ReconciliationReport, show_all: bool) -> Vec<String> {
        let visible = |change: ChangeType| show_all || change.is_change();
        let mut lines = Vec::new();

        let metadata: Vec<String> = report
            .metadata
            .iter()
            .filter(|m| visible(m.change))
            .map(|m| format!("  {} {}", self.change_marker(m.change), m.key))
            .collect();
        if !metadata.is_empty() {
            lines.push(self.heading("Metadata"));
            lines.extend(metadata);
        }

        let mut current_title = "";
        for file in &report.files {
            let Some(change) = file.change() else {
                continue;
            };
            if !visible(change) {
                continue;
            }
            let title = file.artifact_type.title();
            if title != current_title {
                lines.push(self.heading(title));
                current_title = title;
            }
            let location = match (file.path_before.as_deref(), file.effective_path()) {
                (Some(before), Some(path)) if before != path => format!("{} -> {}", before, path),
                (_, Some(path)) => path.to_string(),
                (_, None) => String::new(),
            };
            lines.push(format!(
                "  {} {}: {}",
                self.change_marker(change),
                file.subtype.label,
                location
            ));
        }

        let directories: Vec<String> = report
            .directories
            .iter()
            .filter_map(|d| d.change().filter(|c| visible(*c)).map(|c| (d, c)))
            .map(|(d, change)| {
                let path = d.path.as_deref().or(d.path_before.as_deref()).unwrap_or("");
                format!("  {} {}: {}", self.change_marker(change), d.label, path)
            })
            .collect();
        if !directories.is_empty() {
            lines.push(self.heading("Directories"));
            lines.extend(directories);
        }

        lines.push(report.summary());
        lines
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}
