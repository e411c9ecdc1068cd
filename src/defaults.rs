//! Default values for repo-control configuration.
//!
//! This module provides centralized default values used by the settings file,
//! the pipeline and the command-line wrapper.

use std::path::PathBuf;

/// Settings file looked up at the repository root.
pub const SETTINGS_FILE: &str = ".repo-control.yaml";

/// Directory holding the configuration fragments.
pub const CONTROL_DIR: &str = ".control";

/// Subdirectory of the control directory that is never read as fragments.
pub const HOOKS_DIR: &str = "hooks";

/// Where the merged document is written.
pub const METADATA_PATH: &str = ".github/.control/metadata.json";

/// Retention of resolved `!ext` resources, in hours.
pub const EXTENSION_RETENTION_HOURS: f64 = 24.0;

/// Environment variable overriding the cache file location.
pub const CACHE_ENV_VAR: &str = "REPO_CONTROL_CACHE";

/// Returns the per-user cache file.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/repo-control/cache.yaml` (XDG Base Directory)
/// - macOS: `~/Library/Caches/repo-control/cache.yaml`
/// - Windows: `{FOLDERID_LocalAppData}\repo-control\cache.yaml`
///
/// Falls back to `.repo-control-cache/cache.yaml` in the current directory if
/// the platform cache directory cannot be determined.
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("repo-control"))
        .unwrap_or_else(|| PathBuf::from(".repo-control-cache"))
        .join("cache.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_path_returns_yaml_file() {
        let cache_path = default_cache_path();
        assert!(cache_path.ends_with("cache.yaml"));
    }

    #[test]
    fn test_default_cache_path_is_absolute_or_fallback() {
        let cache_path = default_cache_path();
        assert!(
            cache_path.is_absolute() || cache_path.starts_with(".repo-control-cache"),
            "Expected absolute path or fallback, got: {:?}",
            cache_path
        );
    }
}
