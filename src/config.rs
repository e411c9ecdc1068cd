//! # Settings
//!
//! This module defines the `.repo-control.yaml` settings file read from the
//! repository root. Every field has a default, so the file is optional and may
//! set only what differs:
//!
//! ```yaml
//! control_dir: .control
//! hooks_dir: hooks
//! metadata_path: .github/.control/metadata.json
//! cache:
//!   path: .github/.control/.cache.yaml
//!   retention_hours:
//!     extension: 12
//! merge:
//!   list_policies:
//!     keywords: append_unique
//!     "*.authors": exclusive
//! documents:
//!   team: .control/shared/team.yaml
//! ```
//!
//! Unknown keys are rejected so that typos surface as errors instead of being
//! ignored.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::cache::EXTENSION_CACHE_TYPE;
use crate::defaults;
use crate::error::{Error, Result};
use crate::format::DataFormat;
use crate::merge::{ListMergePolicy, MergePolicies};

/// Repository settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding the configuration fragments
    pub control_dir: PathBuf,
    /// Subdirectory of `control_dir` excluded from fragment discovery
    pub hooks_dir: PathBuf,
    /// Repository-relative path of the metadata file
    pub metadata_path: String,
    pub cache: CacheSettings,
    pub merge: MergeSettings,
    /// Named sibling documents reachable from `${{ name::path }}` markers
    pub documents: BTreeMap<String, PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            control_dir: PathBuf::from(defaults::CONTROL_DIR),
            hooks_dir: PathBuf::from(defaults::HOOKS_DIR),
            metadata_path: defaults::METADATA_PATH.to_string(),
            cache: CacheSettings::default(),
            merge: MergeSettings::default(),
            documents: BTreeMap::new(),
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Cache file, relative to the repository root; in-memory when unset
    pub path: Option<PathBuf>,
    /// Retention per cache type, in hours
    pub retention_hours: HashMap<String, f64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: None,
            retention_hours: HashMap::from([(
                EXTENSION_CACHE_TYPE.to_string(),
                defaults::EXTENSION_RETENTION_HOURS,
            )]),
        }
    }
}

/// Merge settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeSettings {
    /// Key path (or glob) → list merge policy
    pub list_policies: BTreeMap<String, ListMergePolicy>,
}

impl MergeSettings {
    pub fn policies(&self) -> MergePolicies {
        MergePolicies::from_table(&self.list_policies)
    }
}

impl Settings {
    /// Parse settings from YAML text.
    pub fn parse(yaml_content: &str) -> Result<Self> {
        if yaml_content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_content).map_err(|e| Error::Config {
            message: e.to_string(),
            hint: Some(format!(
                "Check {} against the documented keys",
                defaults::SETTINGS_FILE
            )),
        })
    }

    /// Parse settings from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read {}: {}", path.display(), e),
            hint: None,
        })?;
        Self::parse(&content)
    }

    /// Load the settings of `repo_root`: the explicit file when given, else
    /// `.repo-control.yaml` if present, else the defaults.
    pub fn load(repo_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = repo_root.join(defaults::SETTINGS_FILE);
                if path.is_file() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Absolute location of the control directory.
    pub fn control_dir_in(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.control_dir)
    }

    /// Absolute location of the cache file, if one is configured.
    pub fn cache_path_in(&self, repo_root: &Path) -> Option<PathBuf> {
        self.cache.path.as_ref().map(|path| repo_root.join(path))
    }

    /// Read every sibling document.
    ///
    /// # Errors
    ///
    /// Returns `Error::DataRead` for a missing or unparsable document and
    /// `Error::UnsupportedFormat` for an unknown extension.
    pub fn load_documents(&self, repo_root: &Path) -> Result<BTreeMap<String, Value>> {
        let mut documents = BTreeMap::new();
        for (name, relative) in &self.documents {
            let path = repo_root.join(relative);
            let source_name = path.display().to_string();
            let format = DataFormat::from_path(&path).ok_or_else(|| Error::UnsupportedFormat {
                source_name: source_name.clone(),
                extension: path
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })?;
            let text = fs::read_to_string(&path).map_err(|e| Error::DataRead {
                source_name: source_name.clone(),
                message: e.to_string(),
            })?;
            documents.insert(name.clone(), format.parse(&text, &source_name)?);
        }
        Ok(documents)
    }
}
