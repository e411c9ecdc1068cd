//! Configuration fragment discovery and parsing
//!
//! Fragments are the structured files (`.yaml`, `.yml`, `.json`, `.toml`)
//! below the control directory. They are found recursively, ordered by path
//! and parsed into value trees; the hooks directory is never searched.
//! YAML fragments may contain custom tags, which are resolved by the
//! [`TagResolver`]s registered on the [`FragmentParser`].

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_yaml::Value;
use walkdir::WalkDir;

use crate::document::type_name;
use crate::error::{Error, Result};
use crate::format::DataFormat;
use crate::tags::{resolve_tags, TagLocator, TagResolver};

/// A parsed configuration fragment
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// File the data came from
    pub source: PathBuf,
    /// Parsed root mapping, tags resolved
    pub data: Value,
}

impl Fragment {
    pub fn new(source: impl Into<PathBuf>, data: Value) -> Self {
        Self {
            source: source.into(),
            data,
        }
    }
}

/// Find every fragment file under `control_dir`, skipping `hooks_dir`
/// (relative to `control_dir`). Results are sorted by path components.
///
/// A missing control directory yields no fragments.
pub fn discover(control_dir: &Path, hooks_dir: &Path) -> Result<Vec<PathBuf>> {
    if !control_dir.is_dir() {
        info!(
            "Control directory {} does not exist; no fragments to load",
            control_dir.display()
        );
        return Ok(Vec::new());
    }
    let hooks_path = control_dir.join(hooks_dir);

    let mut paths = Vec::new();
    for entry in WalkDir::new(control_dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.path() != hooks_path)
    {
        let entry = entry.map_err(|e| Error::Filesystem {
            message: format!("Failed to walk {}: {}", control_dir.display(), e),
        })?;
        if entry.file_type().is_file() && DataFormat::from_path(entry.path()).is_some() {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Parses fragment files, resolving custom tags with the registered
/// resolvers.
#[derive(Default)]
pub struct FragmentParser<'r> {
    resolvers: Vec<Box<dyn TagResolver + 'r>>,
}

impl<'r> FragmentParser<'r> {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Register a resolver for its tag.
    pub fn register(&mut self, resolver: Box<dyn TagResolver + 'r>) {
        self.resolvers.push(resolver);
    }

    /// Read and parse the fragment at `path`.
    pub fn parse_file(&mut self, path: &Path) -> Result<Option<Fragment>> {
        let text = fs::read_to_string(path).map_err(|e| Error::DataRead {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.parse_str(&text, path)
    }

    /// Parse fragment text. The format comes from the extension of `source`.
    ///
    /// Returns `Ok(None)` for a fragment without data (blank or only
    /// comments).
    ///
    /// # Errors
    ///
    /// - `Error::UnsupportedFormat` for an unknown extension
    /// - `Error::DataRead` for unparsable text or a root that is not a mapping
    /// - Any tag resolution error
    pub fn parse_str(&mut self, text: &str, source: &Path) -> Result<Option<Fragment>> {
        let source_name = source.display().to_string();
        let format = DataFormat::from_path(source).ok_or_else(|| Error::UnsupportedFormat {
            source_name: source_name.clone(),
            extension: source
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })?;

        if is_blank(text) {
            info!("Fragment {} is empty; skipped", source_name);
            return Ok(None);
        }
        let mut data = format.parse(text, &source_name)?;
        match &data {
            Value::Null => {
                info!("Fragment {} is empty; skipped", source_name);
                return Ok(None);
            }
            Value::Mapping(_) => {}
            other => {
                return Err(Error::DataRead {
                    source_name,
                    message: format!("expected a mapping at the root, found {}", type_name(other)),
                });
            }
        }

        if format == DataFormat::Yaml {
            let mut locator = TagLocator::new(source, text);
            let mut resolvers: Vec<&mut (dyn TagResolver + 'r)> =
                self.resolvers.iter_mut().map(|r| &mut **r).collect();
            resolve_tags(&mut data, &mut resolvers, &mut locator)?;
        }
        debug!("Parsed fragment {}", source_name);
        Ok(Some(Fragment::new(source, data)))
    }

    /// Discover and parse every fragment under `control_dir`.
    pub fn load_dir(&mut self, control_dir: &Path, hooks_dir: &Path) -> Result<Vec<Fragment>> {
        let mut fragments = Vec::new();
        for path in discover(control_dir, hooks_dir)? {
            if let Some(fragment) = self.parse_file(&path)? {
                fragments.push(fragment);
            }
        }
        info!(
            "Loaded {} fragment(s) from {}",
            fragments.len(),
            control_dir.display()
        );
        Ok(fragments)
    }
}

fn is_blank(text: &str) -> bool {
    text.lines().map(str::trim).all(|line| {
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}
