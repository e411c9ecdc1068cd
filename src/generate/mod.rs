//! Dynamic artifact generation
//!
//! Derives every artifact the repository should contain from the final
//! document:
//!
//! - **custom**: one file per `file_<id>` key ([`custom`])
//! - **template**: one file per `templates.items` entry ([`templates`])
//! - **config**: the metadata file holding the whole document
//!
//! The previous run's document (read back from the metadata file) supplies
//! `path_before` through its `manifest`, which is how moves, renames and stale
//! artifacts are detected. Directory descriptors come from the `directory`
//! mappings of both documents.

pub mod custom;
pub mod templates;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::PathBuf;

use log::{debug, info};
use serde_yaml::{Mapping, Value};

use crate::artifact::{ArtifactDescriptor, ArtifactType, ChangeType, DirectoryDescriptor, Subtype};
use crate::document::{key_to_string, ConfigDocument};
use crate::error::{Error, Result};

/// Document key recording where each generated artifact was written.
pub const MANIFEST_KEY: &str = "manifest";

/// Document key declaring generated directories.
pub const DIRECTORY_KEY: &str = "directory";

/// Subtype id of the metadata artifact.
pub const METADATA_SUBTYPE: &str = "metadata";

/// Everything generated for one run
#[derive(Debug, Clone, Default)]
pub struct Generated {
    pub files: Vec<ArtifactDescriptor>,
    pub directories: Vec<DirectoryDescriptor>,
}

/// Generates artifacts for a repository.
#[derive(Debug, Clone)]
pub struct Generator {
    repo_root: PathBuf,
    metadata_path: String,
}

impl Generator {
    pub fn new(repo_root: impl Into<PathBuf>, metadata_path: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            metadata_path: metadata_path.into(),
        }
    }

    /// Read the document written by the previous run, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `Error::DataRead` when the file exists but is not a valid
    /// document.
    pub fn read_previous(&self) -> Result<Option<ConfigDocument>> {
        let path = self.repo_root.join(&self.metadata_path);
        if !path.is_file() {
            info!("No previous metadata at {}", path.display());
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| Error::DataRead {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        ConfigDocument::from_json_str(&text, &path.display().to_string()).map(Some)
    }

    /// Generate all descriptors and record the manifest on `document`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateArtifact` when two descriptors share a type
    /// and subtype; no descriptors are returned in that case.
    pub fn generate(
        &self,
        document: &mut ConfigDocument,
        previous: Option<&ConfigDocument>,
    ) -> Result<Generated> {
        let mut files = custom::generate(document, previous)?;
        files.extend(templates::generate(document, previous, &self.repo_root)?);
        check_unique(&files)?;

        document.set(MANIFEST_KEY, Value::Mapping(build_manifest(&files)))?;

        let metadata = ArtifactDescriptor::new(
            ArtifactType::Config,
            Subtype::new(METADATA_SUBTYPE, "Metadata"),
        )
        .with_content(document.to_json_string()?)
        .with_path(self.metadata_path.clone())
        .with_path_before(Some(self.metadata_path.clone()));
        files.push(metadata);

        let directories = directories(document, previous);
        debug!(
            "Generated {} artifact(s) and {} directory descriptor(s)",
            files.len(),
            directories.len()
        );
        Ok(Generated { files, directories })
    }
}

fn check_unique(files: &[ArtifactDescriptor]) -> Result<()> {
    let mut seen = HashSet::new();
    for file in files {
        if !seen.insert((file.artifact_type, file.subtype.id.as_str())) {
            return Err(Error::DuplicateArtifact {
                artifact_type: file.artifact_type.id().to_string(),
                subtype: file.subtype.id.clone(),
            });
        }
    }
    Ok(())
}

/// `{category: {subtype: path}}` for every artifact that will exist after
/// the run.
fn build_manifest(files: &[ArtifactDescriptor]) -> Mapping {
    let mut categories: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();
    for file in files {
        let path = if file.change() == Some(ChangeType::Inactive) {
            file.path_before.as_deref()
        } else if file.content.is_some() {
            file.path.as_deref().filter(|p| !p.is_empty())
        } else {
            None
        };
        if let Some(path) = path {
            categories
                .entry(file.artifact_type.id())
                .or_default()
                .insert(file.subtype.id.as_str(), path);
        }
    }

    let mut manifest = Mapping::new();
    for (category, entries) in categories {
        let mut map = Mapping::new();
        for (id, path) in entries {
            map.insert(Value::String(id.to_string()), Value::String(path.to_string()));
        }
        manifest.insert(Value::String(category.to_string()), Value::Mapping(map));
    }
    manifest
}

/// Path recorded for `id` in the previous run's manifest.
fn previous_path(
    previous: Option<&ConfigDocument>,
    artifact_type: ArtifactType,
    id: &str,
) -> Option<String> {
    previous?
        .get(MANIFEST_KEY)?
        .get(artifact_type.id())?
        .get(id)?
        .as_str()
        .map(str::to_string)
}

/// Descriptors for ids in the previous manifest that `current` lacks.
fn stale_from_manifest(
    previous: Option<&ConfigDocument>,
    artifact_type: ArtifactType,
    current: &[String],
) -> Vec<ArtifactDescriptor> {
    let Some(entries) = previous
        .and_then(|doc| doc.get(MANIFEST_KEY))
        .and_then(|manifest| manifest.get(artifact_type.id()))
        .and_then(Value::as_mapping)
    else {
        return Vec::new();
    };
    let mut stale: Vec<ArtifactDescriptor> = entries
        .iter()
        .filter_map(|(id, path)| {
            let id = key_to_string(id);
            if current.contains(&id) {
                return None;
            }
            let path = path.as_str()?.to_string();
            Some(
                ArtifactDescriptor::new(artifact_type, Subtype::new(&id, &id))
                    .with_path_before(Some(path)),
            )
        })
        .collect();
    stale.sort_by(|a, b| a.subtype.id.cmp(&b.subtype.id));
    stale
}

fn directory_map(document: Option<&ConfigDocument>) -> BTreeMap<String, Option<String>> {
    document
        .and_then(|doc| doc.get(DIRECTORY_KEY))
        .and_then(Value::as_mapping)
        .map(|map| {
            map.iter()
                .map(|(id, path)| {
                    let path = path.as_str().filter(|p| !p.is_empty()).map(str::to_string);
                    (key_to_string(id), path)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn directories(
    document: &ConfigDocument,
    previous: Option<&ConfigDocument>,
) -> Vec<DirectoryDescriptor> {
    let current = directory_map(Some(document));
    let before = directory_map(previous);
    let ids: BTreeSet<&String> = current.keys().chain(before.keys()).collect();
    ids.into_iter()
        .map(|id| {
            DirectoryDescriptor::new(
                id.clone(),
                current.get(id).cloned().flatten(),
                before.get(id).cloned().flatten(),
            )
        })
        .collect()
}
