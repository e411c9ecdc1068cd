//! Change classification against on-disk state
//!
//! Each descriptor is compared with what currently exists in the repository.
//! A `path_before` only counts when that file (or directory) still exists;
//! otherwise it is cleared. File contents are compared with surrounding
//! whitespace ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde_json::Value as JsonValue;

use crate::artifact::{ArtifactDescriptor, ChangeType, DirectoryDescriptor};
use crate::document::{key_to_string, ConfigDocument};
use crate::error::{Error, Result};
use crate::report::MetadataChange;

/// Whether two texts are equal ignoring leading and trailing whitespace.
pub fn contents_equal(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

/// Assign a change type to `descriptor` unless it already has one.
pub fn classify(descriptor: &mut ArtifactDescriptor, repo_root: &Path) -> Result<()> {
    if descriptor.change().is_some() {
        return Ok(());
    }

    let live_before = descriptor
        .path_before
        .as_deref()
        .filter(|p| !p.is_empty() && repo_root.join(p).is_file())
        .map(str::to_string);
    if live_before.is_none() {
        descriptor.path_before = None;
    }

    let change = match (&descriptor.content, descriptor.path.as_deref(), &live_before) {
        (None, _, Some(_)) => ChangeType::Removed,
        (None, _, None) => ChangeType::Disabled,
        (Some(_), None, _) | (Some(_), Some(""), _) => ChangeType::Disabled,
        (Some(_), Some(_), None) => ChangeType::Added,
        (Some(content), Some(path), Some(before)) => {
            let existing = read_text(&repo_root.join(before))?;
            match (contents_equal(content, &existing), path == before) {
                (true, true) => ChangeType::Unchanged,
                (true, false) => ChangeType::Moved,
                (false, true) => ChangeType::Modified,
                (false, false) => ChangeType::MovedModified,
            }
        }
    };
    debug!(
        "Classified {} '{}' as {}",
        descriptor.artifact_type, descriptor.subtype.id, change
    );
    descriptor.assign_change(change);
    Ok(())
}

/// Classify every descriptor.
pub fn classify_all(descriptors: &mut [ArtifactDescriptor], repo_root: &Path) -> Result<()> {
    descriptors
        .iter_mut()
        .try_for_each(|descriptor| classify(descriptor, repo_root))
}

/// Assign a change type to a directory descriptor.
pub fn classify_directory(directory: &mut DirectoryDescriptor, repo_root: &Path) {
    let live_before = directory
        .path_before
        .as_deref()
        .filter(|p| repo_root.join(p).is_dir())
        .map(str::to_string);
    if live_before.is_none() {
        directory.path_before = None;
    }

    let change = match (directory.path.as_deref(), live_before.as_deref()) {
        (Some(path), Some(before)) if path == before => ChangeType::Unchanged,
        (Some(_), Some(_)) => ChangeType::Moved,
        (None, None) => ChangeType::Disabled,
        (None, Some(_)) => ChangeType::Removed,
        (Some(path), None) if repo_root.join(path).is_dir() => ChangeType::Unchanged,
        (Some(_), None) => ChangeType::Added,
    };
    directory.assign_change(change);
}

/// Top-level key changes between the previous and the new document, sorted
/// by key.
///
/// Both sides are compared in their JSON form, which is how the previous
/// document was stored, so non-string keys compare equal across runs.
pub fn compare_metadata(
    current: &ConfigDocument,
    previous: Option<&ConfigDocument>,
) -> Vec<MetadataChange> {
    let new_map = json_entries(Some(current));
    let old_map = json_entries(previous);

    let mut changes = Vec::new();
    for (key, value) in &new_map {
        let change = match old_map.get(key) {
            None => ChangeType::Added,
            Some(old) if old != value => ChangeType::Modified,
            Some(_) => continue,
        };
        changes.push(MetadataChange::new(key.clone(), change));
    }
    for key in old_map.keys() {
        if !new_map.contains_key(key) {
            changes.push(MetadataChange::new(key.clone(), ChangeType::Removed));
        }
    }
    changes.sort_by(|a, b| a.key.cmp(&b.key));
    changes
}

/// Top-level entries as they appear once written to the metadata file.
fn json_entries(document: Option<&ConfigDocument>) -> BTreeMap<String, JsonValue> {
    document
        .and_then(ConfigDocument::as_mapping)
        .map(|map| {
            map.iter()
                .map(|(key, value)| {
                    let json = serde_json::to_value(value).unwrap_or(JsonValue::Null);
                    (key_to_string(key), json)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::Filesystem {
        message: format!("Failed to read '{}': {}", path.display(), e),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
