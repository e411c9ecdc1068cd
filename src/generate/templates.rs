//! Template artifacts from `templates.items`
//!
//! Every item becomes a file under `templates.dir`. The directory is owned by
//! the generator: any other file found there is reported stale.

use std::collections::BTreeSet;
use std::path::Path;

use glob::Pattern;
use log::{debug, warn};
use serde_yaml::Value;

use super::previous_path;
use crate::artifact::{ArtifactDescriptor, ArtifactType, Subtype};
use crate::document::{key_to_string, ConfigDocument};
use crate::error::{Error, Result};

pub fn generate(
    document: &ConfigDocument,
    previous: Option<&ConfigDocument>,
    repo_root: &Path,
) -> Result<Vec<ArtifactDescriptor>> {
    let mut out = Vec::new();
    let Some(dir) = document.get_str("templates.dir") else {
        out.extend(super::stale_from_manifest(
            previous,
            ArtifactType::Template,
            &[],
        ));
        return Ok(out);
    };
    let dir = dir.trim_end_matches('/');

    let mut names = Vec::new();
    let mut emitted_paths = BTreeSet::new();
    if let Some(items) = document.get("templates.items").and_then(Value::as_mapping) {
        for (name, content) in items {
            let name = key_to_string(name);
            let path = join_dir(dir, &name);
            let path_before =
                previous_path(previous, ArtifactType::Template, &name).or(Some(path.clone()));
            let content = content.as_str().unwrap_or_default();
            debug!("Generated template artifact '{}'", path);
            out.push(
                ArtifactDescriptor::new(ArtifactType::Template, Subtype::new(&name, &name))
                    .with_content(content)
                    .with_path(path.clone())
                    .with_path_before(path_before.clone()),
            );
            emitted_paths.insert(path);
            emitted_paths.extend(path_before);
            names.push(name);
        }
    }

    let stale = super::stale_from_manifest(previous, ArtifactType::Template, &names);
    let mut used_ids: BTreeSet<String> = names.iter().cloned().collect();
    for descriptor in &stale {
        emitted_paths.extend(descriptor.path_before.clone());
        used_ids.insert(descriptor.subtype.id.clone());
    }
    out.extend(stale);

    for path in files_in_dir(repo_root, dir)? {
        if emitted_paths.contains(&path) {
            continue;
        }
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        // A name taken by another entry is qualified with the full path.
        let id = if used_ids.contains(&name) { path.clone() } else { name };
        if !used_ids.insert(id.clone()) {
            continue;
        }
        debug!("Found stale template file '{}'", path);
        out.push(
            ArtifactDescriptor::new(ArtifactType::Template, Subtype::new(&id, &id))
                .with_path_before(Some(path)),
        );
    }
    Ok(out)
}

fn join_dir(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Repository-relative paths of the files directly inside `dir`, sorted.
fn files_in_dir(repo_root: &Path, dir: &str) -> Result<Vec<String>> {
    let abs_dir = repo_root.join(dir);
    if !abs_dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = format!("{}/*", Pattern::escape(&abs_dir.to_string_lossy()));
    let mut paths = Vec::new();
    for entry in glob::glob(&pattern)? {
        let entry = entry.map_err(|e| Error::Filesystem {
            message: format!("Failed to read '{}': {}", abs_dir.display(), e),
        })?;
        if !entry.is_file() {
            continue;
        }
        match entry.file_name().and_then(|n| n.to_str()) {
            Some(name) => paths.push(join_dir(dir, name)),
            None => warn!("Skipping non UTF-8 file name in {}", abs_dir.display()),
        }
    }
    paths.sort();
    Ok(paths)
}
