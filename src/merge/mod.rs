//! Deep merge of configuration fragments
//!
//! Fragments are folded into one [`ConfigDocument`] in order. The merge never
//! silently overwrites data:
//!
//! - a key missing from the accumulator is added
//! - mappings are merged recursively
//! - two sequences are combined according to the [`ListMergePolicy`] for
//!   their path
//! - an equal scalar is skipped
//! - anything else (different scalars, or different types) is a
//!   `DuplicateConfigData` error naming the fragment and key path
//!
//! Because conflicts always fail, fragments with disjoint keys merge to the
//! same document in any order, and a conflicting pair fails in either order.

pub mod policy;

use std::fmt;
use std::path::Path;

use log::debug;
use serde_yaml::{Mapping, Value};

pub use policy::{ListMergePolicy, MergePolicies};

use crate::document::{key_to_string, short_display, type_name, ConfigDocument};
use crate::error::{Error, Result};
use crate::fragments::Fragment;
use crate::path::join_key;

/// Key paths touched while merging one fragment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeLog {
    /// Paths that did not exist before
    pub added: Vec<String>,
    /// Sequences that were extended
    pub appended: Vec<String>,
    /// Paths whose value was already present and equal
    pub skipped: Vec<String>,
    /// Sequences that were replaced
    pub replaced: Vec<String>,
}

impl MergeLog {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.appended.is_empty()
            && self.skipped.is_empty()
            && self.replaced.is_empty()
    }
}

impl fmt::Display for MergeLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "added [{}], appended [{}], skipped [{}], replaced [{}]",
            self.added.join(", "),
            self.appended.join(", "),
            self.skipped.join(", "),
            self.replaced.join(", ")
        )
    }
}

/// Accumulates fragments into a single document.
#[derive(Debug, Clone)]
pub struct Merger {
    root: Value,
    policies: MergePolicies,
}

impl Merger {
    pub fn new(policies: MergePolicies) -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
            policies,
        }
    }

    /// Start from an existing partial document instead of an empty one.
    pub fn with_seed(seed: ConfigDocument, policies: MergePolicies) -> Self {
        Self {
            root: seed.into_value(),
            policies,
        }
    }

    /// Merge one fragment into the accumulator.
    ///
    /// On error the accumulator may hold part of the fragment; callers abort
    /// the run.
    pub fn merge_fragment(&mut self, fragment: &Fragment) -> Result<MergeLog> {
        let source = fragment.data.as_mapping().ok_or_else(|| Error::DataRead {
            source_name: fragment.source.display().to_string(),
            message: format!(
                "expected a mapping at the root, found {}",
                type_name(&fragment.data)
            ),
        })?;
        let target = self
            .root
            .as_mapping_mut()
            .ok_or_else(|| Error::DataRead {
                source_name: "document".to_string(),
                message: "expected a mapping at the document root".to_string(),
            })?;

        let mut log = MergeLog::default();
        merge_mappings(
            target,
            source,
            "",
            &fragment.source,
            &self.policies,
            &mut log,
        )?;
        debug!("Merged {}: {}", fragment.source.display(), log);
        Ok(log)
    }

    /// The merged document.
    pub fn finish(self) -> ConfigDocument {
        // The root is always a mapping.
        ConfigDocument::from_value(self.root).unwrap_or_default()
    }
}

/// Merge `fragments` in order into a new document.
pub fn merge(fragments: &[Fragment], policies: &MergePolicies) -> Result<ConfigDocument> {
    let mut merger = Merger::new(policies.clone());
    for fragment in fragments {
        merger.merge_fragment(fragment)?;
    }
    Ok(merger.finish())
}

fn merge_mappings(
    target: &mut Mapping,
    source: &Mapping,
    path: &str,
    file: &Path,
    policies: &MergePolicies,
    log: &mut MergeLog,
) -> Result<()> {
    for (key, incoming) in source {
        let child_path = join_key(path, &key_to_string(key));
        let Some(existing) = target.get_mut(key) else {
            target.insert(key.clone(), incoming.clone());
            log.added.push(child_path);
            continue;
        };
        merge_values(existing, incoming, &child_path, file, policies, log)?;
    }
    Ok(())
}

fn merge_values(
    existing: &mut Value,
    incoming: &Value,
    path: &str,
    file: &Path,
    policies: &MergePolicies,
    log: &mut MergeLog,
) -> Result<()> {
    // An identical list contributed again is not a second contribution.
    if existing.is_sequence() && *existing == *incoming {
        log.skipped.push(path.to_string());
        return Ok(());
    }
    match (existing, incoming) {
        (Value::Mapping(target), Value::Mapping(source)) => {
            merge_mappings(target, source, path, file, policies, log)
        }
        (Value::Sequence(target), Value::Sequence(source)) => {
            match policies.policy_for(path) {
                ListMergePolicy::Append => {
                    target.extend(source.iter().cloned());
                    log.appended.push(path.to_string());
                }
                ListMergePolicy::AppendUnique => {
                    for item in source {
                        if !target.contains(item) {
                            target.push(item.clone());
                        }
                    }
                    log.appended.push(path.to_string());
                }
                ListMergePolicy::Replace => {
                    *target = source.clone();
                    log.replaced.push(path.to_string());
                }
                ListMergePolicy::Exclusive => {
                    return Err(conflict(
                        file,
                        path,
                        &Value::Sequence(target.clone()),
                        incoming,
                    ));
                }
            }
            Ok(())
        }
        (existing, incoming) if *existing == *incoming => {
            log.skipped.push(path.to_string());
            Ok(())
        }
        (existing, incoming) => Err(conflict(file, path, existing, incoming)),
    }
}

fn conflict(file: &Path, path: &str, existing: &Value, incoming: &Value) -> Error {
    Error::DuplicateConfigData {
        file: file.to_path_buf(),
        path: path.to_string(),
        existing: short_display(existing),
        existing_type: type_name(existing).to_string(),
        incoming: short_display(incoming),
        incoming_type: type_name(incoming).to_string(),
    }
}
