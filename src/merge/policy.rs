//! List merge policies
//!
//! When two fragments both contribute a sequence at the same key path, the
//! policy configured for that path decides what happens. Policies are set per
//! path in the settings file under `merge.list_policies`; a path may be a glob
//! pattern (`*.authors`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::{format_path, glob_match, parse_path};

/// How two sequences at the same path are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListMergePolicy {
    /// Extend the existing sequence
    #[default]
    Append,
    /// Extend with items not already present
    AppendUnique,
    /// Replace the existing sequence
    Replace,
    /// Only one fragment may define the sequence
    Exclusive,
}

/// Per-path list merge policies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePolicies {
    default: ListMergePolicy,
    exact: BTreeMap<String, ListMergePolicy>,
    patterns: Vec<(String, ListMergePolicy)>,
}

impl MergePolicies {
    pub fn new(default: ListMergePolicy) -> Self {
        Self {
            default,
            ..Self::default()
        }
    }

    /// Build from a path → policy table.
    pub fn from_table(table: &BTreeMap<String, ListMergePolicy>) -> Self {
        let mut policies = Self::default();
        for (path, policy) in table {
            policies.set(path, *policy);
        }
        policies
    }

    /// Set the policy for a path or glob pattern.
    pub fn set(&mut self, path: &str, policy: ListMergePolicy) {
        if path.contains('*') || path.contains('?') {
            self.patterns.push((path.to_string(), policy));
        } else {
            self.exact.insert(format_path(&parse_path(path)), policy);
        }
    }

    /// Policy governing the sequence at `path`.
    pub fn policy_for(&self, path: &str) -> ListMergePolicy {
        if let Some(policy) = self.exact.get(path) {
            return *policy;
        }
        self.patterns
            .iter()
            .find(|(pattern, _)| glob_match(pattern, path).unwrap_or(false))
            .map(|(_, policy)| *policy)
            .unwrap_or(self.default)
    }
}
