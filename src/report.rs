//! Reconciliation report
//!
//! Collects the classified descriptors of a run into three sections
//! (metadata keys, files and directories) and decides whether anything needs
//! to be applied.

use std::collections::BTreeMap;

use crate::artifact::{ArtifactDescriptor, ChangeType, DirectoryDescriptor};

/// Change of one top-level document key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataChange {
    pub key: String,
    pub change: ChangeType,
}

impl MetadataChange {
    pub fn new(key: impl Into<String>, change: ChangeType) -> Self {
        Self {
            key: key.into(),
            change,
        }
    }
}

/// Classified result of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    pub metadata: Vec<MetadataChange>,
    pub files: Vec<ArtifactDescriptor>,
    pub directories: Vec<DirectoryDescriptor>,
}

impl ReconciliationReport {
    /// Build a report, sorting every section for display.
    pub fn new(
        mut metadata: Vec<MetadataChange>,
        mut files: Vec<ArtifactDescriptor>,
        mut directories: Vec<DirectoryDescriptor>,
    ) -> Self {
        metadata.sort_by(|a, b| a.key.cmp(&b.key));
        files.sort_by(|a, b| {
            (a.artifact_type.title(), a.subtype.label.as_str())
                .cmp(&(b.artifact_type.title(), b.subtype.label.as_str()))
        });
        directories.sort_by(|a, b| (&a.label, &a.path).cmp(&(&b.label, &b.path)));
        Self {
            metadata,
            files,
            directories,
        }
    }

    pub fn has_metadata_changes(&self) -> bool {
        self.metadata.iter().any(|m| m.change.is_change())
    }

    pub fn has_file_changes(&self) -> bool {
        self.files
            .iter()
            .any(|f| f.change().is_some_and(ChangeType::is_change))
    }

    pub fn has_directory_changes(&self) -> bool {
        self.directories
            .iter()
            .any(|d| d.change().is_some_and(ChangeType::is_change))
    }

    /// Whether applying the run would change the repository.
    pub fn has_changes(&self) -> bool {
        self.has_metadata_changes() || self.has_file_changes() || self.has_directory_changes()
    }

    /// Number of files per change type.
    pub fn file_counts(&self) -> BTreeMap<ChangeType, usize> {
        let mut counts = BTreeMap::new();
        for change in self.files.iter().filter_map(ArtifactDescriptor::change) {
            *counts.entry(change).or_insert(0) += 1;
        }
        counts
    }

    /// One-line plain text summary.
    pub fn summary(&self) -> String {
        if !self.has_changes() {
            return "No changes; the repository is up to date.".to_string();
        }
        let changed = |n: usize, what: &str| format!("{} {}{}", n, what, if n == 1 { "" } else { "s" });
        let files = self
            .files
            .iter()
            .filter(|f| f.change().is_some_and(ChangeType::is_change))
            .count();
        let directories = self
            .directories
            .iter()
            .filter(|d| d.change().is_some_and(ChangeType::is_change))
            .count();
        let keys = self
            .metadata
            .iter()
            .filter(|m| m.change.is_change())
            .count();
        let breakdown: Vec<String> = self
            .file_counts()
            .into_iter()
            .filter(|(change, _)| change.is_change())
            .map(|(change, n)| format!("{} {}", n, change.title().to_lowercase()))
            .collect();
        let mut text = format!(
            "Changes in {}, {} and {}",
            changed(files, "file"),
            changed(directories, "directory"),
            changed(keys, "metadata key")
        );
        if !breakdown.is_empty() {
            text.push_str(&format!(" ({})", breakdown.join(", ")));
        }
        text.push('.');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactType, Subtype};

    fn file(artifact_type: ArtifactType, label: &str, change: ChangeType) -> ArtifactDescriptor {
        let mut d = ArtifactDescriptor::new(artifact_type, Subtype::new(label, label));
        d.assign_change(change);
        d
    }

    #[test]
    fn test_no_changes_when_only_passive_states() {
        let report = ReconciliationReport::new(
            vec![],
            vec![
                file(ArtifactType::Custom, "a", ChangeType::Unchanged),
                file(ArtifactType::Custom, "b", ChangeType::Disabled),
                file(ArtifactType::Custom, "c", ChangeType::Inactive),
            ],
            vec![],
        );
        assert!(!report.has_changes());
        assert!(report.summary().starts_with("No changes"));
    }

    #[test]
    fn test_any_section_counts() {
        let report = ReconciliationReport::new(
            vec![MetadataChange::new("name", ChangeType::Modified)],
            vec![],
            vec![],
        );
        assert!(report.has_changes());
        assert!(report.has_metadata_changes());
        assert!(!report.has_file_changes());

        let mut dir = DirectoryDescriptor::new("docs", Some("docs".into()), None);
        dir.assign_change(ChangeType::Added);
        let report = ReconciliationReport::new(vec![], vec![], vec![dir]);
        assert!(report.has_directory_changes());
    }

    #[test]
    fn test_files_sorted_by_type_title_then_label() {
        let report = ReconciliationReport::new(
            vec![],
            vec![
                file(ArtifactType::Template, "z", ChangeType::Added),
                file(ArtifactType::Custom, "b", ChangeType::Added),
                file(ArtifactType::Config, "Metadata", ChangeType::Modified),
                file(ArtifactType::Custom, "a", ChangeType::Added),
            ],
            vec![],
        );
        let order: Vec<&str> = report.files.iter().map(|f| f.subtype.label.as_str()).collect();
        assert_eq!(order, vec!["Metadata", "a", "b", "z"]);
    }

    #[test]
    fn test_summary_mentions_counts() {
        let report = ReconciliationReport::new(
            vec![],
            vec![
                file(ArtifactType::Custom, "a", ChangeType::Added),
                file(ArtifactType::Custom, "b", ChangeType::Added),
                file(ArtifactType::Custom, "c", ChangeType::Unchanged),
            ],
            vec![],
        );
        let summary = report.summary();
        assert!(summary.contains("2 files"));
        assert!(summary.contains("2 added"));
    }
}
