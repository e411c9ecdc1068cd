//! Artifact descriptors and change types
//!
//! An [`ArtifactDescriptor`] pairs generated content with the repository path
//! it belongs at and the path the same artifact had after the previous run.
//! Descriptors are created content-first by the generator; their
//! [`ChangeType`] is assigned exactly once, either by the generator
//! (`Inactive`) or by the classifier.

use std::fmt;

/// How an artifact differs from what is on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeType {
    Removed,
    Modified,
    MovedModified,
    Moved,
    Added,
    Unchanged,
    Disabled,
    Inactive,
}

impl ChangeType {
    /// Display title
    pub fn title(self) -> &'static str {
        match self {
            Self::Removed => "Removed",
            Self::Modified => "Modified",
            Self::MovedModified => "Moved & Modified",
            Self::Moved => "Moved",
            Self::Added => "Added",
            Self::Unchanged => "Unchanged",
            Self::Disabled => "Disabled",
            Self::Inactive => "Inactive",
        }
    }

    /// Display glyph
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Removed => "🔴",
            Self::Modified => "🟣",
            Self::MovedModified => "🟠",
            Self::Moved => "🟡",
            Self::Added => "🟢",
            Self::Unchanged => "⚪️",
            Self::Disabled => "⚫",
            Self::Inactive => "🔵",
        }
    }

    /// Whether applying this change touches the repository.
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Disabled | Self::Unchanged | Self::Inactive)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Category of a generated artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactType {
    /// Declared by a `file_<id>` key
    Custom,
    /// One item of `templates.items`
    Template,
    /// The metadata file
    Config,
}

impl ArtifactType {
    /// Key used in the manifest and in messages
    pub fn id(self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Template => "template",
            Self::Config => "config",
        }
    }

    /// Display title
    pub fn title(self) -> &'static str {
        match self {
            Self::Custom => "Custom Files",
            Self::Template => "Templates",
            Self::Config => "Configuration",
        }
    }

    /// Categories recorded in the manifest
    pub fn manifested() -> [Self; 2] {
        [Self::Custom, Self::Template]
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Identity of an artifact within its category
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subtype {
    pub id: String,
    pub label: String,
}

impl Subtype {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A generated file and where it lives
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactDescriptor {
    pub artifact_type: ArtifactType,
    pub subtype: Subtype,
    /// Text to write; `None` when the artifact should not exist
    pub content: Option<String>,
    /// Target path; empty disables the artifact
    pub path: Option<String>,
    /// Path recorded by the previous run
    pub path_before: Option<String>,
    pub executable: bool,
    change: Option<ChangeType>,
}

impl ArtifactDescriptor {
    pub fn new(artifact_type: ArtifactType, subtype: Subtype) -> Self {
        Self {
            artifact_type,
            subtype,
            content: None,
            path: None,
            path_before: None,
            executable: false,
            change: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_path_before(mut self, path_before: Option<String>) -> Self {
        self.path_before = path_before;
        self
    }

    pub fn with_executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }

    /// A descriptor the generator already knows is inactive.
    pub fn inactive(mut self) -> Self {
        self.change = Some(ChangeType::Inactive);
        self
    }

    /// The assigned change, if classified.
    pub fn change(&self) -> Option<ChangeType> {
        self.change
    }

    /// Assign the change type. Later assignments are ignored.
    pub(crate) fn assign_change(&mut self, change: ChangeType) {
        if self.change.is_none() {
            self.change = Some(change);
        }
    }

    /// The path this artifact occupies after the run, falling back to the
    /// previous one.
    pub fn effective_path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.path_before.as_deref())
    }
}

/// A generated directory declared under the `directory` key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDescriptor {
    pub id: String,
    pub label: String,
    pub path: Option<String>,
    pub path_before: Option<String>,
    change: Option<ChangeType>,
}

impl DirectoryDescriptor {
    pub fn new(id: impl Into<String>, path: Option<String>, path_before: Option<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            path,
            path_before,
            change: None,
        }
    }

    pub fn change(&self) -> Option<ChangeType> {
        self.change
    }

    pub(crate) fn assign_change(&mut self, change: ChangeType) {
        if self.change.is_none() {
            self.change = Some(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_display() {
        assert_eq!(ChangeType::MovedModified.to_string(), "Moved & Modified");
        assert_eq!(ChangeType::Added.glyph(), "🟢");
    }

    #[test]
    fn test_only_real_changes_count() {
        assert!(ChangeType::Removed.is_change());
        assert!(ChangeType::Moved.is_change());
        assert!(!ChangeType::Unchanged.is_change());
        assert!(!ChangeType::Disabled.is_change());
        assert!(!ChangeType::Inactive.is_change());
    }

    #[test]
    fn test_change_assigned_once() {
        let mut descriptor =
            ArtifactDescriptor::new(ArtifactType::Custom, Subtype::new("a", "A")).inactive();
        descriptor.assign_change(ChangeType::Removed);
        assert_eq!(descriptor.change(), Some(ChangeType::Inactive));
    }

    #[test]
    fn test_effective_path() {
        let descriptor = ArtifactDescriptor::new(ArtifactType::Custom, Subtype::new("a", "A"))
            .with_path("")
            .with_path_before(Some("old.txt".to_string()));
        assert_eq!(descriptor.effective_path(), Some("old.txt"));
    }
}
