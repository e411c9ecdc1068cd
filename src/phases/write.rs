//! Apply: writing a report to disk
//!
//! This is the last stage of a `sync` run. It turns the classified
//! descriptors of a [`ReconciliationReport`] into filesystem changes.
//!
//! ## Process
//!
//! 1.  **Directories**: `Removed` directories are deleted, `Moved` ones renamed
//!     and `Added` ones created.
//!
//! 2.  **Stale files**: every `Removed`, `Moved` or `MovedModified` file has its
//!     previous path deleted. All deletions happen before any write so that a
//!     file moving into a freed path is not clobbered.
//!
//! 3.  **Write Content**: `Added`, `Modified`, `Moved` and `MovedModified` files
//!     are written as their trimmed content plus a newline, creating parent
//!     directories as needed.
//!
//! 4.  **Set Permissions**: On Unix-like systems, executable artifacts get the
//!     exec bits.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::artifact::{ArtifactDescriptor, ChangeType};
use crate::error::{Error, Result};
use crate::report::ReconciliationReport;

/// Apply `report` to the repository at `repo_root`.
///
/// Does nothing when the report has no changes.
pub fn apply(report: &ReconciliationReport, repo_root: &Path) -> Result<()> {
    if !report.has_changes() {
        info!("Nothing to apply");
        return Ok(());
    }

    for directory in &report.directories {
        match (
            directory.change(),
            directory.path.as_deref(),
            directory.path_before.as_deref(),
        ) {
            (Some(ChangeType::Removed), _, Some(before)) => {
                let target = repo_root.join(before);
                debug!("Removing directory {}", target.display());
                fs::remove_dir_all(&target).map_err(|e| Error::Filesystem {
                    message: format!("Failed to remove directory '{}': {}", target.display(), e),
                })?;
            }
            (Some(ChangeType::Moved), Some(path), Some(before)) => {
                let target = repo_root.join(path);
                create_parent(&target)?;
                debug!("Moving directory {} to {}", before, path);
                fs::rename(repo_root.join(before), &target).map_err(|e| Error::Filesystem {
                    message: format!(
                        "Failed to move directory '{}' to '{}': {}",
                        before,
                        target.display(),
                        e
                    ),
                })?;
            }
            (Some(ChangeType::Added), Some(path), _) => {
                let target = repo_root.join(path);
                fs::create_dir_all(&target).map_err(|e| Error::Filesystem {
                    message: format!("Failed to create directory '{}': {}", target.display(), e),
                })?;
            }
            _ => {}
        }
    }

    for file in &report.files {
        if !matches!(
            file.change(),
            Some(ChangeType::Removed | ChangeType::Moved | ChangeType::MovedModified)
        ) {
            continue;
        }
        let Some(before) = file.path_before.as_deref() else {
            continue;
        };
        let target = repo_root.join(before);
        if target.is_file() {
            debug!("Removing {}", target.display());
            fs::remove_file(&target).map_err(|e| Error::Filesystem {
                message: format!("Failed to remove file '{}': {}", target.display(), e),
            })?;
        }
    }

    for file in &report.files {
        if matches!(
            file.change(),
            Some(
                ChangeType::Added
                    | ChangeType::Modified
                    | ChangeType::Moved
                    | ChangeType::MovedModified
            )
        ) {
            write_file(file, repo_root)?;
        }
    }

    Ok(())
}

fn write_file(file: &ArtifactDescriptor, repo_root: &Path) -> Result<()> {
    let (Some(path), Some(content)) = (file.path.as_deref(), file.content.as_deref()) else {
        return Ok(());
    };
    let full_path = repo_root.join(path);
    create_parent(&full_path)?;

    debug!("Writing {}", full_path.display());
    fs::write(&full_path, format!("{}\n", content.trim())).map_err(|e| Error::Filesystem {
        message: format!("Failed to write file '{}': {}", full_path.display(), e),
    })?;

    #[cfg(unix)]
    {
        if file.executable {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&full_path)
                .map_err(|e| Error::Filesystem {
                    message: format!("Failed to read metadata of '{}': {}", full_path.display(), e),
                })?
                .permissions();
            perms.set_mode(perms.mode() | 0o111);
            fs::set_permissions(&full_path, perms).map_err(|e| Error::Filesystem {
                message: format!(
                    "Failed to set permissions on '{}': {}",
                    full_path.display(),
                    e
                ),
            })?;
        }
    }

    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", parent.display(), e),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactType, DirectoryDescriptor, Subtype};
    use tempfile::TempDir;

    fn classified(
        id: &str,
        content: Option<&str>,
        path: Option<&str>,
        before: Option<&str>,
        change: ChangeType,
    ) -> ArtifactDescriptor {
        let mut d = ArtifactDescriptor::new(ArtifactType::Custom, Subtype::new(id, id))
            .with_path_before(before.map(str::to_string));
        d.content = content.map(str::to_string);
        d.path = path.map(str::to_string);
        d.assign_change(change);
        d
    }

    #[test]
    fn test_write_trims_and_adds_newline() {
        let temp = TempDir::new().unwrap();
        let report = ReconciliationReport::new(
            vec![],
            vec![classified(
                "a",
                Some("\n  hello  \n\n"),
                Some("nested/dir/a.txt"),
                None,
                ChangeType::Added,
            )],
            vec![],
        );
        apply(&report, temp.path()).unwrap();
        let content = fs::read_to_string(temp.path().join("nested/dir/a.txt")).unwrap();
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_move_frees_old_path_before_writing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "one\n").unwrap();
        fs::write(temp.path().join("b.txt"), "two\n").unwrap();
        let report = ReconciliationReport::new(
            vec![],
            vec![
                classified("first", Some("one"), Some("b.txt"), Some("a.txt"), ChangeType::Moved),
                classified("second", Some("two"), Some("c.txt"), Some("b.txt"), ChangeType::Moved),
                classified("gone", None, None, Some("c.txt"), ChangeType::Removed),
            ],
            vec![],
        );
        apply(&report, temp.path()).unwrap();
        assert!(!temp.path().join("a.txt").exists());
        assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "one\n");
        assert_eq!(fs::read_to_string(temp.path().join("c.txt")).unwrap(), "two\n");
    }

    #[test]
    fn test_unchanged_and_disabled_are_left_alone() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("keep.txt"), "old\n").unwrap();
        let report = ReconciliationReport::new(
            vec![],
            vec![
                classified("keep", Some("new"), Some("keep.txt"), Some("keep.txt"), ChangeType::Unchanged),
                classified("off", Some("x"), Some(""), None, ChangeType::Disabled),
                classified("add", Some("x"), Some("add.txt"), None, ChangeType::Added),
            ],
            vec![],
        );
        apply(&report, temp.path()).unwrap();
        assert_eq!(fs::read_to_string(temp.path().join("keep.txt")).unwrap(), "old\n");
    }

    #[test]
    fn test_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("old/inner")).unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        fs::write(temp.path().join("docs/index.md"), "hi").unwrap();

        let mut removed = DirectoryDescriptor::new("old", None, Some("old".into()));
        removed.assign_change(ChangeType::Removed);
        let mut moved =
            DirectoryDescriptor::new("docs", Some("site/docs".into()), Some("docs".into()));
        moved.assign_change(ChangeType::Moved);
        let mut added = DirectoryDescriptor::new("src", Some("src".into()), None);
        added.assign_change(ChangeType::Added);

        let report = ReconciliationReport::new(vec![], vec![], vec![removed, moved, added]);
        apply(&report, temp.path()).unwrap();

        assert!(!temp.path().join("old").exists());
        assert!(temp.path().join("site/docs/index.md").is_file());
        assert!(temp.path().join("src").is_dir());
    }

    #[test]
    #[cfg(unix)]
    fn test_executable_bits() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let report = ReconciliationReport::new(
            vec![],
            vec![classified("run", Some("#!/bin/sh"), Some("run.sh"), None, ChangeType::Added)
                .with_executable(true)],
            vec![],
        );
        apply(&report, temp.path()).unwrap();
        let mode = fs::metadata(temp.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
