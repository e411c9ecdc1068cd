//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a repository fixture and helpers to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_fragment("main.yaml", fragments::README);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::fragments;
    pub use super::TestFixture;
}

/// Common fragment snippets for testing.
#[allow(dead_code)]
pub mod fragments {
    /// One custom file rendered from a self-reference and a variable.
    pub const README: &str = r##"
name: demo
var:
  owner: ada
file_readme:
  path: README.md
  content: "# ${{ name }}\n\nMaintained by {{ owner }}."
"##;

    /// A directory and a template set.
    pub const LAYOUT: &str = r#"
directory:
  docs: docs
templates:
  dir: .github/templates
  items:
    bug.md: "Bug report for ${{ name }}"
"#;

    /// Conflicts with [`README`] on `name`.
    pub const CONFLICTING_NAME: &str = "name: other\n";

    /// Comment-only fragment.
    pub const EMPTY: &str = "# nothing here yet\n";
}

/// A temporary repository with a control directory.
pub struct TestFixture {
    pub temp: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp: assert_fs::TempDir::new().unwrap(),
        }
    }

    /// Add a fragment under `.control/`.
    pub fn with_fragment(self, name: &str, content: &str) -> Self {
        self.temp
            .child(".control")
            .child(name)
            .write_str(content)
            .unwrap();
        self
    }

    /// Add a file at a repository-relative path.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp.child(path).write_str(content).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.temp.path().join(path)).unwrap()
    }
}
