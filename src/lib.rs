//! # Repository Control Library
//!
//! This library keeps a repository's generated files (configuration files,
//! templates and a metadata file) in sync with one declarative document
//! assembled from many small configuration fragments. It is designed to be
//! used by the `repo-control` command-line tool but can also be embedded by
//! anything that wants the classified result of a run.
//!
//! ## Quick Example
//!
//! ```
//! use repo_control::fragments::Fragment;
//! use repo_control::merge::{merge, MergePolicies};
//!
//! let a = Fragment::new("a.yaml", serde_yaml::from_str("a: {x: 1}").unwrap());
//! let b = Fragment::new("b.yaml", serde_yaml::from_str("a: {y: 2}\nb: [p]").unwrap());
//!
//! let document = merge(&[a, b], &MergePolicies::default()).unwrap();
//! assert_eq!(document.get_str("b[0]"), Some("p"));
//! assert_eq!(
//!     document.to_json_string().unwrap(),
//!     "{\n  \"a\": {\n    \"x\": 1,\n    \"y\": 2\n  },\n  \"b\": [\n    \"p\"\n  ]\n}\n"
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Fragments (`fragments`, `tags`, `fetch`)**: structured-data files under
//!   the control directory. YAML fragments may include external resources with
//!   the `!ext` tag, resolved through a [`fetch::Fetcher`] and the
//!   [`cache::CacheStore`].
//! - **Merging (`merge`)**: fragments are folded into one
//!   [`document::ConfigDocument`]; conflicting values are an error, never a
//!   silent overwrite.
//! - **Templating (`template`)**: `${{ path }}` self-references are filled,
//!   then `var`-based templates are rendered.
//! - **Validation (`validate`)**: the document is checked before and after
//!   templating through the [`validate::SchemaValidator`] trait.
//! - **Generation and classification (`generate`, `artifact`, `classify`,
//!   `report`)**: descriptors for every generated file are derived from the
//!   document and compared against the repository.
//!
//! ## Execution Flow
//!
//! The main entry point is [`phases::Orchestrator`], which loads, merges,
//! validates, substitutes, generates and classifies, returning a
//! [`report::ReconciliationReport`]. [`phases::apply`] writes a report to
//! disk.

pub mod artifact;
pub mod cache;
pub mod classify;
pub mod config;
pub mod defaults;
pub mod document;
pub mod error;
pub mod fetch;
pub mod format;
pub mod fragments;
pub mod generate;
pub mod merge;
pub mod output;
pub mod path;
pub mod phases;
pub mod report;
pub mod tags;
pub mod template;
pub mod validate;

#[cfg(test)]
mod merge_proptest;
