//! Implementation of the repo-control pipeline.
//!
//! ## Overview
//!
//! One run goes through these stages, each failing fast:
//! 1. Load - discover and parse fragments, resolving `!ext` tags through the cache
//! 2. Merge - fold the fragments (after an optional seed document) into one document
//! 3. Validate - check the merged document before substitution
//! 4. Substitute - fill `${{ path }}` markers, then render `var` templates
//! 5. Validate - check again with defaults filled in
//! 6. Generate - derive artifact and directory descriptors
//! 7. Classify - compare descriptors with the repository and build the report
//!
//! [`orchestrator`] runs stages 1-7. [`write`] applies a report to disk and is
//! only invoked by callers that want the changes written.

pub mod orchestrator;
pub mod write;

pub use orchestrator::{Orchestrator, RunOutcome};
pub use write::apply;
