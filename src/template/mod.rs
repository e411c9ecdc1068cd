//! Template resolution
//!
//! Substitution runs in two passes over the merged document:
//!
//! 1. [`fill`] replaces `${{ path }}` self-reference markers.
//! 2. [`render`] renders Tera syntax against the document's `var` mapping and
//!    removes `var`.
//!
//! Each pass is a no-op on its own output.

pub mod fill;
pub mod render;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_yaml::Value;

use crate::document::ConfigDocument;
use crate::error::Result;

pub use fill::{fill, PathFiller};
pub use render::{render, render_tree, Renderer, VAR_KEY};

/// Run both passes.
pub fn substitute(
    document: &mut ConfigDocument,
    siblings: &BTreeMap<String, Value>,
    now: DateTime<Utc>,
) -> Result<()> {
    fill::fill(document, siblings)?;
    render::render_at(document, now)
}
