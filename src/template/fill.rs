//! Self-reference substitution
//!
//! String leaves may refer to other parts of the document with
//! `${{ path }}` markers:
//!
//! ```yaml
//! name: demo
//! title: "${{ name }} docs"      # embedded: replaced by text
//! links:
//!   home: https://example.com
//!   docs: "${{ .home }}/docs"    # relative to the `links` map
//!   up: "${{ ..name }}"          # each extra dot climbs one level
//! authors: ${{ team::members }}  # whole marker: any value, from a sibling
//! ```
//!
//! References are looked up in the unsubstituted document and substituted
//! recursively. A stack of the references being expanded detects cycles.

use std::collections::BTreeMap;

use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::document::{key_to_string, lookup, scalar_to_string, type_name, ConfigDocument};
use crate::error::{Error, Result};
use crate::path::{format_path, parse_path, PathSegment};

/// Name under which the primary document is registered.
const MAIN_DOCUMENT: &str = "";

const MARKER_PATTERN: &str = r"\$\{\{\s*(.*?)\s*\}\}";

/// Whether `text` contains a self-reference marker.
pub fn has_marker(text: &str) -> bool {
    text.contains("${{")
}

/// Substitute every marker in `document`.
///
/// `siblings` holds the named documents reachable through `name::path`
/// references.
pub fn fill(document: &mut ConfigDocument, siblings: &BTreeMap<String, Value>) -> Result<()> {
    let snapshot = document.as_value().clone();
    let filled = {
        let mut filler = PathFiller::new(&snapshot, siblings)?;
        filler.fill_value(&snapshot, &[], MAIN_DOCUMENT)?
    };
    *document.value_mut() = filled;
    Ok(())
}

/// Resolves references against a fixed set of documents.
pub struct PathFiller<'a> {
    roots: BTreeMap<&'a str, &'a Value>,
    marker: Regex,
    stack: Vec<String>,
}

impl<'a> PathFiller<'a> {
    pub fn new(main: &'a Value, siblings: &'a BTreeMap<String, Value>) -> Result<Self> {
        let mut roots: BTreeMap<&'a str, &'a Value> = siblings
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        roots.insert(MAIN_DOCUMENT, main);
        Ok(Self {
            roots,
            marker: Regex::new(MARKER_PATTERN)?,
            stack: Vec::new(),
        })
    }

    /// Fully substituted value at `path` of the primary document.
    pub fn fill_path(&mut self, path: &str) -> Result<Value> {
        self.resolve_reference(path, &[], MAIN_DOCUMENT, path)
    }

    /// Substitute markers in `value`, which sits at `path` inside `document`.
    pub fn fill_value(
        &mut self,
        value: &Value,
        path: &[PathSegment],
        document: &str,
    ) -> Result<Value> {
        match value {
            Value::String(text) if has_marker(text) => self.fill_string(text, path, document),
            Value::Mapping(map) => {
                let mut filled = Mapping::with_capacity(map.len());
                for (key, child) in map {
                    let mut child_path = path.to_vec();
                    child_path.push(PathSegment::Key(key_to_string(key)));
                    filled.insert(key.clone(), self.fill_value(child, &child_path, document)?);
                }
                Ok(Value::Mapping(filled))
            }
            Value::Sequence(seq) => {
                let mut filled = Vec::with_capacity(seq.len());
                for (idx, child) in seq.iter().enumerate() {
                    let mut child_path = path.to_vec();
                    child_path.push(PathSegment::Index(idx));
                    filled.push(self.fill_value(child, &child_path, document)?);
                }
                Ok(Value::Sequence(filled))
            }
            other => Ok(other.clone()),
        }
    }

    fn fill_string(&mut self, text: &str, path: &[PathSegment], document: &str) -> Result<Value> {
        let parent = &path[..path.len().saturating_sub(1)];
        let at = display_reference(document, path);

        let markers: Vec<(std::ops::Range<usize>, String)> = self
            .marker
            .captures_iter(text)
            .filter_map(|caps| Some((caps.get(0)?.range(), caps.get(1)?.as_str().to_string())))
            .collect();

        if let [(range, reference)] = markers.as_slice() {
            if range.start == 0 && range.end == text.len() {
                return self.resolve_reference(reference, parent, document, &at);
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (range, reference) in markers {
            out.push_str(&text[last..range.start]);
            let value = self.resolve_reference(&reference, parent, document, &at)?;
            let embedded = scalar_to_string(&value).ok_or_else(|| Error::TemplateReference {
                reference: reference.clone(),
                path: at.clone(),
                message: format!("cannot embed a {} in a string", type_name(&value)),
            })?;
            out.push_str(&embedded);
            last = range.end;
        }
        out.push_str(&text[last..]);
        Ok(Value::String(out))
    }

    fn resolve_reference(
        &mut self,
        reference: &str,
        parent: &[PathSegment],
        document: &str,
        at: &str,
    ) -> Result<Value> {
        let unresolved = |message: String| Error::TemplateReference {
            reference: reference.to_string(),
            path: at.to_string(),
            message,
        };

        let (target_document, expression) = match reference.split_once("::") {
            Some((name, rest)) => (name.trim(), rest.trim()),
            None => (document, reference.trim()),
        };
        let Some(root) = self.roots.get(target_document).copied() else {
            return Err(unresolved(format!("unknown document '{}'", target_document)));
        };

        let dots = expression.chars().take_while(|c| *c == '.').count();
        let mut segments = if dots > 0 && target_document == document {
            let climb = dots - 1;
            if climb > parent.len() {
                return Err(unresolved(
                    "relative reference climbs above the document root".to_string(),
                ));
            }
            parent[..parent.len() - climb].to_vec()
        } else {
            Vec::new()
        };
        segments.extend(parse_path(&expression[dots..]));

        let key = display_reference(target_document, &segments);
        if let Some(pos) = self.stack.iter().position(|seen| *seen == key) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(key);
            return Err(Error::TemplateCycle {
                chain: chain.join(" -> "),
            });
        }

        let Some(value) = lookup(root, &segments) else {
            return Err(unresolved(format!("path '{}' does not exist", key)));
        };

        self.stack.push(key);
        let filled = self.fill_value(value, &segments, target_document);
        self.stack.pop();
        filled
    }
}

fn display_reference(document: &str, segments: &[PathSegment]) -> String {
    if document == MAIN_DOCUMENT {
        format_path(segments)
    } else {
        format!("{}::{}", document, format_path(segments))
    }
}
