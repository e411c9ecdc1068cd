//! The merged configuration document
//!
//! [`ConfigDocument`] wraps a `serde_yaml::Value` tree (mappings, sequences and
//! scalars) and adds path-based access plus the canonical serialization used
//! for the metadata file: JSON with sorted keys and a trailing newline.

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};
use crate::path::{parse_path, PathSegment};

/// The single configuration tree owned by a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: Value,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigDocument {
    /// Create an empty document (an empty mapping).
    pub fn new() -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
        }
    }

    /// Wrap an existing tree. The root must be a mapping.
    pub fn from_value(root: Value) -> Result<Self> {
        match root {
            Value::Mapping(_) => Ok(Self { root }),
            Value::Null => Ok(Self::new()),
            other => Err(Error::DataRead {
                source_name: "document".to_string(),
                message: format!(
                    "expected a mapping at the document root, found {}",
                    type_name(&other)
                ),
            }),
        }
    }

    /// Parse a document from JSON text, as written to the metadata file.
    pub fn from_json_str(text: &str, source_name: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text).map_err(|e| Error::DataRead {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(root)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        self.root.as_mapping()
    }

    /// Look up a value by dotted/indexed path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.root, &parse_path(path))
    }

    /// Look up a string value by path.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Set a value at a path, creating intermediate mappings as needed.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let segments = parse_path(path);
        let target = navigate_mut(&mut self.root, &segments)?;
        *target = value;
        Ok(())
    }

    /// Remove a top-level key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.root
            .as_mapping_mut()
            .and_then(|map| map.remove(key))
    }

    /// Top-level keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .as_mapping()
            .into_iter()
            .flat_map(|map| map.keys())
            .filter_map(Value::as_str)
            .filter(|key| key.starts_with(prefix))
            .map(str::to_string)
            .collect();
        keys.sort();
        keys
    }

    /// Serialize as pretty JSON with sorted keys and a trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        to_sorted_json(&self.root)
    }
}

/// Serialize any tree as pretty JSON with sorted keys and a trailing newline.
pub fn to_sorted_json(value: &Value) -> Result<String> {
    // serde_json's default map is ordered by key.
    let json: serde_json::Value =
        serde_json::to_value(value).map_err(|e| Error::Serialization {
            message: format!("Failed to convert document to JSON: {}", e),
        })?;
    let mut text = serde_json::to_string_pretty(&json)?;
    text.push('\n');
    Ok(text)
}

/// Follow `segments` from `value`. Wildcards never match here.
pub fn lookup<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match segment {
            PathSegment::Key(key) => current.as_mapping()?.get(key.as_str())?,
            PathSegment::Index(idx) => current.as_sequence()?.get(*idx)?,
            PathSegment::Wildcard => return None,
        };
    }
    Some(current)
}

/// Navigate to a path within a value, creating intermediate structures as
/// needed.
///
/// # Errors
///
/// Returns `Error::DataRead` if the path runs through a scalar.
pub fn navigate_mut<'a>(value: &'a mut Value, path: &[PathSegment]) -> Result<&'a mut Value> {
    let mut current = value;
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if current.is_null() {
                    *current = Value::Mapping(Mapping::new());
                }
                let map = current.as_mapping_mut().ok_or_else(|| Error::DataRead {
                    source_name: "document".to_string(),
                    message: format!("Expected mapping while navigating to '{}'", key),
                })?;
                current = map
                    .entry(Value::String(key.clone()))
                    .or_insert(Value::Null);
            }
            PathSegment::Index(idx) => {
                if current.is_null() {
                    *current = Value::Sequence(Vec::new());
                }
                let seq = current.as_sequence_mut().ok_or_else(|| Error::DataRead {
                    source_name: "document".to_string(),
                    message: format!("Expected sequence while navigating to index {}", idx),
                })?;
                while seq.len() <= *idx {
                    seq.push(Value::Null);
                }
                current = &mut seq[*idx];
            }
            PathSegment::Wildcard => {
                return Err(Error::DataRead {
                    source_name: "document".to_string(),
                    message: "Wildcards cannot be used to set a value".to_string(),
                });
            }
        }
    }
    Ok(current)
}

/// Get a human-readable type name for a value
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Sequence(_) => "Sequence",
        Value::Mapping(_) => "Mapping",
        Value::Tagged(_) => "Tagged",
    }
}

/// Text of a mapping key as it appears in paths.
pub fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => scalar_to_string(other).unwrap_or_else(|| format!("{:?}", other)),
    }
}

/// Text of a scalar as it would be embedded in a string. `None` for
/// mappings, sequences and tagged values.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Compact single-line rendering of a value for messages.
pub fn short_display(value: &Value) -> String {
    match serde_json::to_string(value) {
        Ok(text) if text.chars().count() > 80 => {
            format!("{}...", text.chars().take(77).collect::<String>())
        }
        Ok(text) => text,
        Err(_) => format!("{:?}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> ConfigDocument {
        ConfigDocument::from_value(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_get_nested_and_indexed() {
        let document = doc("a:\n  b:\n    - x\n    - y\n");
        assert_eq!(document.get_str("a.b[1]"), Some("y"));
        assert!(document.get("a.c").is_none());
        assert!(document.get("a.b[5]").is_none());
    }

    #[test]
    fn test_set_creates_missing_path() {
        let mut document = ConfigDocument::new();
        document
            .set("manifest.custom.readme", Value::String("README.md".into()))
            .unwrap();
        assert_eq!(document.get_str("manifest.custom.readme"), Some("README.md"));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut document = doc("a: 42");
        assert!(document.set("a.b", Value::Null).is_err());
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        let result = ConfigDocument::from_value(serde_yaml::from_str("- a\n- b").unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_json_output_sorted_with_trailing_newline() {
        let document = doc("zeta: 1\nalpha:\n  d: 2\n  c: 3\n");
        let json = document.to_json_string().unwrap();
        assert!(json.ends_with("}\n"));
        let alpha = json.find("\"alpha\"").unwrap();
        let zeta = json.find("\"zeta\"").unwrap();
        assert!(alpha < zeta);
        assert!(json.find("\"c\"").unwrap() < json.find("\"d\"").unwrap());
    }

    #[test]
    fn test_json_round_trip_preserves_document() {
        let document = doc("a:\n  x: 1\nb: [p, q]\nc: true\n");
        let text = document.to_json_string().unwrap();
        let parsed = ConfigDocument::from_json_str(&text, "metadata.json").unwrap();
        assert_eq!(parsed, document);
    }

    #[test]
    fn test_keys_with_prefix_sorted() {
        let document = doc("file_b: {}\nfile_a: {}\nother: 1\n");
        assert_eq!(document.keys_with_prefix("file_"), vec!["file_a", "file_b"]);
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&Value::Bool(true)), Some("true".to_string()));
        assert_eq!(scalar_to_string(&Value::Number(3.into())), Some("3".to_string()));
        assert_eq!(scalar_to_string(&Value::Sequence(vec![])), None);
    }
}
