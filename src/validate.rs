//! Schema validation of the configuration document
//!
//! Validation is a consumed interface: the pipeline only depends on the
//! [`SchemaValidator`] trait. [`BuiltinValidator`] implements the structural
//! checks the rest of the crate relies on for two schemas:
//!
//! - `document`: the primary document
//! - `file`: each `file_<id>` sub-document describing a custom artifact
//!
//! Validation runs twice. Before substitution, strings that still contain
//! `${{ }}` markers or template syntax are accepted wherever a scalar is
//! expected, since their final type is not known yet.

use std::path::{Component, Path};

use serde_yaml::{Mapping, Value};

use crate::document::{key_to_string, type_name, ConfigDocument};
use crate::error::{Error, Result, ValidationStage};
use crate::generate::MANIFEST_KEY;
use crate::path::{join_key, json_path};
use crate::template::fill::has_marker;
use crate::template::render::has_template_syntax;

/// Schema id of the primary document.
pub const DOCUMENT_SCHEMA: &str = "document";

/// Schema id of `file_<id>` sub-documents.
pub const FILE_SCHEMA: &str = "file";

/// Top-level key prefix of custom artifact declarations.
pub const FILE_KEY_PREFIX: &str = "file_";

/// Output formats of custom artifacts.
pub const FILE_FORMATS: &[&str] = &["text", "yaml", "json", "toml"];

/// Lifecycle states of custom artifacts.
pub const FILE_STATUSES: &[&str] = &["active", "inactive", "delete"];

const FILE_KEYS: &[&str] = &["path", "name", "format", "status", "executable", "content"];

/// Validates data against a named schema.
pub trait SchemaValidator {
    /// Validate `data` against `schema_id`, filling defaults in place when
    /// `fill_defaults` is set.
    ///
    /// # Errors
    ///
    /// Returns `Error::SchemaValidation` describing the first violation.
    fn validate(
        &self,
        data: &mut Value,
        schema_id: &str,
        before_substitution: bool,
        fill_defaults: bool,
    ) -> Result<()>;
}

/// Validate the primary document and each `file_<id>` sub-document.
pub fn validate_document(
    validator: &dyn SchemaValidator,
    document: &mut ConfigDocument,
    before_substitution: bool,
    fill_defaults: bool,
) -> Result<()> {
    validator.validate(
        document.value_mut(),
        DOCUMENT_SCHEMA,
        before_substitution,
        fill_defaults,
    )?;

    for key in document.keys_with_prefix(FILE_KEY_PREFIX) {
        let Some(sub) = document
            .value_mut()
            .as_mapping_mut()
            .and_then(|map| map.get_mut(key.as_str()))
        else {
            continue;
        };
        validator
            .validate(sub, FILE_SCHEMA, before_substitution, fill_defaults)
            .map_err(|e| prefix_json_path(e, &key))?;
    }
    Ok(())
}

fn prefix_json_path(error: Error, key: &str) -> Error {
    match error {
        Error::SchemaValidation {
            schema,
            stage,
            json_path: inner,
            message,
        } => Error::SchemaValidation {
            schema,
            stage,
            json_path: format!(
                "{}{}",
                json_path(&join_key("", key)),
                inner.strip_prefix('$').unwrap_or(&inner)
            ),
            message,
        },
        other => other,
    }
}

/// Built-in structural validator for the `document` and `file` schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinValidator;

impl SchemaValidator for BuiltinValidator {
    fn validate(
        &self,
        data: &mut Value,
        schema_id: &str,
        before_substitution: bool,
        fill_defaults: bool,
    ) -> Result<()> {
        let check = Check {
            schema: schema_id,
            stage: ValidationStage::from_flag(before_substitution),
        };
        match schema_id {
            DOCUMENT_SCHEMA => check.document(data),
            FILE_SCHEMA => check.file(data, fill_defaults),
            other => Err(Error::SchemaValidation {
                schema: other.to_string(),
                stage: check.stage,
                json_path: "$".to_string(),
                message: "unknown schema".to_string(),
            }),
        }
    }
}

struct Check<'a> {
    schema: &'a str,
    stage: ValidationStage,
}

impl Check<'_> {
    fn fail(&self, path: &str, message: impl Into<String>) -> Error {
        Error::SchemaValidation {
            schema: self.schema.to_string(),
            stage: self.stage,
            json_path: json_path(path),
            message: message.into(),
        }
    }

    fn before(&self) -> bool {
        self.stage == ValidationStage::BeforeSubstitution
    }

    /// A string whose final value is only known after substitution.
    fn deferred(&self, value: &Value) -> bool {
        self.before()
            && value
                .as_str()
                .is_some_and(|s| has_marker(s) || has_template_syntax(s))
    }

    fn mapping<'v>(&self, value: &'v Value, path: &str) -> Result<&'v Mapping> {
        value.as_mapping().ok_or_else(|| {
            self.fail(path, format!("must be a mapping, found {}", type_name(value)))
        })
    }

    fn string<'v>(&self, value: &'v Value, path: &str) -> Result<&'v str> {
        value.as_str().ok_or_else(|| {
            self.fail(path, format!("must be a string, found {}", type_name(value)))
        })
    }

    fn repo_path(&self, value: &str, path: &str) -> Result<()> {
        if self.before() {
            return Ok(());
        }
        let candidate = Path::new(value);
        if candidate.is_absolute() || value.starts_with('/') || value.starts_with('\\') {
            return Err(self.fail(path, format!("path '{}' must be relative", value)));
        }
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(self.fail(
                path,
                format!("path '{}' must not leave the repository", value),
            ));
        }
        Ok(())
    }

    fn document(&self, data: &Value) -> Result<()> {
        let root = self.mapping(data, "")?;

        if root.contains_key(MANIFEST_KEY) {
            return Err(self.fail(MANIFEST_KEY, "reserved key, written by the generator"));
        }

        if let Some(var) = root.get("var") {
            if !var.is_null() && !self.deferred(var) {
                self.mapping(var, "var")?;
            }
        }

        if let Some(directory) = root.get("directory") {
            if !self.deferred(directory) {
                for (id, value) in self.mapping(directory, "directory")? {
                    let at = join_key("directory", &key_to_string(id));
                    match value {
                        Value::Null => {}
                        v if self.deferred(v) => {}
                        v => self.repo_path(self.string(v, &at)?, &at)?,
                    }
                }
            }
        }

        if let Some(templates) = root.get("templates") {
            let templates = self.mapping(templates, "templates")?;
            let dir = templates
                .get("dir")
                .ok_or_else(|| self.fail("templates", "missing required key 'dir'"))?;
            if !self.deferred(dir) {
                self.repo_path(self.string(dir, "templates.dir")?, "templates.dir")?;
            }
            if let Some(items) = templates.get("items") {
                for (name, content) in self.mapping(items, "templates.items")? {
                    let at = join_key("templates.items", &key_to_string(name));
                    let name = self.string(name, &at)?;
                    self.repo_path(name, &at)?;
                    self.string(content, &at)?;
                }
            }
        }
        Ok(())
    }

    fn file(&self, data: &mut Value, fill_defaults: bool) -> Result<()> {
        let map = data.as_mapping_mut().ok_or_else(|| {
            self.fail("", "must be a mapping")
        })?;

        for key in map.keys() {
            let name = key_to_string(key);
            if !FILE_KEYS.contains(&name.as_str()) {
                return Err(self.fail(&name, "unknown key"));
            }
        }

        let path = map
            .get("path")
            .ok_or_else(|| self.fail("", "missing required key 'path'"))?;
        if !self.deferred(path) {
            self.repo_path(self.string(path, "path")?, "path")?;
        }

        if let Some(name) = map.get("name") {
            if !self.deferred(name) {
                self.string(name, "name")?;
            }
        }

        let format = self.choice(map, "format", FILE_FORMATS)?;
        let status = self.choice(map, "status", FILE_STATUSES)?;

        if let Some(executable) = map.get("executable") {
            if !executable.is_bool() && !self.deferred(executable) {
                return Err(self.fail(
                    "executable",
                    format!("must be a boolean, found {}", type_name(executable)),
                ));
            }
        }

        match map.get("content") {
            None if status.as_deref() != Some("delete") => {
                return Err(self.fail("", "missing required key 'content'"));
            }
            Some(content) if !self.before() && format.as_deref().unwrap_or("text") == "text" => {
                self.string(content, "content")?;
            }
            _ => {}
        }

        if fill_defaults {
            insert_default(map, "format", Value::String("text".to_string()));
            insert_default(map, "status", Value::String("active".to_string()));
            insert_default(map, "executable", Value::Bool(false));
        }
        Ok(())
    }

    /// Value of an enumerated key, `None` when absent or not yet substituted.
    fn choice(&self, map: &Mapping, key: &str, allowed: &[&str]) -> Result<Option<String>> {
        let Some(value) = map.get(key) else {
            return Ok(None);
        };
        if self.deferred(value) {
            return Ok(None);
        }
        let text = self.string(value, key)?;
        if !allowed.contains(&text) {
            return Err(self.fail(
                key,
                format!("'{}' is not one of: {}", text, allowed.join(", ")),
            ));
        }
        Ok(Some(text.to_string()))
    }
}

fn insert_default(map: &mut Mapping, key: &str, value: Value) {
    if !map.contains_key(key) {
        map.insert(Value::String(key.to_string()), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> ConfigDocument {
        ConfigDocument::from_value(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    fn validate(yaml: &str, before: bool) -> Result<ConfigDocument> {
        let mut document = doc(yaml);
        validate_document(&BuiltinValidator, &mut document, before, true)?;
        Ok(document)
    }

    fn json_path_of(err: Error) -> String {
        match err {
            Error::SchemaValidation { json_path, .. } => json_path,
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_fills_file_defaults() {
        let document = validate("file_readme:\n  path: README.md\n  content: hi\n", false).unwrap();
        assert_eq!(document.get_str("file_readme.format"), Some("text"));
        assert_eq!(document.get_str("file_readme.status"), Some("active"));
        assert_eq!(document.get("file_readme.executable"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_invalid_status_reports_prefixed_path() {
        let err = validate(
            "file_readme:\n  path: README.md\n  status: paused\n  content: hi\n",
            false,
        )
        .unwrap_err();
        assert_eq!(json_path_of(err), "$.file_readme.status");
    }

    #[test]
    fn test_content_required_unless_deleted() {
        assert!(validate("file_a:\n  path: a.txt\n", false).is_err());
        assert!(validate("file_a:\n  path: a.txt\n  status: delete\n", false).is_ok());
    }

    #[test]
    fn test_text_content_must_be_string_after_substitution() {
        let text = "file_a:\n  path: a.txt\n  content: {k: v}\n";
        assert!(validate(text, true).is_ok());
        let err = validate(text, false).unwrap_err();
        assert_eq!(json_path_of(err), "$.file_a.content");
        assert!(validate("file_a:\n  path: a.yaml\n  format: yaml\n  content: {k: v}\n", false).is_ok());
    }

    #[test]
    fn test_markers_deferred_before_substitution() {
        let text = "file_a:\n  path: ${{ paths.a }}\n  executable: ${{ flags.exec }}\n  content: x\n";
        assert!(validate(text, true).is_ok());
        let err = validate(text, false).unwrap_err();
        assert_eq!(json_path_of(err), "$.file_a.executable");
    }

    #[test]
    fn test_escaping_paths_rejected_after_substitution() {
        assert!(validate("directory:\n  docs: ../outside\n", true).is_ok());
        let err = validate("directory:\n  docs: ../outside\n", false).unwrap_err();
        assert_eq!(json_path_of(err), "$.directory.docs");
        assert!(validate("file_a:\n  path: /etc/passwd\n  content: x\n", false).is_err());
    }

    #[test]
    fn test_document_structure() {
        assert!(validate("var: [1]\n", true).is_err());
        assert!(validate("templates:\n  items: {}\n", true).is_err());
        assert!(validate(
            "templates:\n  dir: .github/ISSUE_TEMPLATE\n  items:\n    bug.yaml: \"name: Bug\"\n",
            false
        )
        .is_ok());
        assert!(validate("directory:\n  docs: docs\n  old: null\n", false).is_ok());
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let err = validate("file_a:\n  path: a\n  content: x\n  mode: 755\n", true).unwrap_err();
        assert_eq!(json_path_of(err), "$.file_a.mode");
    }

    #[test]
    fn test_manifest_key_is_reserved() {
        for before in [true, false] {
            let err = validate("name: demo\nmanifest:\n  custom: {}\n", before).unwrap_err();
            assert_eq!(json_path_of(err), "$.manifest");
        }
    }

    struct RootFailure;

    impl SchemaValidator for RootFailure {
        fn validate(&self, _: &mut Value, schema_id: &str, before: bool, _: bool) -> Result<()> {
            match schema_id {
                FILE_SCHEMA => Err(Error::SchemaValidation {
                    schema: schema_id.to_string(),
                    stage: ValidationStage::from_flag(before),
                    json_path: String::new(),
                    message: "rejected".to_string(),
                }),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_empty_nested_path_is_prefixed() {
        let mut document = doc("file_a:\n  path: a.txt\n  content: x\n");
        let err = validate_document(&RootFailure, &mut document, false, false).unwrap_err();
        assert_eq!(json_path_of(err), "$.file_a");
    }

    #[test]
    fn test_unknown_schema() {
        let mut value = Value::Null;
        assert!(BuiltinValidator
            .validate(&mut value, "license", false, false)
            .is_err());
    }
}
