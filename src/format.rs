//! Structured-data formats understood by fragments, fetched resources and
//! generated files.

use std::path::Path;

use serde_yaml::Value;

use crate::error::{Error, Result};

/// A structured text format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Yaml,
    Json,
    Toml,
}

impl DataFormat {
    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse `text` into a value tree. Failures are reported against
    /// `source_name`.
    pub fn parse(self, text: &str, source_name: &str) -> Result<Value> {
        let parsed = match self {
            Self::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str::<Value>(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| Error::DataRead {
            source_name: source_name.to_string(),
            message,
        })
    }

    /// Serialize a value tree in this format, always ending with a newline.
    pub fn serialize(self, value: &Value) -> Result<String> {
        let mut text = match self {
            Self::Yaml => serde_yaml::to_string(value)?,
            Self::Json => serde_json::to_string_pretty(value)?,
            Self::Toml => toml::to_string_pretty(value).map_err(|e| Error::Serialization {
                message: format!("Failed to serialize TOML: {}", e),
            })?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }
}
