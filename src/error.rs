//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for
//! `repo-control`. It uses the `thiserror` library to create a single `Error`
//! enum that covers every failure mode of a pipeline run, so that each stage
//! can propagate failures with `?` and the caller always receives a structured
//! value (kind, location, message and, where relevant, the underlying cause).
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant corresponds to one failure kind
//!   and carries the context needed to point the user at the offending input.
//!
//! - **`Location`**: A source file plus 1-based line/column, attached to every
//!   error raised while resolving a custom tag.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! ## Failure Classes
//!
//! Almost every variant describes bad input (malformed fragments, merge
//! conflicts, unreachable resources, schema violations, broken templates).
//! `DuplicateArtifact` is different: it signals a defect in artifact
//! generation rather than in the configuration, and `Error::is_defect`
//! reports it so callers can surface it accordingly.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Position of a node inside a source file (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// A location that only knows the file.
    pub fn file_only(file: impl Into<PathBuf>) -> Self {
        Self::new(file, 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file.display())
        } else {
            write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
        }
    }
}

/// Main error type for repo-control operations
#[derive(Error, Debug)]
pub enum Error {
    /// A fragment, cache file, previous metadata file or fetched resource
    /// could not be read or parsed.
    #[error("Data read error in {source_name}: {message}")]
    DataRead {
        source_name: String,
        message: String,
    },

    /// Two fragments contributed conflicting values to the same key path.
    #[error(
        "Duplicate configuration data in {}: value of type {incoming_type} at '{path}' already exists in another configuration file{}",
        file.display(),
        conflict_detail(existing, existing_type, incoming, incoming_type)
    )]
    DuplicateConfigData {
        file: PathBuf,
        path: String,
        existing: String,
        existing_type: String,
        incoming: String,
        incoming_type: String,
    },

    /// A custom tag was used without a value.
    #[error("The {tag} tag at {location} has no value")]
    EmptyTag { tag: String, location: Location },

    /// The resource referenced by a custom tag could not be retrieved.
    #[error("The {tag} tag at {location} references unreachable resource {url}: {cause}")]
    UnreachableTag {
        tag: String,
        url: String,
        location: Location,
        #[source]
        cause: Box<Error>,
    },

    /// A resource was referenced whose format cannot be parsed.
    #[error("Unsupported format '{extension}' for {source_name}")]
    UnsupportedFormat {
        source_name: String,
        extension: String,
    },

    /// A tag filter expression selected nothing.
    #[error("No match found for filter '{expression}' in data from {source_name}")]
    TagFilter {
        expression: String,
        source_name: String,
    },

    /// Data failed schema validation.
    #[error("Schema validation error ({schema}, {stage}) at {json_path}: {message}")]
    SchemaValidation {
        schema: String,
        stage: ValidationStage,
        json_path: String,
        message: String,
    },

    /// A string leaf could not be rendered as a template.
    #[error("Template rendering error at '{path}': {message}")]
    TemplateRender { path: String, message: String },

    /// A self-reference marker points at a path that does not exist.
    #[error("Unresolved reference '{reference}' at '{path}': {message}")]
    TemplateReference {
        reference: String,
        path: String,
        message: String,
    },

    /// Resolving self-reference markers revisited a path.
    #[error("Cycle detected while resolving references: {chain}")]
    TemplateCycle { chain: String },

    /// Two generated artifacts claimed the same type and subtype.
    #[error("Duplicate dynamic artifact type and subtype: {artifact_type} {subtype}")]
    DuplicateArtifact {
        artifact_type: String,
        subtype: String,
    },

    /// The settings file is invalid.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the settings
        hint: Option<String>,
    },

    /// A resource fetch failed.
    #[error("Network operation error: {url} - {message}")]
    Fetch { url: String, message: String },

    /// An error occurred while reading or writing repository files.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An error occurred during serialization.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML parsing error, wrapped from `toml::de::Error`.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

fn conflict_detail(existing: &str, existing_type: &str, incoming: &str, incoming_type: &str) -> String {
    if existing_type == incoming_type {
        format!(" (existing: {}, new: {})", existing, incoming)
    } else {
        format!(" with type {}", existing_type)
    }
}

impl Error {
    /// Whether the error points at a bug in the pipeline rather than at bad
    /// configuration.
    pub fn is_defect(&self) -> bool {
        matches!(self, Error::DuplicateArtifact { .. })
    }

    /// The tag location for tag errors.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::EmptyTag { location, .. } | Error::UnreachableTag { location, .. } => {
                Some(location)
            }
            _ => None,
        }
    }
}

/// When a validation ran relative to template substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    BeforeSubstitution,
    AfterSubstitution,
}

impl ValidationStage {
    pub fn from_flag(before_substitution: bool) -> Self {
        if before_substitution {
            Self::BeforeSubstitution
        } else {
            Self::AfterSubstitution
        }
    }
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeSubstitution => write!(f, "before substitution"),
            Self::AfterSubstitution => write!(f, "after substitution"),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
