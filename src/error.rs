//! Error types for schema resolution, compilation and document validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while reading a JSON file from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors while retrieving a remote schema.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch schema: {uri} ({status})")]
    Status { uri: String, status: u16 },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {uri}: {source}")]
    Network {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot load mirror of {uri}: {source}")]
    Mirror {
        uri: String,
        #[source]
        source: LoadError,
    },

    #[error("remote schemas are disabled: {uri}")]
    Disabled { uri: String },
}

/// Errors while turning a schema graph into an executable validator.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{identity}: {message}")]
    Invalid { identity: String, message: String },
}

/// Why a single document failed. Every variant is scoped to one file; the run
/// continues with the next one.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Cannot read file: {source}")]
    Unreadable {
        #[source]
        source: LoadError,
    },

    #[error("Invalid JSON: {source}")]
    MalformedDocument {
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing $schema field")]
    MissingSchemaReference,

    #[error("Schema not found: {reference}")]
    UnresolvedSchemaReference { reference: String },

    #[error("Schema compilation error: {0}")]
    Compilation(#[from] CompileError),

    #[error("Schema fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("{}", join_violations(.errors))]
    SchemaViolation { errors: Vec<Violation> },
}

impl DocumentError {
    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::Unreadable { .. } => "unreadable",
            DocumentError::MalformedDocument { .. } => "malformed_document",
            DocumentError::MissingSchemaReference => "missing_schema_reference",
            DocumentError::UnresolvedSchemaReference { .. } => "unresolved_schema_reference",
            DocumentError::Compilation(_) => "compilation_error",
            DocumentError::Fetch(_) => "fetch_error",
            DocumentError::SchemaViolation { .. } => "schema_violation",
        }
    }
}

impl From<LoadError> for DocumentError {
    fn from(source: LoadError) -> Self {
        match source {
            LoadError::InvalidJson { source, .. } => DocumentError::MalformedDocument { source },
            other => DocumentError::Unreadable { source: other },
        }
    }
}

/// Errors that abort a whole run rather than a single document.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid pattern \"{pattern}\": {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("cannot write report: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl RunError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Pattern { .. } => 2,
            RunError::Io { .. } => 3,
        }
    }
}

/// Single schema violation with location context.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Violation {
    /// JSON Pointer (RFC 6901) into the validated document, `/` for the root.
    pub location: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

fn join_violations(errors: &[Violation]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_exit_codes() {
        let err = RunError::Pattern {
            pattern: "[".into(),
            source: glob::Pattern::new("[").unwrap_err(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = RunError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn invalid_json_becomes_malformed_document() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = DocumentError::from(LoadError::InvalidJson {
            path: PathBuf::from("doc.json"),
            source,
        });
        assert_eq!(err.kind(), "malformed_document");
        assert!(err.to_string().starts_with("Invalid JSON: "));
    }

    #[test]
    fn missing_file_becomes_unreadable() {
        let err = DocumentError::from(LoadError::FileNotFound {
            path: PathBuf::from("gone.json"),
        });
        assert_eq!(err.kind(), "unreadable");
    }

    #[test]
    fn violation_display() {
        let err = Violation {
            location: "/buyer/email".into(),
            message: "\"x\" is not a \"email\"".into(),
        };
        assert_eq!(err.to_string(), "/buyer/email: \"x\" is not a \"email\"");
    }

    #[test]
    fn schema_violation_joins_entries() {
        let err = DocumentError::SchemaViolation {
            errors: vec![
                Violation {
                    location: "/".into(),
                    message: "\"x\" is a required property".into(),
                },
                Violation {
                    location: "/y".into(),
                    message: "1 is not of type \"string\"".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "/: \"x\" is a required property; /y: 1 is not of type \"string\""
        );
        assert_eq!(err.kind(), "schema_violation");
    }
}
