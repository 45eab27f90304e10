//! Core types shared across resolution, compilation and reporting.

use serde::Serialize;

use crate::error::Violation;

/// Key that names a schema reference anywhere in a schema tree.
pub const REF_KEY: &str = "$ref";

/// Key under which a document names the schema that governs it.
pub const SCHEMA_KEY: &str = "$schema";

/// Key under which a schema declares its own identity.
pub const ID_KEY: &str = "$id";

/// Outcome of validating one document against one compiled validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Violations in the order the validator reported them.
    pub errors: Vec<Violation>,
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<Violation>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// A document that failed, as recorded in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub file: String,
    /// Failure kind, see `DocumentError::kind`.
    pub kind: String,
    pub error: String,
}

/// Totals for one full run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub validated: usize,
    pub failed: usize,
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    /// Number of documents processed.
    pub fn total(&self) -> usize {
        self.validated + self.failed
    }

    /// Returns true if no document failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Options for schema compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// When true, unknown `format` values are compilation errors instead of
    /// being ignored. Known formats are always checked.
    pub strict: bool,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
