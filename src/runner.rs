//! Per-document pipeline and whole-run orchestration.
//!
//! Documents are processed one at a time, end to end. Every failure is
//! scoped to the document that caused it; only reporting I/O errors end a
//! run early.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use crate::compiler::{CompiledValidator, ValidatorCompiler};
use crate::error::{DocumentError, RunError};
use crate::loader::load_document;
use crate::reference::{classify, with_fragment, SchemaLocation};
use crate::report::Reporter;
use crate::rewriter::SchemaGraphRewriter;
use crate::types::{FailureRecord, RunSummary, ValidationResult, SCHEMA_KEY};
use crate::validator::validate;

pub struct ValidationRunner {
    compiler: ValidatorCompiler,
    root: PathBuf,
}

impl ValidationRunner {
    pub fn new(compiler: ValidatorCompiler) -> Self {
        Self {
            compiler,
            root: PathBuf::from("."),
        }
    }

    /// Directory reported file names are shown relative to.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn compiler(&self) -> &ValidatorCompiler {
        &self.compiler
    }

    /// Validate every file in order, streaming progress to `reporter`.
    pub async fn run<R: Reporter>(
        &self,
        files: &[PathBuf],
        reporter: &mut R,
    ) -> Result<RunSummary, RunError> {
        reporter.discovered(files.len())?;

        let mut summary = RunSummary::default();
        for path in files {
            let file = self.display_name(path);
            let span = tracing::debug_span!("document", file = %file);
            match self.validate_file(path).instrument(span).await {
                Ok(()) => {
                    summary.validated += 1;
                    reporter.passed(&file)?;
                }
                Err(error) => {
                    tracing::debug!(file = %file, kind = error.kind(), "document failed");
                    reporter.failed(&file, &error)?;
                    summary.failed += 1;
                    summary.failures.push(FailureRecord {
                        file,
                        kind: error.kind().to_string(),
                        error: error.to_string(),
                    });
                }
            }
        }

        reporter.finished(&summary)?;
        Ok(summary)
    }

    /// Validate one document, turning schema violations into
    /// `DocumentError::SchemaViolation`.
    pub async fn validate_file(&self, path: &Path) -> Result<(), DocumentError> {
        let result = self.check_file(path).await?;
        if result.valid {
            Ok(())
        } else {
            Err(DocumentError::SchemaViolation {
                errors: result.errors,
            })
        }
    }

    /// Load a document, resolve and compile the schema it names, and
    /// validate it.
    ///
    /// # Errors
    ///
    /// Returns the `DocumentError` for any failure that happens before
    /// validation proper; violations are reported in the `ValidationResult`.
    pub async fn check_file(&self, path: &Path) -> Result<ValidationResult, DocumentError> {
        let document = load_document(path)?;
        let reference = schema_reference(&document)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let validator = self.resolve(reference, base_dir).await?;
        Ok(validate(&document, &validator))
    }

    async fn resolve(
        &self,
        reference: &str,
        base_dir: &Path,
    ) -> Result<Arc<CompiledValidator>, DocumentError> {
        match classify(reference, base_dir) {
            SchemaLocation::Local { path, fragment } => {
                let registry = self.compiler.registry();
                let identity = SchemaGraphRewriter::new(registry).load(&path)?;
                self.compiler.fetch_dependencies(&identity).await?;
                let validator = match fragment {
                    Some(fragment) => self
                        .compiler
                        .compile_reference(&with_fragment(&identity, Some(&fragment)))?,
                    None => self.compiler.compile_local(&identity)?,
                };
                Ok(validator)
            }
            SchemaLocation::Remote { uri } => self.compiler.compile_remote(&uri).await,
            SchemaLocation::Unresolved { reference } => {
                Err(DocumentError::UnresolvedSchemaReference { reference })
            }
        }
    }

    fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// The non-empty `$schema` string a document declares.
fn schema_reference(document: &Value) -> Result<&str, DocumentError> {
    document
        .get(SCHEMA_KEY)
        .and_then(Value::as_str)
        .filter(|reference| !reference.is_empty())
        .ok_or(DocumentError::MissingSchemaReference)
}
