//! Schema Reference Validator
//!
//! Validates JSON documents against the JSON Schema each one names in its
//! `$schema` field. Schemas may be split across many files and hosts: local
//! `$ref`s are resolved relative to the file that contains them, remote ones
//! are fetched, and fragment references point inside a document.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use spec_validate::{
//!     ConsoleReporter, HttpFetcher, SchemaRegistry, ValidationRunner, ValidatorCompiler,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(SchemaRegistry::new());
//! let compiler = ValidatorCompiler::new(registry, Arc::new(HttpFetcher::new()?));
//! let runner = ValidationRunner::new(compiler);
//!
//! let files = spec_validate::discover(".".as_ref(), &["**/*.denna-spec.json".into()], &[])?;
//! let summary = runner.run(&files, &mut ConsoleReporter::stdout()).await?;
//! assert!(summary.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! # Resolution
//!
//! | `$ref` form | Handling |
//! |-------------|----------|
//! | `#/definitions/x` | Left as is; points into the current document |
//! | `./other.json#/x` | Rewritten to the file's identity, fragment kept |
//! | `./missing.json` | Left as is; fails validation only where it is reached |
//! | `https://...` | Fetched once before compilation |
//!
//! A file's identity is its own `$id` when that is an absolute URI, and the
//! `file://` URI of its canonical path otherwise. Every identity is loaded
//! and compiled at most once per run.

mod compiler;
mod discovery;
mod error;
mod loader;
mod reference;
mod registry;
mod report;
mod rewriter;
mod runner;
mod types;
mod validator;

pub use compiler::{CompiledValidator, ValidatorCompiler};
pub use discovery::{discover, DEFAULT_PATTERN};
pub use error::{CompileError, DocumentError, FetchError, LoadError, RunError, Violation};
pub use loader::{load_document, MirrorFetcher, OfflineFetcher, SchemaFetcher};
pub use reference::{classify, file_identity, split_reference, SchemaLocation};
pub use registry::SchemaRegistry;
pub use report::{write_status, ConsoleReporter, Reporter};
pub use rewriter::SchemaGraphRewriter;
pub use runner::ValidationRunner;
pub use types::{CompileOptions, FailureRecord, RunSummary, ValidationResult};
pub use validator::{validate, ROOT_LOCATION};

#[cfg(feature = "remote")]
pub use loader::HttpFetcher;
