//! Compilation of registered schema graphs into executable validators.
//!
//! The compiled validator never touches the filesystem or the network: every
//! reference it follows is served from the [`SchemaRegistry`]. Local graphs
//! are put there by the rewriter; remote documents are fetched ahead of
//! compilation by [`ValidatorCompiler::fetch_dependencies`], which is the
//! only step that suspends.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use jsonschema::{Retrieve, Uri};
use serde_json::{json, Value};

use crate::error::{CompileError, DocumentError, FetchError};
use crate::loader::SchemaFetcher;
use crate::reference::{
    declared_identity, is_absolute_uri, is_bundled_meta_schema, is_url, resolve_uri,
    split_reference,
};
use crate::registry::SchemaRegistry;
use crate::types::{CompileOptions, REF_KEY};

/// An executable validator bound to the identity it was compiled for.
pub struct CompiledValidator {
    identity: String,
    inner: jsonschema::Validator,
}

impl CompiledValidator {
    /// Compile a self-contained schema with default options.
    pub fn from_schema(identity: &str, schema: &Value) -> Result<Self, CompileError> {
        jsonschema::validator_for(schema)
            .map(|inner| Self::new(identity, inner))
            .map_err(|e| invalid(identity, e))
    }

    fn new(identity: &str, inner: jsonschema::Validator) -> Self {
        Self {
            identity: identity.to_string(),
            inner,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub(crate) fn inner(&self) -> &jsonschema::Validator {
        &self.inner
    }
}

impl std::fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledValidator")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

fn invalid(identity: &str, error: impl std::fmt::Display) -> CompileError {
    CompileError::Invalid {
        identity: identity.to_string(),
        message: error.to_string(),
    }
}

/// Serves `$ref` targets out of the registry.
///
/// Holds a weak handle: the registry owns the validators that own this.
struct RegistryRetriever {
    registry: Weak<SchemaRegistry>,
}

impl Retrieve for RegistryRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let key = uri.as_str();
        let registry = self.registry.upgrade().ok_or("schema registry dropped")?;
        if let Some(document) = registry
            .get(key)
            .or_else(|| registry.get(key.trim_end_matches('#')))
        {
            return Ok(document.as_ref().clone());
        }
        if is_url(key) {
            return Err(format!("schema not found: {key}").into());
        }
        tracing::debug!(uri = key, "serving placeholder for dangling reference");
        Ok(unresolved_placeholder(key))
    }
}

/// Schema standing in for a reference whose target does not exist.
///
/// It compiles, so a dangling `$ref` in a branch that is never evaluated is
/// harmless, and it rejects every instance that does reach it.
fn unresolved_placeholder(uri: &str) -> Value {
    json!({
        "description": format!("unresolved reference: {uri}"),
        "not": {}
    })
}

pub struct ValidatorCompiler {
    registry: Arc<SchemaRegistry>,
    fetcher: Arc<dyn SchemaFetcher>,
    options: CompileOptions,
}

impl ValidatorCompiler {
    pub fn new(registry: Arc<SchemaRegistry>, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            registry,
            fetcher,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Compile the rewritten schema registered under `identity`.
    ///
    /// Its remote dependencies must already be registered. A missing local
    /// target compiles to a schema that rejects whatever reaches it. The
    /// result is cached, so each identity is compiled at most once.
    pub fn compile_local(&self, identity: &str) -> Result<Arc<CompiledValidator>, CompileError> {
        self.registry.get_or_compile(identity, || {
            let schema = self
                .registry
                .get(identity)
                .ok_or_else(|| invalid(identity, "schema is not registered"))?;
            self.build(identity, &schema)
        })
    }

    /// Compile the reference-only schema `{"$ref": reference}`.
    pub fn compile_reference(
        &self,
        reference: &str,
    ) -> Result<Arc<CompiledValidator>, CompileError> {
        self.registry.get_or_compile(reference, || {
            self.build(reference, &json!({ REF_KEY: reference }))
        })
    }

    /// Fetch the remote schema at `uri` and everything it references, then
    /// compile a validator that points at it.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Fetch` if any document cannot be retrieved and
    /// `DocumentError::Compilation` if the fetched graph does not compile.
    pub async fn compile_remote(
        &self,
        uri: &str,
    ) -> Result<Arc<CompiledValidator>, DocumentError> {
        let (document_uri, _) = split_reference(uri);
        self.fetch_dependencies(document_uri).await?;
        Ok(self.compile_reference(uri)?)
    }

    /// Walk the reference graph starting at `uri` and fetch every remote
    /// document that is not registered yet.
    ///
    /// Registered documents are followed but never fetched again, and the
    /// standard meta-schemas are left to the engine's bundled copies.
    /// Relative references inside a fetched document resolve against its
    /// `$id`, or the URI it was fetched from.
    pub async fn fetch_dependencies(&self, uri: &str) -> Result<(), FetchError> {
        let mut pending = vec![uri.to_string()];
        let mut seen = HashSet::new();

        while let Some(uri) = pending.pop() {
            if !seen.insert(uri.clone()) || is_bundled_meta_schema(&uri) {
                continue;
            }

            let document = match self.registry.get(&uri) {
                Some(document) => document,
                None if is_url(&uri) => {
                    let document = self.fetcher.fetch(&uri).await.map_err(|e| {
                        tracing::warn!(uri = %uri, error = %e, "remote schema fetch failed");
                        e
                    })?;
                    self.registry.register(&uri, document);
                    match self.registry.get(&uri) {
                        Some(document) => document,
                        None => continue,
                    }
                }
                // Dangling local reference; the retriever stands in for it.
                None => continue,
            };

            let base = declared_identity(&document).unwrap_or_else(|| uri.clone());
            collect_references(&document, &base, &mut pending);
        }
        Ok(())
    }

    fn build(&self, identity: &str, schema: &Value) -> Result<CompiledValidator, CompileError> {
        let retriever = RegistryRetriever {
            registry: Arc::downgrade(&self.registry),
        };
        let inner = jsonschema::options()
            .should_validate_formats(true)
            .should_ignore_unknown_formats(!self.options.strict)
            .with_retriever(retriever)
            .build(schema)
            .map_err(|e| invalid(identity, e))?;
        tracing::info!(identity, "compiled validator");
        Ok(CompiledValidator::new(identity, inner))
    }
}

/// Push the absolute document URI of every `$ref` in `node`.
fn collect_references(node: &Value, base: &str, out: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::String(reference) if key == REF_KEY => {
                        let (path_part, _) = split_reference(reference);
                        if path_part.is_empty() {
                            continue;
                        }
                        if is_absolute_uri(path_part) {
                            out.push(path_part.to_string());
                        } else if let Some(resolved) = resolve_uri(base, path_part) {
                            out.push(resolved);
                        }
                    }
                    _ => collect_references(value, base, out),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, base, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewriter::SchemaGraphRewriter;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves canned documents and counts every fetch.
    #[derive(Default)]
    struct StubFetcher {
        documents: HashMap<String, Value>,
        fetches: AtomicUsize,
    }

    impl StubFetcher {
        fn with(mut self, uri: &str, document: Value) -> Self {
            self.documents.insert(uri.to_string(), document);
            self
        }
    }

    #[async_trait]
    impl SchemaFetcher for StubFetcher {
        async fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.documents
                .get(uri)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    uri: uri.to_string(),
                    status: 404,
                })
        }
    }

    fn compiler_with(fetcher: Arc<StubFetcher>) -> ValidatorCompiler {
        ValidatorCompiler::new(Arc::new(SchemaRegistry::new()), fetcher)
    }

    #[test]
    fn compile_local_resolves_registered_dependencies() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.json"), r#"{"type": "integer"}"#).unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"type": "object", "properties": {"n": {"$ref": "./b.json"}}}"#,
        )
        .unwrap();

        let compiler = compiler_with(Arc::new(StubFetcher::default()));
        let identity = SchemaGraphRewriter::new(compiler.registry())
            .load(&dir.path().join("a.json"))
            .unwrap();
        let validator = compiler.compile_local(&identity).unwrap();

        assert!(validator.inner().is_valid(&json!({"n": 3})));
        assert!(!validator.inner().is_valid(&json!({"n": "three"})));
    }

    #[test]
    fn compile_local_happens_once_per_identity() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"type": "string"}"#).unwrap();

        let compiler = compiler_with(Arc::new(StubFetcher::default()));
        let rewriter = SchemaGraphRewriter::new(compiler.registry());
        for _ in 0..4 {
            let identity = rewriter.load(&dir.path().join("a.json")).unwrap();
            compiler.compile_local(&identity).unwrap();
        }
        assert_eq!(compiler.registry().compilations(), 1);
    }

    #[test]
    fn malformed_schema_is_compilation_error() {
        let compiler = compiler_with(Arc::new(StubFetcher::default()));
        compiler
            .registry()
            .register("file:///bad.json", json!({"type": "object", "minProperties": "many"}));

        let result = compiler.compile_local("file:///bad.json");
        match result {
            Err(CompileError::Invalid { identity, .. }) => assert_eq!(identity, "file:///bad.json"),
            other => panic!("expected compilation error, got {:?}", other),
        }
    }

    #[test]
    fn dangling_reference_only_fails_where_evaluated() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"properties": {"x": {"$ref": "./missing.json"}}}"#,
        )
        .unwrap();

        let compiler = compiler_with(Arc::new(StubFetcher::default()));
        let identity = SchemaGraphRewriter::new(compiler.registry())
            .load(&dir.path().join("a.json"))
            .unwrap();
        let validator = compiler.compile_local(&identity).unwrap();

        assert!(validator.inner().is_valid(&json!({"y": 1})));
        assert!(!validator.inner().is_valid(&json!({"x": 1})));
    }

    #[test]
    fn unused_dangling_definition_compiles() {
        let compiler = compiler_with(Arc::new(StubFetcher::default()));
        compiler.registry().register(
            "file:///s.json",
            json!({"type": "object", "definitions": {"unused": {"$ref": "./gone.json"}}}),
        );

        let validator = compiler.compile_local("file:///s.json").unwrap();
        assert!(validator.inner().is_valid(&json!({})));
    }

    #[test]
    fn placeholder_rejects_everything() {
        let placeholder = unresolved_placeholder("json-schema:///gone.json");
        let validator = jsonschema::validator_for(&placeholder).unwrap();
        assert!(!validator.is_valid(&json!(null)));
        assert!(!validator.is_valid(&json!({"any": "thing"})));
        assert_eq!(
            placeholder["description"],
            "unresolved reference: json-schema:///gone.json"
        );
    }

    #[test]
    fn strict_mode_rejects_unknown_formats() {
        let schema = json!({"type": "string", "format": "not-a-real-format"});

        let lenient = compiler_with(Arc::new(StubFetcher::default()));
        lenient.registry().register("file:///f.json", schema.clone());
        assert!(lenient.compile_local("file:///f.json").is_ok());

        let strict = compiler_with(Arc::new(StubFetcher::default()))
            .with_options(CompileOptions::new().strict(true));
        strict.registry().register("file:///f.json", schema);
        assert!(strict.compile_local("file:///f.json").is_err());
    }

    #[tokio::test]
    async fn compile_remote_fetches_transitively_once() {
        let fetcher = Arc::new(
            StubFetcher::default()
                .with(
                    "https://schemas.example.com/order.json",
                    json!({
                        "type": "object",
                        "properties": { "item": { "$ref": "item.json" } }
                    }),
                )
                .with(
                    "https://schemas.example.com/item.json",
                    json!({ "type": "object", "required": ["sku"] }),
                ),
        );
        let compiler = compiler_with(Arc::clone(&fetcher));

        for _ in 0..3 {
            let validator = compiler
                .compile_remote("https://schemas.example.com/order.json")
                .await
                .unwrap();
            assert!(validator.inner().is_valid(&json!({"item": {"sku": "a"}})));
            assert!(!validator.inner().is_valid(&json!({"item": {}})));
        }
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(compiler.registry().compilations(), 1);
    }

    #[tokio::test]
    async fn compile_remote_reports_fetch_failure() {
        let fetcher = Arc::new(StubFetcher::default());
        let compiler = compiler_with(fetcher);

        let result = compiler
            .compile_remote("https://schemas.example.com/absent.json")
            .await;
        assert!(matches!(
            result,
            Err(DocumentError::Fetch(FetchError::Status { status: 404, .. }))
        ));
    }

    #[tokio::test]
    async fn local_schema_pulls_in_remote_refs() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"properties": {"id": {"$ref": "https://schemas.example.com/id.json"}}}"#,
        )
        .unwrap();
        let fetcher = Arc::new(StubFetcher::default().with(
            "https://schemas.example.com/id.json",
            json!({"type": "string", "minLength": 2}),
        ));
        let compiler = compiler_with(Arc::clone(&fetcher));

        let identity = SchemaGraphRewriter::new(compiler.registry())
            .load(&dir.path().join("a.json"))
            .unwrap();
        compiler.fetch_dependencies(&identity).await.unwrap();
        let validator = compiler.compile_local(&identity).unwrap();

        assert!(validator.inner().is_valid(&json!({"id": "ab"})));
        assert!(!validator.inner().is_valid(&json!({"id": "a"})));
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bundled_meta_schema_is_never_fetched() {
        let fetcher = Arc::new(StubFetcher::default());
        let compiler = compiler_with(Arc::clone(&fetcher));
        compiler.registry().register(
            "file:///schema-of-schemas.json",
            json!({"$ref": "http://json-schema.org/draft-07/schema#"}),
        );

        compiler
            .fetch_dependencies("file:///schema-of-schemas.json")
            .await
            .unwrap();
        let validator = compiler
            .compile_remote("http://json-schema.org/draft-07/schema#")
            .await
            .unwrap();

        assert!(validator.inner().is_valid(&json!({"type": "object"})));
        assert!(!validator.inner().is_valid(&json!({"type": 12})));
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn collect_references_resolves_against_base() {
        let mut out = Vec::new();
        collect_references(
            &json!({
                "allOf": [
                    {"$ref": "#/definitions/x"},
                    {"$ref": "other.json#/y"},
                    {"$ref": "https://elsewhere.example.com/z.json"}
                ]
            }),
            "https://schemas.example.com/dir/a.json",
            &mut out,
        );
        assert_eq!(
            out,
            vec![
                "https://schemas.example.com/dir/other.json".to_string(),
                "https://elsewhere.example.com/z.json".to_string(),
            ]
        );
    }
}
