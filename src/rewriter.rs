//! Canonicalization of local `$ref` values across a schema graph.
//!
//! Walks a schema tree and rewrites every `$ref` whose path part names an
//! existing file into that file's canonical identity, keeping any fragment.
//! Each referenced file is loaded, registered and rewritten in turn, so the
//! whole local graph ends up in the registry with absolute references only.
//!
//! A schema is registered before its own references are followed. When the
//! walk comes back to it through a cycle, the registry already knows it and
//! the walk stops there.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::CompileError;
use crate::loader::load_document;
use crate::reference::{
    canonical_path, declared_identity, file_identity, is_absolute_uri, split_reference,
    with_fragment,
};
use crate::registry::SchemaRegistry;
use crate::types::REF_KEY;

pub struct SchemaGraphRewriter<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> SchemaGraphRewriter<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Load the schema file at `path` together with every local schema it
    /// references, and return the identity it is registered under.
    ///
    /// A file already loaded in this run is not read again. Concurrent
    /// callers wait until the graph being loaded is fully rewritten.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::Load` if this file or any file it references
    /// cannot be read or parsed.
    pub fn load(&self, path: &Path) -> Result<String, CompileError> {
        let _loading = self.registry.lock_loading();
        self.load_graph(path)
    }

    /// Rewrite every local `$ref` in `node`, resolving relative paths
    /// against `base_dir`.
    ///
    /// References that are fragment-only, already absolute URIs, or name a
    /// file that does not exist are left unchanged; a dangling reference only
    /// fails the validation branches that reach it.
    pub fn rewrite(&self, node: &Value, base_dir: &Path) -> Result<Value, CompileError> {
        let _loading = self.registry.lock_loading();
        self.rewrite_node(node, base_dir)
    }

    fn load_graph(&self, path: &Path) -> Result<String, CompileError> {
        let path = canonical_path(path);
        if let Some(identity) = self.registry.identity_for_path(&path) {
            return Ok(identity);
        }

        let document = load_document(&path)?;
        let identity = declared_identity(&document).unwrap_or_else(|| file_identity(&path));
        self.registry.alias_path(&path, &identity);

        if self.registry.register(&identity, document.clone()) {
            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            match self.rewrite_node(&document, base_dir) {
                Ok(rewritten) => self.registry.complete(&identity, rewritten),
                Err(e) => {
                    self.registry.forget(&identity);
                    return Err(e);
                }
            }
        }
        Ok(identity)
    }

    fn rewrite_node(&self, node: &Value, base_dir: &Path) -> Result<Value, CompileError> {
        match node {
            Value::Object(map) => self.rewrite_object(map, base_dir),
            Value::Array(items) => items
                .iter()
                .map(|item| self.rewrite_node(item, base_dir))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            scalar => Ok(scalar.clone()),
        }
    }

    fn rewrite_object(
        &self,
        map: &Map<String, Value>,
        base_dir: &Path,
    ) -> Result<Value, CompileError> {
        let mut result = Map::with_capacity(map.len());
        for (key, value) in map {
            let value = match value {
                Value::String(reference) if key == REF_KEY => {
                    match self.rewrite_reference(reference, base_dir)? {
                        Some(canonical) => Value::String(canonical),
                        None => value.clone(),
                    }
                }
                _ => self.rewrite_node(value, base_dir)?,
            };
            result.insert(key.clone(), value);
        }
        Ok(Value::Object(result))
    }

    /// Canonical form of one reference, or `None` to keep it as written.
    fn rewrite_reference(
        &self,
        reference: &str,
        base_dir: &Path,
    ) -> Result<Option<String>, CompileError> {
        let (path_part, fragment) = split_reference(reference);
        if path_part.is_empty() || is_absolute_uri(path_part) {
            return Ok(None);
        }

        let target = base_dir.join(path_part);
        if !target.exists() {
            tracing::debug!(reference, base = %base_dir.display(), "leaving dangling reference");
            return Ok(None);
        }

        let identity = self.load_graph(&target)?;
        Ok(Some(with_fragment(&identity, fragment)))
    }
}
