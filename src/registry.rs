//! Run-scoped schema cache keyed by canonical identity.
//!
//! Holds every schema document discovered during a run, the file paths they
//! were loaded from, and the validators compiled from them. Entries are never
//! evicted. Registration is insert-if-absent and compilation happens under
//! the validator lock, so each identity is registered once and compiled at
//! most once even when files are processed in parallel.
//!
//! A local schema graph is registered in two steps: the raw document first,
//! as a cycle breaker, then its rewritten form. Graph loads hold the loading
//! lock for their whole duration, so no other caller ever sees an identity
//! whose document is still raw.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde_json::Value;

use crate::compiler::CompiledValidator;
use crate::error::CompileError;

type CompileOutcome = Result<Arc<CompiledValidator>, (String, String)>;

#[derive(Default)]
pub struct SchemaRegistry {
    documents: RwLock<HashMap<String, Arc<Value>>>,
    paths: RwLock<HashMap<PathBuf, String>>,
    validators: Mutex<HashMap<String, CompileOutcome>>,
    loading: Mutex<()>,
    compilations: AtomicUsize,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under `identity`.
    ///
    /// Returns false, leaving the existing entry untouched, if the identity
    /// is already present.
    pub fn register(&self, identity: &str, document: Value) -> bool {
        let mut documents = self.documents.write();
        if documents.contains_key(identity) {
            return false;
        }
        documents.insert(identity.to_string(), Arc::new(document));
        tracing::debug!(identity, "registered schema");
        true
    }

    /// Replace the document registered under `identity` with its rewritten
    /// form. Only the caller whose `register` succeeded should do this.
    pub(crate) fn complete(&self, identity: &str, document: Value) {
        self.documents
            .write()
            .insert(identity.to_string(), Arc::new(document));
    }

    /// Exclusive access for loading and rewriting a local schema graph.
    pub(crate) fn lock_loading(&self) -> MutexGuard<'_, ()> {
        self.loading.lock()
    }

    /// Drop an entry whose dependencies could not be loaded.
    pub(crate) fn forget(&self, identity: &str) {
        self.documents.write().remove(identity);
        self.paths.write().retain(|_, known| known != identity);
    }

    pub fn has(&self, identity: &str) -> bool {
        self.documents.read().contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<Arc<Value>> {
        self.documents.read().get(identity).cloned()
    }

    /// Remember that the file at `path` is registered under `identity`.
    pub(crate) fn alias_path(&self, path: &Path, identity: &str) {
        self.paths
            .write()
            .entry(path.to_path_buf())
            .or_insert_with(|| identity.to_string());
    }

    /// Identity of an already loaded file, so it is never parsed twice.
    pub fn identity_for_path(&self, path: &Path) -> Option<String> {
        self.paths.read().get(path).cloned()
    }

    /// Number of registered schema documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of compilations performed so far, failed ones included.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Return the validator compiled for `key`, running `compile` only if no
    /// attempt has been made yet. Failures are cached as well.
    pub fn get_or_compile<F>(
        &self,
        key: &str,
        compile: F,
    ) -> Result<Arc<CompiledValidator>, CompileError>
    where
        F: FnOnce() -> Result<CompiledValidator, CompileError>,
    {
        let mut validators = self.validators.lock();
        let outcome = match validators.get(key) {
            Some(outcome) => outcome.clone(),
            None => {
                self.compilations.fetch_add(1, Ordering::Relaxed);
                let outcome = compile().map(Arc::new).map_err(|e| match e {
                    CompileError::Invalid { identity, message } => (identity, message),
                    other => (key.to_string(), other.to_string()),
                });
                validators.insert(key.to_string(), outcome.clone());
                outcome
            }
        };
        outcome.map_err(|(identity, message)| CompileError::Invalid { identity, message })
    }
}
