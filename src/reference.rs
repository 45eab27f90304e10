//! Reference classification and canonical identities.
//!
//! A reference is split into a path part and an optional fragment on its
//! first `#`. The path part decides where the schema lives; the fragment
//! points inside it and is carried along unchanged.

use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use crate::types::ID_KEY;

/// Where a schema reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaLocation {
    /// An existing file, resolved relative to the referencing document.
    Local {
        path: PathBuf,
        fragment: Option<String>,
    },
    /// An http(s) URI, kept verbatim.
    Remote { uri: String },
    /// Neither an existing file nor a network URI.
    Unresolved { reference: String },
}

/// Classify `reference` relative to `base_dir`, the directory of the
/// document that contains it.
///
/// The only I/O is an existence check; an unresolved reference is a normal
/// outcome, not an error.
pub fn classify(reference: &str, base_dir: &Path) -> SchemaLocation {
    if is_url(reference) {
        return SchemaLocation::Remote {
            uri: reference.to_string(),
        };
    }

    let (path_part, fragment) = split_reference(reference);
    if !path_part.is_empty() {
        let resolved = base_dir.join(path_part);
        if resolved.exists() {
            return SchemaLocation::Local {
                path: canonical_path(&resolved),
                fragment: fragment.map(str::to_string),
            };
        }
    }

    SchemaLocation::Unresolved {
        reference: reference.to_string(),
    }
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Meta-schemas bundled with the validator engine; never fetched.
const BUNDLED_META_SCHEMAS: &[&str] = &[
    "http://json-schema.org/draft-04/schema",
    "http://json-schema.org/draft-06/schema",
    "http://json-schema.org/draft-07/schema",
    "https://json-schema.org/draft/2019-09/schema",
    "https://json-schema.org/draft/2020-12/schema",
];

/// Vocabulary meta-schema prefixes of the newer drafts, also bundled.
const BUNDLED_META_PREFIXES: &[&str] = &[
    "https://json-schema.org/draft/2019-09/meta/",
    "https://json-schema.org/draft/2020-12/meta/",
];

/// Check if a URI names a standard meta-schema the validator already ships.
pub fn is_bundled_meta_schema(uri: &str) -> bool {
    let (document, _) = split_reference(uri);
    BUNDLED_META_SCHEMAS.contains(&document)
        || BUNDLED_META_PREFIXES
            .iter()
            .any(|prefix| document.starts_with(prefix))
}

/// Check if a string is an absolute URI with a real scheme.
///
/// Single-letter schemes are rejected so Windows drive paths (`C:/x`) are
/// not mistaken for URIs.
pub fn is_absolute_uri(s: &str) -> bool {
    Url::parse(s)
        .map(|url| url.scheme().len() > 1)
        .unwrap_or(false)
}

/// Split a reference into its path part and non-empty fragment.
pub fn split_reference(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('#') {
        Some((path, fragment)) if !fragment.is_empty() => (path, Some(fragment)),
        Some((path, _)) => (path, None),
        None => (reference, None),
    }
}

/// Append `#fragment` to an identity when a fragment is present.
pub fn with_fragment(identity: &str, fragment: Option<&str>) -> String {
    match fragment {
        Some(fragment) => format!("{identity}#{fragment}"),
        None => identity.to_string(),
    }
}

/// The identity a schema declares for itself via `$id`.
///
/// Only absolute URIs count; a trailing empty fragment is dropped.
pub fn declared_identity(schema: &Value) -> Option<String> {
    let id = schema.get(ID_KEY)?.as_str()?;
    let id = id.strip_suffix('#').unwrap_or(id);
    is_absolute_uri(id).then(|| id.to_string())
}

/// The identity of a schema file that declares none: the `file://` URI of
/// its canonical path.
pub fn file_identity(path: &Path) -> String {
    let path = canonical_path(path);
    Url::from_file_path(&path)
        .map(|url| url.to_string())
        .unwrap_or_else(|()| path.display().to_string())
}

/// Canonicalize a path, falling back to the path itself.
pub fn canonical_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Resolve `reference` against the absolute URI `base`.
pub fn resolve_uri(base: &str, reference: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(reference).ok().map(|url| url.to_string())
}
