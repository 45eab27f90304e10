//! Candidate document discovery via include/exclude glob patterns.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::RunError;

/// Default include pattern when none is configured.
pub const DEFAULT_PATTERN: &str = "**/*.denna-spec.json";

/// Find the regular files under `root` matching any of `patterns` and none of
/// `exclude`.
///
/// Patterns are relative to `root` unless absolute; exclude patterns are
/// matched against the path relative to `root`. Results keep discovery order
/// and each file appears once even when several patterns match it.
///
/// # Errors
///
/// Returns `RunError::Pattern` if any pattern is not a valid glob.
pub fn discover(
    root: &Path,
    patterns: &[String],
    exclude: &[String],
) -> Result<Vec<PathBuf>, RunError> {
    let exclude = exclude
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| RunError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::new()
    };

    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for pattern in patterns {
        let full_pattern = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            format!(
                "{}/{}",
                Pattern::escape(&root.to_string_lossy()),
                pattern
            )
        };

        let entries = glob::glob_with(&full_pattern, options).map_err(|source| {
            RunError::Pattern {
                pattern: pattern.clone(),
                source,
            }
        })?;

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable path");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(&path);
            if exclude
                .iter()
                .any(|pattern| pattern.matches_path_with(relative, options))
            {
                tracing::debug!(path = %relative.display(), "excluded");
                continue;
            }
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    tracing::info!(count = files.len(), "discovered documents");
    Ok(files)
}
