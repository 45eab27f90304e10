//! Document validation against compiled validators.

use serde_json::Value;

use crate::compiler::CompiledValidator;
use crate::error::Violation;
use crate::types::ValidationResult;

/// Location reported for violations of the document as a whole.
pub const ROOT_LOCATION: &str = "/";

/// Validate a document against a compiled validator.
///
/// Every violation is collected, in the order the validator evaluates its
/// keywords. The same document and validator always give the same result.
pub fn validate(document: &Value, validator: &CompiledValidator) -> ValidationResult {
    let errors = validator
        .inner()
        .iter_errors(document)
        .map(|e| {
            let location = e.instance_path.to_string();
            Violation {
                location: if location.is_empty() {
                    ROOT_LOCATION.to_string()
                } else {
                    location
                },
                message: e.to_string(),
            }
        })
        .collect();

    ValidationResult::from_errors(errors)
}
