//! Remediation hints for error artifacts.

use crate::error::ProcessingError;
use crate::schema::FieldViolation;

pub const GENERIC_HINT: &str = "Manual review required - error pattern not recognized.";

/// Human-readable hints for the failure, one per recognized violation.
///
/// Falls back to a single generic hint when nothing is recognized,
/// including every non-validation failure.
pub fn remediation_hints(error: &ProcessingError) -> Vec<String> {
    let hints: Vec<String> = error
        .as_schema()
        .map(|schema| schema.violations.iter().filter_map(hint_for).collect())
        .unwrap_or_default();

    if hints.is_empty() {
        vec![GENERIC_HINT.to_string()]
    } else {
        hints
    }
}

fn hint_for(violation: &FieldViolation) -> Option<String> {
    let field = &violation.field;
    if violation.kind.is_range() {
        Some(format!(
            "Field '{field}' has numeric constraint violation. \
             Check if this is a discount/credit that should be handled differently."
        ))
    } else if violation.kind.is_missing() {
        Some(format!(
            "Required field '{field}' is missing. Review extraction prompt for this field."
        ))
    } else if violation.kind.is_type() {
        Some(format!(
            "Field '{field}' has wrong type. Check LLM output format for this field."
        ))
    } else {
        None
    }
}
