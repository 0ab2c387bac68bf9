//! Field-level validation failures.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Maximum characters of the offending input kept in a violation.
pub const MAX_INPUT_CHARS: usize = 200;

/// Field name used when the whole document has the wrong shape.
pub const ROOT_FIELD: &str = "(root)";

/// Which schema a violation was raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaModel {
    /// The inbound message envelope.
    Message,
    /// The invoice embedded in `extracted_data`.
    Invoice,
}

impl SchemaModel {
    pub fn title(&self) -> &'static str {
        match self {
            SchemaModel::Message => "InboundMessage",
            SchemaModel::Invoice => "Invoice",
        }
    }
}

/// The JSON type a field was expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
    String,
    Integer,
    Float,
    Decimal,
    List,
    Object,
}

/// Numeric bound that was violated, rendered as in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    GreaterThanEqual(String),
    LessThanEqual(String),
}

/// What went wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    Missing,
    WrongType(ExpectedType),
    OutOfRange(Bound),
    TooShort,
    InvalidChoice,
    InvalidDate,
    InvalidDecimal,
    PatternMismatch,
}

impl ViolationKind {
    /// Stable machine-readable code, written into error artifacts.
    pub fn code(&self) -> &'static str {
        match self {
            ViolationKind::Missing => "missing",
            ViolationKind::WrongType(ExpectedType::String) => "string_type",
            ViolationKind::WrongType(ExpectedType::Integer) => "int_type",
            ViolationKind::WrongType(ExpectedType::Float) => "float_type",
            ViolationKind::WrongType(ExpectedType::Decimal) => "decimal_type",
            ViolationKind::WrongType(ExpectedType::List) => "list_type",
            ViolationKind::WrongType(ExpectedType::Object) => "dict_type",
            ViolationKind::OutOfRange(Bound::GreaterThanEqual(_)) => "greater_than_equal",
            ViolationKind::OutOfRange(Bound::LessThanEqual(_)) => "less_than_equal",
            ViolationKind::TooShort => "string_too_short",
            ViolationKind::InvalidChoice => "enum",
            ViolationKind::InvalidDate => "date_parsing",
            ViolationKind::InvalidDecimal => "decimal_parsing",
            ViolationKind::PatternMismatch => "string_pattern_mismatch",
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, ViolationKind::OutOfRange(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ViolationKind::Missing)
    }

    pub fn is_type(&self) -> bool {
        matches!(self, ViolationKind::WrongType(_))
    }
}

/// A single violated field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Dotted path of the field, e.g. `line_items.2`.
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
    /// The offending input, truncated to [`MAX_INPUT_CHARS`].
    pub input: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, kind: ViolationKind, input: Option<&Value>) -> Self {
        let message = describe(&kind);
        Self {
            field: field.into(),
            kind,
            message,
            input: render_input(input),
        }
    }
}

impl Serialize for FieldViolation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FieldViolation", 4)?;
        state.serialize_field("field", &self.field)?;
        state.serialize_field("type", self.kind.code())?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("input", &self.input)?;
        state.end()
    }
}

fn describe(kind: &ViolationKind) -> String {
    match kind {
        ViolationKind::Missing => "Field required".to_string(),
        ViolationKind::WrongType(expected) => {
            let name = match expected {
                ExpectedType::String => "a valid string",
                ExpectedType::Integer => "a valid integer",
                ExpectedType::Float => "a valid number",
                ExpectedType::Decimal => "a valid decimal",
                ExpectedType::List => "a valid list",
                ExpectedType::Object => "a valid dictionary",
            };
            format!("Input should be {name}")
        }
        ViolationKind::OutOfRange(Bound::GreaterThanEqual(limit)) => {
            format!("Input should be greater than or equal to {limit}")
        }
        ViolationKind::OutOfRange(Bound::LessThanEqual(limit)) => {
            format!("Input should be less than or equal to {limit}")
        }
        ViolationKind::TooShort => "String should have at least 1 character".to_string(),
        ViolationKind::InvalidChoice => "Input should be a known vendor type".to_string(),
        ViolationKind::InvalidDate => "Input should be a date in YYYY-MM-DD format".to_string(),
        ViolationKind::InvalidDecimal => "Input should be a valid decimal number".to_string(),
        ViolationKind::PatternMismatch => {
            "Input should be a three-letter upper-case currency code".to_string()
        }
    }
}

fn render_input(input: Option<&Value>) -> String {
    let text = match input {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    truncate_chars(&text, MAX_INPUT_CHARS)
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_with_type_code() {
        let violation = FieldViolation::new("invoice_id", ViolationKind::Missing, None);
        let value = serde_json::to_value(&violation).unwrap();

        assert_eq!(
            value,
            json!({
                "field": "invoice_id",
                "type": "missing",
                "message": "Field required",
                "input": "",
            })
        );
    }

    #[test]
    fn test_input_truncated() {
        let long = Value::String("é".repeat(500));
        let violation = FieldViolation::new(
            "source_file",
            ViolationKind::WrongType(ExpectedType::Integer),
            Some(&long),
        );
        assert_eq!(violation.input.chars().count(), MAX_INPUT_CHARS);
    }

    #[test]
    fn test_range_message_names_limit() {
        let violation = FieldViolation::new(
            "confidence_score",
            ViolationKind::OutOfRange(Bound::LessThanEqual("1".to_string())),
            Some(&json!(1.5)),
        );
        assert_eq!(violation.kind.code(), "less_than_equal");
        assert_eq!(violation.message, "Input should be less than or equal to 1");
        assert_eq!(violation.input, "1.5");
    }
}
