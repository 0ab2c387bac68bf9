//! Structural validation of inbound messages and invoices.
//!
//! Validation walks the JSON document once and collects every violated
//! field instead of stopping at the first one, so a single error artifact
//! explains everything wrong with an extraction.

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::LazyLock;

use super::types::{DEFAULT_CURRENCY, InboundMessage, Invoice, LineItem, VendorType};
use super::violation::{
    Bound, ExpectedType, FieldViolation, ROOT_FIELD, SchemaModel, ViolationKind,
};
use crate::config::ValidationConfig;
use crate::error::SchemaError;

static CURRENCY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").expect("valid regex"));

/// Validate a decoded payload against the inbound message schema.
pub fn validate_message(raw: &Value) -> Result<InboundMessage, SchemaError> {
    let Some(object) = raw.as_object() else {
        return Err(root_error(SchemaModel::Message, raw));
    };
    let mut fields = Fields::new(object);

    let source_file = fields.non_empty_string("source_file");
    let vendor_type = fields.vendor("vendor_type");
    let extraction_model = fields.non_empty_string("extraction_model");
    let extraction_latency_ms = fields.non_negative_int("extraction_latency_ms");
    let confidence_score = fields.unit_interval("confidence_score");
    let extracted_data = fields.object("extracted_data");

    let built = (|| {
        Some(InboundMessage {
            source_file: source_file?.to_string(),
            vendor_type: vendor_type?,
            extraction_model: extraction_model?.to_string(),
            extraction_latency_ms: extraction_latency_ms?,
            confidence_score: confidence_score?,
            extracted_data: extracted_data?.clone(),
        })
    })();
    fields.finish(SchemaModel::Message, built)
}

/// Validate the `extracted_data` of a message against the invoice schema.
pub fn validate_invoice(
    data: &Map<String, Value>,
    rules: &ValidationConfig,
) -> Result<Invoice, SchemaError> {
    let mut fields = Fields::new(data);

    let invoice_id = fields.non_empty_string("invoice_id");
    let vendor_type = fields.vendor("vendor_type");
    let invoice_date = fields.optional_date("invoice_date");
    let currency = fields.optional_currency("currency");
    let subtotal = fields.optional_non_negative_decimal("subtotal");
    let tax_amount = fields.optional_non_negative_decimal("tax_amount");
    let total_amount = fields.decimal("total_amount");
    let line_items = fields.line_items("line_items");

    // Negative totals are credit memos, only accepted for configured vendors.
    if let Some(total) = total_amount
        && total.is_sign_negative()
        && !total.is_zero()
        && !vendor_type.is_some_and(|v| rules.allows_credit(v))
    {
        fields.flag(
            "total_amount",
            ViolationKind::OutOfRange(Bound::GreaterThanEqual("0".to_string())),
            data.get("total_amount"),
        );
    }

    let built = (|| {
        Some(Invoice {
            invoice_id: invoice_id?.to_string(),
            vendor_type: vendor_type?,
            invoice_date,
            currency: currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            subtotal,
            tax_amount,
            total_amount: total_amount?,
            line_items,
        })
    })();
    fields.finish(SchemaModel::Invoice, built)
}

fn root_error(model: SchemaModel, raw: &Value) -> SchemaError {
    SchemaError::new(
        model,
        vec![FieldViolation::new(
            ROOT_FIELD,
            ViolationKind::WrongType(ExpectedType::Object),
            Some(raw),
        )],
    )
}

/// Typed reader over a JSON object that records violations as it goes.
struct Fields<'a> {
    object: &'a Map<String, Value>,
    violations: Vec<FieldViolation>,
}

impl<'a> Fields<'a> {
    fn new(object: &'a Map<String, Value>) -> Self {
        Self {
            object,
            violations: Vec::new(),
        }
    }

    fn flag(&mut self, field: &str, kind: ViolationKind, input: Option<&Value>) {
        self.violations.push(FieldViolation::new(field, kind, input));
    }

    fn required(&mut self, field: &str) -> Option<&'a Value> {
        let value = self.object.get(field);
        if value.is_none() {
            self.flag(field, ViolationKind::Missing, None);
        }
        value
    }

    /// Absent and `null` both read as "not provided".
    fn optional(&self, field: &str) -> Option<&'a Value> {
        self.object.get(field).filter(|v| !v.is_null())
    }

    fn string(&mut self, field: &str) -> Option<&'a str> {
        let value = self.required(field)?;
        self.as_string(field, value)
    }

    fn as_string(&mut self, field: &str, value: &'a Value) -> Option<&'a str> {
        let s = value.as_str();
        if s.is_none() {
            self.flag(field, ViolationKind::WrongType(ExpectedType::String), Some(value));
        }
        s
    }

    fn non_empty_string(&mut self, field: &str) -> Option<&'a str> {
        let s = self.string(field)?;
        if s.trim().is_empty() {
            let input = self.object.get(field);
            self.flag(field, ViolationKind::TooShort, input);
            return None;
        }
        Some(s)
    }

    fn vendor(&mut self, field: &str) -> Option<VendorType> {
        let s = self.string(field)?;
        let vendor = VendorType::parse(s);
        if vendor.is_none() {
            let input = self.object.get(field);
            self.flag(field, ViolationKind::InvalidChoice, input);
        }
        vendor
    }

    fn non_negative_int(&mut self, field: &str) -> Option<u64> {
        let value = self.required(field)?;
        let Value::Number(n) = value else {
            self.flag(field, ViolationKind::WrongType(ExpectedType::Integer), Some(value));
            return None;
        };

        if let Some(u) = n.as_u64() {
            return Some(u);
        }
        let f = n.as_f64().unwrap_or(f64::NAN);
        if f < 0.0 {
            self.flag(
                field,
                ViolationKind::OutOfRange(Bound::GreaterThanEqual("0".to_string())),
                Some(value),
            );
            return None;
        }
        if f.fract() == 0.0 && f <= u64::MAX as f64 {
            return Some(f as u64);
        }
        self.flag(field, ViolationKind::WrongType(ExpectedType::Integer), Some(value));
        None
    }

    fn unit_interval(&mut self, field: &str) -> Option<f64> {
        let value = self.required(field)?;
        let Some(f) = value.as_f64() else {
            self.flag(field, ViolationKind::WrongType(ExpectedType::Float), Some(value));
            return None;
        };

        let bound = if f < 0.0 {
            Some(Bound::GreaterThanEqual("0".to_string()))
        } else if f > 1.0 {
            Some(Bound::LessThanEqual("1".to_string()))
        } else {
            None
        };
        match bound {
            Some(bound) => {
                self.flag(field, ViolationKind::OutOfRange(bound), Some(value));
                None
            }
            None => Some(f),
        }
    }

    fn object(&mut self, field: &str) -> Option<&'a Map<String, Value>> {
        let value = self.required(field)?;
        let object = value.as_object();
        if object.is_none() {
            self.flag(field, ViolationKind::WrongType(ExpectedType::Object), Some(value));
        }
        object
    }

    fn decimal(&mut self, field: &str) -> Option<Decimal> {
        let value = self.required(field)?;
        self.as_decimal(field, value)
    }

    fn as_decimal(&mut self, field: &str, value: &'a Value) -> Option<Decimal> {
        let text = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => {
                self.flag(field, ViolationKind::WrongType(ExpectedType::Decimal), Some(value));
                return None;
            }
        };
        let parsed = parse_decimal(&text);
        if parsed.is_none() {
            self.flag(field, ViolationKind::InvalidDecimal, Some(value));
        }
        parsed
    }

    fn optional_non_negative_decimal(&mut self, field: &str) -> Option<Decimal> {
        let value = self.optional(field)?;
        let amount = self.as_decimal(field, value)?;
        if amount.is_sign_negative() && !amount.is_zero() {
            self.flag(
                field,
                ViolationKind::OutOfRange(Bound::GreaterThanEqual("0".to_string())),
                Some(value),
            );
            return None;
        }
        Some(amount)
    }

    fn optional_date(&mut self, field: &str) -> Option<NaiveDate> {
        let value = self.optional(field)?;
        let s = self.as_string(field, value)?;
        let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok();
        if date.is_none() {
            self.flag(field, ViolationKind::InvalidDate, Some(value));
        }
        date
    }

    fn optional_currency(&mut self, field: &str) -> Option<String> {
        let value = self.optional(field)?;
        let s = self.as_string(field, value)?;
        if !CURRENCY_PATTERN.is_match(s) {
            self.flag(field, ViolationKind::PatternMismatch, Some(value));
            return None;
        }
        Some(s.to_string())
    }

    fn line_items(&mut self, field: &str) -> Vec<LineItem> {
        let Some(value) = self.optional(field) else {
            return Vec::new();
        };
        let Some(items) = value.as_array() else {
            self.flag(field, ViolationKind::WrongType(ExpectedType::List), Some(value));
            return Vec::new();
        };

        let mut line_items = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            match item.as_object() {
                Some(object) => line_items.push(LineItem(object.clone())),
                None => self.flag(
                    &format!("{field}.{idx}"),
                    ViolationKind::WrongType(ExpectedType::Object),
                    Some(item),
                ),
            }
        }
        line_items
    }

    fn finish<T>(self, model: SchemaModel, built: Option<T>) -> Result<T, SchemaError> {
        match built {
            Some(value) if self.violations.is_empty() => Ok(value),
            _ => Err(SchemaError::new(model, self.violations)),
        }
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}
