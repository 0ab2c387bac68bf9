//! Per-delivery processing context.
//!
//! Filled in as the delivery advances through the stages, so the failure
//! path can describe exactly what was known when something went wrong.

use serde_json::{Map, Value};

use crate::metrics::Stage;
use crate::schema::{InboundMessage, Invoice};

/// Identifiers read from a payload that failed validation.
#[derive(Debug, Clone, Default, PartialEq)]
struct Recovered {
    source_file: Option<String>,
    vendor_type: Option<String>,
    extraction_model: Option<String>,
    invoice_id: Option<String>,
}

impl Recovered {
    fn from_payload(payload: &Value) -> Self {
        let text = |value: Option<&Value>| {
            value
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let data = payload.get("extracted_data");
        Self {
            source_file: text(payload.get("source_file")),
            vendor_type: text(payload.get("vendor_type")),
            extraction_model: text(payload.get("extraction_model")),
            invoice_id: text(data.and_then(|d| d.get("invoice_id"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingContext {
    /// The stage being attempted.
    pub stage: Stage,
    pub message_id: Option<String>,
    /// The payload as received: decoded JSON when available, else text.
    pub raw_message: Value,
    pub message: Option<InboundMessage>,
    pub invoice: Option<Invoice>,
    recovered: Recovered,
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingContext {
    pub fn new() -> Self {
        Self {
            stage: Stage::Decode,
            message_id: None,
            raw_message: Value::Null,
            message: None,
            invoice: None,
            recovered: Recovered::default(),
        }
    }

    /// Record undecoded bytes.
    pub fn received(&mut self, bytes: &[u8]) {
        self.raw_message = Value::String(String::from_utf8_lossy(bytes).into_owned());
    }

    pub fn decoded(&mut self, payload: Value) {
        self.recovered = Recovered::from_payload(&payload);
        self.raw_message = payload;
        self.stage = Stage::ValidateMessage;
    }

    pub fn message_validated(&mut self, message: InboundMessage) {
        self.message = Some(message);
        self.stage = Stage::ValidateInvoice;
    }

    pub fn invoice_validated(&mut self, invoice: Invoice) {
        self.invoice = Some(invoice);
        self.stage = Stage::Persist;
    }

    pub fn source_file(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.source_file.as_str())
            .or(self.recovered.source_file.as_deref())
    }

    pub fn invoice_id(&self) -> Option<&str> {
        self.invoice
            .as_ref()
            .map(|i| i.invoice_id.as_str())
            .or(self.recovered.invoice_id.as_deref())
    }

    pub fn vendor_type(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.vendor_type.as_str())
            .or(self.recovered.vendor_type.as_deref())
    }

    pub fn extraction_model(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.extraction_model.as_str())
            .or(self.recovered.extraction_model.as_deref())
    }

    /// Confidence of a validated message only.
    pub fn confidence_score(&self) -> Option<f64> {
        self.message.as_ref().map(|m| m.confidence_score)
    }

    /// The extracted invoice object, or an empty object if none was found.
    pub fn extracted_data(&self) -> Value {
        let data = match &self.message {
            Some(message) => Some(message.extracted_data.clone()),
            None => self
                .raw_message
                .get("extracted_data")
                .and_then(Value::as_object)
                .cloned(),
        };
        Value::Object(data.unwrap_or_else(Map::new))
    }
}
