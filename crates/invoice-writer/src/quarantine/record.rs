//! Error artifact written to quarantine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::hints::remediation_hints;
use crate::error::ProcessingError;
use crate::metrics::Stage;
use crate::pipeline::ProcessingContext;
use crate::schema::FieldViolation;
use crate::telemetry::UNKNOWN;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub error_metadata: ErrorMetadata,
    pub invoice_context: InvoiceContext,
    pub extracted_data: Value,
    pub raw_message: Value,
    pub remediation_hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMetadata {
    pub timestamp: DateTime<Utc>,
    pub failed_stage: Stage,
    pub error_type: &'static str,
    pub error_message: String,
    pub is_validation_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_details: Option<ValidationDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetails {
    pub error_count: usize,
    pub errors: Vec<FieldViolation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceContext {
    pub invoice_id: String,
    pub vendor_type: String,
    pub source_file: String,
    pub extraction_model: String,
    pub confidence_score: f64,
}

impl ErrorRecord {
    pub fn new(ctx: &ProcessingContext, error: &ProcessingError, timestamp: DateTime<Utc>) -> Self {
        let validation_details = error.as_schema().map(|schema| ValidationDetails {
            error_count: schema.error_count(),
            errors: schema.violations.clone(),
        });

        let known = |value: Option<&str>| value.unwrap_or(UNKNOWN).to_string();

        Self {
            error_metadata: ErrorMetadata {
                timestamp,
                failed_stage: ctx.stage,
                error_type: error.error_type(),
                error_message: error.to_string(),
                is_validation_error: validation_details.is_some(),
                validation_details,
            },
            invoice_context: InvoiceContext {
                invoice_id: known(ctx.invoice_id()),
                vendor_type: known(ctx.vendor_type()),
                source_file: known(ctx.source_file()),
                extraction_model: known(ctx.extraction_model()),
                confidence_score: ctx.confidence_score().unwrap_or(0.0),
            },
            extracted_data: ctx.extracted_data(),
            raw_message: ctx.raw_message.clone(),
            remediation_hints: remediation_hints(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::config::ValidationConfig;
    use crate::error::PersistenceError;
    use crate::schema::{validate_invoice, validate_message};

    #[test]
    fn test_validation_failure_record() {
        let payload = json!({
            "source_file": "gs://landing/grubhub_scan.pdf",
            "vendor_type": "grubhub",
            "extraction_model": "gemini",
            "extraction_latency_ms": 100,
            "confidence_score": 0.7,
            "extracted_data": {"vendor_type": "grubhub", "total_amount": "5.00"}
        });
        let mut ctx = ProcessingContext::new();
        ctx.decoded(payload.clone());
        let message = validate_message(&payload).unwrap();
        let err = validate_invoice(&message.extracted_data, &ValidationConfig::default())
            .unwrap_err();
        ctx.message_validated(message);

        let record = ErrorRecord::new(&ctx, &err.into(), Utc::now());
        let value = serde_json::to_value(&record).unwrap();

        let meta = &value["error_metadata"];
        assert_eq!(meta["failed_stage"], "validate_invoice");
        assert_eq!(meta["error_type"], "SchemaError");
        assert_eq!(meta["is_validation_error"], true);
        assert_eq!(meta["validation_details"]["error_count"], 1);
        assert_eq!(meta["validation_details"]["errors"][0]["field"], "invoice_id");
        assert_eq!(meta["validation_details"]["errors"][0]["type"], "missing");

        assert_eq!(value["invoice_context"]["invoice_id"], "unknown");
        assert_eq!(value["invoice_context"]["vendor_type"], "grubhub");
        assert_eq!(value["invoice_context"]["confidence_score"], 0.7);
        assert_eq!(value["extracted_data"]["total_amount"], "5.00");
        assert_eq!(value["raw_message"], payload);
        assert_eq!(value["remediation_hints"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_non_validation_record_omits_details() {
        let mut ctx = ProcessingContext::new();
        ctx.received(b"garbage");
        let error: ProcessingError = PersistenceError::WriteFailed {
            invoice_id: "INV-1".to_string(),
            message: "exists failed: unavailable".to_string(),
        }
        .into();

        let value = serde_json::to_value(ErrorRecord::new(&ctx, &error, Utc::now())).unwrap();

        assert_eq!(value["error_metadata"]["is_validation_error"], false);
        assert!(value["error_metadata"].get("validation_details").is_none());
        assert_eq!(value["invoice_context"]["source_file"], "unknown");
        assert_eq!(value["invoice_context"]["confidence_score"], 0.0);
        assert_eq!(value["raw_message"], "garbage");
        assert_eq!(value["extracted_data"], json!({}));
    }
}
