//! Extraction-quality telemetry.
//!
//! Every processing attempt appends one row to the metrics table, on success
//! and on failure. Callers treat a failed append as non-fatal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::TelemetryError;
use crate::schema::{InboundMessage, VendorType};
use crate::warehouse::{TableRef, WarehouseStore};

/// Placeholder for identifiers that were never recovered.
pub const UNKNOWN: &str = "unknown";

/// One row of the extraction-metrics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub invoice_id: String,
    pub source_file: String,
    pub vendor_type: VendorType,
    pub extraction_model: String,
    pub extraction_latency_ms: u64,
    pub confidence_score: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl MetricsRecord {
    pub fn success(message: &InboundMessage, invoice_id: &str) -> Self {
        Self {
            invoice_id: invoice_id.to_string(),
            source_file: message.source_file.clone(),
            vendor_type: message.vendor_type,
            extraction_model: message.extraction_model.clone(),
            extraction_latency_ms: message.extraction_latency_ms,
            confidence_score: message.confidence_score,
            success: true,
            error_message: None,
            recorded_at: Utc::now(),
        }
    }

    /// A failure row built from whatever context was recovered. Confidence
    /// is always zero.
    pub fn failure(
        message: Option<&InboundMessage>,
        source_file: Option<&str>,
        invoice_id: Option<&str>,
        error: impl Into<String>,
    ) -> Self {
        let source_file = source_file.or(message.map(|m| m.source_file.as_str()));
        Self {
            invoice_id: invoice_id.unwrap_or(UNKNOWN).to_string(),
            source_file: source_file.unwrap_or(UNKNOWN).to_string(),
            vendor_type: message.map_or(VendorType::Other, |m| m.vendor_type),
            extraction_model: message.map_or_else(
                || UNKNOWN.to_string(),
                |m| m.extraction_model.clone(),
            ),
            extraction_latency_ms: message.map_or(0, |m| m.extraction_latency_ms),
            confidence_score: 0.0,
            success: false,
            error_message: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }
}

/// Appends [`MetricsRecord`]s to the metrics table.
#[derive(Clone)]
pub struct TelemetryRecorder {
    store: Arc<dyn WarehouseStore>,
    table: TableRef,
    timeout: Duration,
}

impl TelemetryRecorder {
    pub fn new(store: Arc<dyn WarehouseStore>, table: TableRef, timeout: Duration) -> Self {
        Self {
            store,
            table,
            timeout,
        }
    }

    pub async fn record(&self, record: &MetricsRecord) -> Result<(), TelemetryError> {
        let table = self.table.to_string();
        match tokio::time::timeout(self.timeout, self.store.append_metrics(&self.table, record))
            .await
        {
            Ok(Ok(())) => {
                debug!(
                    invoice_id = %record.invoice_id,
                    success = record.success,
                    "Extraction metrics recorded"
                );
                Ok(())
            }
            Ok(Err(source)) => Err(TelemetryError::TelemetryAppend { table, source }),
            Err(_) => Err(TelemetryError::TelemetryTimeout {
                table,
                millis: self.timeout.as_millis(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    use crate::warehouse::{MemoryWarehouse, WarehouseOp};

    fn message() -> InboundMessage {
        InboundMessage {
            source_file: "gs://landing/doordash_INV-DD-7.pdf".to_string(),
            vendor_type: VendorType::Doordash,
            extraction_model: "gemini-2.5-pro".to_string(),
            extraction_latency_ms: 2300,
            confidence_score: 0.81,
            extracted_data: Map::new(),
        }
    }

    #[test]
    fn test_failure_defaults_without_context() {
        let record = MetricsRecord::failure(None, None, None, "boom");

        assert_eq!(record.invoice_id, "unknown");
        assert_eq!(record.source_file, "unknown");
        assert_eq!(record.vendor_type, VendorType::Other);
        assert_eq!(record.extraction_model, "unknown");
        assert_eq!(record.extraction_latency_ms, 0);
        assert_eq!(record.confidence_score, 0.0);
        assert!(!record.success);
        assert_eq!(record.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_failure_zeroes_confidence_with_context() {
        let record =
            MetricsRecord::failure(Some(&message()), None, Some("INV-DD-7"), "write failed");

        assert_eq!(record.invoice_id, "INV-DD-7");
        assert_eq!(record.source_file, "gs://landing/doordash_INV-DD-7.pdf");
        assert_eq!(record.vendor_type, VendorType::Doordash);
        assert_eq!(record.extraction_latency_ms, 2300);
        assert_eq!(record.confidence_score, 0.0);
    }

    #[test]
    fn test_success_keeps_confidence() {
        let record = MetricsRecord::success(&message(), "INV-DD-7");
        assert!(record.success);
        assert_eq!(record.source_file, "gs://landing/doordash_INV-DD-7.pdf");
        assert_eq!(record.confidence_score, 0.81);
        assert!(record.error_message.is_none());
    }

    #[tokio::test]
    async fn test_record_errors_are_returned() {
        let store = Arc::new(MemoryWarehouse::new());
        let table = TableRef::new("finance", "extraction_metrics");
        let recorder = TelemetryRecorder::new(store.clone(), table.clone(), Duration::from_secs(1));

        let record = MetricsRecord::failure(None, None, None, "boom");
        recorder.record(&record).await.unwrap();

        store.fail(WarehouseOp::AppendMetrics).await;
        let err = recorder.record(&record).await.unwrap_err();
        assert!(matches!(err, TelemetryError::TelemetryAppend { .. }));
        assert_eq!(store.metrics(&table).await.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_reported_in_millis() {
        let store = Arc::new(MemoryWarehouse::new());
        store.set_delay(Duration::from_millis(300)).await;
        let table = TableRef::new("finance", "extraction_metrics");
        let recorder = TelemetryRecorder::new(store, table, Duration::from_millis(50));

        let err = recorder
            .record(&MetricsRecord::failure(None, None, None, "boom"))
            .await
            .unwrap_err();

        assert!(matches!(err, TelemetryError::TelemetryTimeout { millis: 50, .. }));
        assert!(err.to_string().ends_with("timed out after 50ms"));
    }
}
