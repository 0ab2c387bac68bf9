//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use base64::Engine;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use invoice_writer::config::ValidationConfig;
use invoice_writer::persist::Persister;
use invoice_writer::quarantine::{FailureCapture, MemoryQuarantine};
use invoice_writer::telemetry::TelemetryRecorder;
use invoice_writer::warehouse::{MemoryWarehouse, TableRef, WarehouseTables};
use invoice_writer::{Config, Processor};

pub fn tables() -> WarehouseTables {
    WarehouseTables {
        invoices: TableRef::new("finance", "invoices"),
        line_items: TableRef::new("finance", "invoice_line_items"),
        metrics: TableRef::new("finance", "extraction_metrics"),
    }
}

/// A valid message for `invoice_id` with `items` line items.
pub fn message(invoice_id: &str, items: usize) -> Value {
    let line_items: Vec<Value> = (1..=items)
        .map(|n| json!({"description": format!("Item {n}"), "quantity": n, "amount": "4.25"}))
        .collect();
    json!({
        "source_file": format!("gs://invoices-landing/ubereats_{invoice_id}_page1.pdf"),
        "vendor_type": "ubereats",
        "extraction_model": "gemini-2.5-flash",
        "extraction_latency_ms": 1840,
        "confidence_score": 0.93,
        "extracted_data": {
            "invoice_id": invoice_id,
            "vendor_type": "ubereats",
            "invoice_date": "2025-03-14",
            "currency": "USD",
            "subtotal": "38.00",
            "tax_amount": "4.50",
            "total_amount": "42.50",
            "line_items": line_items
        }
    })
}

/// Wrap a payload in a push envelope.
pub fn push_body(payload: &Value) -> Vec<u8> {
    let data = base64::engine::general_purpose::STANDARD.encode(payload.to_string());
    json!({
        "message": {"data": data, "messageId": "4242", "attributes": {}},
        "subscription": "projects/acme/subscriptions/invoice-writer"
    })
    .to_string()
    .into_bytes()
}

/// A processor over in-memory stores.
pub struct Harness {
    pub processor: Processor,
    pub warehouse: Arc<MemoryWarehouse>,
    pub quarantine: Arc<MemoryQuarantine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(ValidationConfig::default(), Duration::from_secs(5))
    }

    pub fn with(rules: ValidationConfig, timeout: Duration) -> Self {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let quarantine = Arc::new(MemoryQuarantine::new());
        let processor = Processor::new(
            rules,
            Persister::new(warehouse.clone(), tables(), timeout),
            TelemetryRecorder::new(warehouse.clone(), tables().metrics, timeout),
            FailureCapture::new(quarantine.clone(), timeout),
        );
        Self {
            processor,
            warehouse,
            quarantine,
        }
    }

    /// The only quarantine artifact, parsed.
    pub async fn single_artifact(&self) -> (String, Value) {
        let keys = self.quarantine.keys().await;
        assert_eq!(keys.len(), 1, "expected one artifact, found {keys:?}");
        let body = self.quarantine.get(&keys[0]).await.unwrap();
        (keys[0].clone(), serde_json::from_slice(&body).unwrap())
    }
}

/// Minimal YAML config rooted at local directories.
pub fn local_config(warehouse_dir: &str, quarantine_dir: &str) -> Config {
    Config::parse(&format!(
        r#"
server:
  address: 127.0.0.1:0
metrics:
  enabled: false
warehouse:
  storage:
    uri: {warehouse_dir}
  dataset: finance
quarantine:
  uri: {quarantine_dir}
"#
    ))
    .unwrap()
}
