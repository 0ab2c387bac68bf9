//! Idempotent invoice persistence.
//!
//! Write order per invoice:
//!
//! 1. Look up the header by invoice id. Present means duplicate, stop.
//! 2. Write the line items under a load id fresh to this attempt.
//! 3. Write the header, naming that load, create-only.
//!
//! The header is the commit marker: line items only belong to the invoice
//! through the load id on its header. A crash between steps leaves an
//! unreferenced load behind. Two concurrent deliveries can both pass step 1,
//! but only one header write succeeds; the other reports a duplicate and its
//! load stays unreferenced, so the committed rows are never touched.

use chrono::Utc;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::schema::{InboundMessage, Invoice};
use crate::warehouse::{
    HeaderWrite, InvoiceHeaderRow, LineItemRow, WarehouseStore, WarehouseTables,
};

/// Extraction metadata stored alongside each header row.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteMeta {
    pub source_file: String,
    pub extraction_model: String,
    pub extraction_latency_ms: u64,
    pub confidence_score: f64,
}

impl WriteMeta {
    pub fn from_message(message: &InboundMessage) -> Self {
        Self {
            source_file: message.source_file.clone(),
            extraction_model: message.extraction_model.clone(),
            extraction_latency_ms: message.extraction_latency_ms,
            confidence_score: message.confidence_score,
        }
    }
}

/// Outcome of a persist call. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub success: bool,
    pub is_duplicate: bool,
    /// Header plus line-item rows written; zero for duplicates.
    pub rows_written: usize,
    pub error: Option<String>,
}

impl WriteResult {
    pub fn written(rows_written: usize) -> Self {
        Self {
            success: true,
            is_duplicate: false,
            rows_written,
            error: None,
        }
    }

    pub fn duplicate() -> Self {
        Self {
            success: true,
            is_duplicate: true,
            rows_written: 0,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            is_duplicate: false,
            rows_written: 0,
            error: Some(error.into()),
        }
    }
}

/// Writes validated invoices to the warehouse at most once per invoice id.
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn WarehouseStore>,
    tables: WarehouseTables,
    timeout: Duration,
}

impl Persister {
    pub fn new(store: Arc<dyn WarehouseStore>, tables: WarehouseTables, timeout: Duration) -> Self {
        Self {
            store,
            tables,
            timeout,
        }
    }

    /// Persist `invoice` unless a header with its id already exists.
    pub async fn persist(&self, invoice: &Invoice, meta: &WriteMeta) -> WriteResult {
        let invoice_id = invoice.invoice_id.as_str();

        let exists = self
            .bounded("exists", self.store.exists(&self.tables.invoices, invoice_id))
            .await;
        match exists {
            Ok(true) => {
                info!(invoice_id, "Invoice already persisted, skipping");
                return WriteResult::duplicate();
            }
            Ok(false) => {}
            Err(e) => return self.failed(invoice_id, e),
        }

        let load_id = Uuid::new_v4().to_string();
        let line_items = LineItemRow::for_invoice(invoice, &load_id);
        if let Err(e) = self
            .bounded(
                "write_line_items",
                self.store.write_line_items(
                    &self.tables.line_items,
                    invoice_id,
                    &load_id,
                    &line_items,
                ),
            )
            .await
        {
            return self.failed(invoice_id, e);
        }

        let header = InvoiceHeaderRow::new(invoice, meta, &load_id, Utc::now());
        let written = self
            .bounded(
                "write_header",
                self.store.write_header(&self.tables.invoices, &header),
            )
            .await;
        match written {
            Ok(HeaderWrite::Created) => {
                let rows = 1 + line_items.len();
                debug!(invoice_id, load_id, rows, "Invoice persisted");
                WriteResult::written(rows)
            }
            Ok(HeaderWrite::AlreadyExists) => {
                info!(invoice_id, "Invoice persisted concurrently, skipping");
                WriteResult::duplicate()
            }
            Err(e) => self.failed(invoice_id, e),
        }
    }

    fn failed(&self, invoice_id: &str, error: String) -> WriteResult {
        warn!(invoice_id, error = %error, "Warehouse write failed");
        WriteResult::failed(error)
    }

    /// Run a store call under the configured timeout, flattening the error.
    async fn bounded<T, E: Display>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, String> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{operation} failed: {e}")),
            Err(_) => Err(format!(
                "{operation} timed out after {}ms",
                self.timeout.as_millis()
            )),
        }
    }
}
