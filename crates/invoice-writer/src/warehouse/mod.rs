//! Analytical warehouse the invoices are written to.
//!
//! [`WarehouseStore`] is the seam between persistence logic and a concrete
//! backend. [`ObjectWarehouse`] stores rows as JSON objects in GCS, S3 or a
//! local directory; [`MemoryWarehouse`] keeps them in memory for tests.

mod memory;
mod object;
mod rows;

pub use memory::{MemoryWarehouse, WarehouseOp};
pub use object::ObjectWarehouse;
pub use rows::{InvoiceHeaderRow, LineItemRow};

use async_trait::async_trait;
use std::fmt;

use crate::config::WarehouseConfig;
use crate::error::WarehouseError;
use crate::telemetry::MetricsRecord;

/// A table inside a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// The three tables the writer touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseTables {
    pub invoices: TableRef,
    pub line_items: TableRef,
    pub metrics: TableRef,
}

impl WarehouseTables {
    pub fn from_config(config: &WarehouseConfig) -> Self {
        Self {
            invoices: TableRef::new(&config.dataset, &config.invoices_table),
            line_items: TableRef::new(&config.dataset, &config.line_items_table),
            metrics: TableRef::new(&config.dataset, &config.metrics_table),
        }
    }
}

/// Result of a create-only header write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderWrite {
    Created,
    /// A header for this invoice id was already present. Nothing was written.
    AlreadyExists,
}

/// Row-level access to the warehouse tables.
///
/// Headers are keyed by invoice id and written create-only, so the header
/// table never holds two rows for one invoice. Line items are written per
/// load: each persist attempt writes its rows under a fresh load id, and only
/// the load named by the header belongs to the invoice. An attempt that loses
/// the header write leaves the committed load untouched.
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    /// Whether a header row exists for `invoice_id`.
    async fn exists(&self, table: &TableRef, invoice_id: &str) -> Result<bool, WarehouseError>;

    /// Write the header row unless one already exists for its invoice id.
    async fn write_header(
        &self,
        table: &TableRef,
        row: &InvoiceHeaderRow,
    ) -> Result<HeaderWrite, WarehouseError>;

    /// Write the line-item rows of one load of `invoice_id`, replacing any
    /// earlier write of the same load. An empty `rows` still records the load.
    async fn write_line_items(
        &self,
        table: &TableRef,
        invoice_id: &str,
        load_id: &str,
        rows: &[LineItemRow],
    ) -> Result<(), WarehouseError>;

    /// Append one extraction-metrics row.
    async fn append_metrics(
        &self,
        table: &TableRef,
        row: &MetricsRecord,
    ) -> Result<(), WarehouseError>;

    /// Backend description for logging.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoice_core::config::StorageLocation;

    #[test]
    fn test_tables_from_config() {
        let config = WarehouseConfig {
            storage: StorageLocation::new("gs://warehouse"),
            dataset: "finance".to_string(),
            invoices_table: "invoices".to_string(),
            line_items_table: "invoice_line_items".to_string(),
            metrics_table: "extraction_metrics".to_string(),
        };

        let tables = WarehouseTables::from_config(&config);
        assert_eq!(tables.invoices.to_string(), "finance.invoices");
        assert_eq!(tables.line_items.to_string(), "finance.invoice_line_items");
        assert_eq!(tables.metrics.to_string(), "finance.extraction_metrics");
    }
}
