//! In-memory warehouse with failure injection.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{
    HeaderWrite, InvoiceHeaderRow, LineItemRow, TableRef, WarehouseStore, WarehouseTables,
};
use crate::error::WarehouseError;
use crate::telemetry::MetricsRecord;

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarehouseOp {
    Exists,
    WriteHeader,
    WriteLineItems,
    AppendMetrics,
}

#[derive(Default)]
struct Tables {
    headers: BTreeMap<TableRef, BTreeMap<String, InvoiceHeaderRow>>,
    /// Keyed by `(invoice_id, load_id)`.
    line_items: BTreeMap<TableRef, BTreeMap<(String, String), Vec<LineItemRow>>>,
    metrics: BTreeMap<TableRef, Vec<MetricsRecord>>,
    failing: HashSet<WarehouseOp>,
    delay: Option<Duration>,
}

/// [`WarehouseStore`] holding every table in memory.
#[derive(Default)]
pub struct MemoryWarehouse {
    tables: Mutex<Tables>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail until [`MemoryWarehouse::recover`] is called.
    pub async fn fail(&self, op: WarehouseOp) {
        self.tables.lock().await.failing.insert(op);
    }

    pub async fn recover(&self) {
        self.tables.lock().await.failing.clear();
    }

    /// Delay every operation by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        self.tables.lock().await.delay = Some(delay);
    }

    /// Seed a header row, as if written by an earlier delivery.
    pub async fn insert_header(&self, table: &TableRef, row: InvoiceHeaderRow) {
        self.tables
            .lock()
            .await
            .headers
            .entry(table.clone())
            .or_default()
            .insert(row.invoice_id.clone(), row);
    }

    pub async fn headers(&self, table: &TableRef) -> Vec<InvoiceHeaderRow> {
        self.tables
            .lock()
            .await
            .headers
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Rows of one load of `invoice_id`, committed or not.
    pub async fn line_items(
        &self,
        table: &TableRef,
        invoice_id: &str,
        load_id: &str,
    ) -> Vec<LineItemRow> {
        self.tables
            .lock()
            .await
            .line_items
            .get(table)
            .and_then(|rows| rows.get(&(invoice_id.to_string(), load_id.to_string())))
            .cloned()
            .unwrap_or_default()
    }

    /// Rows of the load named by the invoice's header; empty without a header.
    pub async fn committed_line_items(
        &self,
        tables: &WarehouseTables,
        invoice_id: &str,
    ) -> Vec<LineItemRow> {
        let load_id = {
            let guard = self.tables.lock().await;
            guard
                .headers
                .get(&tables.invoices)
                .and_then(|rows| rows.get(invoice_id))
                .map(|header| header.load_id.clone())
        };
        match load_id {
            Some(load_id) => self.line_items(&tables.line_items, invoice_id, &load_id).await,
            None => Vec::new(),
        }
    }

    /// Number of loads written for `invoice_id`, committed or not.
    pub async fn load_count(&self, table: &TableRef, invoice_id: &str) -> usize {
        self.tables
            .lock()
            .await
            .line_items
            .get(table)
            .map(|rows| rows.keys().filter(|(id, _)| id == invoice_id).count())
            .unwrap_or_default()
    }

    pub async fn metrics(&self, table: &TableRef) -> Vec<MetricsRecord> {
        self.tables
            .lock()
            .await
            .metrics
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Apply the configured delay and fail if `op` is marked failing.
    async fn enter(&self, op: WarehouseOp) -> Result<(), WarehouseError> {
        let (delay, failing) = {
            let tables = self.tables.lock().await;
            (tables.delay, tables.failing.contains(&op))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(WarehouseError::WarehouseUnavailable {
                message: format!("injected failure for {op:?}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WarehouseStore for MemoryWarehouse {
    async fn exists(&self, table: &TableRef, invoice_id: &str) -> Result<bool, WarehouseError> {
        self.enter(WarehouseOp::Exists).await?;
        Ok(self
            .tables
            .lock()
            .await
            .headers
            .get(table)
            .is_some_and(|rows| rows.contains_key(invoice_id)))
    }

    async fn write_header(
        &self,
        table: &TableRef,
        row: &InvoiceHeaderRow,
    ) -> Result<HeaderWrite, WarehouseError> {
        self.enter(WarehouseOp::WriteHeader).await?;
        let mut tables = self.tables.lock().await;
        let rows = tables.headers.entry(table.clone()).or_default();
        if rows.contains_key(&row.invoice_id) {
            return Ok(HeaderWrite::AlreadyExists);
        }
        rows.insert(row.invoice_id.clone(), row.clone());
        Ok(HeaderWrite::Created)
    }

    async fn write_line_items(
        &self,
        table: &TableRef,
        invoice_id: &str,
        load_id: &str,
        rows: &[LineItemRow],
    ) -> Result<(), WarehouseError> {
        self.enter(WarehouseOp::WriteLineItems).await?;
        self.tables
            .lock()
            .await
            .line_items
            .entry(table.clone())
            .or_default()
            .insert((invoice_id.to_string(), load_id.to_string()), rows.to_vec());
        Ok(())
    }

    async fn append_metrics(
        &self,
        table: &TableRef,
        row: &MetricsRecord,
    ) -> Result<(), WarehouseError> {
        self.enter(WarehouseOp::AppendMetrics).await?;
        self.tables
            .lock()
            .await
            .metrics
            .entry(table.clone())
            .or_default()
            .push(row.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failure_and_recover() {
        let warehouse = MemoryWarehouse::new();
        let table = TableRef::new("d", "invoices");

        warehouse.fail(WarehouseOp::Exists).await;
        assert!(matches!(
            warehouse.exists(&table, "INV-1").await,
            Err(WarehouseError::WarehouseUnavailable { .. })
        ));

        warehouse.recover().await;
        assert!(!warehouse.exists(&table, "INV-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_metrics_appended_per_table() {
        let warehouse = MemoryWarehouse::new();
        let table = TableRef::new("d", "extraction_metrics");

        let row = MetricsRecord::failure(None, None, None, "boom");
        warehouse.append_metrics(&table, &row).await.unwrap();
        warehouse.append_metrics(&table, &row).await.unwrap();

        assert_eq!(warehouse.metrics(&table).await.len(), 2);
        assert!(
            warehouse
                .metrics(&TableRef::new("d", "other"))
                .await
                .is_empty()
        );
    }
}
