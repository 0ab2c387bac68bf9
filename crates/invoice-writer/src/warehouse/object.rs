//! Warehouse tables stored as JSON objects.
//!
//! Layout under the configured root:
//!
//! ```text
//! {dataset}/{invoices_table}/{invoice_id}.json
//! {dataset}/{line_items_table}/{invoice_id}/{load_id}.ndjson
//! {dataset}/{metrics_table}/date=YYYY-MM-DD/{HHMMSS.ffffff}-{uuid}.json
//! ```
//!
//! Each path segment is escaped, so invoice ids can't traverse the layout.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path;
use snafu::prelude::*;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use invoice_core::storage::{CreateOutcome, StorageProvider, StorageProviderRef};

use super::{HeaderWrite, InvoiceHeaderRow, LineItemRow, TableRef, WarehouseStore};
use crate::config::WarehouseConfig;
use crate::error::{StorageError, WarehouseError, WarehouseSerializeSnafu, WarehouseStorageSnafu};
use crate::telemetry::MetricsRecord;

const JSON: &str = "application/json";
const NDJSON: &str = "application/x-ndjson";

/// [`WarehouseStore`] backed by an object store.
#[derive(Debug, Clone)]
pub struct ObjectWarehouse {
    storage: StorageProviderRef,
}

impl ObjectWarehouse {
    pub fn new(storage: StorageProviderRef) -> Self {
        Self { storage }
    }

    pub async fn from_config(config: &WarehouseConfig) -> Result<Self, StorageError> {
        let storage = StorageProvider::for_location(&config.storage).await?;
        Ok(Self::new(Arc::new(storage)))
    }

    pub fn storage(&self) -> &StorageProviderRef {
        &self.storage
    }

    pub fn header_path(table: &TableRef, invoice_id: &str) -> Path {
        let file = format!("{invoice_id}.json");
        Path::from_iter([table.dataset.as_str(), table.table.as_str(), file.as_str()])
    }

    pub fn line_items_path(table: &TableRef, invoice_id: &str, load_id: &str) -> Path {
        let file = format!("{load_id}.ndjson");
        Path::from_iter([
            table.dataset.as_str(),
            table.table.as_str(),
            invoice_id,
            file.as_str(),
        ])
    }

    pub fn metrics_path(table: &TableRef, row: &MetricsRecord) -> Path {
        let partition = format!("date={}", row.recorded_at.format("%Y-%m-%d"));
        let file = format!(
            "{}-{}.json",
            row.recorded_at.format("%H%M%S%.6f"),
            Uuid::new_v4()
        );
        Path::from_iter([
            table.dataset.as_str(),
            table.table.as_str(),
            partition.as_str(),
            file.as_str(),
        ])
    }

    /// Read back a header row, if present.
    pub async fn read_header(
        &self,
        table: &TableRef,
        invoice_id: &str,
    ) -> Result<Option<InvoiceHeaderRow>, WarehouseError> {
        let path = Self::header_path(table, invoice_id);
        let bytes = match self.storage.get(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(source) => return Err(WarehouseError::WarehouseStorage { source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .context(WarehouseSerializeSnafu)
    }

    /// Read back the line-item rows of one load of an invoice.
    pub async fn read_line_items(
        &self,
        table: &TableRef,
        invoice_id: &str,
        load_id: &str,
    ) -> Result<Vec<LineItemRow>, WarehouseError> {
        let path = Self::line_items_path(table, invoice_id, load_id);
        let bytes = match self.storage.get(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(source) => return Err(WarehouseError::WarehouseStorage { source }),
        };
        serde_json::Deserializer::from_slice(&bytes)
            .into_iter::<LineItemRow>()
            .collect::<Result<_, _>>()
            .context(WarehouseSerializeSnafu)
    }
}

#[async_trait]
impl WarehouseStore for ObjectWarehouse {
    async fn exists(&self, table: &TableRef, invoice_id: &str) -> Result<bool, WarehouseError> {
        self.storage
            .exists(&Self::header_path(table, invoice_id))
            .await
            .context(WarehouseStorageSnafu)
    }

    async fn write_header(
        &self,
        table: &TableRef,
        row: &InvoiceHeaderRow,
    ) -> Result<HeaderWrite, WarehouseError> {
        let path = Self::header_path(table, &row.invoice_id);
        let body = serde_json::to_vec(row).context(WarehouseSerializeSnafu)?;

        let outcome = self
            .storage
            .put_if_absent(&path, Bytes::from(body), JSON)
            .await
            .context(WarehouseStorageSnafu)?;

        debug!(%table, invoice_id = %row.invoice_id, ?outcome, "Header write");
        Ok(match outcome {
            CreateOutcome::Created => HeaderWrite::Created,
            CreateOutcome::AlreadyExists => HeaderWrite::AlreadyExists,
        })
    }

    async fn write_line_items(
        &self,
        table: &TableRef,
        invoice_id: &str,
        load_id: &str,
        rows: &[LineItemRow],
    ) -> Result<(), WarehouseError> {
        let mut ndjson = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut ndjson, row).context(WarehouseSerializeSnafu)?;
            ndjson.push(b'\n');
        }

        let path = Self::line_items_path(table, invoice_id, load_id);
        self.storage
            .put_with_content_type(&path, Bytes::from(ndjson), NDJSON)
            .await
            .context(WarehouseStorageSnafu)?;

        debug!(%table, invoice_id, load_id, rows = rows.len(), "Line items written");
        Ok(())
    }

    async fn append_metrics(
        &self,
        table: &TableRef,
        row: &MetricsRecord,
    ) -> Result<(), WarehouseError> {
        let body = serde_json::to_vec(row).context(WarehouseSerializeSnafu)?;
        self.storage
            .put_with_content_type(&Self::metrics_path(table, row), Bytes::from(body), JSON)
            .await
            .context(WarehouseStorageSnafu)
    }

    fn describe(&self) -> String {
        self.storage.canonical_url().to_string()
    }
}
