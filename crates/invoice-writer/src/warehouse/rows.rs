//! Row shapes written to the warehouse tables.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::persist::WriteMeta;
use crate::schema::{Invoice, VendorType};

/// One row of the invoices table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceHeaderRow {
    pub invoice_id: String,
    pub vendor_type: VendorType,
    pub invoice_date: Option<NaiveDate>,
    pub currency: String,
    pub subtotal: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub total_amount: Decimal,
    pub line_item_count: usize,
    pub source_file: String,
    pub extraction_model: String,
    pub extraction_latency_ms: u64,
    pub confidence_score: f64,
    /// Load whose line-item rows belong to this invoice.
    pub load_id: String,
    pub loaded_at: DateTime<Utc>,
}

impl InvoiceHeaderRow {
    pub fn new(
        invoice: &Invoice,
        meta: &WriteMeta,
        load_id: &str,
        loaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            invoice_id: invoice.invoice_id.clone(),
            vendor_type: invoice.vendor_type,
            invoice_date: invoice.invoice_date,
            currency: invoice.currency.clone(),
            subtotal: invoice.subtotal,
            tax_amount: invoice.tax_amount,
            total_amount: invoice.total_amount,
            line_item_count: invoice.line_items.len(),
            source_file: meta.source_file.clone(),
            extraction_model: meta.extraction_model.clone(),
            extraction_latency_ms: meta.extraction_latency_ms,
            confidence_score: meta.confidence_score,
            load_id: load_id.to_string(),
            loaded_at,
        }
    }
}

/// One row of the line-items table.
///
/// The item's own fields are flattened next to the key columns. Only rows
/// whose `load_id` matches the invoice header are part of the invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemRow {
    pub invoice_id: String,
    pub load_id: String,
    /// 1-based position within the invoice.
    pub line_number: usize,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LineItemRow {
    /// Rows for every line item of `invoice`, numbered from 1.
    pub fn for_invoice(invoice: &Invoice, load_id: &str) -> Vec<Self> {
        invoice
            .line_items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let mut fields = item.fields().clone();
                // Key columns win over same-named item fields.
                fields.remove("invoice_id");
                fields.remove("load_id");
                fields.remove("line_number");
                Self {
                    invoice_id: invoice.invoice_id.clone(),
                    load_id: load_id.to_string(),
                    line_number: idx + 1,
                    fields,
                }
            })
            .collect()
    }
}
