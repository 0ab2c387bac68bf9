//! Validated message and invoice types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Currency assumed when the extraction doesn't name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Known invoice vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorType {
    Ubereats,
    Doordash,
    Grubhub,
    Other,
}

impl VendorType {
    pub const ALL: [VendorType; 4] = [
        VendorType::Ubereats,
        VendorType::Doordash,
        VendorType::Grubhub,
        VendorType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorType::Ubereats => "ubereats",
            VendorType::Doordash => "doordash",
            VendorType::Grubhub => "grubhub",
            VendorType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == value)
    }
}

impl fmt::Display for VendorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundMessage {
    /// URI of the document the invoice was extracted from.
    pub source_file: String,
    pub vendor_type: VendorType,
    pub extraction_model: String,
    pub extraction_latency_ms: u64,
    /// Extraction confidence in `[0, 1]`.
    pub confidence_score: f64,
    /// Raw structured invoice, validated separately.
    pub extracted_data: Map<String, Value>,
}

/// One line of an invoice. The inner structure is opaque to the writer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LineItem(pub Map<String, Value>);

impl LineItem {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A validated invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub invoice_id: String,
    pub vendor_type: VendorType,
    pub invoice_date: Option<NaiveDate>,
    pub currency: String,
    pub subtotal: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub total_amount: Decimal,
    pub line_items: Vec<LineItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_parse() {
        assert_eq!(VendorType::parse("doordash"), Some(VendorType::Doordash));
        assert_eq!(VendorType::parse("DoorDash"), None);
        assert_eq!(VendorType::parse("postmates"), None);
    }

    #[test]
    fn test_vendor_serde_matches_as_str() {
        for vendor in VendorType::ALL {
            let json = serde_json::to_string(&vendor).unwrap();
            assert_eq!(json, format!("\"{}\"", vendor.as_str()));
        }
    }
}
