//! Processing against local-filesystem stores, checked on disk.

mod common;

use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use invoice_writer::metrics::Stage;
use invoice_writer::{Outcome, Processor};

use common::{local_config, message, push_body};

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

/// Every file below `dir`, recursively.
fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    if !dir.exists() {
        return out;
    }
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(files_under(&path));
        } else {
            out.push(path);
        }
    }
    out
}

#[tokio::test]
async fn test_invoice_written_to_local_tables() {
    let warehouse_dir = TempDir::new().unwrap();
    let quarantine_dir = TempDir::new().unwrap();
    let config = local_config(
        warehouse_dir.path().to_str().unwrap(),
        quarantine_dir.path().to_str().unwrap(),
    );
    let processor = Processor::from_config(&config).await.unwrap();

    let body = push_body(&message("INV-UE-100", 2));
    assert_eq!(
        processor.handle_push(&body).await,
        Outcome::Persisted {
            invoice_id: "INV-UE-100".to_string(),
            rows_written: 3,
        }
    );

    let root = warehouse_dir.path().join("finance");
    let header = read_json(&root.join("invoices").join("INV-UE-100.json"));
    assert_eq!(header["invoice_id"], "INV-UE-100");
    assert_eq!(header["vendor_type"], "ubereats");
    assert_eq!(header["line_item_count"], 2);
    assert_eq!(header["extraction_model"], "gemini-2.5-flash");

    let load_id = header["load_id"].as_str().unwrap();
    let ndjson = fs::read_to_string(
        root.join("invoice_line_items")
            .join("INV-UE-100")
            .join(format!("{load_id}.ndjson")),
    )
    .unwrap();
    let rows: Vec<Value> = ndjson
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["line_number"], 2);
    assert_eq!(rows[1]["invoice_id"], "INV-UE-100");
    assert_eq!(rows[1]["description"], "Item 2");
    assert_eq!(rows[1]["load_id"], load_id);

    // Redelivery leaves the tables as they were.
    assert!(matches!(
        processor.handle_push(&body).await,
        Outcome::Duplicate { .. }
    ));
    assert_eq!(files_under(&root.join("invoices")).len(), 1);
    assert_eq!(files_under(&root.join("invoice_line_items")).len(), 1);

    let metrics = files_under(&root.join("extraction_metrics"));
    assert_eq!(metrics.len(), 2);
    for path in &metrics {
        assert!(
            path.parent()
                .unwrap()
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("date=")
        );
        let row = read_json(path);
        assert_eq!(row["success"], true);
        assert_eq!(
            row["source_file"],
            "gs://invoices-landing/ubereats_INV-UE-100_page1.pdf"
        );
    }

    assert!(files_under(quarantine_dir.path()).is_empty());
}

#[tokio::test]
async fn test_failure_quarantined_to_local_directory() {
    let warehouse_dir = TempDir::new().unwrap();
    let quarantine_dir = TempDir::new().unwrap();
    let config = local_config(
        warehouse_dir.path().to_str().unwrap(),
        quarantine_dir.path().to_str().unwrap(),
    );
    let processor = Processor::from_config(&config).await.unwrap();

    let mut payload = message("INV-UE-101", 1);
    payload["extracted_data"]["currency"] = Value::String("usd".to_string());

    let outcome = processor.handle_push(&push_body(&payload)).await;
    let Outcome::Failed {
        stage,
        error_type,
        artifact: Some(locator),
    } = outcome
    else {
        panic!("expected a quarantined failure, got {outcome:?}");
    };
    assert_eq!(stage, Stage::ValidateInvoice);
    assert_eq!(error_type, "SchemaError");
    assert!(locator.ends_with("ubereats_INV-UE-101.error.json"));

    let artifact = read_json(&quarantine_dir.path().join("ubereats_INV-UE-101.error.json"));
    assert_eq!(
        artifact["error_metadata"]["validation_details"]["errors"][0]["type"],
        "string_pattern_mismatch"
    );
    assert_eq!(artifact["invoice_context"]["invoice_id"], "INV-UE-101");

    let root = warehouse_dir.path().join("finance");
    assert!(files_under(&root.join("invoices")).is_empty());
    let metrics = files_under(&root.join("extraction_metrics"));
    assert_eq!(metrics.len(), 1);
    let row = read_json(&metrics[0]);
    assert_eq!(row["success"], false);
    assert_eq!(row["confidence_score"], 0.0);
}
