//! invoice-writer CLI: serves the push endpoint for extracted invoices.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use invoice_writer::{CliArgs, Config, init_tracing, run_service};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();
    info!("Loading config from {}", args.config.display());

    let config = match Config::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Starting invoice-writer ({}.{} -> {})",
        config.warehouse.dataset, config.warehouse.invoices_table, config.quarantine.uri
    );

    match run_service(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("invoice-writer failed: {e}");
            ExitCode::FAILURE
        }
    }
}
