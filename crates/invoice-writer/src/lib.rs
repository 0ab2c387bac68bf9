//! invoice-writer: failure-safe consumer for extracted invoices.
//!
//! This crate handles:
//! - Decoding push deliveries and validating the message and invoice schemas
//! - Persisting each invoice at most once (header plus line items)
//! - Recording extraction-quality metrics for every attempt
//! - Quarantining failures as self-contained JSON artifacts

pub mod config;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod persist;
pub mod pipeline;
pub mod quarantine;
pub mod schema;
pub mod server;
pub mod telemetry;
pub mod warehouse;

pub use config::{CliArgs, Config};
pub use error::{ProcessingError, ServiceError};
pub use persist::{Persister, WriteMeta, WriteResult};
pub use pipeline::{Outcome, ProcessingContext, Processor};
pub use server::{router, run_service, serve};

pub use invoice_core::init_tracing;
