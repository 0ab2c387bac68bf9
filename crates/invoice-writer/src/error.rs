//! Error types for the invoice writer.
//!
//! [`ProcessingError`] is the tagged union the orchestrator routes into the
//! failure path. The best-effort steps of that path have their own error
//! types ([`TelemetryError`], [`QuarantineWriteError`]) which are logged and
//! dropped, never propagated.

use snafu::prelude::*;
use std::fmt;

pub use invoice_core::error::{ConfigError, MetricsError, StorageError};

use crate::schema::{FieldViolation, SchemaModel};

// ============ Decode Errors ============

/// The transport envelope or its payload could not be decoded.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// The request body is not a JSON push envelope.
    #[snafu(display("Push envelope is not valid JSON: {source}"))]
    InvalidEnvelope { source: serde_json::Error },

    /// The envelope has no `message.data` string.
    #[snafu(display("Push envelope has no message.data"))]
    MissingData,

    /// `message.data` is not valid base64.
    #[snafu(display("message.data is not valid base64: {source}"))]
    InvalidBase64 { source: base64::DecodeError },

    /// The decoded payload is not JSON.
    #[snafu(display("Message payload is not valid JSON: {source}"))]
    InvalidPayload { source: serde_json::Error },
}

// ============ Schema Errors ============

/// Validation of the inbound message or the embedded invoice failed.
///
/// Carries every violated field, not only the first one found.
#[derive(Debug, Clone)]
pub struct SchemaError {
    pub model: SchemaModel,
    pub violations: Vec<FieldViolation>,
}

impl SchemaError {
    pub fn new(model: SchemaModel, violations: Vec<FieldViolation>) -> Self {
        Self { model, violations }
    }

    pub fn error_count(&self) -> usize {
        self.violations.len()
    }

    /// True if any violation concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} validation error(s) for {}",
            self.violations.len(),
            self.model.title()
        )?;
        for violation in &self.violations {
            write!(f, "\n  {}: {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

// ============ Warehouse Errors ============

/// Errors raised by a [`crate::warehouse::WarehouseStore`] adapter.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[allow(clippy::enum_variant_names)]
pub enum WarehouseError {
    /// The backing object store failed.
    #[snafu(display("Warehouse storage error: {source}"))]
    WarehouseStorage { source: StorageError },

    /// A row could not be serialized.
    #[snafu(display("Failed to serialize warehouse row: {source}"))]
    WarehouseSerialize { source: serde_json::Error },

    /// The store rejected or could not serve the request.
    #[snafu(display("Warehouse unavailable: {message}"))]
    WarehouseUnavailable { message: String },
}

// ============ Persistence Errors ============

/// The invoice could not be written. Duplicates are not errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PersistenceError {
    #[snafu(display("Warehouse write failed for invoice {invoice_id}: {message}"))]
    WriteFailed { invoice_id: String, message: String },
}

// ============ Telemetry Errors ============

/// Appending an extraction-metrics row failed. Always swallowed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[allow(clippy::enum_variant_names)]
pub enum TelemetryError {
    #[snafu(display("Failed to append metrics row to {table}: {source}"))]
    TelemetryAppend {
        table: String,
        source: WarehouseError,
    },

    #[snafu(display("Appending metrics row to {table} timed out after {millis}ms"))]
    TelemetryTimeout { table: String, millis: u128 },
}

// ============ Quarantine Errors ============

/// Writing an error artifact to quarantine failed. Always swallowed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[allow(clippy::enum_variant_names)]
pub enum QuarantineWriteError {
    #[snafu(display("Failed to serialize error record: {source}"))]
    QuarantineSerialize { source: serde_json::Error },

    #[snafu(display("Failed to write {key} to quarantine: {source}"))]
    QuarantineStorage { key: String, source: StorageError },

    #[snafu(display("Quarantine rejected {key}: {message}"))]
    QuarantineRejected { key: String, message: String },

    #[snafu(display("Writing {key} to quarantine timed out after {millis}ms"))]
    QuarantineTimeout { key: String, millis: u128 },
}

// ============ Processing Errors ============

/// Any failure of a processing attempt, routed into the failure path.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProcessingError {
    #[snafu(display("{source}"))]
    Decode { source: DecodeError },

    #[snafu(display("{source}"))]
    Schema { source: SchemaError },

    #[snafu(display("{source}"))]
    Persistence { source: PersistenceError },

    /// Anything else, including panics caught at the orchestrator boundary.
    #[snafu(display("{message}"))]
    Other { message: String },
}

impl ProcessingError {
    /// Stable name of the error kind, written into error artifacts.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProcessingError::Decode { .. } => "DecodeError",
            ProcessingError::Schema { .. } => "SchemaError",
            ProcessingError::Persistence { .. } => "PersistenceError",
            ProcessingError::Other { .. } => "UnexpectedError",
        }
    }

    /// The schema detail, if this is a validation failure.
    pub fn as_schema(&self) -> Option<&SchemaError> {
        match self {
            ProcessingError::Schema { source } => Some(source),
            _ => None,
        }
    }
}

impl From<DecodeError> for ProcessingError {
    fn from(source: DecodeError) -> Self {
        ProcessingError::Decode { source }
    }
}

impl From<SchemaError> for ProcessingError {
    fn from(source: SchemaError) -> Self {
        ProcessingError::Schema { source }
    }
}

impl From<PersistenceError> for ProcessingError {
    fn from(source: PersistenceError) -> Self {
        ProcessingError::Persistence { source }
    }
}

// ============ Service Errors ============

/// Errors that stop the service from starting or serving.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServiceError {
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    #[snafu(display("Failed to bind {address}: {source}"))]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[snafu(display("Server error: {source}"))]
    Serve { source: std::io::Error },
}

impl From<ConfigError> for ServiceError {
    fn from(source: ConfigError) -> Self {
        ServiceError::Config { source }
    }
}

impl From<StorageError> for ServiceError {
    fn from(source: StorageError) -> Self {
        ServiceError::Storage { source }
    }
}

impl From<MetricsError> for ServiceError {
    fn from(source: MetricsError) -> Self {
        ServiceError::Metrics { source }
    }
}
