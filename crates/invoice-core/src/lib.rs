//! invoice-core: shared plumbing for the invoice-writer service.
//!
//! - `storage/` - object storage abstraction (GCS, S3, local)
//! - `metrics/` - Prometheus metrics infrastructure and the `emit!` macro
//! - `config/` - YAML loading with environment variable interpolation
//! - `logging` - tracing subscriber setup
//! - `signal` - signal handling for graceful shutdown
//! - `error` - shared error types

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod signal;
pub mod storage;

pub use config::{MetricsConfig, StorageLocation, load_yaml, parse_yaml};
pub use error::{ConfigError, MetricsError, StorageError};
pub use logging::init_tracing;
pub use signal::shutdown_signal;
pub use storage::{CreateOutcome, StorageProvider, StorageProviderRef};
