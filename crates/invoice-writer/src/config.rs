//! Configuration for the invoice writer.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use invoice_core::config::{MetricsConfig, StorageLocation, load_yaml, parse_addr, parse_yaml};

use crate::error::ConfigError;
use crate::schema::VendorType;

/// Default address for the push endpoint.
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

#[derive(Parser, Debug)]
#[command(version, about = "Persist extracted invoices and quarantine failures")]
pub struct CliArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "INVOICE_WRITER_CONFIG")]
    pub config: PathBuf,
}

/// HTTP push endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_server_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr("server.address", &self.address)
    }
}

fn default_server_address() -> String {
    DEFAULT_SERVER_ADDR.to_string()
}

/// Where invoice headers, line items and extraction metrics are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseConfig {
    /// Root location of the warehouse tables.
    pub storage: StorageLocation,
    /// Dataset all tables live in.
    pub dataset: String,
    #[serde(default = "default_invoices_table")]
    pub invoices_table: String,
    #[serde(default = "default_line_items_table")]
    pub line_items_table: String,
    #[serde(default = "default_metrics_table")]
    pub metrics_table: String,
}

fn default_invoices_table() -> String {
    "invoices".to_string()
}

fn default_line_items_table() -> String {
    "invoice_line_items".to_string()
}

fn default_metrics_table() -> String {
    "extraction_metrics".to_string()
}

/// Business rules applied when validating invoices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    /// Vendors whose invoices may carry a negative total (credit memos).
    #[serde(default)]
    pub credit_memo_vendors: Vec<VendorType>,
}

impl ValidationConfig {
    pub fn allows_credit(&self, vendor: VendorType) -> bool {
        self.credit_memo_vendors.contains(&vendor)
    }
}

/// Bounds on every external call, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    #[serde(default = "default_warehouse_timeout")]
    pub warehouse_secs: u64,
    #[serde(default = "default_telemetry_timeout")]
    pub telemetry_secs: u64,
    #[serde(default = "default_quarantine_timeout")]
    pub quarantine_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            warehouse_secs: default_warehouse_timeout(),
            telemetry_secs: default_telemetry_timeout(),
            quarantine_secs: default_quarantine_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn warehouse(&self) -> Duration {
        Duration::from_secs(self.warehouse_secs)
    }

    pub fn telemetry(&self) -> Duration {
        Duration::from_secs(self.telemetry_secs)
    }

    pub fn quarantine(&self) -> Duration {
        Duration::from_secs(self.quarantine_secs)
    }
}

fn default_warehouse_timeout() -> u64 {
    30
}

fn default_telemetry_timeout() -> u64 {
    10
}

fn default_quarantine_timeout() -> u64 {
    30
}

/// Main configuration for the invoice writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub warehouse: WarehouseConfig,
    /// Bucket or directory receiving error artifacts.
    pub quarantine: StorageLocation,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Config = load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = parse_yaml(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        if self.metrics.enabled {
            self.metrics.socket_addr()?;
        }

        self.warehouse.storage.validate("warehouse.storage.uri")?;
        self.quarantine.validate("quarantine.uri")?;

        let tables = [
            ("warehouse.dataset", &self.warehouse.dataset),
            ("warehouse.invoices_table", &self.warehouse.invoices_table),
            ("warehouse.line_items_table", &self.warehouse.line_items_table),
            ("warehouse.metrics_table", &self.warehouse.metrics_table),
        ];
        for (field, name) in tables {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyTableName {
                    field: field.to_string(),
                });
            }
        }

        let timeouts = [
            ("timeouts.warehouse_secs", self.timeouts.warehouse_secs),
            ("timeouts.telemetry_secs", self.timeouts.telemetry_secs),
            ("timeouts.quarantine_secs", self.timeouts.quarantine_secs),
        ];
        for (field, secs) in timeouts {
            if secs == 0 {
                return Err(ConfigError::ZeroTimeout {
                    field: field.to_string(),
                });
            }
        }

        Ok(())
    }
}
