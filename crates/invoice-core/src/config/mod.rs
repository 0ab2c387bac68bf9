//! Configuration building blocks shared across the workspace.

mod vars;

pub use vars::interpolate;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::ConfigError;

/// Default address for the Prometheus endpoint.
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether to start the `/metrics` server.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server.
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

impl MetricsConfig {
    /// Parse the configured address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr("metrics.address", &self.address)
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    DEFAULT_METRICS_ADDR.to_string()
}

/// An object storage location plus backend options (credentials, region, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageLocation {
    /// URI of the location (`gs://`, `s3://`, `file://` or an absolute path).
    pub uri: String,
    /// Backend options passed to the object store builder.
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

impl StorageLocation {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            storage_options: HashMap::new(),
        }
    }

    /// Reject an empty URI, naming the config field in the error.
    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.uri.trim().is_empty() {
            return Err(ConfigError::EmptyUri {
                field: field.to_string(),
            });
        }
        Ok(())
    }
}

/// Parse `address` as a socket address, naming `field` on failure.
pub fn parse_addr(field: &str, address: &str) -> Result<SocketAddr, ConfigError> {
    address.parse().map_err(|_| ConfigError::InvalidAddress {
        field: field.to_string(),
        address: address.to_string(),
    })
}

/// Interpolate environment variables in `contents` and parse it as YAML.
pub fn parse_yaml<T: DeserializeOwned>(contents: &str) -> Result<T, ConfigError> {
    let text = interpolate(contents)?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::YamlParse { source })
}

/// Read a YAML config file, interpolating environment variables first.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_yaml(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_defaults() {
        let config: MetricsConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.address, DEFAULT_METRICS_ADDR);
        assert!(config.socket_addr().is_ok());
    }

    #[test]
    fn test_invalid_metrics_address() {
        let config = MetricsConfig {
            enabled: true,
            address: "not-an-address".to_string(),
        };
        let err = config.socket_addr().unwrap_err();
        assert!(err.to_string().contains("metrics.address"));
    }

    #[test]
    fn test_storage_location_validate() {
        assert!(StorageLocation::new("gs://bucket").validate("quarantine").is_ok());
        let err = StorageLocation::new("  ").validate("quarantine.uri").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyUri { field } if field == "quarantine.uri"));
    }

    #[test]
    fn test_load_yaml_missing_file() {
        let result: Result<MetricsConfig, _> = load_yaml(Path::new("/nonexistent/config.yaml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<StorageLocation, _> = parse_yaml("uri: /tmp\nbogus: 1");
        assert!(matches!(result, Err(ConfigError::YamlParse { .. })));
    }
}
