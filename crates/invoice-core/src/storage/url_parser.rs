//! URL parsing for storage backends.
//!
//! Maps the URL forms accepted in config (`gs://`, GCS https, `s3://`, S3
//! https, `s3::http://host:port/`, `file://` and absolute paths) onto a
//! backend configuration.

use object_store::path::Path;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::error::{InvalidUrlSnafu, StorageError};

use super::{GcsConfig, LocalConfig, S3Config};

const GCS_URL: &str = r"^[gG][sS]://(?P<bucket>[a-z0-9\-\._]+)(/(?P<key>.+?))?/?$";
const GCS_PATH: &str =
    r"^https://storage\.googleapis\.com/(?P<bucket>[a-z0-9\-_\.]+)(/(?P<key>.+?))?/?$";
const GCS_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-_\.]+)\.storage\.googleapis\.com(/(?P<key>.+?))?/?$";

const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+?))?/?$";
const S3_PATH: &str = r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+?))?/?$";
const S3_ENDPOINT_URL: &str = r"^[sS]3[aA]?::(?P<protocol>https?)://(?P<endpoint>[^:/]+):(?P<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+?))?/?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

#[derive(Debug, Clone, Copy)]
enum Backend {
    Gcs,
    S3,
    Local,
}

/// Ordered matchers; the first backend with a matching pattern wins.
static MATCHERS: LazyLock<Vec<(Backend, Regex)>> = LazyLock::new(|| {
    [
        (Backend::Gcs, GCS_URL),
        (Backend::Gcs, GCS_PATH),
        (Backend::Gcs, GCS_VIRTUAL),
        (Backend::S3, S3_URL),
        (Backend::S3, S3_PATH),
        (Backend::S3, S3_ENDPOINT_URL),
        (Backend::Local, FILE_URI),
        (Backend::Local, FILE_PATH),
    ]
    .into_iter()
    .map(|(backend, pattern)| (backend, Regex::new(pattern).expect("storage URL pattern is valid")))
    .collect()
});

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Gcs(GcsConfig),
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        for (backend, regex) in MATCHERS.iter() {
            if let Some(caps) = regex.captures(url) {
                return Ok(match backend {
                    Backend::Gcs => Self::parse_gcs(&caps),
                    Backend::S3 => Self::parse_s3(&caps),
                    Backend::Local => Self::parse_local(&caps),
                });
            }
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    fn parse_gcs(caps: &Captures) -> Self {
        BackendConfig::Gcs(GcsConfig {
            bucket: caps["bucket"].to_string(),
            key: caps.name("key").map(|m| Path::from(m.as_str())),
        })
    }

    fn parse_s3(caps: &Captures) -> Self {
        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or_else(|| caps.name("region").map(|m| m.as_str().to_string()));

        let endpoint = std::env::var("AWS_ENDPOINT").ok().or_else(|| {
            caps.name("endpoint").map(|endpoint| {
                let protocol = caps.name("protocol").map_or("https", |p| p.as_str());
                let port = caps.name("port").map_or("443", |p| p.as_str());
                format!("{protocol}://{}:{port}", endpoint.as_str())
            })
        });

        BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket: caps["bucket"].to_string(),
            key: caps.name("key").map(|m| Path::from(m.as_str())),
        })
    }

    fn parse_local(caps: &Captures) -> Self {
        let path = caps["path"].trim_end_matches('/');
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        BackendConfig::Local(LocalConfig { path })
    }

    /// Key prefix inside the bucket, if any. Local paths never carry one.
    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::Gcs(gcs) => gcs.key.as_ref(),
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Local(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcs_url_parsing() {
        match BackendConfig::parse_url("gs://failed-invoices/errors").unwrap() {
            BackendConfig::Gcs(gcs) => {
                assert_eq!(gcs.bucket, "failed-invoices");
                assert_eq!(gcs.key, Some(Path::from("errors")));
            }
            other => panic!("Expected GCS config, got {other:?}"),
        }
    }

    #[test]
    fn test_gcs_bucket_only_with_trailing_slash() {
        match BackendConfig::parse_url("gs://failed-invoices/").unwrap() {
            BackendConfig::Gcs(gcs) => {
                assert_eq!(gcs.bucket, "failed-invoices");
                assert_eq!(gcs.key, None);
            }
            other => panic!("Expected GCS config, got {other:?}"),
        }
    }

    #[test]
    fn test_gcs_https_forms() {
        for url in [
            "https://storage.googleapis.com/warehouse/raw",
            "https://warehouse.storage.googleapis.com/raw",
        ] {
            match BackendConfig::parse_url(url).unwrap() {
                BackendConfig::Gcs(gcs) => {
                    assert_eq!(gcs.bucket, "warehouse");
                    assert_eq!(gcs.key, Some(Path::from("raw")));
                }
                other => panic!("Expected GCS config for {url}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_s3_endpoint_url() {
        match BackendConfig::parse_url("s3::http://localhost:9000/warehouse/tables").unwrap() {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "warehouse");
                assert_eq!(s3.key, Some(Path::from("tables")));
                if std::env::var("AWS_ENDPOINT").is_err() {
                    assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
                }
            }
            other => panic!("Expected S3 config, got {other:?}"),
        }
    }

    #[test]
    fn test_local_forms() {
        for url in ["/var/lib/invoices", "file:///var/lib/invoices", "/var/lib/invoices/"] {
            match BackendConfig::parse_url(url).unwrap() {
                BackendConfig::Local(local) => assert_eq!(local.path, "/var/lib/invoices"),
                other => panic!("Expected local config for {url}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_url() {
        assert!(BackendConfig::parse_url("ftp://nope").is_err());
        assert!(BackendConfig::parse_url("relative/path").is_err());
    }
}
