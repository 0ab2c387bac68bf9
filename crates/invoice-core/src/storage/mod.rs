//! Object storage abstraction.
//!
//! Wraps an [`ObjectStore`] for GCS, S3 or the local filesystem behind a
//! single provider that qualifies relative paths with the configured key
//! prefix and records a Prometheus event for every request.

mod gcs;
mod local;
mod s3;
mod url_parser;

pub use gcs::GcsConfig;
pub use local::LocalConfig;
pub use s3::S3Config;
pub use url_parser::BackendConfig;

use bytes::Bytes;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, PutMode, PutOptions, PutPayload,
    RetryConfig,
};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::StorageLocation;
use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

fn default_retry_config() -> RetryConfig {
    RetryConfig::default()
}

/// Outcome of a create-only write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The object did not exist and was written.
    Created,
    /// An object already existed at the path; nothing was written.
    AlreadyExists,
}

/// Storage provider that abstracts over different object storage backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with backend options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::Gcs(config) => Self::construct_gcs(config, &options),
            BackendConfig::S3(config) => Self::construct_s3(config, &options),
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// Create a storage provider for a configured location.
    pub async fn for_location(location: &StorageLocation) -> Result<Self, StorageError> {
        Self::for_url_with_options(&location.uri, location.storage_options.clone()).await
    }

    /// Canonical URL of the configured root, e.g. `gs://bucket/prefix`.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Fully qualified URL of a relative path, for logs and error artifacts.
    pub fn url_for(&self, path: &Path) -> String {
        format!("{}/{}", self.canonical_url.trim_end_matches('/'), path)
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Get the contents of an object.
    pub async fn get(&self, path: &Path) -> Result<Bytes, StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.get(&path).await;
        record_request(StorageOperation::Get, result.is_ok(), start);

        result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)
    }

    /// Check whether an object exists at `path`.
    pub async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.head(&path).await;

        match result {
            Ok(_) => {
                record_request(StorageOperation::Head, true, start);
                Ok(true)
            }
            Err(object_store::Error::NotFound { .. }) => {
                record_request(StorageOperation::Head, true, start);
                Ok(false)
            }
            Err(source) => {
                record_request(StorageOperation::Head, false, start);
                Err(StorageError::ObjectStore { source })
            }
        }
    }

    /// Put a payload to a path, overwriting any existing object.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        self.put_with_opts(path, payload, PutOptions::default())
            .await
            .context(ObjectStoreSnafu)
    }

    /// Put bytes to a path with a `Content-Type`, overwriting any existing object.
    ///
    /// The local filesystem doesn't support attributes, so the content type is
    /// dropped there.
    pub async fn put_with_content_type(
        &self,
        path: &Path,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let opts = PutOptions {
            attributes: self.content_type_attributes(content_type),
            ..Default::default()
        };
        self.put_with_opts(path, PutPayload::from(bytes), opts)
            .await
            .context(ObjectStoreSnafu)
    }

    /// Write an object only if nothing exists at `path` yet.
    ///
    /// Uses the backend's create-only precondition, so two concurrent writers
    /// can never both observe [`CreateOutcome::Created`].
    pub async fn put_if_absent(
        &self,
        path: &Path,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<CreateOutcome, StorageError> {
        let opts = PutOptions {
            mode: PutMode::Create,
            attributes: self.content_type_attributes(content_type),
            ..Default::default()
        };
        match self.put_with_opts(path, PutPayload::from(bytes), opts).await {
            Ok(()) => Ok(CreateOutcome::Created),
            Err(
                object_store::Error::AlreadyExists { .. } | object_store::Error::Precondition { .. },
            ) => Ok(CreateOutcome::AlreadyExists),
            Err(source) => Err(StorageError::ObjectStore { source }),
        }
    }

    fn content_type_attributes(&self, content_type: &str) -> Attributes {
        if matches!(self.config, BackendConfig::Local(_)) {
            return Attributes::new();
        }
        Attributes::from_iter([(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        )])
    }

    async fn put_with_opts(
        &self,
        path: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> Result<(), object_store::Error> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.put_opts(&path, payload, opts).await;
        record_request(StorageOperation::Put, result.is_ok(), start);
        result.map(|_| ())
    }
}

fn record_request(operation: StorageOperation, ok: bool, start: Instant) {
    let status = if ok {
        RequestStatus::Success
    } else {
        RequestStatus::Error
    };
    emit!(StorageRequest { operation, status });
    emit!(StorageRequestDuration {
        operation,
        duration: start.elapsed(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn local_provider(dir: &TempDir) -> StorageProvider {
        StorageProvider::for_url_with_options(dir.path().to_str().unwrap(), HashMap::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = local_provider(&temp_dir).await;

        let path = Path::from("errors/sample.error.json");
        storage
            .put_with_content_type(&path, Bytes::from_static(b"{}"), "application/json")
            .await
            .unwrap();

        assert_eq!(storage.get(&path).await.unwrap().as_ref(), b"{}");
        assert!(temp_dir.path().join("errors/sample.error.json").exists());
    }

    #[tokio::test]
    async fn test_exists() {
        let temp_dir = TempDir::new().unwrap();
        let storage = local_provider(&temp_dir).await;
        let path = Path::from("invoices/INV-1.json");

        assert!(!storage.exists(&path).await.unwrap());
        storage
            .put_payload(&path, PutPayload::from(Bytes::from_static(b"{}")))
            .await
            .unwrap();
        assert!(storage.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_if_absent_only_creates_once() {
        let temp_dir = TempDir::new().unwrap();
        let storage = local_provider(&temp_dir).await;
        let path = Path::from("invoices/INV-1.json");

        let first = storage
            .put_if_absent(&path, Bytes::from_static(b"first"), "application/json")
            .await
            .unwrap();
        let second = storage
            .put_if_absent(&path, Bytes::from_static(b"second"), "application/json")
            .await
            .unwrap();

        assert_eq!(first, CreateOutcome::Created);
        assert_eq!(second, CreateOutcome::AlreadyExists);
        assert_eq!(storage.get(&path).await.unwrap().as_ref(), b"first");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = local_provider(&temp_dir).await;

        let err = storage.get(&Path::from("missing.json")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_url_for() {
        let temp_dir = TempDir::new().unwrap();
        let storage = local_provider(&temp_dir).await;

        let url = storage.url_for(&Path::from("a/b.json"));
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/a/b.json"));
    }
}
