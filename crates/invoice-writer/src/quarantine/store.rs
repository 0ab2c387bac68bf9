//! Storage for error artifacts.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path;
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use invoice_core::config::StorageLocation;
use invoice_core::storage::{StorageProvider, StorageProviderRef};

use crate::error::{QuarantineStorageSnafu, QuarantineWriteError, StorageError};

/// Write-only destination for error artifacts.
#[async_trait]
pub trait QuarantineStore: Send + Sync {
    /// Write `body` under `key`, replacing any previous artifact.
    ///
    /// Returns a locator for logs, such as the object's full URL.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, QuarantineWriteError>;
}

/// [`QuarantineStore`] backed by an object store bucket or directory.
#[derive(Debug, Clone)]
pub struct ObjectQuarantine {
    storage: StorageProviderRef,
}

impl ObjectQuarantine {
    pub fn new(storage: StorageProviderRef) -> Self {
        Self { storage }
    }

    pub async fn from_location(location: &StorageLocation) -> Result<Self, StorageError> {
        let storage = StorageProvider::for_location(location).await?;
        Ok(Self::new(Arc::new(storage)))
    }

    pub fn storage(&self) -> &StorageProviderRef {
        &self.storage
    }
}

#[async_trait]
impl QuarantineStore for ObjectQuarantine {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, QuarantineWriteError> {
        // A single escaped segment: keys never create directories.
        let path = Path::from_iter([key]);
        self.storage
            .put_with_content_type(&path, body, content_type)
            .await
            .context(QuarantineStorageSnafu { key })?;
        Ok(self.storage.url_for(&path))
    }
}

/// In-memory [`QuarantineStore`] for tests.
#[derive(Default)]
pub struct MemoryQuarantine {
    objects: Mutex<BTreeMap<String, Bytes>>,
    failing: AtomicBool,
}

impl MemoryQuarantine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write while `failing` is set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl QuarantineStore for MemoryQuarantine {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<String, QuarantineWriteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(QuarantineWriteError::QuarantineRejected {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.objects.lock().await.insert(key.to_string(), body);
        Ok(format!("memory://{key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_object_quarantine_overwrites_same_key() {
        let dir = TempDir::new().unwrap();
        let storage =
            StorageProvider::for_url_with_options(dir.path().to_str().unwrap(), HashMap::new())
                .await
                .unwrap();
        let quarantine = ObjectQuarantine::new(Arc::new(storage));

        let key = "ubereats_INV-UE-123.error.json";
        quarantine
            .put(key, Bytes::from_static(b"{\"n\":1}"), "application/json")
            .await
            .unwrap();
        let locator = quarantine
            .put(key, Bytes::from_static(b"{\"n\":2}"), "application/json")
            .await
            .unwrap();

        assert!(locator.ends_with(key));
        let written = std::fs::read(dir.path().join(key)).unwrap();
        assert_eq!(written, b"{\"n\":2}");
    }

    #[tokio::test]
    async fn test_memory_quarantine_failure_injection() {
        let quarantine = MemoryQuarantine::new();
        quarantine.set_failing(true);
        assert!(
            quarantine
                .put("a.error.json", Bytes::new(), "application/json")
                .await
                .is_err()
        );

        quarantine.set_failing(false);
        let locator = quarantine
            .put("a.error.json", Bytes::new(), "application/json")
            .await
            .unwrap();
        assert_eq!(locator, "memory://a.error.json");
        assert_eq!(quarantine.keys().await, vec!["a.error.json".to_string()]);
    }
}
