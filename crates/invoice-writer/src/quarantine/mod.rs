//! Quarantine for messages that could not be processed.
//!
//! Each failure becomes one self-contained JSON artifact holding the error,
//! whatever invoice context was recovered, the raw message and remediation
//! hints, written under a key derived from the source document.

mod hints;
mod key;
mod record;
mod store;

pub use hints::{GENERIC_HINT, remediation_hints};
pub use key::{ARTIFACT_SUFFIX, artifact_key};
pub use record::{ErrorMetadata, ErrorRecord, InvoiceContext, ValidationDetails};
pub use store::{MemoryQuarantine, ObjectQuarantine, QuarantineStore};

use bytes::Bytes;
use chrono::Utc;
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{ProcessingError, QuarantineSerializeSnafu, QuarantineWriteError};
use crate::pipeline::ProcessingContext;

const CONTENT_TYPE: &str = "application/json";

/// Builds error artifacts and writes them to a [`QuarantineStore`].
#[derive(Clone)]
pub struct FailureCapture {
    store: Arc<dyn QuarantineStore>,
    timeout: Duration,
}

impl FailureCapture {
    pub fn new(store: Arc<dyn QuarantineStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Write the artifact for `error`. Returns the artifact's locator.
    pub async fn capture(
        &self,
        ctx: &ProcessingContext,
        error: &ProcessingError,
    ) -> Result<String, QuarantineWriteError> {
        let now = Utc::now();
        let key = artifact_key(ctx.source_file(), ctx.invoice_id(), now);
        let record = ErrorRecord::new(ctx, error, now);
        let body = serde_json::to_vec_pretty(&record).context(QuarantineSerializeSnafu)?;

        let locator = tokio::time::timeout(
            self.timeout,
            self.store.put(&key, Bytes::from(body), CONTENT_TYPE),
        )
        .await
        .map_err(|_| QuarantineWriteError::QuarantineTimeout {
            key: key.clone(),
            millis: self.timeout.as_millis(),
        })??;

        info!(
            stage = %ctx.stage,
            error_type = error.error_type(),
            %locator,
            "Error captured to quarantine"
        );
        Ok(locator)
    }
}
