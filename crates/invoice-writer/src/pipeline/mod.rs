//! Per-message processing.
//!
//! A delivery moves through decode, message validation, invoice validation
//! and persistence. Any failure, including a panic, ends the attempt in the
//! failure path: a failure metrics row and a quarantine artifact, both
//! best-effort. [`Processor::handle_push`] therefore always returns an
//! [`Outcome`] and the delivery is always acknowledged.

mod context;
mod fallback;

pub use context::ProcessingContext;
pub use fallback::{best_effort, panic_message};

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use invoice_core::emit;

use crate::config::{Config, ValidationConfig};
use crate::envelope::{decode_payload, unwrap_push};
use crate::error::{PersistenceError, ProcessingError, StorageError};
use crate::metrics::{
    ErrorQuarantined, ExtractionConfidence, MessageProcessed, MessageReceived, OutcomeLabel,
    RowsWritten, Stage, StageFailed,
};
use crate::persist::{Persister, WriteMeta};
use crate::quarantine::{FailureCapture, ObjectQuarantine, QuarantineStore};
use crate::schema::{validate_invoice, validate_message};
use crate::telemetry::{MetricsRecord, TelemetryRecorder};
use crate::warehouse::{ObjectWarehouse, WarehouseStore, WarehouseTables};

/// Terminal state of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Persisted {
        invoice_id: String,
        rows_written: usize,
    },
    Duplicate {
        invoice_id: String,
    },
    Failed {
        stage: Stage,
        error_type: &'static str,
        /// Locator of the quarantine artifact, if it could be written.
        artifact: Option<String>,
    },
}

impl Outcome {
    pub fn label(&self) -> OutcomeLabel {
        match self {
            Outcome::Persisted { .. } => OutcomeLabel::Persisted,
            Outcome::Duplicate { .. } => OutcomeLabel::Duplicate,
            Outcome::Failed { .. } => OutcomeLabel::Failed,
        }
    }
}

enum Input<'a> {
    Push(&'a [u8]),
    Payload(&'a [u8]),
}

/// Validates, persists and quarantines inbound invoice messages.
#[derive(Clone)]
pub struct Processor {
    rules: ValidationConfig,
    persister: Persister,
    telemetry: TelemetryRecorder,
    capture: FailureCapture,
}

impl Processor {
    pub fn new(
        rules: ValidationConfig,
        persister: Persister,
        telemetry: TelemetryRecorder,
        capture: FailureCapture,
    ) -> Self {
        Self {
            rules,
            persister,
            telemetry,
            capture,
        }
    }

    /// Build a processor over the given stores, using `config` for tables,
    /// rules and timeouts.
    pub fn with_stores(
        config: &Config,
        warehouse: Arc<dyn WarehouseStore>,
        quarantine: Arc<dyn QuarantineStore>,
    ) -> Self {
        let tables = WarehouseTables::from_config(&config.warehouse);
        let telemetry = TelemetryRecorder::new(
            warehouse.clone(),
            tables.metrics.clone(),
            config.timeouts.telemetry(),
        );
        Self::new(
            config.validation.clone(),
            Persister::new(warehouse, tables, config.timeouts.warehouse()),
            telemetry,
            FailureCapture::new(quarantine, config.timeouts.quarantine()),
        )
    }

    /// Build a processor over the configured object stores.
    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        let warehouse = ObjectWarehouse::from_config(&config.warehouse).await?;
        let quarantine = ObjectQuarantine::from_location(&config.quarantine).await?;
        info!(
            warehouse = %warehouse.describe(),
            quarantine = %quarantine.storage().canonical_url(),
            "Stores initialized"
        );
        Ok(Self::with_stores(
            config,
            Arc::new(warehouse),
            Arc::new(quarantine),
        ))
    }

    /// Process a push delivery body (JSON envelope with base64 data).
    pub async fn handle_push(&self, body: &[u8]) -> Outcome {
        self.handle(Input::Push(body)).await
    }

    /// Process a bare message payload (the JSON message itself).
    pub async fn handle_payload(&self, bytes: &[u8]) -> Outcome {
        self.handle(Input::Payload(bytes)).await
    }

    async fn handle(&self, input: Input<'_>) -> Outcome {
        let start = Instant::now();
        emit!(MessageReceived);

        let mut ctx = ProcessingContext::new();
        let result = AssertUnwindSafe(self.process(input, &mut ctx))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => self.fail(&ctx, error).await,
            Err(payload) => {
                let error = ProcessingError::Other {
                    message: format!("panic: {}", panic_message(payload.as_ref())),
                };
                self.fail(&ctx, error).await
            }
        };

        emit!(MessageProcessed {
            outcome: outcome.label(),
            duration: start.elapsed(),
        });
        outcome
    }

    async fn process(
        &self,
        input: Input<'_>,
        ctx: &mut ProcessingContext,
    ) -> Result<Outcome, ProcessingError> {
        let payload = match input {
            Input::Push(body) => {
                ctx.received(body);
                let delivery = unwrap_push(body)?;
                ctx.message_id = delivery.message_id.clone();
                ctx.received(&delivery.data);
                delivery.payload()?
            }
            Input::Payload(bytes) => {
                ctx.received(bytes);
                decode_payload(bytes)?
            }
        };
        ctx.decoded(payload);

        let message = validate_message(&ctx.raw_message)?;
        ctx.message_validated(message.clone());

        let invoice = validate_invoice(&message.extracted_data, &self.rules)?;
        ctx.invoice_validated(invoice.clone());

        let invoice_id = invoice.invoice_id.clone();
        let result = self
            .persister
            .persist(&invoice, &WriteMeta::from_message(&message))
            .await;
        if !result.success {
            return Err(PersistenceError::WriteFailed {
                invoice_id,
                message: result.error.unwrap_or_default(),
            }
            .into());
        }

        best_effort(
            "telemetry",
            self.telemetry
                .record(&MetricsRecord::success(&message, &invoice_id)),
        )
        .await;

        if result.is_duplicate {
            info!(
                invoice_id,
                message_id = ctx.message_id.as_deref(),
                "Duplicate invoice acknowledged"
            );
            return Ok(Outcome::Duplicate { invoice_id });
        }

        emit!(RowsWritten {
            count: result.rows_written,
        });
        emit!(ExtractionConfidence {
            score: message.confidence_score,
        });
        info!(
            invoice_id,
            vendor = %message.vendor_type,
            rows = result.rows_written,
            message_id = ctx.message_id.as_deref(),
            "Invoice persisted"
        );
        Ok(Outcome::Persisted {
            invoice_id,
            rows_written: result.rows_written,
        })
    }

    /// Record failure metrics and quarantine the message. Never fails.
    async fn fail(&self, ctx: &ProcessingContext, error: ProcessingError) -> Outcome {
        let stage = ctx.stage;
        let error_type = error.error_type();
        warn!(
            stage = %stage,
            error_type,
            message_id = ctx.message_id.as_deref(),
            source_file = ctx.source_file(),
            error = %error,
            "Message processing failed"
        );
        emit!(StageFailed { stage, error_type });

        let record = MetricsRecord::failure(
            ctx.message.as_ref(),
            ctx.source_file(),
            ctx.invoice_id(),
            error.to_string(),
        );
        best_effort("telemetry", self.telemetry.record(&record)).await;

        let artifact = best_effort("quarantine", self.capture.capture(ctx, &error)).await;
        if artifact.is_some() {
            emit!(ErrorQuarantined { stage });
        }

        Outcome::Failed {
            stage,
            error_type,
            artifact,
        }
    }
}
