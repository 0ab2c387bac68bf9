//! Internal events for the processing pipeline.

use metrics::{counter, histogram};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::trace;

use invoice_core::metrics::events::InternalEvent;

/// Processing stage a message was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decode,
    ValidateMessage,
    ValidateInvoice,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::ValidateMessage => "validate_message",
            Stage::ValidateInvoice => "validate_invoice",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome label of a processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeLabel {
    Persisted,
    Duplicate,
    Failed,
}

impl OutcomeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeLabel::Persisted => "persisted",
            OutcomeLabel::Duplicate => "duplicate",
            OutcomeLabel::Failed => "failed",
        }
    }
}

/// Event emitted when a delivery arrives.
pub struct MessageReceived;

impl InternalEvent for MessageReceived {
    fn emit(self) {
        trace!("Message received");
        counter!("invoice_writer_messages_received_total").increment(1);
    }
}

/// Event emitted once per delivery with its outcome and latency.
pub struct MessageProcessed {
    pub outcome: OutcomeLabel,
    pub duration: Duration,
}

impl InternalEvent for MessageProcessed {
    fn emit(self) {
        trace!(
            outcome = self.outcome.as_str(),
            duration_ms = self.duration.as_millis(),
            "Message processed"
        );
        counter!(
            "invoice_writer_messages_processed_total",
            "outcome" => self.outcome.as_str()
        )
        .increment(1);
        histogram!(
            "invoice_writer_processing_duration_seconds",
            "outcome" => self.outcome.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a stage fails.
pub struct StageFailed {
    pub stage: Stage,
    pub error_type: &'static str,
}

impl InternalEvent for StageFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), error_type = self.error_type, "Stage failed");
        counter!(
            "invoice_writer_stage_failures_total",
            "stage" => self.stage.as_str(),
            "error_type" => self.error_type
        )
        .increment(1);
    }
}

/// Event emitted with the number of warehouse rows written for an invoice.
pub struct RowsWritten {
    pub count: usize,
}

impl InternalEvent for RowsWritten {
    fn emit(self) {
        trace!(count = self.count, "Rows written");
        counter!("invoice_writer_rows_written_total").increment(self.count as u64);
    }
}

/// Event emitted with the confidence of a persisted extraction.
pub struct ExtractionConfidence {
    pub score: f64,
}

impl InternalEvent for ExtractionConfidence {
    fn emit(self) {
        histogram!("invoice_writer_extraction_confidence").record(self.score);
    }
}

/// Event emitted when an error artifact is written to quarantine.
pub struct ErrorQuarantined {
    pub stage: Stage,
}

impl InternalEvent for ErrorQuarantined {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), "Error quarantined");
        counter!(
            "invoice_writer_errors_quarantined_total",
            "stage" => self.stage.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a best-effort step fails and is skipped.
pub struct BestEffortFailed {
    pub step: &'static str,
}

impl InternalEvent for BestEffortFailed {
    fn emit(self) {
        trace!(step = self.step, "Best-effort step failed");
        counter!(
            "invoice_writer_best_effort_failures_total",
            "step" => self.step
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoice_core::emit;
    use invoice_core::metrics::{MetricsController, init_test};

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ValidateInvoice.to_string(), "validate_invoice");
        assert_eq!(
            serde_json::to_value(Stage::ValidateMessage).unwrap(),
            "validate_message"
        );
    }

    #[test]
    fn test_events_recorded() {
        init_test();
        emit!(StageFailed {
            stage: Stage::Persist,
            error_type: "PersistenceError",
        });
        emit!(BestEffortFailed { step: "quarantine" });

        let output = MetricsController::get().unwrap().render();
        assert!(output.contains("invoice_writer_stage_failures_total"));
        assert!(output.contains("invoice_writer_best_effort_failures_total"));
    }
}
