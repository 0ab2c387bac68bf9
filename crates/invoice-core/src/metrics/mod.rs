//! Metrics and observability infrastructure.
//!
//! - `events`: the `InternalEvent` trait and storage request events
//! - `server`: Prometheus recorder and the `/metrics` + `/health` endpoint

pub mod events;
pub mod server;

pub use server::{MetricsController, init_global, init_test};

/// Emit a metric event (Vector-style pattern).
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding Prometheus metric. Usable from any crate in the workspace.
///
/// ```ignore
/// use invoice_core::emit;
/// use invoice_core::metrics::events::{RequestStatus, StorageOperation, StorageRequest};
///
/// emit!(StorageRequest { operation: StorageOperation::Put, status: RequestStatus::Success });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
