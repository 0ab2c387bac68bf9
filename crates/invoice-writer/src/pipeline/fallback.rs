//! Best-effort execution of auxiliary steps.

use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{error, warn};

use invoice_core::emit;

use crate::metrics::BestEffortFailed;

/// Run `step`, logging and swallowing both errors and panics.
pub async fn best_effort<T, E, F>(step: &'static str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(step, error = %e, "Best-effort step failed, continuing");
            emit!(BestEffortFailed { step });
            None
        }
        Err(payload) => {
            error!(
                step,
                panic = %panic_message(payload.as_ref()),
                "Best-effort step panicked, continuing"
            );
            emit!(BestEffortFailed { step });
            None
        }
    }
}

/// Text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        let value = best_effort("step", async { Ok::<_, String>(7) }).await;
        assert_eq!(value, Some(7));
    }

    #[tokio::test]
    async fn test_error_swallowed() {
        let value = best_effort("step", async { Err::<u8, _>("boom") }).await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_panic_swallowed() {
        let value = best_effort("step", async {
            if true {
                panic!("kaboom");
            }
            Ok::<u8, String>(1)
        })
        .await;
        assert_eq!(value, None);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
