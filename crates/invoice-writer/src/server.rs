//! HTTP push endpoint.
//!
//! The bus POSTs each message to `/`. Every delivery is answered with
//! `204 No Content` once processing finished, whatever the outcome:
//! failures are quarantined instead of redelivered.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use snafu::prelude::*;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use invoice_core::metrics::init_global;
use invoice_core::shutdown_signal;

use crate::config::Config;
use crate::error::{BindSnafu, ServeSnafu, ServiceError};
use crate::pipeline::Processor;

/// Start metrics, connect the stores and serve until a shutdown signal.
pub async fn run_service(config: &Config) -> Result<(), ServiceError> {
    if config.metrics.enabled {
        init_global(config.metrics.socket_addr()?)?;
    }

    let addr = config.server.socket_addr()?;
    let processor = Arc::new(Processor::from_config(config).await?);
    serve(addr, processor, shutdown_signal()).await?;

    info!("Push endpoint stopped");
    Ok(())
}

/// Router with the push endpoint and a health check.
pub fn router(processor: Arc<Processor>) -> Router {
    Router::new()
        .route("/", post(push_handler))
        .route("/health", get(health_handler))
        .with_state(processor)
}

/// Serve the push endpoint on `addr` until `shutdown` resolves.
///
/// In-flight deliveries finish before this returns.
pub async fn serve(
    addr: SocketAddr,
    processor: Arc<Processor>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServiceError> {
    let listener = TcpListener::bind(addr).await.context(BindSnafu {
        address: addr.to_string(),
    })?;
    info!(%addr, "Push endpoint listening");

    axum::serve(listener, router(processor))
        .with_graceful_shutdown(shutdown)
        .await
        .context(ServeSnafu)
}

async fn push_handler(State(processor): State<Arc<Processor>>, body: Bytes) -> StatusCode {
    processor.handle_push(&body).await;
    StatusCode::NO_CONTENT
}

async fn health_handler() -> &'static str {
    "ok\n"
}
