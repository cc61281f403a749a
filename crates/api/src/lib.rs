//! `api` crate: inbound HTTP endpoint for webhook-driven triggers.
//!
//! Exposes:
//!   POST   /webhook/{path}
//!
//! Each path is bound to one trigger node; the trigger turns the request into
//! items, which are handed to the route's channel for whoever runs the
//! workflow.

pub mod handlers;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::post;
use axum::Router;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::{AppState, WebhookRoute};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/:path", post(handlers::webhooks::handle_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    bind: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
