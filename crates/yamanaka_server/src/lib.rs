//! # Yamanaka Sync Server
//!
//! HTTP surface of the sync engine.
//!
//! This crate provides:
//! - Mutation and read endpoints (push, initial replace, pull, check)
//! - The per-device event stream with offline catch-up
//! - The periodic history snapshotter
//! - Router assembly and the server run loop

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
mod events;
mod handlers;
mod snapshot;

pub use config::ServerConfig;
pub use context::SyncContext;
pub use error::{ApiError, ApiResult};
pub use events::EventStream;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Upper bound on request bodies; initial syncs upload a whole vault.
const MAX_BODY_BYTES: usize = 1024 * 1024 * 1024;

async fn banner() -> &'static str {
    "Yamanaka sync server is running."
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let origin = allowed_origin.parse::<HeaderValue>().unwrap_or_else(|_| {
        warn!(allowed_origin, "configured origin is not a valid header value, allowing any");
        HeaderValue::from_static("*")
    });
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Builds the router over shared state.
pub fn router(ctx: Arc<SyncContext>) -> Router {
    let cors = cors_layer(&ctx.config.allowed_origin);

    Router::new()
        .route("/", get(banner))
        .route("/api/check", get(handlers::check))
        .route("/api/sync/pull", get(handlers::pull))
        .route("/api/sync/push", post(handlers::push))
        .route("/api/sync/initial", post(handlers::initial_sync))
        .route("/api/events", get(events::events))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(ctx)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

/// Opens the vault and serves until interrupted.
pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let listen_addr = config.listen_addr;
    let ctx = SyncContext::open(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let snapshotter = snapshot::spawn_snapshotter(Arc::clone(&ctx), shutdown_rx);

    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(addr = %listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = snapshotter.await;
    Ok(())
}
