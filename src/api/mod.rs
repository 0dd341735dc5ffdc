//! Read-only HTTP query layer over the output bundle.

pub mod handlers;
pub mod store;

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use store::BundleStore;

pub struct AppState {
    pub store: BundleStore,
    pub api_key_configured: bool,
}

impl AppState {
    pub fn new(output_dir: impl Into<PathBuf>, api_key_configured: bool) -> Self {
        Self {
            store: BundleStore::new(output_dir),
            api_key_configured,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/analysis", get(handlers::analysis))
        .route("/api/summary", get(handlers::summary))
        .route("/api/neighborhoods", get(handlers::neighborhoods))
        .route("/api/neighborhoods/{name}", get(handlers::neighborhood))
        .route("/api/search", get(handlers::search))
        .route("/api/stats", get(handlers::stats))
        .route("/api/insights", get(handlers::insights))
        .with_state(Arc::new(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        }))
}

/// Serves the query API on `addr` until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Civic Value Index API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
