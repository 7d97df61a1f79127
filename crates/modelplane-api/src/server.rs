//! HTTP server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use modelplane_common::Error;
use modelplane_lifecycle::LifecycleController;

use crate::handlers::{
    create_serving, create_training, delete_serving, get_serving, get_training, list_training,
};

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle operations for all tenants
    pub controller: Arc<LifecycleController>,
}

/// Build the application router
///
/// Routes:
/// - `GET /healthz` - liveness, no identity required
/// - `POST|GET /training` - start a run, list runs
/// - `GET /training/{run_id}` - status of one run
/// - `POST|GET|DELETE /serving` - the tenant's serving deployment
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/training", post(create_training).get(list_training))
        .route("/training/{run_id}", get(get_training))
        .route(
            "/serving",
            post(create_serving)
                .get(get_serving)
                .delete(delete_serving),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until SIGINT or SIGTERM, then drain in-flight requests
pub async fn start_server(addr: SocketAddr, state: AppState) -> Result<(), Error> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::internal_with_context("bind", format!("{}: {}", addr, e)))?;

    info!(addr = %addr, "Starting modelplane API server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::internal_with_context("serve", e.to_string()))?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
