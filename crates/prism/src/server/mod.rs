//! HTTP front end over the `Prism` service.

pub mod response;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use prism_core::Prism;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Room for multipart framing on top of the configured upload limit.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the router with all routes.
pub fn build_router(prism: Arc<Prism>) -> Router {
    let body_limit =
        usize::try_from(prism.config().limits.max_upload_bytes()).unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health_check))
        .route(
            "/api/images",
            get(routes::list_images).post(routes::upload_image),
        )
        .route("/api/images/{id}", get(routes::get_image))
        .route(
            "/api/images/{id}/thumbnails/{size}",
            get(routes::get_thumbnail),
        )
        .route("/api/stats", get(routes::get_stats))
        .layer(DefaultBodyLimit::max(
            body_limit.saturating_add(MULTIPART_OVERHEAD),
        ))
        .with_state(AppState::new(prism))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind and serve until Ctrl-C, then let in-flight workers finish.
pub async fn run(prism: Arc<Prism>) -> anyhow::Result<()> {
    let server = &prism.config().server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address {}:{}: {e}", server.host, server.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}"))?;

    tracing::info!("Starting Prism on http://{}", addr);
    tracing::info!("Public base URL: {}", server.resolved_base_url());

    axum::serve(listener, build_router(Arc::clone(&prism)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let pending = prism.in_flight();
    if pending > 0 {
        tracing::info!("Waiting for {pending} in-flight image(s) to finish");
    }
    prism.wait_idle().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
