//! HTTP server implementation using Axum.

use crate::handlers::{
    create_manual, destroy_manual, handle_health, list_manuals, show_attachment, show_manual,
    update_manual,
};
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use manual_core::ManualService;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    pub service: ManualService,
}

/// Build the router for the manual API.
pub fn router(service: ManualService, max_upload_bytes: usize) -> Router {
    let state = Arc::new(AppState { service });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/v1/manuals", get(list_manuals).post(create_manual))
        .route(
            "/api/v1/manuals/:id",
            get(show_manual)
                .patch(update_manual)
                .put(update_manual)
                .delete(destroy_manual),
        )
        .route("/api/v1/attachments/:key", get(show_attachment))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    service: ManualService,
    host: &str,
    port: u16,
    max_upload_bytes: usize,
) -> anyhow::Result<SocketAddr> {
    let app = router(service, max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
