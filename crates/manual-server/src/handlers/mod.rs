//! Request handlers.

mod attachments;
mod manuals;

pub use attachments::show_attachment;
pub use manuals::{create_manual, destroy_manual, list_manuals, show_manual, update_manual};

use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}
