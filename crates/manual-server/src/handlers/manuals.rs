//! `/api/v1/manuals` endpoints.

use crate::error::ApiError;
use crate::form::ManualForm;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use manual_core::{ManualDetail, ManualSummary};
use std::sync::Arc;
use tracing::debug;

/// Ids that are not integers cannot name a manual.
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse().map_err(|_| {
        debug!("Rejecting non-numeric manual id {:?}", raw);
        ApiError::manual_not_found()
    })
}

pub async fn list_manuals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ManualSummary>>, ApiError> {
    Ok(Json(state.service.list().await?))
}

pub async fn show_manual(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ManualDetail>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.get(id).await?))
}

pub async fn create_manual(
    State(state): State<Arc<AppState>>,
    ManualForm(write): ManualForm,
) -> Result<(StatusCode, Json<ManualDetail>), ApiError> {
    let manual = state.service.create(write).await?;
    Ok((StatusCode::CREATED, Json(manual)))
}

/// PATCH and PUT both land here.
pub async fn update_manual(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ManualForm(write): ManualForm,
) -> Result<Json<ManualDetail>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.update(id, write).await?))
}

pub async fn destroy_manual(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
