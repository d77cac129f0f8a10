//! Alert listing and operator actions.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use fleet_core::{Alert, AlertQuery, Page};

use crate::api::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AcknowledgeBody {
    pub acknowledged_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveBody {
    #[serde(alias = "resolution_notes")]
    pub resolution: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DismissBody {
    pub notes: Option<String>,
}

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> Json<Page<Alert>> {
    Json(state.alerts.list(&query))
}

pub async fn acknowledge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<AcknowledgeBody>>,
) -> ApiResult<Json<Alert>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(state.alerts.acknowledge(&id, body.acknowledged_by)?))
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ResolveBody>>,
) -> ApiResult<Json<Alert>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(state.alerts.resolve(&id, body.resolution)?))
}

pub async fn dismiss(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<DismissBody>>,
) -> ApiResult<Json<Alert>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(state.alerts.dismiss(&id, body.notes)?))
}
