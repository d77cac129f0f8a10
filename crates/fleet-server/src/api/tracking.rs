//! Shipment tracking endpoints: position reports, events, history and routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use fleet_core::{
    BatchOutcome, BatchRequest, EventReceipt, EventReport, HistoryPage, HistoryQuery,
    IngestedPoint, LocationReport, PlanRouteRequest, RouteView, ShipmentEvent, TrackingRoute,
};

use crate::api::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RouteQuery {
    /// Simplify the recorded track with this tolerance (metres)
    pub tolerance_m: Option<f64>,
}

pub async fn report_location(
    State(state): State<Arc<AppState>>,
    Path(shipment_id): Path<String>,
    Json(report): Json<LocationReport>,
) -> ApiResult<(StatusCode, Json<IngestedPoint>)> {
    let recorded = state.ingest.ingest_location(&shipment_id, &report)?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

pub async fn report_location_batch(
    State(state): State<Arc<AppState>>,
    Path(shipment_id): Path<String>,
    Json(batch): Json<BatchRequest>,
) -> ApiResult<Json<BatchOutcome>> {
    let outcome = state.ingest.ingest_batch(&shipment_id, &batch)?;
    if outcome.failed > 0 {
        tracing::warn!(
            shipment_id = %shipment_id,
            failed = outcome.failed,
            successful = outcome.successful,
            "Batch partially rejected"
        );
    }
    Ok(Json(outcome))
}

pub async fn report_event(
    State(state): State<Arc<AppState>>,
    Path(shipment_id): Path<String>,
    Json(report): Json<EventReport>,
) -> ApiResult<(StatusCode, Json<EventReceipt>)> {
    let receipt = state.ingest.report_event(&shipment_id, &report)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(shipment_id): Path<String>,
) -> ApiResult<Json<Vec<ShipmentEvent>>> {
    Ok(Json(state.ingest.events(&shipment_id)?))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(shipment_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryPage>> {
    Ok(Json(state.ingest.history(&shipment_id, &query)?))
}

pub async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(shipment_id): Path<String>,
    Query(query): Query<RouteQuery>,
) -> ApiResult<Json<RouteView>> {
    Ok(Json(state.ingest.route_view(&shipment_id, query.tolerance_m)?))
}

pub async fn plan_route(
    State(state): State<Arc<AppState>>,
    Path(shipment_id): Path<String>,
    Json(request): Json<PlanRouteRequest>,
) -> ApiResult<(StatusCode, Json<TrackingRoute>)> {
    let route = state.ingest.plan_route(&shipment_id, &request)?;
    Ok((StatusCode::CREATED, Json(route)))
}
