//! Dispatch allocation endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use fleet_core::{
    CreateDispatchRequest, Dispatch, DispatchCreated, DispatchQuery, DispatchStatistics,
    OptimizeRouteRequest, Order, Page, RoutePlan, Shipment, StatusChangeRequest, Vehicle,
};

use crate::api::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DispatchDetail {
    pub dispatch: Dispatch,
    pub shipments: Vec<Shipment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn create_dispatch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateDispatchRequest>,
) -> ApiResult<(StatusCode, Json<DispatchCreated>)> {
    let created = state.dispatch.create_dispatch(request)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_dispatches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DispatchQuery>,
) -> Json<Page<Dispatch>> {
    Json(state.dispatch.list_dispatches(&query))
}

pub async fn get_dispatch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DispatchDetail>> {
    let dispatch = state.dispatch.dispatch(&id)?;
    let shipments = state.dispatch.shipments(&id);
    Ok(Json(DispatchDetail {
        dispatch,
        shipments,
    }))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(change): Json<StatusChangeRequest>,
) -> ApiResult<Json<Dispatch>> {
    Ok(Json(state.dispatch.update_status(&id, change)?))
}

pub async fn optimize_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OptimizeRouteRequest>,
) -> ApiResult<Json<RoutePlan>> {
    Ok(Json(state.dispatch.optimize_route(&request)?))
}

pub async fn statistics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatisticsQuery>,
) -> Json<DispatchStatistics> {
    Json(state.dispatch.statistics(query.from, query.to))
}

pub async fn available_orders(State(state): State<Arc<AppState>>) -> Json<Vec<Order>> {
    Json(state.dispatch.available_orders())
}

pub async fn available_vehicles(State(state): State<Arc<AppState>>) -> Json<Vec<Vehicle>> {
    Json(state.dispatch.available_vehicles())
}
