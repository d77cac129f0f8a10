//! Master-data feed: orders, vehicles and drivers pushed by collaborators.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use fleet_core::models::{Driver, Order, Vehicle};
use fleet_core::{FleetError, FleetRepository, VehicleLocation};

use crate::api::error::ApiResult;
use crate::state::AppState;

/// The path id wins over any `id` in the body.
fn with_path_id<T: DeserializeOwned>(id: &str, mut body: Value) -> Result<T, FleetError> {
    if id.trim().is_empty() {
        return Err(FleetError::validation("id", "must not be empty"));
    }
    match body.as_object_mut() {
        Some(fields) => {
            fields.insert("id".to_string(), Value::String(id.to_string()));
        }
        None => return Err(FleetError::validation("body", "expected a JSON object")),
    }
    serde_json::from_value(body).map_err(|err| FleetError::validation("body", err.to_string()))
}

pub async fn upsert_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Order>> {
    let order: Order = with_path_id(&id, body)?;
    if !order.origin.is_valid() {
        return Err(FleetError::validation("origin", "coordinates out of range").into());
    }
    if !order.destination.is_valid() {
        return Err(FleetError::validation("destination", "coordinates out of range").into());
    }
    if order.cargo_weight < 0.0 || order.cargo_volume < 0.0 {
        return Err(FleetError::validation("cargo_weight", "cargo must not be negative").into());
    }

    state.store.upsert_order(order)?;
    let stored = state
        .store
        .order(&id)
        .ok_or_else(|| FleetError::Internal(format!("order {id} vanished after upsert")))?;
    tracing::info!(order_id = %id, status = %stored.status, "Order upserted");
    Ok(Json(stored))
}

pub async fn upsert_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Vehicle>> {
    let vehicle: Vehicle = with_path_id(&id, body)?;
    if vehicle.max_load <= 0.0 {
        return Err(FleetError::validation("max_load", "must be positive").into());
    }
    if vehicle.max_volume <= 0.0 {
        return Err(FleetError::validation("max_volume", "must be positive").into());
    }

    state.store.upsert_vehicle(vehicle)?;
    let stored = state
        .store
        .vehicle(&id)
        .ok_or_else(|| FleetError::Internal(format!("vehicle {id} vanished after upsert")))?;
    tracing::info!(vehicle_id = %id, status = %stored.status, "Vehicle upserted");
    Ok(Json(stored))
}

pub async fn upsert_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Driver>> {
    let driver: Driver = with_path_id(&id, body)?;
    if driver.name.trim().is_empty() {
        return Err(FleetError::validation("name", "must not be empty").into());
    }

    state.store.upsert_driver(driver)?;
    let stored = state
        .store
        .driver(&id)
        .ok_or_else(|| FleetError::Internal(format!("driver {id} vanished after upsert")))?;
    tracing::info!(driver_id = %id, status = %stored.status, "Driver upserted");
    Ok(Json(stored))
}

/// Latest known position of a vehicle; `null` when it never reported.
pub async fn vehicle_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Option<VehicleLocation>> {
    Json(state.ingest.vehicle_location(&id))
}
