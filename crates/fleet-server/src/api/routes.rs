//! REST API routes.

use axum::{
    extract::State,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{alerts, dispatches, fleet, request_id, tracking};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    let master_data = Router::new()
        .route("/v1/orders/:id", put(fleet::upsert_order))
        .route("/v1/vehicles/:id", put(fleet::upsert_vehicle))
        .route("/v1/vehicles/:id/location", get(fleet::vehicle_location))
        .route("/v1/drivers/:id", put(fleet::upsert_driver));

    let dispatch_routes = Router::new()
        .route(
            "/v1/dispatches",
            post(dispatches::create_dispatch).get(dispatches::list_dispatches),
        )
        .route("/v1/dispatches/optimize", post(dispatches::optimize_route))
        .route("/v1/dispatches/statistics", get(dispatches::statistics))
        .route("/v1/dispatches/available-orders", get(dispatches::available_orders))
        .route(
            "/v1/dispatches/available-vehicles",
            get(dispatches::available_vehicles),
        )
        .route("/v1/dispatches/:id", get(dispatches::get_dispatch))
        .route("/v1/dispatches/:id/status", put(dispatches::update_status));

    let tracking_routes = Router::new()
        .route("/v1/shipments/:id/locations", post(tracking::report_location))
        .route(
            "/v1/shipments/:id/locations/batch",
            post(tracking::report_location_batch),
        )
        .route(
            "/v1/shipments/:id/events",
            post(tracking::report_event).get(tracking::list_events),
        )
        .route("/v1/shipments/:id/history", get(tracking::history))
        .route(
            "/v1/shipments/:id/route",
            get(tracking::get_route).post(tracking::plan_route),
        );

    let alert_routes = Router::new()
        .route("/v1/alerts", get(alerts::list_alerts))
        .route("/v1/alerts/:id/acknowledge", post(alerts::acknowledge))
        .route("/v1/alerts/:id/resolve", post(alerts::resolve))
        .route("/v1/alerts/:id/dismiss", post(alerts::dismiss));

    Router::new()
        .route("/health", get(health))
        .merge(master_data)
        .merge(dispatch_routes)
        .merge(tracking_routes)
        .merge(alert_routes)
        .layer(middleware::from_fn(request_id::ensure_request_id))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_s": state.uptime_secs(),
        "dispatches": state.store.dispatch_count(),
        "shipments": state.store.shipment_count(),
        "persistence": state.persistence_enabled(),
        "persist_backlog": state.persist_backlog(),
    }))
}
