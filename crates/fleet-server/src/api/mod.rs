//! API routes for the fleet server.

pub mod alerts;
pub mod dispatches;
pub mod error;
pub mod fleet;
pub mod request_id;
mod routes;
pub mod tracking;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    routes::create_router()
}
