//! Shipment progress and checkpoint arrival detection.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Checkpoint, CheckpointStatus, Coordinate};
use crate::spatial::{distance_km, haversine_distance};

/// Round to 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Completion percentage of the origin to destination leg at `current`.
///
/// `(total - remaining) / total * 100`, clamped to [0, 100] and rounded to
/// 2 decimals. Missing or malformed endpoints, or a zero-length leg, yield 0
/// instead of an error.
pub fn calculate_progress(
    origin: Option<Coordinate>,
    destination: Option<Coordinate>,
    current: Coordinate,
) -> f64 {
    let (Some(origin), Some(destination)) = (origin, destination) else {
        tracing::warn!("progress requested without origin/destination coordinates");
        return 0.0;
    };
    if !origin.is_valid() || !destination.is_valid() || !current.is_valid() {
        tracing::warn!(
            ?origin,
            ?destination,
            ?current,
            "malformed coordinates in progress calculation"
        );
        return 0.0;
    }

    let total = distance_km(origin, destination);
    if total <= f64::EPSILON {
        return 0.0;
    }
    let remaining = distance_km(current, destination);
    round2(((total - remaining) / total * 100.0).clamp(0.0, 100.0))
}

/// A checkpoint transition to ARRIVED.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointArrival {
    pub checkpoint_id: String,
    pub name: String,
    pub order: u32,
    pub distance_m: f64,
    pub arrived_at: DateTime<Utc>,
}

/// Evaluate `position` against the earliest pending checkpoint only.
///
/// Marks it ARRIVED and bumps its visit count when the position is within
/// its radius. Later checkpoints are never considered while an earlier one
/// is still pending.
pub fn check_checkpoints(
    checkpoints: &mut [Checkpoint],
    position: Coordinate,
    at: DateTime<Utc>,
) -> Option<CheckpointArrival> {
    let next = checkpoints
        .iter_mut()
        .filter(|checkpoint| checkpoint.status == CheckpointStatus::Pending)
        .min_by_key(|checkpoint| checkpoint.order)?;

    let distance_m = haversine_distance(position.lat, position.lon, next.target.lat, next.target.lon);
    if distance_m > next.radius_m {
        return None;
    }

    next.status = CheckpointStatus::Arrived;
    next.actual_arrival = Some(at);
    next.visit_count = next.visit_count.saturating_add(1);

    Some(CheckpointArrival {
        checkpoint_id: next.id.clone(),
        name: next.name.clone(),
        order: next.order,
        distance_m,
        arrived_at: at,
    })
}
