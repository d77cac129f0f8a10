//! Pickup/delivery sequencing and dispatch pricing.
//!
//! The sequencing is a deterministic nearest-neighbour heuristic, not a
//! global optimum.

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};
use crate::models::{Coordinate, CostBreakdown, Order, Priority, Vehicle, VehicleType};
use crate::progress::round2;
use crate::rules::{PricingConfig, RouteOptimizerConfig};
use crate::spatial::{distance_km, path_distance_km};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopKind {
    Pickup,
    Delivery,
}

/// One pickup or delivery in the planned sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub sequence: usize,
    pub kind: StopKind,
    pub order_id: String,
    pub address: String,
    pub location: Coordinate,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePreferences {
    /// Grouped nearest-neighbour ordering when true, priority-paired when false
    pub prioritize_distance: bool,
    /// Overrides the configured average speed (km/h)
    pub average_speed_kmh: Option<f64>,
}

impl Default for RoutePreferences {
    fn default() -> Self {
        Self {
            prioritize_distance: true,
            average_speed_kmh: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    pub stops: Vec<RouteStop>,
    pub total_distance_km: f64,
    pub estimated_duration_min: f64,
    pub total_weight: f64,
    pub total_volume: f64,
    pub weight_utilization_pct: f64,
    pub volume_utilization_pct: f64,
}

/// Fail with `CapacityExceeded` when the load does not fit the vehicle.
pub fn check_capacity(weight: f64, volume: f64, vehicle: &Vehicle) -> FleetResult<()> {
    if weight > vehicle.max_load {
        return Err(FleetError::CapacityExceeded(format!(
            "total weight {:.1} kg exceeds vehicle {} capacity {:.1} kg",
            weight, vehicle.plate_number, vehicle.max_load
        )));
    }
    if volume > vehicle.max_volume {
        return Err(FleetError::CapacityExceeded(format!(
            "total volume {:.2} m³ exceeds vehicle {} capacity {:.2} m³",
            volume, vehicle.plate_number, vehicle.max_volume
        )));
    }
    Ok(())
}

/// Sequence the pickups and deliveries for `orders` on `vehicle`, gated on
/// the summed order loads.
pub fn optimize_route(
    orders: &[Order],
    vehicle: &Vehicle,
    preferences: &RoutePreferences,
    config: &RouteOptimizerConfig,
) -> FleetResult<RoutePlan> {
    let total_weight: f64 = orders.iter().map(|o| o.cargo_weight).sum();
    let total_volume: f64 = orders.iter().map(|o| o.cargo_volume).sum();
    check_capacity(total_weight, total_volume, vehicle)?;
    sequence_route(orders, vehicle, (total_weight, total_volume), preferences, config)
}

/// Sequence `orders` for an already accepted `(weight, volume)` load.
/// Performs no capacity check; utilization is reported against `load`.
pub fn sequence_route(
    orders: &[Order],
    vehicle: &Vehicle,
    load: (f64, f64),
    preferences: &RoutePreferences,
    config: &RouteOptimizerConfig,
) -> FleetResult<RoutePlan> {
    if orders.is_empty() {
        return Err(FleetError::validation("order_ids", "at least one order is required"));
    }
    let (total_weight, total_volume) = load;

    let mut stops = if preferences.prioritize_distance {
        grouped_sequence(orders)
    } else {
        paired_sequence(orders)
    };
    for (idx, stop) in stops.iter_mut().enumerate() {
        stop.sequence = idx;
    }

    let path: Vec<Coordinate> = stops.iter().map(|stop| stop.location).collect();
    let total_distance_km = path_distance_km(&path);
    let speed = preferences
        .average_speed_kmh
        .filter(|speed| speed.is_finite() && *speed > 0.0)
        .unwrap_or(config.average_speed_kmh);
    let estimated_duration_min =
        travel_minutes(total_distance_km, speed) + stops.len() as f64 * config.stop_dwell_min;

    Ok(RoutePlan {
        stops,
        total_distance_km: round2(total_distance_km),
        estimated_duration_min: estimated_duration_min.ceil(),
        total_weight,
        total_volume,
        weight_utilization_pct: utilization(total_weight, vehicle.max_load),
        volume_utilization_pct: utilization(total_volume, vehicle.max_volume),
    })
}

/// All pickups nearest-first from the first order's pickup, then all
/// deliveries nearest-first from the last pickup.
fn grouped_sequence(orders: &[Order]) -> Vec<RouteStop> {
    let pickups: Vec<RouteStop> = orders.iter().map(|o| stop(o, StopKind::Pickup)).collect();
    let deliveries: Vec<RouteStop> = orders.iter().map(|o| stop(o, StopKind::Delivery)).collect();

    let mut sequence = nearest_neighbour(pickups, None);
    let last_pickup = sequence.last().map(|s| s.location);
    sequence.extend(nearest_neighbour(deliveries, last_pickup));
    sequence
}

/// Orders by descending priority (stable on input order), each as pickup then delivery.
fn paired_sequence(orders: &[Order]) -> Vec<RouteStop> {
    let mut ranked: Vec<&Order> = orders.iter().collect();
    ranked.sort_by(|a, b| b.priority.cmp(&a.priority));
    ranked
        .into_iter()
        .flat_map(|order| [stop(order, StopKind::Pickup), stop(order, StopKind::Delivery)])
        .collect()
}

/// Greedy nearest-neighbour ordering. Without `from`, starts at the first stop.
fn nearest_neighbour(mut remaining: Vec<RouteStop>, from: Option<Coordinate>) -> Vec<RouteStop> {
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut current = match from {
        Some(position) => position,
        None => {
            if remaining.is_empty() {
                return ordered;
            }
            let first = remaining.remove(0);
            let position = first.location;
            ordered.push(first);
            position
        }
    };

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, candidate) in remaining.iter().enumerate() {
            let dist = distance_km(current, candidate.location);
            // strict comparison keeps the earliest input on ties
            if dist < best_dist {
                best = idx;
                best_dist = dist;
            }
        }
        let next = remaining.remove(best);
        current = next.location;
        ordered.push(next);
    }
    ordered
}

fn stop(order: &Order, kind: StopKind) -> RouteStop {
    let (address, location) = match kind {
        StopKind::Pickup => (&order.origin_address, order.origin),
        StopKind::Delivery => (&order.destination_address, order.destination),
    };
    RouteStop {
        sequence: 0,
        kind,
        order_id: order.id.clone(),
        address: address.clone(),
        location,
        priority: order.priority,
    }
}

fn utilization(load: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        return 0.0;
    }
    round2(load / capacity * 100.0)
}

/// Minutes to cover `distance_km` at `speed_kmh`.
pub fn travel_minutes(distance_km: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }
    distance_km / speed_kmh * 60.0
}

/// Planned distance (km) and duration (min) of a polyline at a constant speed.
pub fn route_metrics(points: &[Coordinate], speed_kmh: f64) -> (f64, f64) {
    let distance = path_distance_km(points);
    (round2(distance), travel_minutes(distance, speed_kmh).ceil())
}

/// Price a dispatch of `distance_km` on a vehicle of `vehicle_type`.
pub fn estimate_cost(distance_km: f64, vehicle_type: VehicleType, pricing: &PricingConfig) -> CostBreakdown {
    let distance_km = distance_km.max(0.0);
    let base_rate = (distance_km * pricing.rate_per_km(vehicle_type)).max(pricing.minimum_charge);
    let fuel_surcharge = base_rate * pricing.fuel_surcharge_pct / 100.0;
    let toll_fees = distance_km * pricing.toll_per_km(vehicle_type);

    let base_rate = round2(base_rate);
    let fuel_surcharge = round2(fuel_surcharge);
    let toll_fees = round2(toll_fees);
    CostBreakdown {
        distance_km: round2(distance_km),
        base_rate,
        fuel_surcharge,
        toll_fees,
        total_amount: round2(base_rate + fuel_surcharge + toll_fees),
    }
}
