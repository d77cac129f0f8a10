//! Dispatch allocation: eligibility checks, pricing, reservation and status changes.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::error::{FleetError, FleetResult};
use crate::lifecycle::{check_dispatch_transition, DispatchCascade};
use crate::locks::ShipmentLocks;
use crate::models::{
    Dispatch, DispatchStatus, Order, OrderStatus, Page, Shipment, ShipmentStatus, Vehicle,
    VehicleStatus,
};
use crate::progress::round2;
use crate::repository::{DispatchCommit, DispatchUpdate, FleetRepository};
use crate::routing::{self, RoutePlan, RoutePreferences};
use crate::rules::{PricingConfig, RouteOptimizerConfig};
use crate::spatial::distance_km;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDispatchRequest {
    pub order_ids: Vec<String>,
    pub vehicle_id: String,
    pub driver_id: String,
    pub planned_departure: DateTime<Utc>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub total_weight: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub total_value: Option<f64>,
    #[serde(default)]
    pub origin_address: Option<String>,
    #[serde(default)]
    pub destination_address: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchCreated {
    pub dispatch: Dispatch,
    pub shipments: Vec<Shipment>,
    pub route: RoutePlan,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusChangeRequest {
    pub status: DispatchStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeRouteRequest {
    pub order_ids: Vec<String>,
    pub vehicle_id: String,
    #[serde(default)]
    pub preferences: RoutePreferences,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchQuery {
    pub status: Option<DispatchStatus>,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    /// Inclusive lower bound on planned departure
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on planned departure
    pub to: Option<DateTime<Utc>>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceUsage {
    pub id: String,
    pub label: String,
    pub dispatches: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchStatistics {
    pub total_dispatches: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Completed share of all dispatches in percent
    pub completion_rate: f64,
    pub total_distance_km: f64,
    pub total_revenue: f64,
    pub average_cost: f64,
    pub top_vehicles: Vec<ResourceUsage>,
    pub top_drivers: Vec<ResourceUsage>,
}

const DEFAULT_PAGE_LIMIT: usize = 20;
const MAX_PAGE_LIMIT: usize = 100;
const TOP_RESOURCES: usize = 5;

/// Allocates vehicles and drivers to confirmed orders.
pub struct DispatchAllocator<R> {
    repo: Arc<R>,
    locks: Arc<ShipmentLocks>,
    pricing: PricingConfig,
    routing: RouteOptimizerConfig,
}

impl<R: FleetRepository> DispatchAllocator<R> {
    pub fn new(
        repo: Arc<R>,
        locks: Arc<ShipmentLocks>,
        pricing: PricingConfig,
        routing: RouteOptimizerConfig,
    ) -> Self {
        Self {
            repo,
            locks,
            pricing,
            routing,
        }
    }

    /// Create a SCHEDULED dispatch with one shipment per order and reserve
    /// the vehicle and driver. Nothing is written unless every check passes.
    pub fn create_dispatch(&self, request: CreateDispatchRequest) -> FleetResult<DispatchCreated> {
        validate_order_ids(&request.order_ids)?;

        let orders = self.load_orders(&request.order_ids)?;
        if let Some(order) = orders.iter().find(|o| o.status != OrderStatus::Confirmed) {
            return Err(FleetError::InvalidState(format!(
                "order {} is {}, expected CONFIRMED",
                order.order_number, order.status
            )));
        }

        let vehicle = self
            .repo
            .vehicle(&request.vehicle_id)
            .ok_or_else(|| FleetError::not_found("vehicle", &request.vehicle_id))?;
        let driver = self
            .repo
            .driver(&request.driver_id)
            .ok_or_else(|| FleetError::not_found("driver", &request.driver_id))?;
        if vehicle.status != VehicleStatus::Available {
            return Err(FleetError::ResourceUnavailable(format!(
                "vehicle {} is {}",
                vehicle.plate_number, vehicle.status
            )));
        }
        if driver.status != crate::models::DriverStatus::Available {
            return Err(FleetError::ResourceUnavailable(format!(
                "driver {} is {}",
                driver.name, driver.status
            )));
        }

        let total_weight = supplied_or_sum(request.total_weight, "total_weight", &orders, |o| {
            o.cargo_weight
        })?;
        let total_volume = supplied_or_sum(request.total_volume, "total_volume", &orders, |o| {
            o.cargo_volume
        })?;
        let total_value =
            supplied_or_sum(request.total_value, "total_value", &orders, |o| o.cargo_value)?;
        routing::check_capacity(total_weight, total_volume, &vehicle)?;

        // the resolved totals are the only capacity gate
        let plan = routing::sequence_route(
            &orders,
            &vehicle,
            (total_weight, total_volume),
            &RoutePreferences::default(),
            &self.routing,
        )?;
        let first = &orders[0];
        let last = &orders[orders.len() - 1];
        let distance = if plan.total_distance_km > 0.0 {
            plan.total_distance_km
        } else {
            distance_km(first.origin, last.destination)
        };
        let cost = routing::estimate_cost(distance, vehicle.vehicle_type, &self.pricing);
        let duration_min = plan.estimated_duration_min;
        let estimated_arrival =
            request.planned_departure + Duration::seconds((duration_min * 60.0).round() as i64);

        let now = Utc::now();
        let dispatch = Dispatch {
            id: uuid::Uuid::new_v4().to_string(),
            dispatch_number: document_number("DSP", now),
            customer_id: request
                .customer_id
                .clone()
                .or_else(|| first.customer_id.clone()),
            vehicle_id: vehicle.id.clone(),
            driver_id: driver.id.clone(),
            order_ids: request.order_ids.clone(),
            origin_address: request
                .origin_address
                .clone()
                .unwrap_or_else(|| first.origin_address.clone()),
            destination_address: request
                .destination_address
                .clone()
                .unwrap_or_else(|| last.destination_address.clone()),
            origin: Some(first.origin),
            destination: Some(last.destination),
            planned_departure: request.planned_departure,
            actual_departure: None,
            estimated_arrival: Some(estimated_arrival),
            actual_arrival: None,
            total_weight,
            total_volume,
            total_value,
            estimated_duration_min: duration_min,
            cost,
            status: DispatchStatus::Scheduled,
            progress: 0.0,
            current_location: None,
            current_address: None,
            instructions: request.instructions.clone(),
            cancel_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        let shipments: Vec<Shipment> = orders
            .iter()
            .enumerate()
            .map(|(idx, order)| Shipment {
                id: uuid::Uuid::new_v4().to_string(),
                shipment_number: document_number("SHP", now),
                dispatch_id: Some(dispatch.id.clone()),
                order_id: order.id.clone(),
                vehicle_id: Some(vehicle.id.clone()),
                driver_id: Some(driver.id.clone()),
                sequence: idx as u32,
                origin_address: order.origin_address.clone(),
                destination_address: order.destination_address.clone(),
                origin: Some(order.origin),
                destination: Some(order.destination),
                status: ShipmentStatus::Scheduled,
                current_location: None,
                current_address: None,
                progress: 0.0,
                route_id: None,
                estimated_departure: Some(request.planned_departure),
                estimated_arrival: Some(estimated_arrival),
                actual_departure: None,
                actual_arrival: None,
                notes: None,
                updated_at: now,
            })
            .collect();

        self.repo.commit_dispatch(DispatchCommit {
            dispatch: dispatch.clone(),
            shipments: shipments.clone(),
        })?;

        tracing::info!(
            dispatch_id = %dispatch.id,
            dispatch_number = %dispatch.dispatch_number,
            vehicle_id = %dispatch.vehicle_id,
            driver_id = %dispatch.driver_id,
            orders = dispatch.order_ids.len(),
            total = dispatch.cost.total_amount,
            "Dispatch created"
        );

        Ok(DispatchCreated {
            dispatch,
            shipments,
            route: plan,
        })
    }

    /// Move a dispatch through the lifecycle table and cascade to its
    /// vehicle, driver, orders and shipments.
    pub fn update_status(&self, dispatch_id: &str, change: StatusChangeRequest) -> FleetResult<Dispatch> {
        let current = self
            .repo
            .dispatch(dispatch_id)
            .ok_or_else(|| FleetError::not_found("dispatch", dispatch_id))?;
        check_dispatch_transition(current.status, change.status)?;

        let now = Utc::now();
        let mut next = current.clone();
        next.status = change.status;
        next.updated_at = now;
        match change.status {
            DispatchStatus::InTransit => {
                next.actual_departure.get_or_insert(now);
            }
            DispatchStatus::Completed => {
                next.actual_arrival = Some(now);
                next.progress = 100.0;
            }
            DispatchStatus::Cancelled => {
                next.cancelled_at = Some(now);
                next.cancel_reason = change.reason.clone();
            }
            _ => {}
        }
        if let Some(reason) = change.reason.filter(|_| change.status != DispatchStatus::Cancelled) {
            next.instructions = Some(match next.instructions.take() {
                Some(existing) => format!("{existing}\n{reason}"),
                None => reason,
            });
        }

        let cascade = DispatchCascade::for_status(change.status);

        // hold the shipment locks so ingest cannot overwrite the cascade
        let mut shipment_ids: Vec<String> = self
            .repo
            .shipments_for_dispatch(dispatch_id)
            .into_iter()
            .map(|s| s.id)
            .collect();
        shipment_ids.sort();
        let updated = {
            let handles: Vec<_> = shipment_ids.iter().map(|id| self.locks.handle(id)).collect();
            let _guards: Vec<_> = handles.iter().map(|h| ShipmentLocks::acquire(h)).collect();
            self.repo.commit_dispatch_update(DispatchUpdate {
                expected: current.status,
                dispatch: next,
                cascade,
                at: now,
            })?
        };
        if updated.status.is_terminal() {
            for id in &shipment_ids {
                self.locks.release(id);
            }
        }

        tracing::info!(
            dispatch_id = %updated.id,
            from = %current.status,
            to = %updated.status,
            "Dispatch status changed"
        );
        Ok(updated)
    }

    /// What-if sequencing for a set of orders on a vehicle.
    pub fn optimize_route(&self, request: &OptimizeRouteRequest) -> FleetResult<RoutePlan> {
        validate_order_ids(&request.order_ids)?;
        let orders = self.load_orders(&request.order_ids)?;
        let vehicle = self
            .repo
            .vehicle(&request.vehicle_id)
            .ok_or_else(|| FleetError::not_found("vehicle", &request.vehicle_id))?;
        routing::optimize_route(&orders, &vehicle, &request.preferences, &self.routing)
    }

    pub fn dispatch(&self, id: &str) -> FleetResult<Dispatch> {
        self.repo
            .dispatch(id)
            .ok_or_else(|| FleetError::not_found("dispatch", id))
    }

    pub fn shipments(&self, dispatch_id: &str) -> Vec<Shipment> {
        self.repo.shipments_for_dispatch(dispatch_id)
    }

    /// Newest first.
    pub fn list_dispatches(&self, query: &DispatchQuery) -> Page<Dispatch> {
        let mut dispatches: Vec<Dispatch> = self
            .repo
            .dispatches()
            .into_iter()
            .filter(|d| query.status.map_or(true, |status| d.status == status))
            .filter(|d| query.vehicle_id.as_ref().map_or(true, |id| &d.vehicle_id == id))
            .filter(|d| query.driver_id.as_ref().map_or(true, |id| &d.driver_id == id))
            .filter(|d| in_range(d.planned_departure, query.from, query.to))
            .collect();
        dispatches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
        Page::paginate(dispatches, query.page.unwrap_or(1), limit)
    }

    /// CONFIRMED orders, highest priority first.
    pub fn available_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .repo
            .orders()
            .into_iter()
            .filter(|o| o.status == OrderStatus::Confirmed)
            .collect();
        orders.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.order_number.cmp(&b.order_number))
        });
        orders
    }

    pub fn available_vehicles(&self) -> Vec<Vehicle> {
        let mut vehicles: Vec<Vehicle> = self
            .repo
            .vehicles()
            .into_iter()
            .filter(|v| v.status == VehicleStatus::Available)
            .collect();
        vehicles.sort_by(|a, b| a.plate_number.cmp(&b.plate_number));
        vehicles
    }

    pub fn statistics(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DispatchStatistics {
        let dispatches: Vec<Dispatch> = self
            .repo
            .dispatches()
            .into_iter()
            .filter(|d| in_range(d.created_at, from, to))
            .collect();

        let total = dispatches.len();
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut vehicle_counts: HashMap<&str, usize> = HashMap::new();
        let mut driver_counts: HashMap<&str, usize> = HashMap::new();
        let mut total_distance = 0.0;
        let mut total_revenue = 0.0;
        for dispatch in &dispatches {
            *by_status.entry(dispatch.status.to_string()).or_default() += 1;
            *vehicle_counts.entry(&dispatch.vehicle_id).or_default() += 1;
            *driver_counts.entry(&dispatch.driver_id).or_default() += 1;
            total_distance += dispatch.cost.distance_km;
            total_revenue += dispatch.cost.total_amount;
        }

        let completed = by_status
            .get(DispatchStatus::Completed.as_str())
            .copied()
            .unwrap_or(0);
        let ratio = |n: f64| if total == 0 { 0.0 } else { n / total as f64 };

        DispatchStatistics {
            total_dispatches: total,
            by_status,
            completion_rate: round2(ratio(completed as f64) * 100.0),
            total_distance_km: round2(total_distance),
            total_revenue: round2(total_revenue),
            average_cost: round2(ratio(total_revenue)),
            top_vehicles: top_usage(vehicle_counts, |id| {
                self.repo.vehicle(id).map(|v| v.plate_number)
            }),
            top_drivers: top_usage(driver_counts, |id| self.repo.driver(id).map(|d| d.name)),
        }
    }

    fn load_orders(&self, order_ids: &[String]) -> FleetResult<Vec<Order>> {
        order_ids
            .iter()
            .map(|id| {
                self.repo
                    .order(id)
                    .ok_or_else(|| FleetError::not_found("order", id))
            })
            .collect()
    }
}

fn validate_order_ids(order_ids: &[String]) -> FleetResult<()> {
    if order_ids.is_empty() {
        return Err(FleetError::validation("order_ids", "at least one order is required"));
    }
    let mut seen = HashSet::new();
    for id in order_ids {
        if id.trim().is_empty() {
            return Err(FleetError::validation("order_ids", "order ids must not be blank"));
        }
        if !seen.insert(id.as_str()) {
            return Err(FleetError::validation(
                "order_ids",
                format!("order {id} is listed more than once"),
            ));
        }
    }
    Ok(())
}

fn supplied_or_sum(
    supplied: Option<f64>,
    field: &str,
    orders: &[Order],
    value: impl Fn(&Order) -> f64,
) -> FleetResult<f64> {
    match supplied {
        Some(v) if !v.is_finite() || v < 0.0 => Err(FleetError::validation(
            field,
            "must be a non-negative number",
        )),
        Some(v) => Ok(v),
        None => Ok(orders.iter().map(value).sum()),
    }
}

fn in_range(at: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.map_or(true, |from| at >= from) && to.map_or(true, |to| at <= to)
}

fn top_usage(
    counts: HashMap<&str, usize>,
    label: impl Fn(&str) -> Option<String>,
) -> Vec<ResourceUsage> {
    let mut usage: Vec<ResourceUsage> = counts
        .into_iter()
        .map(|(id, dispatches)| ResourceUsage {
            id: id.to_string(),
            label: label(id).unwrap_or_else(|| id.to_string()),
            dispatches,
        })
        .collect();
    usage.sort_by(|a, b| b.dispatches.cmp(&a.dispatches).then_with(|| a.id.cmp(&b.id)));
    usage.truncate(TOP_RESOURCES);
    usage
}

/// `PREFIX-YYYYMMDD-NNNN` with a random suffix.
fn document_number(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix: u32 = rand::rng().random_range(0..10_000);
    format!("{}-{}-{:04}", prefix, at.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DriverStatus;
    use crate::store::MemoryStore;
    use crate::test_support::{sample_driver, sample_order, sample_vehicle};

    fn allocator_with(store: Arc<MemoryStore>) -> DispatchAllocator<MemoryStore> {
        DispatchAllocator::new(
            store,
            Arc::new(ShipmentLocks::new()),
            PricingConfig::default(),
            RouteOptimizerConfig::default(),
        )
    }

    fn seeded(order_weight: f64) -> (Arc<MemoryStore>, DispatchAllocator<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.upsert_order(sample_order("o1", order_weight)).unwrap();
        store.upsert_vehicle(sample_vehicle("v1", 20.0, 10.0)).unwrap();
        store.upsert_driver(sample_driver("d1")).unwrap();
        (store.clone(), allocator_with(store))
    }

    fn request(order_ids: &[&str]) -> CreateDispatchRequest {
        CreateDispatchRequest {
            order_ids: order_ids.iter().map(|s| s.to_string()).collect(),
            vehicle_id: "v1".into(),
            driver_id: "d1".into(),
            planned_departure: Utc::now() + Duration::hours(1),
            customer_id: None,
            total_weight: None,
            total_volume: None,
            total_value: None,
            origin_address: None,
            destination_address: None,
            instructions: None,
        }
    }

    #[test]
    fn one_order_dispatch_reserves_vehicle() {
        let (store, allocator) = seeded(10.0);
        let created = allocator.create_dispatch(request(&["o1"])).unwrap();

        assert_eq!(created.dispatch.status, DispatchStatus::Scheduled);
        assert_eq!(created.shipments.len(), 1);
        assert_eq!(created.shipments[0].sequence, 0);
        assert_eq!(created.shipments[0].status, ShipmentStatus::Scheduled);
        assert_eq!(created.dispatch.total_weight, 10.0);
        assert!(created.dispatch.cost.total_amount > 0.0);
        assert!(created.dispatch.estimated_arrival.unwrap() > created.dispatch.planned_departure);

        assert_eq!(store.vehicle("v1").unwrap().status, VehicleStatus::Reserved);
        assert_eq!(store.driver("d1").unwrap().status, DriverStatus::OnDuty);
        assert_eq!(store.order("o1").unwrap().status, OrderStatus::Assigned);
    }

    #[test]
    fn over_capacity_creates_nothing() {
        let (store, allocator) = seeded(25.0);
        let err = allocator.create_dispatch(request(&["o1"])).unwrap_err();

        assert_eq!(err.kind(), "capacity_exceeded");
        assert_eq!(store.dispatch_count(), 0);
        assert_eq!(store.shipment_count(), 0);
        assert_eq!(store.vehicle("v1").unwrap().status, VehicleStatus::Available);
        assert_eq!(store.order("o1").unwrap().status, OrderStatus::Confirmed);
    }

    #[test]
    fn supplied_weight_is_the_capacity_source() {
        let (store, allocator) = seeded(25.0);
        let mut supplied = request(&["o1"]);
        supplied.total_weight = Some(15.0);
        let created = allocator.create_dispatch(supplied).unwrap();

        assert_eq!(created.dispatch.total_weight, 15.0);
        assert_eq!(created.route.total_weight, 15.0);
        assert_eq!(store.vehicle("v1").unwrap().status, VehicleStatus::Reserved);

        let (_, allocator) = seeded(1.0);
        let mut overweight = request(&["o1"]);
        overweight.total_weight = Some(21.0);
        let err = allocator.create_dispatch(overweight).unwrap_err();
        assert_eq!(err.kind(), "capacity_exceeded");
    }

    #[test]
    fn empty_or_duplicate_order_ids_are_rejected() {
        let (_, allocator) = seeded(10.0);
        let err = allocator.create_dispatch(request(&[])).unwrap_err();
        assert_eq!(err.field(), Some("order_ids"));
        let err = allocator.create_dispatch(request(&["o1", "o1"])).unwrap_err();
        assert_eq!(err.field(), Some("order_ids"));
    }

    #[test]
    fn unconfirmed_order_is_invalid_state() {
        let (store, allocator) = seeded(10.0);
        let mut pending = sample_order("o2", 1.0);
        pending.status = OrderStatus::Pending;
        store.upsert_order(pending).unwrap();

        let err = allocator.create_dispatch(request(&["o1", "o2"])).unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
        let err = allocator.create_dispatch(request(&["missing"])).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn busy_vehicle_is_unavailable() {
        let (store, allocator) = seeded(10.0);
        let mut vehicle = sample_vehicle("v1", 20.0, 10.0);
        vehicle.status = VehicleStatus::Maintenance;
        store.upsert_vehicle(vehicle).unwrap();

        let err = allocator.create_dispatch(request(&["o1"])).unwrap_err();
        assert_eq!(err.kind(), "resource_unavailable");
    }

    #[test]
    fn concurrent_allocations_on_one_vehicle() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_order(sample_order("o1", 5.0)).unwrap();
        store.upsert_order(sample_order("o2", 5.0)).unwrap();
        store.upsert_vehicle(sample_vehicle("v1", 20.0, 10.0)).unwrap();
        store.upsert_driver(sample_driver("d1")).unwrap();
        store.upsert_driver(sample_driver("d2")).unwrap();
        let allocator = allocator_with(store.clone());

        let mut first = request(&["o1"]);
        first.driver_id = "d1".into();
        let mut second = request(&["o2"]);
        second.driver_id = "d2".into();

        let results: Vec<FleetResult<DispatchCreated>> = std::thread::scope(|scope| {
            let a = scope.spawn(|| allocator.create_dispatch(first));
            let b = scope.spawn(|| allocator.create_dispatch(second));
            vec![a.join().unwrap(), b.join().unwrap()]
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        let failure = results.into_iter().find_map(|r| r.err()).unwrap();
        assert_eq!(failure.kind(), "resource_unavailable");
        assert_eq!(store.dispatch_count(), 1);
    }

    #[test]
    fn status_flow_releases_resources_on_completion() {
        let (store, allocator) = seeded(10.0);
        let created = allocator.create_dispatch(request(&["o1"])).unwrap();
        let id = created.dispatch.id.clone();

        let err = allocator
            .update_status(
                &id,
                StatusChangeRequest {
                    status: DispatchStatus::Completed,
                    reason: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");

        let moving = allocator
            .update_status(
                &id,
                StatusChangeRequest {
                    status: DispatchStatus::InTransit,
                    reason: None,
                },
            )
            .unwrap();
        assert!(moving.actual_departure.is_some());
        assert_eq!(store.vehicle("v1").unwrap().status, VehicleStatus::InTransit);
        assert_eq!(
            allocator.shipments(&id)[0].status,
            ShipmentStatus::InTransit
        );

        let done = allocator
            .update_status(
                &id,
                StatusChangeRequest {
                    status: DispatchStatus::Completed,
                    reason: None,
                },
            )
            .unwrap();
        assert_eq!(done.progress, 100.0);
        assert!(done.actual_arrival.is_some());
        assert_eq!(store.vehicle("v1").unwrap().status, VehicleStatus::Available);
        assert_eq!(store.driver("d1").unwrap().status, DriverStatus::Available);
        assert_eq!(store.order("o1").unwrap().status, OrderStatus::Delivered);
        assert_eq!(allocator.shipments(&id)[0].status, ShipmentStatus::Completed);
    }

    #[test]
    fn terminal_dispatch_drops_shipment_locks() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_order(sample_order("o1", 10.0)).unwrap();
        store.upsert_vehicle(sample_vehicle("v1", 20.0, 10.0)).unwrap();
        store.upsert_driver(sample_driver("d1")).unwrap();
        let locks = Arc::new(ShipmentLocks::new());
        let allocator = DispatchAllocator::new(
            store,
            locks.clone(),
            PricingConfig::default(),
            RouteOptimizerConfig::default(),
        );

        let created = allocator.create_dispatch(request(&["o1"])).unwrap();
        let depart = StatusChangeRequest {
            status: DispatchStatus::InTransit,
            reason: None,
        };
        allocator.update_status(&created.dispatch.id, depart).unwrap();
        assert_eq!(locks.len(), 1);

        let complete = StatusChangeRequest {
            status: DispatchStatus::Completed,
            reason: None,
        };
        allocator.update_status(&created.dispatch.id, complete).unwrap();
        assert!(locks.is_empty());
    }

    #[test]
    fn cancellation_returns_orders() {
        let (store, allocator) = seeded(10.0);
        let created = allocator.create_dispatch(request(&["o1"])).unwrap();

        let cancelled = allocator
            .update_status(
                &created.dispatch.id,
                StatusChangeRequest {
                    status: DispatchStatus::Cancelled,
                    reason: Some("customer request".into()),
                },
            )
            .unwrap();
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("customer request"));
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(store.order("o1").unwrap().status, OrderStatus::Confirmed);
        assert_eq!(store.vehicle("v1").unwrap().status, VehicleStatus::Available);
        assert_eq!(allocator.available_orders().len(), 1);

        let err = allocator
            .update_status(
                &created.dispatch.id,
                StatusChangeRequest {
                    status: DispatchStatus::InTransit,
                    reason: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
        let err = allocator
            .update_status(
                "nope",
                StatusChangeRequest {
                    status: DispatchStatus::InTransit,
                    reason: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn listing_and_statistics() {
        let (store, allocator) = seeded(10.0);
        store.upsert_vehicle(sample_vehicle("v2", 20.0, 10.0)).unwrap();
        store.upsert_driver(sample_driver("d2")).unwrap();
        store.upsert_order(sample_order("o2", 5.0)).unwrap();

        let a = allocator.create_dispatch(request(&["o1"])).unwrap();
        let mut second = request(&["o2"]);
        second.vehicle_id = "v2".into();
        second.driver_id = "d2".into();
        allocator.create_dispatch(second).unwrap();
        allocator
            .update_status(
                &a.dispatch.id,
                StatusChangeRequest {
                    status: DispatchStatus::Cancelled,
                    reason: None,
                },
            )
            .unwrap();

        let page = allocator.list_dispatches(&DispatchQuery {
            vehicle_id: Some("v2".into()),
            ..DispatchQuery::default()
        });
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].vehicle_id, "v2");

        let stats = allocator.statistics(None, None);
        assert_eq!(stats.total_dispatches, 2);
        assert_eq!(stats.by_status.get("CANCELLED"), Some(&1));
        assert_eq!(stats.by_status.get("SCHEDULED"), Some(&1));
        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.top_vehicles.len(), 2);
        assert_eq!(allocator.available_vehicles().len(), 1);
    }

    #[test]
    fn optimize_checks_capacity() {
        let (_, allocator) = seeded(25.0);
        let err = allocator
            .optimize_route(&OptimizeRouteRequest {
                order_ids: vec!["o1".into()],
                vehicle_id: "v1".into(),
                preferences: RoutePreferences::default(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), "capacity_exceeded");
    }
}
