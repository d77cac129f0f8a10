//! In-memory repository backed by DashMap.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{FleetError, FleetResult};
use crate::models::{
    Alert, AlertStatus, AlertType, Coordinate, Dispatch, DispatchStatus, Driver, DriverStatus,
    Order, OrderStatus, Shipment, ShipmentEvent, TrackingPoint, TrackingRoute, Vehicle,
    VehicleStatus,
};
use crate::repository::{Change, ChangeSink, DispatchCommit, DispatchUpdate, FleetRepository};

/// Records to load into a fresh store.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub vehicles: Vec<Vehicle>,
    pub drivers: Vec<Driver>,
    pub dispatches: Vec<Dispatch>,
    pub shipments: Vec<Shipment>,
    pub routes: Vec<TrackingRoute>,
    /// In receipt order
    pub points: Vec<TrackingPoint>,
    pub events: Vec<ShipmentEvent>,
    pub alerts: Vec<Alert>,
}

/// DashMap-backed `FleetRepository`.
///
/// Allocation and release of vehicles/drivers/orders run under a single
/// allocation lock so that status checks and writes happen together.
#[derive(Default)]
pub struct MemoryStore {
    orders: DashMap<String, Order>,
    vehicles: DashMap<String, Vehicle>,
    drivers: DashMap<String, Driver>,
    dispatches: DashMap<String, Dispatch>,
    shipments: DashMap<String, Shipment>,
    /// dispatch id -> shipment ids
    dispatch_shipments: DashMap<String, Vec<String>>,
    /// shipment id -> route
    routes: DashMap<String, TrackingRoute>,
    /// shipment id -> points in receipt order
    points: DashMap<String, Vec<TrackingPoint>>,
    latest_by_vehicle: DashMap<String, TrackingPoint>,
    events: DashMap<String, Vec<ShipmentEvent>>,
    alerts: DashMap<String, Alert>,
    allocation: Mutex<()>,
    sink: Option<Arc<dyn ChangeSink>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that reports every write to `sink`.
    pub fn with_sink(sink: Arc<dyn ChangeSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::default()
        }
    }

    /// Load persisted records without reporting them as changes.
    pub fn restore(&self, snapshot: Snapshot) {
        for order in snapshot.orders {
            self.orders.insert(order.id.clone(), order);
        }
        for vehicle in snapshot.vehicles {
            self.vehicles.insert(vehicle.id.clone(), vehicle);
        }
        for driver in snapshot.drivers {
            self.drivers.insert(driver.id.clone(), driver);
        }
        for dispatch in snapshot.dispatches {
            self.dispatches.insert(dispatch.id.clone(), dispatch);
        }
        for shipment in snapshot.shipments {
            self.index_shipment(&shipment);
            self.shipments.insert(shipment.id.clone(), shipment);
        }
        for route in snapshot.routes {
            self.routes.insert(route.shipment_id.clone(), route);
        }
        for point in snapshot.points {
            self.store_point(point);
        }
        for event in snapshot.events {
            self.events
                .entry(event.shipment_id.clone())
                .or_default()
                .push(event);
        }
        for alert in snapshot.alerts {
            self.alerts.insert(alert.id.clone(), alert);
        }
    }

    pub fn shipment_count(&self) -> usize {
        self.shipments.len()
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatches.len()
    }

    fn allocation_guard(&self) -> MutexGuard<'_, ()> {
        // the lock guards no data, so a poisoned lock is still usable
        self.allocation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, change: Change) {
        if let Some(sink) = &self.sink {
            sink.record(change);
        }
    }

    fn index_shipment(&self, shipment: &Shipment) {
        if let Some(dispatch_id) = &shipment.dispatch_id {
            let mut ids = self.dispatch_shipments.entry(dispatch_id.clone()).or_default();
            if !ids.contains(&shipment.id) {
                ids.push(shipment.id.clone());
            }
        }
    }

    fn store_point(&self, point: TrackingPoint) {
        if let Some(vehicle_id) = &point.vehicle_id {
            self.latest_by_vehicle
                .entry(vehicle_id.clone())
                .and_modify(|current| {
                    if point.timestamp >= current.timestamp {
                        *current = point.clone();
                    }
                })
                .or_insert_with(|| point.clone());
        }
        self.points
            .entry(point.shipment_id.clone())
            .or_default()
            .push(point);
    }

    fn set_vehicle_status(&self, id: &str, status: VehicleStatus) {
        let updated = self.vehicles.get_mut(id).map(|mut vehicle| {
            vehicle.status = status;
            vehicle.value().clone()
        });
        if let Some(vehicle) = updated {
            self.emit(Change::Vehicle(vehicle));
        }
    }

    fn set_driver_status(&self, id: &str, status: DriverStatus) {
        let updated = self.drivers.get_mut(id).map(|mut driver| {
            driver.status = status;
            driver.value().clone()
        });
        if let Some(driver) = updated {
            self.emit(Change::Driver(driver));
        }
    }

    fn set_order_status(&self, id: &str, next: impl Fn(OrderStatus) -> Option<OrderStatus>) {
        let updated = self.orders.get_mut(id).and_then(|mut order| {
            let status = next(order.status)?;
            order.status = status;
            Some(order.value().clone())
        });
        if let Some(order) = updated {
            self.emit(Change::Order(order));
        }
    }
}

impl FleetRepository for MemoryStore {
    fn order(&self, id: &str) -> Option<Order> {
        self.orders.get(id).map(|o| o.value().clone())
    }

    fn orders(&self) -> Vec<Order> {
        self.orders.iter().map(|o| o.value().clone()).collect()
    }

    fn upsert_order(&self, mut order: Order) -> FleetResult<()> {
        let _guard = self.allocation_guard();
        // dispatch-owned statuses are not overwritten by the master feed
        if let Some(existing) = self.orders.get(&order.id) {
            if matches!(existing.status, OrderStatus::Assigned | OrderStatus::InTransit) {
                order.status = existing.status;
            }
        }
        self.orders.insert(order.id.clone(), order.clone());
        self.emit(Change::Order(order));
        Ok(())
    }

    fn vehicle(&self, id: &str) -> Option<Vehicle> {
        self.vehicles.get(id).map(|v| v.value().clone())
    }

    fn vehicles(&self) -> Vec<Vehicle> {
        self.vehicles.iter().map(|v| v.value().clone()).collect()
    }

    fn upsert_vehicle(&self, mut vehicle: Vehicle) -> FleetResult<()> {
        let _guard = self.allocation_guard();
        if let Some(existing) = self.vehicles.get(&vehicle.id) {
            if matches!(existing.status, VehicleStatus::Reserved | VehicleStatus::InTransit) {
                vehicle.status = existing.status;
            }
        }
        self.vehicles.insert(vehicle.id.clone(), vehicle.clone());
        self.emit(Change::Vehicle(vehicle));
        Ok(())
    }

    fn driver(&self, id: &str) -> Option<Driver> {
        self.drivers.get(id).map(|d| d.value().clone())
    }

    fn drivers(&self) -> Vec<Driver> {
        self.drivers.iter().map(|d| d.value().clone()).collect()
    }

    fn upsert_driver(&self, mut driver: Driver) -> FleetResult<()> {
        let _guard = self.allocation_guard();
        if let Some(existing) = self.drivers.get(&driver.id) {
            if existing.status == DriverStatus::OnDuty {
                driver.status = existing.status;
            }
        }
        self.drivers.insert(driver.id.clone(), driver.clone());
        self.emit(Change::Driver(driver));
        Ok(())
    }

    fn dispatch(&self, id: &str) -> Option<Dispatch> {
        self.dispatches.get(id).map(|d| d.value().clone())
    }

    fn dispatches(&self) -> Vec<Dispatch> {
        self.dispatches.iter().map(|d| d.value().clone()).collect()
    }

    fn commit_dispatch(&self, commit: DispatchCommit) -> FleetResult<()> {
        let DispatchCommit {
            dispatch,
            shipments,
        } = commit;
        let _guard = self.allocation_guard();

        if self.dispatches.contains_key(&dispatch.id) {
            return Err(FleetError::InvalidState(format!(
                "dispatch {} already exists",
                dispatch.id
            )));
        }

        let vehicle = self
            .vehicle(&dispatch.vehicle_id)
            .ok_or_else(|| FleetError::not_found("vehicle", &dispatch.vehicle_id))?;
        if vehicle.status != VehicleStatus::Available {
            return Err(FleetError::ResourceUnavailable(format!(
                "vehicle {} is {}",
                vehicle.plate_number, vehicle.status
            )));
        }

        let driver = self
            .driver(&dispatch.driver_id)
            .ok_or_else(|| FleetError::not_found("driver", &dispatch.driver_id))?;
        if driver.status != DriverStatus::Available {
            return Err(FleetError::ResourceUnavailable(format!(
                "driver {} is {}",
                driver.name, driver.status
            )));
        }

        for order_id in &dispatch.order_ids {
            let order = self
                .order(order_id)
                .ok_or_else(|| FleetError::not_found("order", order_id))?;
            if order.status != OrderStatus::Confirmed {
                return Err(FleetError::InvalidState(format!(
                    "order {} is {}, expected CONFIRMED",
                    order.order_number, order.status
                )));
            }
        }

        // every check passed; nothing below can fail
        self.set_vehicle_status(&dispatch.vehicle_id, VehicleStatus::Reserved);
        self.set_driver_status(&dispatch.driver_id, DriverStatus::OnDuty);
        for order_id in &dispatch.order_ids {
            self.set_order_status(order_id, |_| Some(OrderStatus::Assigned));
        }
        for shipment in shipments {
            self.index_shipment(&shipment);
            self.shipments.insert(shipment.id.clone(), shipment.clone());
            self.emit(Change::Shipment(shipment));
        }
        self.dispatches.insert(dispatch.id.clone(), dispatch.clone());
        self.emit(Change::Dispatch(dispatch));
        Ok(())
    }

    fn commit_dispatch_update(&self, update: DispatchUpdate) -> FleetResult<Dispatch> {
        let DispatchUpdate {
            expected,
            dispatch,
            cascade,
            at,
        } = update;
        let _guard = self.allocation_guard();

        let current = self
            .dispatch(&dispatch.id)
            .ok_or_else(|| FleetError::not_found("dispatch", &dispatch.id))?;
        if current.status != expected {
            return Err(FleetError::transition(
                "dispatch",
                current.status,
                dispatch.status,
            ));
        }

        if let Some(status) = cascade.vehicle_status() {
            self.set_vehicle_status(&dispatch.vehicle_id, status);
        }
        if let Some(status) = cascade.driver_status() {
            self.set_driver_status(&dispatch.driver_id, status);
        }
        for order_id in &dispatch.order_ids {
            self.set_order_status(order_id, |current| cascade.order_status(current));
        }

        let shipment_ids = self
            .dispatch_shipments
            .get(&dispatch.id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        for shipment_id in shipment_ids {
            let updated = self.shipments.get_mut(&shipment_id).and_then(|mut shipment| {
                cascade
                    .apply_to_shipment(&mut shipment, at)
                    .then(|| shipment.value().clone())
            });
            if let Some(shipment) = updated {
                self.emit(Change::Shipment(shipment));
            }
        }

        // ingest may have moved position and progress since `dispatch` was read
        let stored = self
            .dispatches
            .get_mut(&dispatch.id)
            .map(|mut stored| {
                stored.status = dispatch.status;
                stored.actual_departure = dispatch.actual_departure;
                stored.actual_arrival = dispatch.actual_arrival;
                stored.cancelled_at = dispatch.cancelled_at;
                stored.cancel_reason = dispatch.cancel_reason;
                stored.instructions = dispatch.instructions;
                stored.updated_at = dispatch.updated_at;
                if dispatch.status == DispatchStatus::Completed {
                    stored.progress = dispatch.progress;
                }
                stored.value().clone()
            })
            .ok_or_else(|| FleetError::not_found("dispatch", &dispatch.id))?;
        self.emit(Change::Dispatch(stored.clone()));
        Ok(stored)
    }

    fn update_dispatch_position(
        &self,
        dispatch_id: &str,
        location: Coordinate,
        address: Option<String>,
        progress: f64,
    ) -> FleetResult<()> {
        let updated = self.dispatches.get_mut(dispatch_id).map(|mut dispatch| {
            dispatch.current_location = Some(location);
            if address.is_some() {
                dispatch.current_address = address;
            }
            dispatch.progress = progress.clamp(0.0, 100.0);
            dispatch.updated_at = chrono::Utc::now();
            dispatch.value().clone()
        });
        match updated {
            Some(dispatch) => {
                self.emit(Change::Dispatch(dispatch));
                Ok(())
            }
            None => Err(FleetError::not_found("dispatch", dispatch_id)),
        }
    }

    fn shipment(&self, id: &str) -> Option<Shipment> {
        self.shipments.get(id).map(|s| s.value().clone())
    }

    fn shipments_for_dispatch(&self, dispatch_id: &str) -> Vec<Shipment> {
        let ids = self
            .dispatch_shipments
            .get(dispatch_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        let mut shipments: Vec<Shipment> = ids.iter().filter_map(|id| self.shipment(id)).collect();
        shipments.sort_by_key(|s| s.sequence);
        shipments
    }

    fn save_shipment(&self, shipment: Shipment) -> FleetResult<()> {
        self.index_shipment(&shipment);
        self.shipments.insert(shipment.id.clone(), shipment.clone());
        self.emit(Change::Shipment(shipment));
        Ok(())
    }

    fn route_for_shipment(&self, shipment_id: &str) -> Option<TrackingRoute> {
        self.routes.get(shipment_id).map(|r| r.value().clone())
    }

    fn save_route(&self, route: TrackingRoute) -> FleetResult<()> {
        self.routes.insert(route.shipment_id.clone(), route.clone());
        self.emit(Change::Route(route));
        Ok(())
    }

    fn append_point(&self, point: TrackingPoint) -> FleetResult<()> {
        self.store_point(point.clone());
        self.emit(Change::Point(point));
        Ok(())
    }

    fn points_for_shipment(&self, shipment_id: &str) -> Vec<TrackingPoint> {
        self.points
            .get(shipment_id)
            .map(|points| points.value().clone())
            .unwrap_or_default()
    }

    fn latest_point_for_vehicle(&self, vehicle_id: &str) -> Option<TrackingPoint> {
        self.latest_by_vehicle.get(vehicle_id).map(|p| p.value().clone())
    }

    fn append_event(&self, event: ShipmentEvent) -> FleetResult<()> {
        self.events
            .entry(event.shipment_id.clone())
            .or_default()
            .push(event.clone());
        self.emit(Change::Event(event));
        Ok(())
    }

    fn events_for_shipment(&self, shipment_id: &str) -> Vec<ShipmentEvent> {
        self.events
            .get(shipment_id)
            .map(|events| events.value().clone())
            .unwrap_or_default()
    }

    fn insert_alert(&self, alert: Alert) -> FleetResult<()> {
        self.alerts.insert(alert.id.clone(), alert.clone());
        self.emit(Change::Alert(alert));
        Ok(())
    }

    fn alert(&self, id: &str) -> Option<Alert> {
        self.alerts.get(id).map(|a| a.value().clone())
    }

    fn alerts(&self) -> Vec<Alert> {
        self.alerts.iter().map(|a| a.value().clone()).collect()
    }

    fn has_open_alert(&self, shipment_id: &str, alert_type: AlertType) -> bool {
        self.alerts.iter().any(|alert| {
            alert.shipment_id == shipment_id
                && alert.alert_type == alert_type
                && matches!(alert.status, AlertStatus::Active | AlertStatus::Acknowledged)
        })
    }

    fn update_alert(
        &self,
        id: &str,
        update: &mut dyn FnMut(&mut Alert) -> FleetResult<()>,
    ) -> FleetResult<Alert> {
        let updated = {
            let mut entry = self
                .alerts
                .get_mut(id)
                .ok_or_else(|| FleetError::not_found("alert", id))?;
            let mut next = entry.value().clone();
            update(&mut next)?;
            *entry = next.clone();
            next
        };
        self.emit(Change::Alert(updated.clone()));
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::DispatchCascade;
    use crate::test_support::{
        sample_dispatch, sample_driver, sample_order, sample_point, sample_shipment, sample_vehicle,
    };
    use chrono::{Duration, Utc};

    #[derive(Default)]
    struct RecordingSink {
        changes: Mutex<Vec<(&'static str, String)>>,
    }

    impl ChangeSink for RecordingSink {
        fn record(&self, change: Change) {
            self.changes.lock().unwrap().push(change.key());
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.upsert_order(sample_order("o1", 10.0)).unwrap();
        store.upsert_vehicle(sample_vehicle("v1", 20.0, 10.0)).unwrap();
        store.upsert_driver(sample_driver("d1")).unwrap();
        store
    }

    fn commit_for(store: &MemoryStore, dispatch_id: &str) -> FleetResult<()> {
        let dispatch = sample_dispatch(dispatch_id, "v1", "d1", &["o1"]);
        let mut shipment = sample_shipment(&format!("{dispatch_id}-s0"));
        shipment.dispatch_id = Some(dispatch_id.to_string());
        store.commit_dispatch(DispatchCommit {
            dispatch,
            shipments: vec![shipment],
        })
    }

    #[test]
    fn commit_reserves_resources() {
        let store = seeded();
        commit_for(&store, "dsp-1").unwrap();

        assert_eq!(store.vehicle("v1").unwrap().status, VehicleStatus::Reserved);
        assert_eq!(store.driver("d1").unwrap().status, DriverStatus::OnDuty);
        assert_eq!(store.order("o1").unwrap().status, OrderStatus::Assigned);
        assert_eq!(store.shipments_for_dispatch("dsp-1").len(), 1);
    }

    #[test]
    fn second_commit_on_same_vehicle_is_rejected() {
        let store = seeded();
        store.upsert_order(sample_order("o2", 5.0)).unwrap();
        commit_for(&store, "dsp-1").unwrap();

        let second = sample_dispatch("dsp-2", "v1", "d1", &["o2"]);
        let err = store
            .commit_dispatch(DispatchCommit {
                dispatch: second,
                shipments: vec![],
            })
            .unwrap_err();
        assert_eq!(err.kind(), "resource_unavailable");
        assert!(store.dispatch("dsp-2").is_none());
        assert_eq!(store.order("o2").unwrap().status, OrderStatus::Confirmed);
    }

    #[test]
    fn master_feed_keeps_reservation() {
        let store = seeded();
        commit_for(&store, "dsp-1").unwrap();

        store.upsert_vehicle(sample_vehicle("v1", 30.0, 10.0)).unwrap();
        let vehicle = store.vehicle("v1").unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Reserved);
        assert_eq!(vehicle.max_load, 30.0);
    }

    #[test]
    fn update_with_stale_status_is_rejected() {
        let store = seeded();
        commit_for(&store, "dsp-1").unwrap();

        let mut next = store.dispatch("dsp-1").unwrap();
        next.status = DispatchStatus::Cancelled;
        let err = store
            .commit_dispatch_update(DispatchUpdate {
                expected: DispatchStatus::InTransit,
                dispatch: next.clone(),
                cascade: DispatchCascade::Cancel,
                at: Utc::now(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
        assert_eq!(store.vehicle("v1").unwrap().status, VehicleStatus::Reserved);

        store
            .commit_dispatch_update(DispatchUpdate {
                expected: DispatchStatus::Scheduled,
                dispatch: next,
                cascade: DispatchCascade::Cancel,
                at: Utc::now(),
            })
            .unwrap();
        assert_eq!(store.vehicle("v1").unwrap().status, VehicleStatus::Available);
        assert_eq!(store.order("o1").unwrap().status, OrderStatus::Confirmed);
        let shipments = store.shipments_for_dispatch("dsp-1");
        assert_eq!(
            shipments[0].status,
            crate::models::ShipmentStatus::Cancelled
        );
    }

    #[test]
    fn status_commit_keeps_concurrent_position() {
        let store = seeded();
        commit_for(&store, "dsp-1").unwrap();

        let mut next = store.dispatch("dsp-1").unwrap();
        next.status = DispatchStatus::InTransit;
        next.actual_departure = Some(Utc::now());

        // a tracking sample lands between the read and the commit
        store
            .update_dispatch_position("dsp-1", Coordinate::new(40.3, -74.0), None, 40.0)
            .unwrap();

        let committed = store
            .commit_dispatch_update(DispatchUpdate {
                expected: DispatchStatus::Scheduled,
                dispatch: next,
                cascade: DispatchCascade::Depart,
                at: Utc::now(),
            })
            .unwrap();
        assert_eq!(committed.status, DispatchStatus::InTransit);
        assert!(committed.actual_departure.is_some());
        assert_eq!(committed.progress, 40.0);
        assert_eq!(committed.current_location, Some(Coordinate::new(40.3, -74.0)));
        assert_eq!(store.dispatch("dsp-1").unwrap().progress, 40.0);
    }

    #[test]
    fn latest_vehicle_point_follows_sample_time() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut newer = sample_point("s1", 40.0, -74.0, now);
        newer.vehicle_id = Some("v1".into());
        let mut older = sample_point("s1", 40.1, -74.0, now - Duration::minutes(5));
        older.vehicle_id = Some("v1".into());

        store.append_point(newer.clone()).unwrap();
        store.append_point(older).unwrap();

        assert_eq!(store.latest_point_for_vehicle("v1").unwrap().id, newer.id);
        assert_eq!(store.points_for_shipment("s1").len(), 2);
    }

    #[test]
    fn writes_reach_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let store = MemoryStore::with_sink(sink.clone());
        store.upsert_order(sample_order("o1", 10.0)).unwrap();
        store.append_point(sample_point("s1", 40.0, -74.0, Utc::now())).unwrap();

        let changes = sink.changes.lock().unwrap();
        assert_eq!(changes[0], ("orders", "o1".to_string()));
        assert_eq!(changes[1].0, "tracking_points");
    }

    #[test]
    fn restore_does_not_emit() {
        let sink = Arc::new(RecordingSink::default());
        let store = MemoryStore::with_sink(sink.clone());
        store.restore(Snapshot {
            orders: vec![sample_order("o1", 10.0)],
            shipments: vec![sample_shipment("s1")],
            ..Snapshot::default()
        });
        assert!(store.order("o1").is_some());
        assert_eq!(store.shipment_count(), 1);
        assert!(sink.changes.lock().unwrap().is_empty());
    }
}
