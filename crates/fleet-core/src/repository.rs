//! Storage seam for the allocator and ingest services.

use chrono::{DateTime, Utc};

use crate::error::FleetResult;
use crate::lifecycle::DispatchCascade;
use crate::models::{
    Alert, AlertType, Coordinate, Dispatch, DispatchStatus, Driver, Order, Shipment,
    ShipmentEvent, TrackingPoint, TrackingRoute, Vehicle,
};

/// A new dispatch and its shipments, committed atomically.
#[derive(Debug, Clone)]
pub struct DispatchCommit {
    pub dispatch: Dispatch,
    pub shipments: Vec<Shipment>,
}

/// A dispatch status change, committed only if the stored status still
/// equals `expected`. Only the status, timestamp, cancel and instruction
/// fields of `dispatch` are applied; position and progress stay as stored.
#[derive(Debug, Clone)]
pub struct DispatchUpdate {
    pub expected: DispatchStatus,
    pub dispatch: Dispatch,
    pub cascade: DispatchCascade,
    pub at: DateTime<Utc>,
}

/// A record written through the repository.
#[derive(Debug, Clone)]
pub enum Change {
    Order(Order),
    Vehicle(Vehicle),
    Driver(Driver),
    Dispatch(Dispatch),
    Shipment(Shipment),
    Route(TrackingRoute),
    Point(TrackingPoint),
    Event(ShipmentEvent),
    Alert(Alert),
}

impl Change {
    /// Table-scoped identity; later changes with the same key supersede earlier ones.
    pub fn key(&self) -> (&'static str, String) {
        match self {
            Self::Order(o) => ("orders", o.id.clone()),
            Self::Vehicle(v) => ("vehicles", v.id.clone()),
            Self::Driver(d) => ("drivers", d.id.clone()),
            Self::Dispatch(d) => ("dispatches", d.id.clone()),
            Self::Shipment(s) => ("shipments", s.id.clone()),
            Self::Route(r) => ("tracking_routes", r.id.clone()),
            Self::Point(p) => ("tracking_points", p.id.clone()),
            Self::Event(e) => ("shipment_events", e.id.clone()),
            Self::Alert(a) => ("alerts", a.id.clone()),
        }
    }
}

/// Receives every record the store writes.
pub trait ChangeSink: Send + Sync {
    fn record(&self, change: Change);
}

/// Persistent state for the fleet core.
///
/// Reads return owned snapshots. Writes that span several records
/// (`commit_dispatch`, `commit_dispatch_update`) are atomic with respect to
/// each other and re-check resource state before writing.
pub trait FleetRepository: Send + Sync {
    // ---- master data ----
    fn order(&self, id: &str) -> Option<Order>;
    fn orders(&self) -> Vec<Order>;
    fn upsert_order(&self, order: Order) -> FleetResult<()>;
    fn vehicle(&self, id: &str) -> Option<Vehicle>;
    fn vehicles(&self) -> Vec<Vehicle>;
    fn upsert_vehicle(&self, vehicle: Vehicle) -> FleetResult<()>;
    fn driver(&self, id: &str) -> Option<Driver>;
    fn drivers(&self) -> Vec<Driver>;
    fn upsert_driver(&self, driver: Driver) -> FleetResult<()>;

    // ---- dispatches ----
    fn dispatch(&self, id: &str) -> Option<Dispatch>;
    fn dispatches(&self) -> Vec<Dispatch>;
    /// Reserve vehicle/driver, assign orders and store the dispatch with its shipments.
    fn commit_dispatch(&self, commit: DispatchCommit) -> FleetResult<()>;
    /// Store a status change and apply its cascade to resources, orders and shipments.
    fn commit_dispatch_update(&self, update: DispatchUpdate) -> FleetResult<Dispatch>;
    fn update_dispatch_position(
        &self,
        dispatch_id: &str,
        location: Coordinate,
        address: Option<String>,
        progress: f64,
    ) -> FleetResult<()>;

    // ---- shipments & tracking ----
    fn shipment(&self, id: &str) -> Option<Shipment>;
    fn shipments_for_dispatch(&self, dispatch_id: &str) -> Vec<Shipment>;
    fn save_shipment(&self, shipment: Shipment) -> FleetResult<()>;
    fn route_for_shipment(&self, shipment_id: &str) -> Option<TrackingRoute>;
    fn save_route(&self, route: TrackingRoute) -> FleetResult<()>;
    fn append_point(&self, point: TrackingPoint) -> FleetResult<()>;
    /// Points in receipt order.
    fn points_for_shipment(&self, shipment_id: &str) -> Vec<TrackingPoint>;
    fn latest_point_for_vehicle(&self, vehicle_id: &str) -> Option<TrackingPoint>;
    fn append_event(&self, event: ShipmentEvent) -> FleetResult<()>;
    fn events_for_shipment(&self, shipment_id: &str) -> Vec<ShipmentEvent>;

    // ---- alerts ----
    fn insert_alert(&self, alert: Alert) -> FleetResult<()>;
    fn alert(&self, id: &str) -> Option<Alert>;
    fn alerts(&self) -> Vec<Alert>;
    fn has_open_alert(&self, shipment_id: &str, alert_type: AlertType) -> bool;
    /// Apply `update` to the stored alert atomically and return the result.
    fn update_alert(
        &self,
        id: &str,
        update: &mut dyn FnMut(&mut Alert) -> FleetResult<()>,
    ) -> FleetResult<Alert>;
}
