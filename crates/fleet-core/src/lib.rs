pub mod alert_desk;
pub mod alerts;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod locks;
pub mod models;
pub mod progress;
pub mod repository;
pub mod routing;
pub mod rules;
pub mod spatial;
pub mod stats;
pub mod store;

pub use alert_desk::{AlertDesk, AlertQuery};
pub use alerts::{AlertEngine, SampleContext};
pub use dispatch::{
    CreateDispatchRequest, DispatchAllocator, DispatchCreated, DispatchQuery, DispatchStatistics,
    OptimizeRouteRequest, StatusChangeRequest,
};
pub use error::{FleetError, FleetResult};
pub use ingest::{
    BatchOutcome, BatchRequest, EventReceipt, EventReport, HistoryPage, HistoryQuery,
    IngestedPoint, LocationIngest, MotionState, PlanRouteRequest, RouteView, VehicleLocation,
};
pub use locks::ShipmentLocks;
pub use models::{
    Alert, AlertSeverity, AlertStatus, AlertType, Coordinate, Dispatch, DispatchStatus, Driver,
    DriverStatus, LocationReport, Order, OrderStatus, Page, Shipment, ShipmentEvent,
    ShipmentStatus, TrackingEvent, TrackingPoint, TrackingRoute, Vehicle, VehicleStatus,
};
pub use progress::calculate_progress;
pub use repository::{Change, ChangeSink, FleetRepository};
pub use routing::{RoutePlan, RoutePreferences};
pub use rules::{AlertThresholds, IngestConfig, PricingConfig, RouteOptimizerConfig};
pub use spatial::haversine_distance;
pub use store::{MemoryStore, Snapshot};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};

    use crate::models::{
        Coordinate, CostBreakdown, Dispatch, DispatchStatus, Driver, DriverStatus, Order,
        OrderStatus, Priority, Shipment, ShipmentStatus, TrackingPoint, Vehicle, VehicleStatus,
        VehicleType,
    };

    pub fn sample_shipment(id: &str) -> Shipment {
        Shipment {
            id: id.to_string(),
            shipment_number: format!("SHP-{id}"),
            dispatch_id: None,
            order_id: "o1".to_string(),
            vehicle_id: Some("v1".to_string()),
            driver_id: Some("d1".to_string()),
            sequence: 0,
            origin_address: "Origin yard".to_string(),
            destination_address: "Destination dock".to_string(),
            origin: Some(Coordinate::new(40.0, -74.0)),
            destination: Some(Coordinate::new(41.0, -74.0)),
            status: ShipmentStatus::InTransit,
            current_location: None,
            current_address: None,
            progress: 0.0,
            route_id: None,
            estimated_departure: None,
            estimated_arrival: None,
            actual_departure: None,
            actual_arrival: None,
            notes: None,
            updated_at: Utc::now(),
        }
    }

    pub fn sample_point(shipment_id: &str, lat: f64, lon: f64, timestamp: DateTime<Utc>) -> TrackingPoint {
        TrackingPoint {
            id: uuid::Uuid::new_v4().to_string(),
            shipment_id: shipment_id.to_string(),
            vehicle_id: None,
            lat,
            lon,
            address: None,
            speed_kmh: 0.0,
            heading_deg: 0.0,
            altitude_m: None,
            accuracy_m: None,
            battery_level: None,
            signal_strength: None,
            temperature_c: None,
            event: None,
            device_id: None,
            timestamp,
            received_at: timestamp,
        }
    }

    pub fn sample_order(id: &str, weight: f64) -> Order {
        Order {
            id: id.to_string(),
            order_number: format!("ORD-{id}"),
            customer_id: Some("c1".to_string()),
            origin_address: format!("{id} pickup"),
            destination_address: format!("{id} delivery"),
            origin: Coordinate::new(40.0, -74.0),
            destination: Coordinate::new(40.5, -74.0),
            cargo_weight: weight,
            cargo_volume: 1.0,
            cargo_value: 1000.0,
            priority: Priority::Medium,
            status: OrderStatus::Confirmed,
        }
    }

    pub fn sample_vehicle(id: &str, max_load: f64, max_volume: f64) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            plate_number: format!("PLT-{id}"),
            vehicle_type: VehicleType::Van,
            max_load,
            max_volume,
            status: VehicleStatus::Available,
            fuel_level: Some(80.0),
            daily_rate: 250.0,
        }
    }

    pub fn sample_driver(id: &str) -> Driver {
        Driver {
            id: id.to_string(),
            name: format!("Driver {id}"),
            license_number: format!("LIC-{id}"),
            license_class: "C".to_string(),
            license_expiry: None,
            status: DriverStatus::Available,
            rating: 4.5,
            accident_count: 0,
            violation_count: 0,
        }
    }

    pub fn sample_dispatch(id: &str, vehicle_id: &str, driver_id: &str, order_ids: &[&str]) -> Dispatch {
        let now = Utc::now();
        Dispatch {
            id: id.to_string(),
            dispatch_number: format!("DSP-{id}"),
            customer_id: None,
            vehicle_id: vehicle_id.to_string(),
            driver_id: driver_id.to_string(),
            order_ids: order_ids.iter().map(|s| s.to_string()).collect(),
            origin_address: "Origin yard".to_string(),
            destination_address: "Destination dock".to_string(),
            origin: Some(Coordinate::new(40.0, -74.0)),
            destination: Some(Coordinate::new(40.5, -74.0)),
            planned_departure: now,
            actual_departure: None,
            estimated_arrival: None,
            actual_arrival: None,
            total_weight: 0.0,
            total_volume: 0.0,
            total_value: 0.0,
            estimated_duration_min: 0.0,
            cost: CostBreakdown::default(),
            status: DispatchStatus::Scheduled,
            progress: 0.0,
            current_location: None,
            current_address: None,
            instructions: None,
            cancel_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
