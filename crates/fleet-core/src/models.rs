//! Core data models for fleet dispatch and shipment tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Implements `as_str` and `Display` using the same names serde puts on the wire.
macro_rules! wire_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude", alias = "lng")]
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and inside the WGS84 degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

// ========== MASTER DATA ==========

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

wire_names!(Priority { Low => "LOW", Medium => "MEDIUM", High => "HIGH", Urgent => "URGENT" });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

wire_names!(OrderStatus {
    Pending => "PENDING",
    Confirmed => "CONFIRMED",
    Assigned => "ASSIGNED",
    InTransit => "IN_TRANSIT",
    Delivered => "DELIVERED",
    Cancelled => "CANCELLED",
});

/// A customer order supplied by the order-management collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub origin_address: String,
    #[serde(default)]
    pub destination_address: String,
    pub origin: Coordinate,
    pub destination: Coordinate,
    /// Cargo weight in kg
    #[serde(default)]
    pub cargo_weight: f64,
    /// Cargo volume in m³
    #[serde(default)]
    pub cargo_volume: f64,
    #[serde(default)]
    pub cargo_value: f64,
    #[serde(default)]
    pub priority: Priority,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    #[default]
    Van,
    Truck,
    HeavyTruck,
    Refrigerated,
    Trailer,
}

wire_names!(VehicleType {
    Van => "VAN",
    Truck => "TRUCK",
    HeavyTruck => "HEAVY_TRUCK",
    Refrigerated => "REFRIGERATED",
    Trailer => "TRAILER",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    #[default]
    Available,
    Reserved,
    InTransit,
    Maintenance,
    Unavailable,
}

wire_names!(VehicleStatus {
    Available => "AVAILABLE",
    Reserved => "RESERVED",
    InTransit => "IN_TRANSIT",
    Maintenance => "MAINTENANCE",
    Unavailable => "UNAVAILABLE",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub plate_number: String,
    #[serde(default)]
    pub vehicle_type: VehicleType,
    /// Maximum load in kg
    pub max_load: f64,
    /// Maximum volume in m³
    pub max_volume: f64,
    #[serde(default)]
    pub status: VehicleStatus,
    /// Fuel or charge level in percent
    #[serde(default)]
    pub fuel_level: Option<f64>,
    #[serde(default)]
    pub daily_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    #[default]
    Available,
    OnDuty,
    OffDuty,
}

wire_names!(DriverStatus { Available => "AVAILABLE", OnDuty => "ON_DUTY", OffDuty => "OFF_DUTY" });

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub license_number: String,
    #[serde(default)]
    pub license_class: String,
    #[serde(default)]
    pub license_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: DriverStatus,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub accident_count: u32,
    #[serde(default)]
    pub violation_count: u32,
}

// ========== DISPATCH ==========

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchStatus {
    Planning,
    #[default]
    Scheduled,
    Assigned,
    InTransit,
    Delayed,
    Completed,
    Cancelled,
}

wire_names!(DispatchStatus {
    Planning => "PLANNING",
    Scheduled => "SCHEDULED",
    Assigned => "ASSIGNED",
    InTransit => "IN_TRANSIT",
    Delayed => "DELAYED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl DispatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Rate breakdown for a dispatch. All amounts rounded to 2 decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub distance_km: f64,
    pub base_rate: f64,
    pub fuel_surcharge: f64,
    pub toll_fees: f64,
    pub total_amount: f64,
}

/// A vehicle/driver assignment covering one or more shipments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: String,
    pub dispatch_number: String,
    pub customer_id: Option<String>,
    pub vehicle_id: String,
    pub driver_id: String,
    pub order_ids: Vec<String>,
    pub origin_address: String,
    pub destination_address: String,
    pub origin: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub planned_departure: DateTime<Utc>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub total_weight: f64,
    pub total_volume: f64,
    pub total_value: f64,
    pub estimated_duration_min: f64,
    pub cost: CostBreakdown,
    pub status: DispatchStatus,
    pub progress: f64,
    pub current_location: Option<Coordinate>,
    pub current_address: Option<String>,
    pub instructions: Option<String>,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ========== SHIPMENT ==========

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    #[default]
    Pending,
    Scheduled,
    Loading,
    InTransit,
    Unloading,
    Delivered,
    Completed,
    Cancelled,
}

wire_names!(ShipmentStatus {
    Pending => "PENDING",
    Scheduled => "SCHEDULED",
    Loading => "LOADING",
    InTransit => "IN_TRANSIT",
    Unloading => "UNLOADING",
    Delivered => "DELIVERED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl ShipmentStatus {
    /// Statuses that no longer accept tracking input.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses during which the cargo is with the vehicle.
    pub fn is_underway(&self) -> bool {
        matches!(self, Self::Loading | Self::InTransit | Self::Unloading)
    }
}

/// Transport of one order's cargo, possibly one stop of a multi-stop dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub shipment_number: String,
    pub dispatch_id: Option<String>,
    pub order_id: String,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    /// 0-based position within the dispatch
    pub sequence: u32,
    pub origin_address: String,
    pub destination_address: String,
    pub origin: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub status: ShipmentStatus,
    pub current_location: Option<Coordinate>,
    pub current_address: Option<String>,
    /// Completion percentage in [0, 100]
    pub progress: f64,
    pub route_id: Option<String>,
    pub estimated_departure: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ========== ROUTES & CHECKPOINTS ==========

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointStatus {
    #[default]
    Pending,
    Arrived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub route_id: String,
    pub name: String,
    pub order: u32,
    pub target: Coordinate,
    /// Arrival radius in meters
    pub radius_m: f64,
    pub status: CheckpointStatus,
    pub visit_count: u32,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub required: bool,
}

/// Planned path for a shipment with its ordered checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRoute {
    pub id: String,
    pub shipment_id: String,
    pub planned_route: Vec<Coordinate>,
    pub distance_km: f64,
    pub duration_min: f64,
    pub checkpoints: Vec<Checkpoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ========== TRACKING ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Departure,
    Arrival,
    LoadingStart,
    LoadingComplete,
    UnloadingStart,
    UnloadingComplete,
    Delay,
    RouteChange,
    Emergency,
    CheckpointPass,
}

wire_names!(EventKind {
    Departure => "DEPARTURE",
    Arrival => "ARRIVAL",
    LoadingStart => "LOADING_START",
    LoadingComplete => "LOADING_COMPLETE",
    UnloadingStart => "UNLOADING_START",
    UnloadingComplete => "UNLOADING_COMPLETE",
    Delay => "DELAY",
    RouteChange => "ROUTE_CHANGE",
    Emergency => "EMERGENCY",
    CheckpointPass => "CHECKPOINT_PASS",
});

/// A shipment lifecycle event. Each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingEvent {
    Departure,
    Arrival,
    LoadingStart,
    LoadingComplete,
    UnloadingStart,
    UnloadingComplete,
    /// Push back the estimated arrival; `hours` overrides the configured extension
    Delay {
        #[serde(default)]
        hours: Option<f64>,
    },
    RouteChange { description: String },
    Emergency {
        #[serde(default)]
        description: Option<String>,
    },
    CheckpointPass,
}

impl TrackingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Departure => EventKind::Departure,
            Self::Arrival => EventKind::Arrival,
            Self::LoadingStart => EventKind::LoadingStart,
            Self::LoadingComplete => EventKind::LoadingComplete,
            Self::UnloadingStart => EventKind::UnloadingStart,
            Self::UnloadingComplete => EventKind::UnloadingComplete,
            Self::Delay { .. } => EventKind::Delay,
            Self::RouteChange { .. } => EventKind::RouteChange,
            Self::Emergency { .. } => EventKind::Emergency,
            Self::CheckpointPass => EventKind::CheckpointPass,
        }
    }
}

/// One timestamped position sample. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingPoint {
    pub id: String,
    pub shipment_id: String,
    pub vehicle_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub address: Option<String>,
    pub speed_kmh: f64,
    pub heading_deg: f64,
    pub altitude_m: Option<f64>,
    pub accuracy_m: Option<f64>,
    /// Battery or fuel level in percent
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
    pub temperature_c: Option<f64>,
    pub event: Option<EventKind>,
    pub device_id: Option<String>,
    /// Device-supplied sample time
    pub timestamp: DateTime<Utc>,
    /// Server receipt time
    pub received_at: DateTime<Utc>,
}

impl TrackingPoint {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

/// Raw position report as sent by a device, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationReport {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub signal_strength: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// RFC 3339 string or epoch milliseconds; anything else is replaced by the ingest time
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub event: Option<EventKind>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Recorded shipment lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentEvent {
    pub id: String,
    pub shipment_id: String,
    pub kind: EventKind,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub tracking_point_id: Option<String>,
}

// ========== ALERTS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    Speeding,
    LowFuel,
    Delay,
    Emergency,
    Deviation,
    DataAnomaly,
}

wire_names!(AlertType {
    Speeding => "SPEEDING",
    LowFuel => "LOW_FUEL",
    Delay => "DELAY",
    Emergency => "EMERGENCY",
    Deviation => "DEVIATION",
    DataAnomaly => "DATA_ANOMALY",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

wire_names!(AlertSeverity { Low => "LOW", Medium => "MEDIUM", High => "HIGH", Critical => "CRITICAL" });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    #[default]
    Active,
    Acknowledged,
    Resolved,
    Dismissed,
}

wire_names!(AlertStatus {
    Active => "ACTIVE",
    Acknowledged => "ACKNOWLEDGED",
    Resolved => "RESOLVED",
    Dismissed => "DISMISSED",
});

/// Sub-kind for DATA_ANOMALY alerts raised by the batch scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    TimeGap,
    TimeOverlap,
    SpeedAnomaly,
    AccelerationAnomaly,
    PositionJump,
}

/// Alert produced by the engine, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertDraft {
    pub shipment_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub location: Option<Coordinate>,
    pub tracking_point_id: Option<String>,
    pub anomaly: Option<AnomalyKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub shipment_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub location: Option<Coordinate>,
    pub tracking_point_id: Option<String>,
    #[serde(default)]
    pub anomaly: Option<AnomalyKind>,
    pub status: AlertStatus,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
}

impl Alert {
    pub fn from_draft(draft: AlertDraft, triggered_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            shipment_id: draft.shipment_id,
            alert_type: draft.alert_type,
            severity: draft.severity,
            title: draft.title,
            description: draft.description,
            location: draft.location,
            tracking_point_id: draft.tracking_point_id,
            anomaly: draft.anomaly,
            status: AlertStatus::Active,
            triggered_at,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_at: None,
            resolution: None,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    /// Slice `items` to the 1-based `page` of size `limit`.
    pub fn paginate(items: Vec<T>, page: usize, limit: usize) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let total = items.len();
        let items = items
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();
        Self {
            items,
            total,
            page,
            limit,
        }
    }
}
