//! Thresholds, rates and planning constants for dispatch and tracking.

use serde::{Deserialize, Serialize};

use crate::models::VehicleType;

/// Limits the alert engine evaluates tracking samples against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Sample speed above this raises SPEEDING (km/h)
    pub speeding_kmh: f64,
    /// Battery/fuel level below this raises LOW_FUEL (percent)
    pub low_power_pct: f64,
    /// Distance from every planned route point that counts as deviation (km)
    pub route_deviation_km: f64,
    /// Gap between consecutive samples that counts as a time gap (minutes)
    pub time_gap_min: f64,
    /// Gaps longer than this escalate from LOW to MEDIUM (minutes)
    pub time_gap_escalation_min: f64,
    /// Samples closer together than this overlap (seconds)
    pub time_overlap_secs: f64,
    /// Reported speed above this is implausible (km/h)
    pub speed_anomaly_kmh: f64,
    /// Speed change rate above this is implausible (km/h per second)
    pub acceleration_kmh_per_s: f64,
    /// Implied travel speed between samples above this is a jump (km/h)
    pub position_jump_kmh: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            speeding_kmh: 120.0,
            low_power_pct: 20.0,
            route_deviation_km: 0.5,
            time_gap_min: 30.0,
            time_gap_escalation_min: 60.0,
            time_overlap_secs: 1.0,
            speed_anomaly_kmh: 150.0,
            acceleration_kmh_per_s: 10.0,
            position_jump_kmh: 200.0,
        }
    }
}

/// Per-kilometre rates used to price a dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub van_rate_per_km: f64,
    pub truck_rate_per_km: f64,
    pub heavy_truck_rate_per_km: f64,
    pub refrigerated_rate_per_km: f64,
    pub trailer_rate_per_km: f64,
    /// Fuel surcharge as a percentage of the base rate
    pub fuel_surcharge_pct: f64,
    /// Toll estimate per km for light vehicles (van)
    pub light_toll_per_km: f64,
    /// Toll estimate per km for everything heavier than a van
    pub heavy_toll_per_km: f64,
    /// Floor applied to the base rate
    pub minimum_charge: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            van_rate_per_km: 1.5,
            truck_rate_per_km: 2.2,
            heavy_truck_rate_per_km: 3.0,
            refrigerated_rate_per_km: 2.8,
            trailer_rate_per_km: 3.4,
            fuel_surcharge_pct: 12.0,
            light_toll_per_km: 0.08,
            heavy_toll_per_km: 0.18,
            minimum_charge: 50.0,
        }
    }
}

impl PricingConfig {
    pub fn rate_per_km(&self, vehicle_type: VehicleType) -> f64 {
        match vehicle_type {
            VehicleType::Van => self.van_rate_per_km,
            VehicleType::Truck => self.truck_rate_per_km,
            VehicleType::HeavyTruck => self.heavy_truck_rate_per_km,
            VehicleType::Refrigerated => self.refrigerated_rate_per_km,
            VehicleType::Trailer => self.trailer_rate_per_km,
        }
    }

    pub fn toll_per_km(&self, vehicle_type: VehicleType) -> f64 {
        match vehicle_type {
            VehicleType::Van => self.light_toll_per_km,
            _ => self.heavy_toll_per_km,
        }
    }
}

/// Constants for route planning and duration estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteOptimizerConfig {
    /// Assumed road speed for dispatch routes (km/h)
    pub average_speed_kmh: f64,
    /// Dwell time added per pickup/delivery stop (minutes)
    pub stop_dwell_min: f64,
    /// Assumed speed for planned tracking routes (km/h)
    pub tracking_route_speed_kmh: f64,
}

impl Default for RouteOptimizerConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: 50.0,
            stop_dwell_min: 15.0,
            tracking_route_speed_kmh: 60.0,
        }
    }
}

/// Limits and defaults applied by the location ingest path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_batch_points: usize,
    /// Reported speeds are clamped into [0, max_speed_kmh]
    pub max_speed_kmh: f64,
    /// Default DELAY event extension (hours)
    pub delay_extension_hours: f64,
    /// Vehicles with no sample for this long are offline (minutes)
    pub offline_after_min: i64,
    /// Default arrival radius for checkpoints without one (meters)
    pub checkpoint_radius_m: f64,
    pub history_default_limit: usize,
    pub history_max_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_batch_points: 1000,
            max_speed_kmh: 300.0,
            delay_extension_hours: 24.0,
            offline_after_min: 30,
            checkpoint_radius_m: 100.0,
            history_default_limit: 100,
            history_max_limit: 1000,
        }
    }
}
