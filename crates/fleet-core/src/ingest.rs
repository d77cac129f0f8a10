//! Location ingest: normalization, progress, checkpoints, alerts and lifecycle events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::alerts::{AlertEngine, SampleContext};
use crate::error::{FleetError, FleetResult};
use crate::lifecycle::{apply_event, delay_offset, delayed_arrival, EventEffect};
use crate::locks::ShipmentLocks;
use crate::models::{
    Alert, AlertDraft, AlertType, Checkpoint, CheckpointStatus, Coordinate, LocationReport,
    Shipment, ShipmentEvent, ShipmentStatus, TrackingEvent, TrackingPoint, TrackingRoute,
};
use crate::progress::{calculate_progress, check_checkpoints, round2, CheckpointArrival};
use crate::repository::FleetRepository;
use crate::routing::route_metrics;
use crate::rules::{IngestConfig, RouteOptimizerConfig};
use crate::spatial::{clamp_coordinate, normalize_heading, simplify_route};
use crate::stats::{batch_statistics, route_statistics, BatchStatistics, RouteStatistics};

/// How out-of-range coordinates are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatePolicy {
    /// Fail with a validation error naming the field
    Reject,
    /// Clamp into the valid degree ranges
    Clamp,
}

/// Result of recording one sample.
#[derive(Debug, Clone, Serialize)]
pub struct IngestedPoint {
    #[serde(flatten)]
    pub point: TrackingPoint,
    pub progress: f64,
    pub shipment_status: ShipmentStatus,
    pub checkpoint_arrival: Option<CheckpointArrival>,
    pub alerts_raised: usize,
}

/// Batch of raw device reports. Entries stay untyped until the per-point
/// loop so one malformed entry fails alone.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    #[serde(alias = "locations")]
    pub updates: Vec<serde_json::Value>,
    #[serde(default)]
    pub device_id: Option<String>,
}

impl BatchRequest {
    pub fn from_reports(reports: &[LocationReport], device_id: Option<String>) -> Self {
        Self {
            updates: reports
                .iter()
                .map(|report| serde_json::to_value(report).unwrap_or(serde_json::Value::Null))
                .collect(),
            device_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PointResult {
    /// Position in the submitted batch
    pub index: usize,
    pub success: bool,
    pub tracking_point_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointError {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<PointError>,
    pub results: Vec<PointResult>,
    pub statistics: BatchStatistics,
    pub anomalies: usize,
    pub progress: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventReport {
    pub event: TrackingEvent,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<LocationReport>,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventReceipt {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub shipment_status: ShipmentStatus,
    pub tracking_point_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointInput {
    pub name: String,
    #[serde(alias = "target")]
    pub location: Coordinate,
    #[serde(default)]
    pub radius_m: Option<f64>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanRouteRequest {
    pub planned_route: Vec<Coordinate>,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub points: Vec<TrackingPoint>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionState {
    Offline,
    Stopped,
    Speeding,
    Moving,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleLocation {
    pub vehicle_id: String,
    pub point: TrackingPoint,
    pub state: MotionState,
    pub age_min: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteView {
    pub route: Option<TrackingRoute>,
    pub statistics: RouteStatistics,
    pub simplified_track: Option<Vec<Coordinate>>,
}

/// Entry point for device position reports and lifecycle events.
pub struct LocationIngest<R> {
    repo: Arc<R>,
    locks: Arc<ShipmentLocks>,
    engine: AlertEngine,
    config: IngestConfig,
    routing: RouteOptimizerConfig,
}

impl<R: FleetRepository> LocationIngest<R> {
    pub fn new(
        repo: Arc<R>,
        locks: Arc<ShipmentLocks>,
        engine: AlertEngine,
        config: IngestConfig,
        routing: RouteOptimizerConfig,
    ) -> Self {
        Self {
            repo,
            locks,
            engine,
            config,
            routing,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Record a single sample. Out-of-range coordinates are rejected.
    pub fn ingest_location(
        &self,
        shipment_id: &str,
        report: &LocationReport,
    ) -> FleetResult<IngestedPoint> {
        let handle = self.lock_handle(shipment_id)?;
        let _guard = ShipmentLocks::acquire(&handle);

        let mut shipment = self.active_shipment(shipment_id)?;
        let now = Utc::now();
        let point = self.build_point(&shipment, report, CoordinatePolicy::Reject, None, now)?;
        let recorded = self.record_point(&mut shipment, point, now)?;
        self.sync_dispatch(&shipment);

        tracing::debug!(
            shipment_id,
            lat = recorded.point.lat,
            lon = recorded.point.lon,
            progress = recorded.progress,
            "Location recorded"
        );
        Ok(recorded)
    }

    /// Record up to `max_batch_points` samples in timestamp order.
    ///
    /// Coordinates are clamped. A failing sample is reported in the outcome
    /// and does not stop the rest of the batch.
    pub fn ingest_batch(&self, shipment_id: &str, batch: &BatchRequest) -> FleetResult<BatchOutcome> {
        if batch.updates.is_empty() {
            return Err(FleetError::validation("updates", "batch must contain at least one point"));
        }
        if batch.updates.len() > self.config.max_batch_points {
            return Err(FleetError::validation(
                "updates",
                format!(
                    "batch of {} points exceeds the limit of {}",
                    batch.updates.len(),
                    self.config.max_batch_points
                ),
            ));
        }

        let handle = self.lock_handle(shipment_id)?;
        let _guard = ShipmentLocks::acquire(&handle);

        let mut shipment = self.active_shipment(shipment_id)?;
        let now = Utc::now();

        let mut results: Vec<Option<PointResult>> = vec![None; batch.updates.len()];
        let mut pending: Vec<(usize, TrackingPoint)> = Vec::with_capacity(batch.updates.len());
        for (index, entry) in batch.updates.iter().enumerate() {
            let built = LocationReport::deserialize(entry)
                .map_err(|err| FleetError::validation("updates", format!("malformed point: {err}")))
                .and_then(|report| {
                    self.build_point(
                        &shipment,
                        &report,
                        CoordinatePolicy::Clamp,
                        batch.device_id.as_deref(),
                        now,
                    )
                });
            match built {
                Ok(point) => pending.push((index, point)),
                Err(err) => results[index] = Some(failed(index, &err)),
            }
        }
        pending.sort_by_key(|(_, point)| point.timestamp);

        let mut recorded: Vec<TrackingPoint> = Vec::with_capacity(pending.len());
        for (index, point) in pending {
            match self.record_point(&mut shipment, point, now) {
                Ok(ingested) => {
                    results[index] = Some(PointResult {
                        index,
                        success: true,
                        tracking_point_id: Some(ingested.point.id.clone()),
                        timestamp: Some(ingested.point.timestamp),
                        error: None,
                    });
                    recorded.push(ingested.point);
                }
                Err(err) => {
                    tracing::warn!(shipment_id, index, error = %err, "Batch point failed");
                    results[index] = Some(failed(index, &err));
                }
            }
        }

        let statistics = batch_statistics(&recorded);
        let anomalies = if recorded.is_empty() {
            0
        } else {
            self.raise(self.engine.scan_anomalies(&recorded), now)
        };
        if !recorded.is_empty() {
            self.sync_dispatch(&shipment);
        }

        let results: Vec<PointResult> = results.into_iter().flatten().collect();
        let errors: Vec<PointError> = results
            .iter()
            .filter_map(|r| {
                r.error.as_ref().map(|error| PointError {
                    index: r.index,
                    error: error.clone(),
                })
            })
            .collect();

        tracing::info!(
            shipment_id,
            successful = recorded.len(),
            failed = errors.len(),
            anomalies,
            "Location batch processed"
        );

        Ok(BatchOutcome {
            successful: recorded.len(),
            failed: errors.len(),
            errors,
            results,
            statistics,
            anomalies,
            progress: shipment.progress,
        })
    }

    /// Apply a lifecycle event and log it. A location, when present, is
    /// recorded first as a sample tagged with the event.
    pub fn report_event(&self, shipment_id: &str, report: &EventReport) -> FleetResult<EventReceipt> {
        let handle = self.lock_handle(shipment_id)?;
        let _guard = ShipmentLocks::acquire(&handle);

        let mut shipment = self.active_shipment(shipment_id)?;
        let now = Utc::now();
        let at = parse_timestamp(report.timestamp.as_ref()).unwrap_or(now);
        let kind = report.event.kind();

        if let TrackingEvent::Delay { hours } = &report.event {
            let offset = delay_offset(*hours, self.config.delay_extension_hours)?;
            if let Some(estimated) = shipment.estimated_arrival {
                delayed_arrival(estimated, offset)?;
            }
        }

        let mut tracking_point_id = None;
        if let Some(location) = &report.location {
            let mut location = location.clone();
            location.event = Some(kind);
            if location.timestamp.is_none() {
                location.timestamp = report.timestamp.clone();
            }
            let point = self.build_point(
                &shipment,
                &location,
                CoordinatePolicy::Reject,
                report.device_id.as_deref(),
                now,
            )?;
            let recorded = self.record_point(&mut shipment, point, now)?;
            tracking_point_id = Some(recorded.point.id);
        }

        let effect = apply_event(&mut shipment, &report.event, at, self.config.delay_extension_hours);
        match &effect {
            EventEffect::Transitioned { from, to } => {
                tracing::info!(shipment_id, %from, %to, event = %kind, "Shipment status changed");
            }
            EventEffect::Rescheduled { estimated_arrival } => {
                tracing::info!(shipment_id, %estimated_arrival, "Shipment rescheduled");
            }
            // a located emergency was already raised from the tagged sample
            EventEffect::Emergency if tracking_point_id.is_none() => {
                let description = report.description.as_deref().or(match &report.event {
                    TrackingEvent::Emergency { description } => description.as_deref(),
                    _ => None,
                });
                let draft = self.engine.emergency(
                    shipment_id,
                    description,
                    shipment.current_location,
                    None,
                );
                self.raise(vec![draft], now);
            }
            EventEffect::CheckpointCheck if tracking_point_id.is_none() => {
                tracing::debug!(shipment_id, "Checkpoint pass without a location");
            }
            EventEffect::Ignored => {
                tracing::debug!(shipment_id, event = %kind, status = %shipment.status, "Event ignored");
            }
            _ => {}
        }
        self.repo.save_shipment(shipment.clone())?;

        let event = ShipmentEvent {
            id: uuid::Uuid::new_v4().to_string(),
            shipment_id: shipment.id.clone(),
            kind,
            description: report.description.clone().or_else(|| event_description(&report.event)),
            timestamp: at,
            tracking_point_id: tracking_point_id.clone(),
        };
        self.repo.append_event(event.clone())?;

        if tracking_point_id.is_some() || matches!(effect, EventEffect::Transitioned { .. }) {
            self.sync_dispatch(&shipment);
        }

        Ok(EventReceipt {
            event_id: event.id,
            timestamp: at,
            shipment_status: shipment.status,
            tracking_point_id,
        })
    }

    /// Create or replace the planned route and checkpoints of a shipment.
    pub fn plan_route(&self, shipment_id: &str, request: &PlanRouteRequest) -> FleetResult<TrackingRoute> {
        if request.planned_route.len() < 2 {
            return Err(FleetError::validation(
                "planned_route",
                "a route needs at least two points",
            ));
        }
        if request.planned_route.iter().any(|c| !c.is_valid()) {
            return Err(FleetError::validation("planned_route", "coordinates out of range"));
        }
        for checkpoint in &request.checkpoints {
            if !checkpoint.location.is_valid() {
                return Err(FleetError::validation(
                    "checkpoints",
                    format!("checkpoint {} has coordinates out of range", checkpoint.name),
                ));
            }
            if checkpoint.radius_m.is_some_and(|r| !r.is_finite() || r <= 0.0) {
                return Err(FleetError::validation(
                    "checkpoints",
                    format!("checkpoint {} needs a positive radius", checkpoint.name),
                ));
            }
        }

        let handle = self.lock_handle(shipment_id)?;
        let _guard = ShipmentLocks::acquire(&handle);

        let mut shipment = self.active_shipment(shipment_id)?;
        let now = Utc::now();
        let existing = self.repo.route_for_shipment(shipment_id);
        let route_id = existing
            .as_ref()
            .map(|r| r.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let (distance_km, duration_min) =
            route_metrics(&request.planned_route, self.routing.tracking_route_speed_kmh);
        let checkpoints = request
            .checkpoints
            .iter()
            .enumerate()
            .map(|(idx, input)| Checkpoint {
                id: uuid::Uuid::new_v4().to_string(),
                route_id: route_id.clone(),
                name: input.name.clone(),
                order: idx as u32 + 1,
                target: input.location,
                radius_m: input.radius_m.unwrap_or(self.config.checkpoint_radius_m),
                status: CheckpointStatus::Pending,
                visit_count: 0,
                actual_arrival: None,
                required: input.required,
            })
            .collect();

        let route = TrackingRoute {
            id: route_id,
            shipment_id: shipment.id.clone(),
            planned_route: request.planned_route.clone(),
            distance_km,
            duration_min,
            checkpoints,
            created_at: existing.map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.repo.save_route(route.clone())?;

        shipment.route_id = Some(route.id.clone());
        shipment.updated_at = now;
        self.repo.save_shipment(shipment)?;

        tracing::info!(
            shipment_id,
            route_id = %route.id,
            distance_km,
            checkpoints = route.checkpoints.len(),
            "Tracking route planned"
        );
        Ok(route)
    }

    /// Newest-first samples of a shipment.
    pub fn history(&self, shipment_id: &str, query: &HistoryQuery) -> FleetResult<HistoryPage> {
        if self.repo.shipment(shipment_id).is_none() {
            return Err(FleetError::not_found("shipment", shipment_id));
        }
        let mut points: Vec<TrackingPoint> = self
            .repo
            .points_for_shipment(shipment_id)
            .into_iter()
            .filter(|p| query.start_date.map_or(true, |start| p.timestamp >= start))
            .filter(|p| query.end_date.map_or(true, |end| p.timestamp <= end))
            .collect();
        points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = points.len();
        let limit = query
            .limit
            .unwrap_or(self.config.history_default_limit)
            .clamp(1, self.config.history_max_limit);
        let offset = query.offset.unwrap_or(0);
        let points: Vec<TrackingPoint> = points.into_iter().skip(offset).take(limit).collect();

        Ok(HistoryPage {
            has_more: offset + points.len() < total,
            points,
            total,
            limit,
            offset,
        })
    }

    /// Latest sample across the vehicle's shipments, or `None`.
    pub fn vehicle_location(&self, vehicle_id: &str) -> Option<VehicleLocation> {
        let point = self.repo.latest_point_for_vehicle(vehicle_id)?;
        let age = Utc::now() - point.timestamp;
        let state = if age > Duration::minutes(self.config.offline_after_min) {
            MotionState::Offline
        } else if point.speed_kmh <= 0.0 {
            MotionState::Stopped
        } else if point.speed_kmh > self.engine.thresholds().speeding_kmh {
            MotionState::Speeding
        } else {
            MotionState::Moving
        };
        Some(VehicleLocation {
            vehicle_id: vehicle_id.to_string(),
            age_min: round2(age.num_seconds() as f64 / 60.0),
            point,
            state,
        })
    }

    /// Planned route plus statistics over the recorded track.
    pub fn route_view(&self, shipment_id: &str, tolerance_m: Option<f64>) -> FleetResult<RouteView> {
        if self.repo.shipment(shipment_id).is_none() {
            return Err(FleetError::not_found("shipment", shipment_id));
        }
        let mut points = self.repo.points_for_shipment(shipment_id);
        points.sort_by_key(|p| p.timestamp);

        let simplified_track = tolerance_m.map(|tolerance| {
            let track: Vec<Coordinate> = points.iter().map(TrackingPoint::coordinate).collect();
            simplify_route(&track, tolerance)
        });
        Ok(RouteView {
            route: self.repo.route_for_shipment(shipment_id),
            statistics: route_statistics(&points),
            simplified_track,
        })
    }

    pub fn events(&self, shipment_id: &str) -> FleetResult<Vec<ShipmentEvent>> {
        if self.repo.shipment(shipment_id).is_none() {
            return Err(FleetError::not_found("shipment", shipment_id));
        }
        Ok(self.repo.events_for_shipment(shipment_id))
    }

    /// Lock handle for a shipment still accepting input. Unknown and finished
    /// shipments fail here without creating a map entry.
    fn lock_handle(&self, shipment_id: &str) -> FleetResult<Arc<Mutex<()>>> {
        self.active_shipment(shipment_id)?;
        Ok(self.locks.handle(shipment_id))
    }

    fn active_shipment(&self, shipment_id: &str) -> FleetResult<Shipment> {
        let shipment = self
            .repo
            .shipment(shipment_id)
            .ok_or_else(|| FleetError::not_found("shipment", shipment_id))?;
        if shipment.status.is_terminal() {
            return Err(FleetError::InvalidState(format!(
                "shipment {} is {} and no longer accepts tracking",
                shipment.shipment_number, shipment.status
            )));
        }
        Ok(shipment)
    }

    fn build_point(
        &self,
        shipment: &Shipment,
        report: &LocationReport,
        policy: CoordinatePolicy,
        batch_device: Option<&str>,
        now: DateTime<Utc>,
    ) -> FleetResult<TrackingPoint> {
        let position = normalize_position(report.latitude, report.longitude, policy)?;
        let timestamp = parse_timestamp(report.timestamp.as_ref()).unwrap_or_else(|| {
            tracing::debug!(shipment_id = %shipment.id, "Sample timestamp missing or unparseable; using ingest time");
            now
        });
        let speed_kmh = report
            .speed
            .filter(|s| s.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, self.config.max_speed_kmh);

        Ok(TrackingPoint {
            id: uuid::Uuid::new_v4().to_string(),
            shipment_id: shipment.id.clone(),
            vehicle_id: shipment.vehicle_id.clone(),
            lat: position.lat,
            lon: position.lon,
            address: report.address.clone(),
            speed_kmh,
            heading_deg: normalize_heading(report.heading.unwrap_or(0.0)),
            altitude_m: report.altitude.filter(|v| v.is_finite()),
            accuracy_m: report.accuracy.filter(|v| v.is_finite()),
            battery_level: report.battery_level.filter(|v| v.is_finite()),
            signal_strength: report.signal_strength.filter(|v| v.is_finite()),
            temperature_c: report.temperature.filter(|v| v.is_finite()),
            event: report.event,
            device_id: report
                .device_id
                .clone()
                .or_else(|| batch_device.map(str::to_string)),
            timestamp,
            received_at: now,
        })
    }

    /// Store the sample and fold it into the shipment, its route and alerts.
    fn record_point(
        &self,
        shipment: &mut Shipment,
        point: TrackingPoint,
        now: DateTime<Utc>,
    ) -> FleetResult<IngestedPoint> {
        self.repo.append_point(point.clone())?;

        let position = point.coordinate();
        shipment.current_location = Some(position);
        if point.address.is_some() {
            shipment.current_address = point.address.clone();
        }
        if !matches!(shipment.status, ShipmentStatus::Unloading | ShipmentStatus::Delivered) {
            shipment.progress = calculate_progress(shipment.origin, shipment.destination, position);
        }
        shipment.updated_at = now;

        let mut route = self.repo.route_for_shipment(&shipment.id);
        let checkpoint_arrival = route.as_mut().and_then(|route| {
            let arrival = check_checkpoints(&mut route.checkpoints, position, point.timestamp)?;
            route.updated_at = now;
            Some(arrival)
        });
        if let (Some(arrival), Some(route)) = (&checkpoint_arrival, route.as_ref()) {
            tracing::info!(
                shipment_id = %shipment.id,
                checkpoint = %arrival.name,
                order = arrival.order,
                distance_m = round2(arrival.distance_m),
                "Checkpoint reached"
            );
            if let Err(err) = self.repo.save_route(route.clone()) {
                tracing::warn!(shipment_id = %shipment.id, error = %err, "Failed to save checkpoint state");
            }
        }

        let planned_route = route
            .as_ref()
            .map(|r| r.planned_route.as_slice())
            .filter(|points| !points.is_empty());
        let drafts = self.engine.evaluate_sample(
            &point,
            &SampleContext {
                shipment: &*shipment,
                planned_route,
                now,
            },
        );
        let alerts_raised = self.raise(drafts, now);

        self.repo.save_shipment(shipment.clone())?;

        Ok(IngestedPoint {
            progress: shipment.progress,
            shipment_status: shipment.status,
            checkpoint_arrival,
            alerts_raised,
            point,
        })
    }

    /// Store alert drafts. Failures are logged and skipped; an open DELAY
    /// alert suppresses new ones for the same shipment.
    fn raise(&self, drafts: Vec<AlertDraft>, now: DateTime<Utc>) -> usize {
        let mut raised = 0;
        for draft in drafts {
            if draft.alert_type == AlertType::Delay
                && self.repo.has_open_alert(&draft.shipment_id, AlertType::Delay)
            {
                continue;
            }
            let alert = Alert::from_draft(draft, now);
            let (id, alert_type, severity) = (alert.id.clone(), alert.alert_type, alert.severity);
            match self.repo.insert_alert(alert) {
                Ok(()) => {
                    raised += 1;
                    tracing::info!(alert_id = %id, %alert_type, %severity, "Alert raised");
                }
                Err(err) => {
                    tracing::warn!(%alert_type, error = %err, "Failed to store alert");
                }
            }
        }
        raised
    }

    /// Mirror the shipment position onto its dispatch; progress is the
    /// average over the dispatch's shipments.
    fn sync_dispatch(&self, shipment: &Shipment) {
        let (Some(dispatch_id), Some(location)) = (&shipment.dispatch_id, shipment.current_location)
        else {
            return;
        };
        let shipments = self.repo.shipments_for_dispatch(dispatch_id);
        let progress = if shipments.is_empty() {
            shipment.progress
        } else {
            round2(shipments.iter().map(|s| s.progress).sum::<f64>() / shipments.len() as f64)
        };
        if let Err(err) = self.repo.update_dispatch_position(
            dispatch_id,
            location,
            shipment.current_address.clone(),
            progress,
        ) {
            tracing::warn!(dispatch_id = %dispatch_id, error = %err, "Failed to update dispatch position");
        }
    }
}

fn failed(index: usize, err: &FleetError) -> PointResult {
    PointResult {
        index,
        success: false,
        tracking_point_id: None,
        timestamp: None,
        error: Some(err.to_string()),
    }
}

fn normalize_position(lat: f64, lon: f64, policy: CoordinatePolicy) -> FleetResult<Coordinate> {
    if !lat.is_finite() {
        return Err(FleetError::validation("latitude", "must be a finite number"));
    }
    if !lon.is_finite() {
        return Err(FleetError::validation("longitude", "must be a finite number"));
    }
    match policy {
        CoordinatePolicy::Clamp => Ok(clamp_coordinate(lat, lon)),
        CoordinatePolicy::Reject => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(FleetError::validation("latitude", "must be between -90 and 90"));
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err(FleetError::validation("longitude", "must be between -180 and 180"));
            }
            Ok(Coordinate::new(lat, lon))
        }
    }
}

/// RFC 3339 string or epoch milliseconds.
pub fn parse_timestamp(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    match value? {
        serde_json::Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        serde_json::Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

fn event_description(event: &TrackingEvent) -> Option<String> {
    match event {
        TrackingEvent::RouteChange { description } => Some(description.clone()),
        TrackingEvent::Emergency { description } => description.clone(),
        TrackingEvent::Delay { hours: Some(hours) } => Some(format!("Delayed by {hours} h")),
        _ => None,
    }
}
