//! Alert engine for shipment tracking samples.
//!
//! Evaluates single samples against operational thresholds and scans
//! batches for consecutive-pair data anomalies. Evaluation is pure: the
//! engine only produces drafts, storing them is up to the caller.

use chrono::{DateTime, Utc};

use crate::models::{
    AlertDraft, AlertSeverity, AlertType, AnomalyKind, Coordinate, EventKind, Shipment,
    TrackingPoint,
};
use crate::rules::AlertThresholds;
use crate::spatial::{distance_km, nearest_distance_km};

/// Shipment state a sample is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct SampleContext<'a> {
    pub shipment: &'a Shipment,
    pub planned_route: Option<&'a [Coordinate]>,
    pub now: DateTime<Utc>,
}

/// Stateless alert evaluation over tracking samples.
#[derive(Debug, Clone, Default)]
pub struct AlertEngine {
    thresholds: AlertThresholds,
}

impl AlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Evaluate one normalized sample. Each returned draft is independent.
    pub fn evaluate_sample(&self, point: &TrackingPoint, ctx: &SampleContext<'_>) -> Vec<AlertDraft> {
        let mut drafts = Vec::new();
        let location = point.coordinate();

        if point.speed_kmh > self.thresholds.speeding_kmh {
            drafts.push(self.draft(
                point,
                AlertType::Speeding,
                AlertSeverity::High,
                "Speeding detected",
                format!(
                    "Vehicle travelling at {:.1} km/h, limit is {:.0} km/h",
                    point.speed_kmh, self.thresholds.speeding_kmh
                ),
            ));
        }

        if let Some(level) = point.battery_level {
            if level < self.thresholds.low_power_pct {
                drafts.push(self.draft(
                    point,
                    AlertType::LowFuel,
                    AlertSeverity::Medium,
                    "Low fuel or battery",
                    format!("Power level at {:.0}%", level),
                ));
            }
        }

        if let Some(estimated) = ctx.shipment.estimated_arrival {
            if ctx.now > estimated && ctx.shipment.status.is_underway() {
                let late_min = (ctx.now - estimated).num_minutes();
                drafts.push(self.draft(
                    point,
                    AlertType::Delay,
                    AlertSeverity::Medium,
                    "Shipment delayed",
                    format!(
                        "Shipment {} is {} min past its estimated arrival",
                        ctx.shipment.shipment_number, late_min
                    ),
                ));
            }
        }

        if let Some(route) = ctx.planned_route {
            if let Some(off_route_km) = nearest_distance_km(location, route) {
                if off_route_km > self.thresholds.route_deviation_km {
                    drafts.push(self.draft(
                        point,
                        AlertType::Deviation,
                        AlertSeverity::Medium,
                        "Route deviation",
                        format!("Vehicle is {:.2} km from the planned route", off_route_km),
                    ));
                }
            }
        }

        if point.event == Some(EventKind::Emergency) {
            drafts.push(self.emergency(&point.shipment_id, None, Some(location), Some(&point.id)));
        }

        drafts
    }

    /// CRITICAL emergency alert. Always produced, independent of thresholds.
    pub fn emergency(
        &self,
        shipment_id: &str,
        description: Option<&str>,
        location: Option<Coordinate>,
        tracking_point_id: Option<&str>,
    ) -> AlertDraft {
        AlertDraft {
            shipment_id: shipment_id.to_string(),
            alert_type: AlertType::Emergency,
            severity: AlertSeverity::Critical,
            title: "Emergency reported".to_string(),
            description: description
                .unwrap_or("Emergency event reported by the vehicle")
                .to_string(),
            location,
            tracking_point_id: tracking_point_id.map(str::to_string),
            anomaly: None,
        }
    }

    /// Scan consecutive samples (already in timestamp order) for data anomalies.
    pub fn scan_anomalies(&self, points: &[TrackingPoint]) -> Vec<AlertDraft> {
        let mut drafts = Vec::new();

        if let Some(first) = points.first() {
            self.check_speed_anomaly(first, &mut drafts);
        }

        for pair in points.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let dt_s = (curr.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
            let dt_min = dt_s / 60.0;

            if dt_min > self.thresholds.time_gap_min {
                let severity = if dt_min > self.thresholds.time_gap_escalation_min {
                    AlertSeverity::Medium
                } else {
                    AlertSeverity::Low
                };
                drafts.push(self.anomaly(
                    curr,
                    AnomalyKind::TimeGap,
                    severity,
                    format!("{:.1} min without a position report", dt_min),
                ));
            }

            if dt_s.abs() < self.thresholds.time_overlap_secs {
                drafts.push(self.anomaly(
                    curr,
                    AnomalyKind::TimeOverlap,
                    AlertSeverity::Low,
                    format!("Samples only {:.3} s apart", dt_s),
                ));
            }

            self.check_speed_anomaly(curr, &mut drafts);

            if dt_s > 0.0 {
                let accel = (curr.speed_kmh - prev.speed_kmh).abs() / dt_s;
                if accel > self.thresholds.acceleration_kmh_per_s {
                    drafts.push(self.anomaly(
                        curr,
                        AnomalyKind::AccelerationAnomaly,
                        AlertSeverity::High,
                        format!("Speed changed at {:.1} km/h per second", accel),
                    ));
                }

                let jump_km = distance_km(prev.coordinate(), curr.coordinate());
                let implied_kmh = jump_km / (dt_s / 3600.0);
                if implied_kmh > self.thresholds.position_jump_kmh {
                    drafts.push(self.anomaly(
                        curr,
                        AnomalyKind::PositionJump,
                        AlertSeverity::High,
                        format!(
                            "Moved {:.2} km in {:.0} s ({:.0} km/h implied)",
                            jump_km, dt_s, implied_kmh
                        ),
                    ));
                }
            }
        }

        drafts
    }

    fn check_speed_anomaly(&self, point: &TrackingPoint, drafts: &mut Vec<AlertDraft>) {
        if point.speed_kmh > self.thresholds.speed_anomaly_kmh {
            drafts.push(self.anomaly(
                point,
                AnomalyKind::SpeedAnomaly,
                AlertSeverity::High,
                format!("Implausible reported speed {:.1} km/h", point.speed_kmh),
            ));
        }
    }

    fn draft(
        &self,
        point: &TrackingPoint,
        alert_type: AlertType,
        severity: AlertSeverity,
        title: &str,
        description: String,
    ) -> AlertDraft {
        AlertDraft {
            shipment_id: point.shipment_id.clone(),
            alert_type,
            severity,
            title: title.to_string(),
            description,
            location: Some(point.coordinate()),
            tracking_point_id: Some(point.id.clone()),
            anomaly: None,
        }
    }

    fn anomaly(
        &self,
        point: &TrackingPoint,
        kind: AnomalyKind,
        severity: AlertSeverity,
        description: String,
    ) -> AlertDraft {
        let title = match kind {
            AnomalyKind::TimeGap => "Time gap in tracking data",
            AnomalyKind::TimeOverlap => "Overlapping tracking samples",
            AnomalyKind::SpeedAnomaly => "Speed anomaly",
            AnomalyKind::AccelerationAnomaly => "Acceleration anomaly",
            AnomalyKind::PositionJump => "Position jump",
        };
        AlertDraft {
            anomaly: Some(kind),
            ..self.draft(point, AlertType::DataAnomaly, severity, title, description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShipmentStatus;
    use crate::spatial::offset_by_bearing;
    use crate::test_support::{sample_point, sample_shipment};
    use chrono::Duration;

    fn ctx<'a>(shipment: &'a Shipment) -> SampleContext<'a> {
        SampleContext {
            shipment,
            planned_route: None,
            now: Utc::now(),
        }
    }

    #[test]
    fn speeding_sample_raises_high_alert() {
        let shipment = sample_shipment("s1");
        let mut point = sample_point("s1", 40.0, -74.0, Utc::now());
        point.speed_kmh = 130.0;

        let drafts = AlertEngine::default().evaluate_sample(&point, &ctx(&shipment));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].alert_type, AlertType::Speeding);
        assert_eq!(drafts[0].severity, AlertSeverity::High);
        assert_eq!(drafts[0].tracking_point_id.as_deref(), Some(point.id.as_str()));
    }

    #[test]
    fn low_battery_raises_medium_low_fuel() {
        let shipment = sample_shipment("s1");
        let mut point = sample_point("s1", 40.0, -74.0, Utc::now());
        point.battery_level = Some(15.0);

        let drafts = AlertEngine::default().evaluate_sample(&point, &ctx(&shipment));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].alert_type, AlertType::LowFuel);
        assert_eq!(drafts[0].severity, AlertSeverity::Medium);
    }

    #[test]
    fn nominal_sample_raises_nothing() {
        let shipment = sample_shipment("s1");
        let mut point = sample_point("s1", 40.0, -74.0, Utc::now());
        point.speed_kmh = 80.0;
        point.battery_level = Some(90.0);
        assert!(AlertEngine::default()
            .evaluate_sample(&point, &ctx(&shipment))
            .is_empty());
    }

    #[test]
    fn delay_only_while_underway() {
        let mut shipment = sample_shipment("s1");
        shipment.estimated_arrival = Some(Utc::now() - Duration::hours(2));
        let point = sample_point("s1", 40.0, -74.0, Utc::now());
        let engine = AlertEngine::default();

        shipment.status = ShipmentStatus::Scheduled;
        assert!(engine.evaluate_sample(&point, &ctx(&shipment)).is_empty());

        shipment.status = ShipmentStatus::InTransit;
        let drafts = engine.evaluate_sample(&point, &ctx(&shipment));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].alert_type, AlertType::Delay);
    }

    #[test]
    fn deviation_when_far_from_every_route_point() {
        let shipment = sample_shipment("s1");
        let start = Coordinate::new(40.0, -74.0);
        let route = vec![start, offset_by_bearing(start, 5_000.0, 90.0)];
        let engine = AlertEngine::default();

        let on_route = sample_point("s1", start.lat, start.lon, Utc::now());
        let context = SampleContext {
            planned_route: Some(&route),
            ..ctx(&shipment)
        };
        assert!(engine.evaluate_sample(&on_route, &context).is_empty());

        let off = offset_by_bearing(start, 2_000.0, 0.0);
        let off_route = sample_point("s1", off.lat, off.lon, Utc::now());
        let drafts = engine.evaluate_sample(&off_route, &context);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].alert_type, AlertType::Deviation);
    }

    #[test]
    fn emergency_tag_is_critical() {
        let shipment = sample_shipment("s1");
        let mut point = sample_point("s1", 40.0, -74.0, Utc::now());
        point.event = Some(EventKind::Emergency);

        let drafts = AlertEngine::default().evaluate_sample(&point, &ctx(&shipment));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn time_gap_severity_escalates() {
        let engine = AlertEngine::default();
        let t0 = Utc::now();
        let short_gap = vec![
            sample_point("s1", 40.0, -74.0, t0),
            sample_point("s1", 40.0, -74.0, t0 + Duration::minutes(45)),
        ];
        let drafts = engine.scan_anomalies(&short_gap);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].anomaly, Some(AnomalyKind::TimeGap));
        assert_eq!(drafts[0].severity, AlertSeverity::Low);

        let long_gap = vec![
            sample_point("s1", 40.0, -74.0, t0),
            sample_point("s1", 40.0, -74.0, t0 + Duration::minutes(90)),
        ];
        let drafts = engine.scan_anomalies(&long_gap);
        assert_eq!(drafts[0].severity, AlertSeverity::Medium);
    }

    #[test]
    fn overlap_and_jump_are_flagged() {
        let engine = AlertEngine::default();
        let t0 = Utc::now();

        let overlapping = vec![
            sample_point("s1", 40.0, -74.0, t0),
            sample_point("s1", 40.0, -74.0, t0 + Duration::milliseconds(200)),
        ];
        let kinds: Vec<_> = engine
            .scan_anomalies(&overlapping)
            .iter()
            .filter_map(|d| d.anomaly)
            .collect();
        assert_eq!(kinds, vec![AnomalyKind::TimeOverlap]);

        // 10 km in 60 s is 600 km/h
        let start = Coordinate::new(40.0, -74.0);
        let far = offset_by_bearing(start, 10_000.0, 90.0);
        let jumping = vec![
            sample_point("s1", start.lat, start.lon, t0),
            sample_point("s1", far.lat, far.lon, t0 + Duration::seconds(60)),
        ];
        let kinds: Vec<_> = engine
            .scan_anomalies(&jumping)
            .iter()
            .filter_map(|d| d.anomaly)
            .collect();
        assert_eq!(kinds, vec![AnomalyKind::PositionJump]);
    }

    #[test]
    fn acceleration_and_speed_anomalies() {
        let engine = AlertEngine::default();
        let t0 = Utc::now();
        let mut slow = sample_point("s1", 40.0, -74.0, t0);
        slow.speed_kmh = 0.0;
        let mut fast = sample_point("s1", 40.0, -74.0, t0 + Duration::seconds(5));
        fast.speed_kmh = 160.0;

        let kinds: Vec<_> = engine
            .scan_anomalies(&[slow, fast])
            .iter()
            .filter_map(|d| d.anomaly)
            .collect();
        assert!(kinds.contains(&AnomalyKind::SpeedAnomaly));
        assert!(kinds.contains(&AnomalyKind::AccelerationAnomaly));
        assert!(!kinds.contains(&AnomalyKind::PositionJump));
    }

    #[test]
    fn single_sample_has_no_pair_anomalies() {
        let engine = AlertEngine::default();
        let point = sample_point("s1", 40.0, -74.0, Utc::now());
        assert!(engine.scan_anomalies(&[point]).is_empty());
        assert!(engine.scan_anomalies(&[]).is_empty());
    }
}
