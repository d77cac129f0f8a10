//! Vehicle path implementations.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use fleet_core::models::{Coordinate, LocationReport};
use fleet_core::spatial::{bearing_deg, distance_km, interpolate};

/// A path a simulated vehicle follows.
pub trait TrackPath: Send + Sync {
    /// Position `t` seconds after departure.
    fn position(&self, t: f64) -> Coordinate;

    /// Seconds needed to reach the end of the path.
    fn duration_s(&self) -> f64;

    /// Speed in km/h at time `t`.
    fn speed_kmh(&self, t: f64) -> f64;

    /// Heading in degrees, 0 = North. Estimated from the position delta.
    fn heading(&self, t: f64) -> f64 {
        let from = self.position(t);
        let to = self.position(t + 1.0);
        if distance_km(from, to) < 1e-9 {
            return 0.0;
        }
        bearing_deg(from, to)
    }
}

/// Straight line at constant speed, standing still once the end is reached.
pub struct LinearPath {
    pub start: Coordinate,
    pub end: Coordinate,
    pub speed_kmh: f64,
    pub distance_km: f64,
    duration_s: f64,
    heading: f64,
}

impl LinearPath {
    pub fn new(start: Coordinate, end: Coordinate, speed_kmh: f64) -> Self {
        let distance = distance_km(start, end);
        let duration_s = if speed_kmh > 0.0 {
            distance / speed_kmh * 3600.0
        } else {
            0.0
        };
        Self {
            start,
            end,
            speed_kmh,
            distance_km: distance,
            duration_s,
            heading: bearing_deg(start, end),
        }
    }
}

impl TrackPath for LinearPath {
    fn position(&self, t: f64) -> Coordinate {
        let fraction = if self.duration_s > 0.0 {
            t / self.duration_s
        } else {
            0.0
        };
        interpolate(self.start, self.end, fraction)
    }

    fn duration_s(&self) -> f64 {
        self.duration_s
    }

    fn speed_kmh(&self, t: f64) -> f64 {
        if t >= self.duration_s {
            0.0
        } else {
            self.speed_kmh
        }
    }

    fn heading(&self, _t: f64) -> f64 {
        self.heading
    }
}

/// Device report for the sample taken `t` seconds after `departed_at`.
pub fn sample_at(
    path: &dyn TrackPath,
    t: f64,
    departed_at: DateTime<Utc>,
    device_id: &str,
) -> LocationReport {
    let position = path.position(t);
    let taken_at = departed_at + Duration::milliseconds((t * 1000.0).round() as i64);
    LocationReport {
        latitude: position.lat,
        longitude: position.lon,
        speed: Some(path.speed_kmh(t)),
        heading: Some(path.heading(t)),
        timestamp: Some(Value::String(taken_at.to_rfc3339())),
        device_id: Some(device_id.to_string()),
        ..LocationReport::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> LinearPath {
        LinearPath::new(Coordinate::new(40.0, -74.0), Coordinate::new(41.0, -74.0), 60.0)
    }

    #[test]
    fn linear_path_reaches_end_at_duration() {
        let path = path();
        assert!((path.distance_km - 111.19).abs() < 0.5);
        // 111 km at 60 km/h is a little under two hours
        assert!((path.duration_s() / 3600.0 - path.distance_km / 60.0).abs() < 1e-9);

        let end = path.position(path.duration_s());
        assert!((end.lat - 41.0).abs() < 1e-9);
        let past_end = path.position(path.duration_s() * 2.0);
        assert!((past_end.lat - 41.0).abs() < 1e-9);
        assert_eq!(path.speed_kmh(path.duration_s() + 1.0), 0.0);
    }

    #[test]
    fn northbound_heading_is_zero() {
        let path = path();
        assert!(path.heading(0.0).abs() < 1e-6);
        let mid = path.position(path.duration_s() / 2.0);
        assert!((mid.lat - 40.5).abs() < 1e-9);
    }

    #[test]
    fn sample_carries_offset_timestamp() {
        let path = path();
        let departed = Utc::now();
        let report = sample_at(&path, 90.0, departed, "dev-1");

        assert_eq!(report.speed, Some(60.0));
        assert_eq!(report.device_id.as_deref(), Some("dev-1"));
        let stamp = report.timestamp.and_then(|v| v.as_str().map(str::to_string)).unwrap();
        let parsed = DateTime::parse_from_rfc3339(&stamp).unwrap();
        assert_eq!((parsed.with_timezone(&Utc) - departed).num_seconds(), 90);
    }

    #[test]
    fn zero_speed_path_stays_at_start() {
        let path = LinearPath::new(Coordinate::new(1.0, 1.0), Coordinate::new(2.0, 2.0), 0.0);
        assert_eq!(path.duration_s(), 0.0);
        assert_eq!(path.position(100.0), Coordinate::new(1.0, 1.0));
    }
}
