//! Aggregate statistics over tracking samples.

use serde::Serialize;

use crate::models::TrackingPoint;
use crate::progress::round2;
use crate::spatial::distance_km;

/// Minimum consecutive stationary samples that count as a stop.
const MIN_STOP_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccuracySummary {
    pub average_m: f64,
    pub best_m: f64,
    pub worst_m: f64,
}

/// Summary of one ingested batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStatistics {
    pub points: usize,
    pub time_span_min: f64,
    pub distance_km: f64,
    /// Over moving samples only
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub altitude: Option<Range>,
    pub accuracy: Option<AccuracySummary>,
}

/// Summary of a shipment's whole log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteStatistics {
    pub points: usize,
    pub total_distance_km: f64,
    pub total_duration_min: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub stops: usize,
    pub idle_minutes: f64,
}

/// Statistics over `points` in timestamp order.
pub fn batch_statistics(points: &[TrackingPoint]) -> BatchStatistics {
    let (average_speed_kmh, max_speed_kmh) = speed_summary(points);

    let altitudes: Vec<f64> = points.iter().filter_map(|p| p.altitude_m).collect();
    let altitude = min_max(&altitudes).map(|(min, max)| Range {
        min: round2(min),
        max: round2(max),
    });

    let accuracies: Vec<f64> = points.iter().filter_map(|p| p.accuracy_m).collect();
    let accuracy = min_max(&accuracies).map(|(best, worst)| AccuracySummary {
        average_m: round2(accuracies.iter().sum::<f64>() / accuracies.len() as f64),
        best_m: round2(best),
        worst_m: round2(worst),
    });

    BatchStatistics {
        points: points.len(),
        time_span_min: round2(time_span_min(points)),
        distance_km: round2(travelled_km(points)),
        average_speed_kmh,
        max_speed_kmh,
        altitude,
        accuracy,
    }
}

/// Distance, duration, speeds and stops over `points` in timestamp order.
///
/// A stop is a run of at least two consecutive zero-speed samples; idle time
/// is the time spanned by those runs.
pub fn route_statistics(points: &[TrackingPoint]) -> RouteStatistics {
    let (average_speed_kmh, max_speed_kmh) = speed_summary(points);

    let mut stops = 0;
    let mut idle_secs = 0.0;
    let mut run_start: Option<usize> = None;
    for idx in 0..=points.len() {
        let stationary = points.get(idx).is_some_and(|p| p.speed_kmh <= 0.0);
        match (stationary, run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                if idx - start >= MIN_STOP_SAMPLES {
                    stops += 1;
                    idle_secs += seconds_between(&points[start], &points[idx - 1]);
                }
                run_start = None;
            }
            _ => {}
        }
    }

    RouteStatistics {
        points: points.len(),
        total_distance_km: round2(travelled_km(points)),
        total_duration_min: round2(time_span_min(points)),
        average_speed_kmh,
        max_speed_kmh,
        stops,
        idle_minutes: round2(idle_secs / 60.0),
    }
}

fn travelled_km(points: &[TrackingPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_km(pair[0].coordinate(), pair[1].coordinate()))
        .sum()
}

fn time_span_min(points: &[TrackingPoint]) -> f64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) => seconds_between(first, last) / 60.0,
        _ => 0.0,
    }
}

fn seconds_between(a: &TrackingPoint, b: &TrackingPoint) -> f64 {
    (b.timestamp - a.timestamp).num_milliseconds() as f64 / 1000.0
}

fn speed_summary(points: &[TrackingPoint]) -> (f64, f64) {
    let moving: Vec<f64> = points
        .iter()
        .map(|p| p.speed_kmh)
        .filter(|speed| *speed > 0.0)
        .collect();
    if moving.is_empty() {
        return (0.0, 0.0);
    }
    let average = moving.iter().sum::<f64>() / moving.len() as f64;
    let max = moving.iter().copied().fold(f64::MIN, f64::max);
    (round2(average), round2(max))
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}
