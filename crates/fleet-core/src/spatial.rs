//! Geospatial kernel: distances, bearings and route simplification.

use crate::models::Coordinate;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance between two coordinates in kilometres.
pub fn distance_km(from: Coordinate, to: Coordinate) -> f64 {
    haversine_distance(from.lat, from.lon, to.lat, to.lon) / 1000.0
}

/// Sum of consecutive great-circle legs in kilometres.
pub fn path_distance_km(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|leg| distance_km(leg[0], leg[1]))
        .sum()
}

/// Distance in kilometres from `point` to the closest of `targets`.
/// `None` when `targets` is empty.
pub fn nearest_distance_km(point: Coordinate, targets: &[Coordinate]) -> Option<f64> {
    targets
        .iter()
        .map(|target| distance_km(point, *target))
        .min_by(|a, b| a.total_cmp(b))
}

// ==== Local metric scaling ====

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

pub fn meters_to_lat(meters: f64, ref_lat_deg: f64) -> f64 {
    meters / meters_per_deg_lat(ref_lat_deg).max(1e-9)
}

fn lat_to_meters(deg: f64, ref_lat_deg: f64) -> f64 {
    deg * meters_per_deg_lat(ref_lat_deg)
}

fn lon_to_meters(deg: f64, ref_lat_deg: f64) -> f64 {
    deg * meters_per_deg_lon(ref_lat_deg)
}

// ==== Bearings ====

/// Initial bearing from `from` to `to` in degrees, 0 = north, clockwise, in [0, 360).
pub fn bearing_deg(from: Coordinate, to: Coordinate) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let delta_lambda = (to.lon - from.lon).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    normalize_heading(x.atan2(y).to_degrees())
}

/// Wrap a heading into [0, 360). Non-finite input becomes 0.
pub fn normalize_heading(heading_deg: f64) -> f64 {
    if !heading_deg.is_finite() {
        return 0.0;
    }
    let wrapped = heading_deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Move `distance_m` meters from `origin` along `bearing_deg`.
pub fn offset_by_bearing(origin: Coordinate, distance_m: f64, bearing_deg: f64) -> Coordinate {
    if distance_m.abs() <= f64::EPSILON {
        return origin;
    }

    let bearing_rad = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    Coordinate::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Linear interpolation between two coordinates, `fraction` clamped to [0, 1].
pub fn interpolate(from: Coordinate, to: Coordinate, fraction: f64) -> Coordinate {
    let t = fraction.clamp(0.0, 1.0);
    Coordinate::new(
        from.lat + (to.lat - from.lat) * t,
        from.lon + (to.lon - from.lon) * t,
    )
}

/// Clamp latitude into [-90, 90] and longitude into [-180, 180].
pub fn clamp_coordinate(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat.clamp(-90.0, 90.0), lon.clamp(-180.0, 180.0))
}

// ==== Simplification ====

/// Minimum distance in meters from a point to a segment, in a local
/// east/north frame anchored at the segment start.
pub fn distance_to_segment_m(point: Coordinate, seg_start: Coordinate, seg_end: Coordinate) -> f64 {
    let ref_lat = seg_start.lat;

    let px = lon_to_meters(point.lon - seg_start.lon, ref_lat);
    let py = lat_to_meters(point.lat - seg_start.lat, ref_lat);

    let sx = lon_to_meters(seg_end.lon - seg_start.lon, ref_lat);
    let sy = lat_to_meters(seg_end.lat - seg_start.lat, ref_lat);

    let seg_len_sq = sx * sx + sy * sy;
    if seg_len_sq < 0.0001 {
        return (px * px + py * py).sqrt();
    }

    // t = ((P-A) · (B-A)) / |B-A|²
    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);
    let dx = px - t * sx;
    let dy = py - t * sy;

    (dx * dx + dy * dy).sqrt()
}

/// Douglas-Peucker simplification with a tolerance in meters.
///
/// Keeps the first and last points, never adds points, and returns the
/// input unchanged when it has fewer than three points or the tolerance
/// is not positive.
pub fn simplify_route(points: &[Coordinate], tolerance_m: f64) -> Vec<Coordinate> {
    if points.len() < 3 || tolerance_m.is_nan() || tolerance_m <= 0.0 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let mut farthest = start;
        let mut max_dist = 0.0;
        for idx in (start + 1)..end {
            let dist = distance_to_segment_m(points[idx], points[start], points[end]);
            if dist > max_dist {
                max_dist = dist;
                farthest = idx;
            }
        }

        if max_dist > tolerance_m {
            keep[farthest] = true;
            stack.push((start, farthest));
            stack.push((farthest, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}
