//! # Geographic Utilities
//!
//! Distance, length and bounding-box helpers shared by every pipeline stage.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`approx_distance`] | Equirectangular distance, used for decimation |
//! | [`polyline_length`] | Total great-circle length of a path in meters |
//! | [`compute_bounds`] | Bounding box of a path |
//! | [`meters_to_degrees`] | Fixed meters to degrees conversion for tolerances |
//! | [`meters_per_degree`] | Local meters per degree of latitude and longitude |
//!
//! ## Algorithm Notes
//!
//! Section lengths use the haversine formula (spherical Earth, radius 6,371 km).
//! Decimation only needs to know whether two fixes are a few meters apart, so it
//! uses the cheaper equirectangular approximation, which is well under a meter
//! off at trail scales and mid latitudes.

use geo::{Distance, Haversine, Point};
use crate::{Bounds, GeoPoint};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters in one degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two points in meters.
///
/// # Example
///
/// ```rust
/// use trail_sections::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Equirectangular distance between two points in meters.
///
/// Longitude is scaled by the cosine of the mean latitude of the pair.
#[inline]
pub fn approx_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let mean_lat = ((p1.latitude + p2.latitude) / 2.0).to_radians();
    let x = (p2.longitude - p1.longitude).to_radians() * mean_lat.cos();
    let y = (p2.latitude - p1.latitude).to_radians();
    (x * EARTH_RADIUS_METERS).hypot(y * EARTH_RADIUS_METERS)
}

/// Total great-circle length of a path in meters. Fewer than two points is 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert meters to degrees with the fixed factor 1° = 111,320 m.
///
/// Used for simplification tolerances, which are configuration values and do
/// not need to vary with latitude.
#[inline]
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Meters per degree of (latitude, longitude) at the given latitude.
#[inline]
pub fn meters_per_degree(latitude: f64) -> (f64, f64) {
    let lat_rad = latitude.to_radians();
    (METERS_PER_DEGREE, METERS_PER_DEGREE * lat_rad.cos().max(1e-6))
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Bounding box of a path.
///
/// Empty input yields inverted MIN/MAX bounds that contain nothing.
///
/// ```rust
/// use trail_sections::{GeoPoint, geo_utils};
///
/// let track = vec![
///     GeoPoint::new(51.5000, -0.1300),
///     GeoPoint::new(51.5100, -0.1200),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&track);
/// assert_eq!(bounds.min_lat, 51.5000);
/// assert_eq!(bounds.max_lng, -0.1200);
/// ```
pub fn compute_bounds(points: &[GeoPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GeoPoint::new(51.21, -3.477);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        assert!(approx_eq(haversine_distance(&a, &b), 111_195.0, 10.0));
    }

    #[test]
    fn test_approx_distance_close_to_haversine() {
        // Minehead to a point ~70m along the coast path
        let a = GeoPoint::new(51.2100, -3.4770);
        let b = GeoPoint::new(51.2104, -3.4777);
        let exact = haversine_distance(&a, &b);
        let approx = approx_distance(&a, &b);
        assert!(approx_eq(exact, approx, 0.1));
    }

    #[test]
    fn test_polyline_length_degenerate() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[GeoPoint::new(51.0, -3.0)]), 0.0);
    }

    #[test]
    fn test_polyline_length_sums_segments() {
        let track = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1.0, 0.0),
            GeoPoint::new(2.0, 0.0),
        ];
        let expected = haversine_distance(&track[0], &track[1]) + haversine_distance(&track[1], &track[2]);
        assert!(approx_eq(polyline_length(&track), expected, 1e-6));
    }

    #[test]
    fn test_compute_bounds() {
        let track = vec![
            GeoPoint::new(51.50, -0.13),
            GeoPoint::new(51.51, -0.12),
            GeoPoint::new(51.505, -0.125),
        ];
        let bounds = compute_bounds(&track);
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lat, 51.51);
        assert_eq!(bounds.min_lng, -0.13);
        assert_eq!(bounds.max_lng, -0.12);
    }

    #[test]
    fn test_meters_to_degrees() {
        assert!(approx_eq(meters_to_degrees(111_320.0), 1.0, 1e-12));
        assert!(approx_eq(meters_to_degrees(20.0), 0.000_179_66, 1e-8));
    }

    #[test]
    fn test_meters_per_degree_shrinks_longitude() {
        let (lat_m, lng_m) = meters_per_degree(60.0);
        assert_eq!(lat_m, METERS_PER_DEGREE);
        assert!(approx_eq(lng_m, METERS_PER_DEGREE / 2.0, 1.0));
    }
}
