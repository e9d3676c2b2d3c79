//! # Trail Sections
//!
//! Route geometry pipeline for drawing a long-distance trail as walked sections.
//!
//! This library provides:
//! - Track loading from GPX or JSON coordinate files (and URLs with `http`)
//! - Decimation and Douglas-Peucker simplification into a reference route
//! - Snapping arbitrary endpoints onto the route and slicing the path between them
//! - Per-participant lateral offsets that stay separated at every zoom level
//!
//! ## Features
//!
//! - **`parallel`** - Slice section definitions in parallel with rayon
//! - **`http`** - Fetch track sources over HTTP
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trail_sections::{GeoPoint, PipelineConfig, simplify};
//!
//! // Raw points heading north along the prime meridian
//! let raw: Vec<GeoPoint> = (0..20)
//!     .map(|i| GeoPoint::new(50.0 + i as f64 * 0.001, 0.0))
//!     .collect();
//!
//! let config = PipelineConfig::default();
//! let route = simplify(&raw, config.decimation_meters, config.simplification_meters).unwrap();
//!
//! let section = route
//!     .slice(GeoPoint::new(50.0021, 0.0001), GeoPoint::new(50.0152, -0.0001))
//!     .unwrap();
//! println!("{:.2} km of {:.2} km", section.length_km(), route.length_km());
//! ```

pub mod config;
pub mod error;
pub mod geo_utils;
pub mod loader;
pub mod offset;
pub mod pipeline;
pub mod refresh;
pub mod sections;
pub mod simplify;
pub mod slice;
pub mod stats;

pub use config::{OffsetStrategy, PipelineConfig, SeparationSchedule};
pub use error::{Result, RouteError};
pub use loader::{load_track, parse_track, TrackSource};
pub use offset::{offset_traces, OffsetTrace, PixelPoint, ViewContext};
pub use pipeline::TrailMap;
pub use refresh::{OffsetRefresher, ViewEvent};
pub use sections::{
    build_sections, parse_definitions, RenderedSection, SectionFailure, SectionRequest, SectionSet, Trip,
    TripRequests,
};
pub use simplify::{decimate, simplify, ReferenceRoute};
pub use slice::{slice, SnappedPoint};
pub use stats::{compute_stats, group_by_year, ParticipantStats, TrailStats, YearGroup};

use serde::{Deserialize, Serialize};

/// Kilometers to statute miles.
pub const MILES_PER_KM: f64 = 0.621371;

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate in decimal degrees.
///
/// # Example
/// ```
/// use trail_sections::GeoPoint;
/// let minehead = GeoPoint::new(51.21, -3.477);
/// assert_eq!(minehead, GeoPoint::from_lng_lat(-3.477, 51.21));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point from latitude and longitude.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Create a point from a (longitude, latitude) pair, the order used by track files.
    pub fn from_lng_lat(longitude: f64, latitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has finite coordinates inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// An ordered sequence of points as parsed from the track source.
///
/// Insertion order is traversal order. Consecutive points may repeat.
pub type RawTrack = Vec<GeoPoint>;

/// Bounding box of a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for empty input.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Smallest bounds containing both `self` and `other`.
    pub fn extend(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lng: self.min_lng.min(other.min_lng),
            max_lng: self.max_lng.max(other.max_lng),
        }
    }

    /// Grow each side by `ratio` of the box's span, for framing a view.
    pub fn pad(&self, ratio: f64) -> Bounds {
        let lat_pad = (self.max_lat - self.min_lat).abs() * ratio;
        let lng_pad = (self.max_lng - self.min_lng).abs() * ratio;
        Bounds {
            min_lat: self.min_lat - lat_pad,
            max_lat: self.max_lat + lat_pad,
            min_lng: self.min_lng - lng_pad,
            max_lng: self.max_lng + lng_pad,
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }
}

/// The portion of the reference route between two snapped endpoints.
///
/// Every point is either a reference route vertex or one of the two
/// projections, in the route's traversal order (or its exact reverse when the
/// section was requested against the stored direction).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlicedPath {
    pub points: Vec<GeoPoint>,
    /// Great-circle length in meters
    pub length_meters: f64,
}

impl SlicedPath {
    pub(crate) fn from_points(points: Vec<GeoPoint>) -> Self {
        let length_meters = geo_utils::polyline_length(&points);
        Self { points, length_meters }
    }

    pub fn length_km(&self) -> f64 {
        self.length_meters / 1000.0
    }

    pub fn length_miles(&self) -> f64 {
        self.length_km() * MILES_PER_KM
    }

    pub fn start(&self) -> Option<&GeoPoint> {
        self.points.first()
    }

    pub fn end(&self) -> Option<&GeoPoint> {
        self.points.last()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points)
    }

    /// The same path walked the other way.
    pub fn reversed(&self) -> SlicedPath {
        let mut points = self.points.clone();
        points.reverse();
        SlicedPath { points, length_meters: self.length_meters }
    }
}

/// A walker with a fixed lateral lane on every section they appear in.
///
/// Rank -1 draws left of the path, 0 on it, +1 right of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub rank: i32,
}

impl Participant {
    pub fn new(name: impl Into<String>, rank: i32) -> Self {
        Self { name: name.into(), rank }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(51.21, -3.477).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_bounds_extend_and_pad() {
        let a = Bounds { min_lat: 50.0, max_lat: 51.0, min_lng: -4.0, max_lng: -3.0 };
        let b = Bounds { min_lat: 50.5, max_lat: 52.0, min_lng: -3.5, max_lng: -2.0 };
        let merged = a.extend(&b);
        assert_eq!(merged, Bounds { min_lat: 50.0, max_lat: 52.0, min_lng: -4.0, max_lng: -2.0 });

        let padded = a.pad(0.25);
        assert!((padded.min_lat - 49.75).abs() < 1e-12);
        assert!((padded.max_lng - -2.75).abs() < 1e-12);
        assert!(padded.contains(&a.center()));
    }

    #[test]
    fn test_sliced_path_units() {
        let path = SlicedPath::from_points(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0)]);
        assert!((path.length_km() - 111.19).abs() < 0.1);
        assert!((path.length_miles() - path.length_km() * MILES_PER_KM).abs() < 1e-9);
        let rev = path.reversed();
        assert_eq!(rev.start(), path.end());
        assert_eq!(rev.length_meters, path.length_meters);
    }
}
