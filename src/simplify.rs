//! # Track Simplification
//!
//! Turns a raw GPS track into the [`ReferenceRoute`] every section is sliced from.
//!
//! ## Algorithm
//! 1. Decimate: keep the first fix, then each fix at least `decimation_meters`
//!    (equirectangular) from the last kept one. The final fix is always kept so
//!    the route is never truncated.
//! 2. Douglas-Peucker simplification at `simplification_meters`, converted to
//!    degrees with the fixed 111,320 m/° factor.
//! 3. Measure the result once and index its segments for snapping.
//!
//! Both passes only ever drop vertices, so the reference route is never longer
//! than the raw track.

use geo::{algorithm::simplify::Simplify, Coord, LineString};
use log::{debug, info};
use rstar::RTree;

use crate::error::{Result, RouteError};
use crate::geo_utils::{approx_distance, haversine_distance, meters_to_degrees};
use crate::slice::{build_segment_index, RouteSegment};
use crate::{Bounds, GeoPoint, MILES_PER_KM};

/// The simplified, canonical polyline of the whole trail.
///
/// Built once per session and read-only afterwards; share it by reference.
#[derive(Debug, Clone)]
pub struct ReferenceRoute {
    points: Vec<GeoPoint>,
    length_meters: f64,
    bounds: Bounds,
    /// Distance along the route to each vertex, in meters
    pub(crate) cumulative: Vec<f64>,
    /// Longitude scale of the local planar frame used for snapping
    pub(crate) lng_scale: f64,
    pub(crate) index: RTree<RouteSegment>,
}

impl ReferenceRoute {
    /// Build a route from already-simplified points.
    ///
    /// Fails with [`RouteError::InsufficientPoints`] below two points.
    pub fn from_points(points: Vec<GeoPoint>) -> Result<Self> {
        if points.len() < 2 {
            return Err(RouteError::InsufficientPoints {
                stage: "simplification",
                remaining: points.len(),
            });
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut along = 0.0;
        cumulative.push(along);
        for pair in points.windows(2) {
            along += haversine_distance(&pair[0], &pair[1]);
            cumulative.push(along);
        }
        let length_meters = along;
        let bounds = crate::geo_utils::compute_bounds(&points);
        let mid_lat = (bounds.min_lat + bounds.max_lat) / 2.0;
        let lng_scale = mid_lat.to_radians().cos().max(1e-6);
        let index = build_segment_index(&points, lng_scale);

        Ok(Self { points, length_meters, bounds, cumulative, lng_scale, index })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total great-circle length in meters, computed once at construction.
    pub fn length_meters(&self) -> f64 {
        self.length_meters
    }

    pub fn length_km(&self) -> f64 {
        self.length_meters / 1000.0
    }

    pub fn length_miles(&self) -> f64 {
        self.length_km() * MILES_PER_KM
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// Drop fixes closer than `min_meters` to the last kept fix.
///
/// Exact repeats of the last kept fix are always dropped. The final fix is
/// kept even when close to its predecessor. Running this on its own output
/// with the same threshold returns the same sequence.
///
/// # Example
/// ```
/// use trail_sections::{decimate, GeoPoint};
///
/// let track = vec![
///     GeoPoint::new(51.0, -3.0),
///     GeoPoint::new(51.00001, -3.0), // ~1m away, dropped
///     GeoPoint::new(51.001, -3.0),
///     GeoPoint::new(51.00101, -3.0), // final fix, kept
/// ];
/// assert_eq!(decimate(&track, 5.0).len(), 3);
/// ```
pub fn decimate(points: &[GeoPoint], min_meters: f64) -> Vec<GeoPoint> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(points.len());
    let mut last = first;
    out.push(last);

    for p in &points[1..] {
        if *p == last {
            continue;
        }
        if approx_distance(&last, p) >= min_meters {
            out.push(*p);
            last = *p;
        }
    }

    if let Some(final_point) = points.last() {
        if *final_point != last {
            out.push(*final_point);
        }
    }

    out
}

/// Build the reference route from a raw track.
///
/// Points with non-finite or out-of-range coordinates are ignored. Fails with
/// [`RouteError::InsufficientPoints`] if fewer than two points survive either pass.
pub fn simplify(
    track: &[GeoPoint],
    decimation_meters: f64,
    simplification_meters: f64,
) -> Result<ReferenceRoute> {
    let valid: Vec<GeoPoint> = track.iter().copied().filter(GeoPoint::is_valid).collect();

    let decimated = decimate(&valid, decimation_meters);
    if decimated.len() < 2 {
        return Err(RouteError::InsufficientPoints {
            stage: "decimation",
            remaining: decimated.len(),
        });
    }
    debug!(
        "[Simplifier] Decimated {} -> {} points at {}m",
        track.len(),
        decimated.len(),
        decimation_meters
    );

    let line: LineString = decimated
        .iter()
        .map(|p| Coord { x: p.longitude, y: p.latitude })
        .collect();
    let tolerance = meters_to_degrees(simplification_meters);
    let simplified = line.simplify(&tolerance);

    let points: Vec<GeoPoint> = simplified
        .0
        .iter()
        .map(|c| GeoPoint::from_lng_lat(c.x, c.y))
        .collect();

    let route = ReferenceRoute::from_points(points)?;
    info!(
        "[Simplifier] Reference route: {} points, {:.1} km ({:.0} mi)",
        route.len(),
        route.length_km(),
        route.length_miles()
    );
    Ok(route)
}
