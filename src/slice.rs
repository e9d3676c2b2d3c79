//! # Snap and Slice
//!
//! Projects arbitrary section endpoints onto the [`ReferenceRoute`] and cuts
//! out the path between them.
//!
//! ## Algorithm
//! 1. Snap each endpoint to the closest point on any route segment (not the
//!    closest vertex), using an R-tree over the segments. Projection happens in
//!    a local planar frame where longitude is scaled by the cosine of the
//!    route's mid latitude.
//! 2. Take the snapped start, every route vertex strictly after it up to the
//!    snapped end, then the snapped end.
//! 3. If that yields fewer than two distinct points (the endpoints coincide or
//!    the section runs against the stored direction), try again with the
//!    endpoints swapped and reverse the result so it still runs start to end.
//!
//! ## Looping routes
//! Where the route doubles back, several segments can be equally close to a
//! query point. The earliest segment in traversal order wins. This is a
//! policy, not a correctness guarantee: a section on the return leg of an
//! out-and-back stretch snaps to the outbound leg.

use log::debug;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::{Result, RouteError};
use crate::geo_utils::haversine_distance;
use crate::simplify::ReferenceRoute;
use crate::{GeoPoint, SlicedPath};

/// Squared planar distance (degrees²) under which two candidates count as tied
const TIE_EPSILON: f64 = 1e-12;

// =============================================================================
// R-tree Indexed Segment for Spatial Queries
// =============================================================================

/// One route segment in the planar snapping frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RouteSegment {
    /// Index of the segment's first vertex
    pub index: usize,
    from: [f64; 2],
    to: [f64; 2],
}

impl RouteSegment {
    /// Clamped projection parameter and squared distance of `query` to this segment.
    fn project(&self, query: &[f64; 2]) -> (f64, f64) {
        let dx = self.to[0] - self.from[0];
        let dy = self.to[1] - self.from[1];
        let len_sq = dx * dx + dy * dy;

        let t = if len_sq > 0.0 {
            (((query[0] - self.from[0]) * dx + (query[1] - self.from[1]) * dy) / len_sq)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };

        let cx = self.from[0] + t * dx;
        let cy = self.from[1] + t * dy;
        let ex = query[0] - cx;
        let ey = query[1] - cy;
        (t, ex * ex + ey * ey)
    }
}

impl RTreeObject for RouteSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.from, self.to)
    }
}

impl PointDistance for RouteSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.project(point).1
    }
}

fn to_planar(point: &GeoPoint, lng_scale: f64) -> [f64; 2] {
    [point.longitude * lng_scale, point.latitude]
}

pub(crate) fn build_segment_index(points: &[GeoPoint], lng_scale: f64) -> RTree<RouteSegment> {
    let segments: Vec<RouteSegment> = points
        .windows(2)
        .enumerate()
        .map(|(index, w)| RouteSegment {
            index,
            from: to_planar(&w[0], lng_scale),
            to: to_planar(&w[1], lng_scale),
        })
        .collect();
    RTree::bulk_load(segments)
}

// =============================================================================
// Snapping
// =============================================================================

/// A query point projected onto the reference route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedPoint {
    /// The projected position, on the route polyline
    pub point: GeoPoint,
    /// Segment the projection lies on (index of its first vertex)
    pub segment: usize,
    /// Position along that segment, 0.0 at its first vertex and 1.0 at its last
    pub fraction: f64,
    /// Distance from the route start to the projection, in meters
    pub distance_along: f64,
}

impl SnappedPoint {
    /// True if `self` lies strictly after `other` in traversal order.
    fn is_after(&self, other: &SnappedPoint) -> bool {
        (self.segment, self.fraction) > (other.segment, other.fraction)
    }
}

impl ReferenceRoute {
    /// Project `query` onto the closest point of the route polyline.
    ///
    /// Ties between equally close segments go to the earliest in traversal order.
    pub fn snap(&self, query: GeoPoint) -> Option<SnappedPoint> {
        let q = to_planar(&query, self.lng_scale);

        let mut candidates = self.index.nearest_neighbor_iter_with_distance_2(&q);
        let (first, best_d2) = candidates.next()?;
        let mut chosen = *first;
        for (segment, d2) in candidates {
            if d2 > best_d2 + TIE_EPSILON {
                break;
            }
            if segment.index < chosen.index {
                chosen = *segment;
            }
        }

        let (t, _) = chosen.project(&q);
        let points = self.points();
        let a = points[chosen.index];
        let b = points[chosen.index + 1];

        // Keep exact vertex coordinates at the segment ends
        let point = if t <= 0.0 {
            a
        } else if t >= 1.0 {
            b
        } else {
            GeoPoint::new(
                a.latitude + t * (b.latitude - a.latitude),
                a.longitude + t * (b.longitude - a.longitude),
            )
        };

        let distance_along = self.cumulative[chosen.index] + haversine_distance(&a, &point);

        Some(SnappedPoint { point, segment: chosen.index, fraction: t, distance_along })
    }

    /// Slice the route between two arbitrary points. See [`slice`].
    pub fn slice(&self, start: GeoPoint, end: GeoPoint) -> Result<SlicedPath> {
        slice(self, start, end)
    }

    /// Route points from `from` to `to` in traversal order, or `None` if that
    /// does not give at least two distinct points.
    fn extract(&self, from: &SnappedPoint, to: &SnappedPoint) -> Option<Vec<GeoPoint>> {
        if from.is_after(to) {
            return None;
        }

        let points = self.points();
        let mut out: Vec<GeoPoint> = Vec::with_capacity(to.segment - from.segment + 2);
        out.push(from.point);
        out.extend_from_slice(&points[from.segment + 1..=to.segment]);
        out.push(to.point);
        out.dedup();

        (out.len() >= 2).then_some(out)
    }
}

// =============================================================================
// Slicing
// =============================================================================

/// Extract the part of `route` between the projections of `start` and `end`.
///
/// The result always runs from the projection of `start` to the projection of
/// `end`; swapping the arguments yields the exact reverse with the same length.
/// Fails with [`RouteError::UnsliceableSection`] when the projections coincide.
///
/// # Example
/// ```
/// use trail_sections::{GeoPoint, ReferenceRoute};
///
/// let route = ReferenceRoute::from_points(vec![
///     GeoPoint::from_lng_lat(0.0, 0.0),
///     GeoPoint::from_lng_lat(0.0, 1.0),
///     GeoPoint::from_lng_lat(0.0, 2.0),
/// ]).unwrap();
///
/// let path = trail_sections::slice::slice(
///     &route,
///     GeoPoint::from_lng_lat(0.0, 0.1),
///     GeoPoint::from_lng_lat(0.0, 1.9),
/// ).unwrap();
/// assert_eq!(path.points.len(), 3);
/// assert_eq!(path.points[1], GeoPoint::from_lng_lat(0.0, 1.0));
/// ```
pub fn slice(route: &ReferenceRoute, start: GeoPoint, end: GeoPoint) -> Result<SlicedPath> {
    let unsliceable = || {
        RouteError::UnsliceableSection(format!(
            "({:.5}, {:.5}) to ({:.5}, {:.5})",
            start.latitude, start.longitude, end.latitude, end.longitude
        ))
    };

    let a = route.snap(start).ok_or_else(unsliceable)?;
    let b = route.snap(end).ok_or_else(unsliceable)?;

    if let Some(points) = route.extract(&a, &b) {
        return Ok(SlicedPath::from_points(points));
    }

    // Against the stored direction: slice forwards, then flip
    if let Some(points) = route.extract(&b, &a) {
        debug!(
            "[Slicer] Section runs against route order ({:.0}m -> {:.0}m), reversing",
            a.distance_along, b.distance_along
        );
        return Ok(SlicedPath::from_points(points).reversed());
    }

    Err(unsliceable())
}
