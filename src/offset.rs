//! # Parallel Offset Traces
//!
//! Draws one copy of a sliced path per participant, shifted sideways by the
//! participant's lane so traces on a shared section never sit on top of each
//! other.
//!
//! ## Strategies
//! - **Screen** (default): shift by a fixed number of pixels in the current
//!   view's Web Mercator pixel space, then project back. Constant on screen at
//!   any zoom, so it must be recomputed whenever the view changes.
//! - **Geographic**: shift by a fixed number of meters using the local
//!   meters-per-degree at each vertex. Independent of the view.
//!
//! ## Tangents
//! The direction at vertex `i` runs from vertex `i-1` to vertex `i+1`, clamped
//! to the single adjacent segment at the ends. A positive offset moves the
//! trace to the right of the direction of travel in both strategies.

use std::f64::consts::PI;

use serde::Serialize;

use crate::config::OffsetStrategy;
use crate::geo_utils::meters_per_degree;
use crate::{GeoPoint, Participant, SlicedPath};

/// Offsets smaller than this many pixels leave the path untouched.
pub const MIN_PIXEL_OFFSET: f64 = 0.5;

/// Web Mercator latitude limit.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// A point in the view's pixel coordinate system (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &PixelPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// The projection parameters of the current map view.
///
/// `origin` is the world-pixel position of the view's top-left corner; it
/// changes on pan, `zoom` changes on zoom. Offsets only depend on the zoom,
/// but pixel coordinates handed to the renderer are relative to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewContext {
    pub zoom: f64,
    pub origin: PixelPoint,
    pub tile_size: f64,
}

impl ViewContext {
    pub fn new(zoom: f64, origin: PixelPoint) -> Self {
        Self { zoom, origin, tile_size: 256.0 }
    }

    /// World size in pixels at this zoom.
    fn world_size(&self) -> f64 {
        self.tile_size * 2f64.powf(self.zoom)
    }

    /// Geographic point to view pixels.
    pub fn project(&self, point: &GeoPoint) -> PixelPoint {
        let scale = self.world_size();
        let lat = point.latitude.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        let sin_lat = lat.to_radians().sin();

        let x = (point.longitude + 180.0) / 360.0 * scale;
        let y = (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI)) * scale;
        PixelPoint::new(x - self.origin.x, y - self.origin.y)
    }

    /// View pixels back to a geographic point.
    pub fn unproject(&self, pixel: &PixelPoint) -> GeoPoint {
        let scale = self.world_size();
        let x = pixel.x + self.origin.x;
        let y = pixel.y + self.origin.y;

        let longitude = x / scale * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * y / scale);
        let latitude = n.sinh().atan().to_degrees();
        GeoPoint::new(latitude, longitude)
    }
}

/// One participant's laterally displaced copy of a section path.
///
/// Transient: rebuilt whenever the view changes and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetTrace {
    pub participant: String,
    pub rank: i32,
    /// Signed displacement applied, in pixels or meters depending on strategy
    pub offset: f64,
    pub points: Vec<GeoPoint>,
}

/// Direction of travel at vertex `i`, from `i-1` to `i+1`.
///
/// Clamped to the adjacent segment at the ends. When the neighbours coincide
/// (the path doubles back), falls back to the incoming then the outgoing segment.
fn tangent(points: &[[f64; 2]], i: usize) -> [f64; 2] {
    let last = points.len() - 1;
    let prev = i.saturating_sub(1);
    let next = (i + 1).min(last);

    let candidates = [(prev, next), (prev, i), (i, next)];
    for (from, to) in candidates {
        let v = [points[to][0] - points[from][0], points[to][1] - points[from][1]];
        if v[0] != 0.0 || v[1] != 0.0 {
            return v;
        }
    }
    [0.0, 0.0]
}

fn unit(v: [f64; 2]) -> [f64; 2] {
    let norm = v[0].hypot(v[1]);
    if norm > 0.0 {
        [v[0] / norm, v[1] / norm]
    } else {
        [0.0, 0.0]
    }
}

/// Shift `points` by `pixels` perpendicular to the path in the view's pixel space.
pub fn offset_screen(points: &[GeoPoint], pixels: f64, view: &ViewContext) -> Vec<GeoPoint> {
    if pixels.abs() < MIN_PIXEL_OFFSET || points.len() < 2 {
        return points.to_vec();
    }

    let projected: Vec<[f64; 2]> = points
        .iter()
        .map(|p| {
            let px = view.project(p);
            [px.x, px.y]
        })
        .collect();

    (0..projected.len())
        .map(|i| {
            let v = tangent(&projected, i);
            // y points down, so (-vy, vx) is the right-hand side of travel
            let n = unit([-v[1], v[0]]);
            let shifted = PixelPoint::new(
                projected[i][0] + n[0] * pixels,
                projected[i][1] + n[1] * pixels,
            );
            view.unproject(&shifted)
        })
        .collect()
}

/// Shift `points` by `meters` perpendicular to the path, in degrees.
pub fn offset_geographic(points: &[GeoPoint], meters: f64) -> Vec<GeoPoint> {
    if meters == 0.0 || points.len() < 2 {
        return points.to_vec();
    }

    let planar: Vec<[f64; 2]> = points.iter().map(|p| [p.longitude, p.latitude]).collect();

    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let (m_lat, m_lng) = meters_per_degree(p.latitude);
            let v = tangent(&planar, i);
            let v_m = [v[0] * m_lng, v[1] * m_lat];
            // y points north, so (vy, -vx) is the right-hand side of travel
            let n = unit([v_m[1], -v_m[0]]);
            GeoPoint::new(
                p.latitude + n[1] * meters / m_lat,
                p.longitude + n[0] * meters / m_lng,
            )
        })
        .collect()
}

/// One trace per participant for a section, laid out by lane rank.
///
/// Screen strategy: each lane is `rank × separation(zoom)` pixels out.
/// Geographic strategy: each lane is `rank × separation_meters` out and the
/// view is ignored.
pub fn offset_traces(
    path: &SlicedPath,
    participants: &[Participant],
    strategy: &OffsetStrategy,
    view: &ViewContext,
) -> Vec<OffsetTrace> {
    participants
        .iter()
        .map(|participant| {
            let (offset, points) = match strategy {
                OffsetStrategy::Screen { schedule } => {
                    let px = f64::from(participant.rank) * schedule.pixels_at(view.zoom);
                    (px, offset_screen(&path.points, px, view))
                }
                OffsetStrategy::Geographic { separation_meters } => {
                    let m = f64::from(participant.rank) * separation_meters;
                    (m, offset_geographic(&path.points, m))
                }
            };
            OffsetTrace {
                participant: participant.name.clone(),
                rank: participant.rank,
                offset,
                points,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeparationSchedule;
    use crate::geo_utils::haversine_distance;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn roster() -> Vec<Participant> {
        vec![
            Participant::new("charlie", -1),
            Participant::new("olly", 0),
            Participant::new("dad", 1),
        ]
    }

    /// Lynmouth towards Combe Martin, with a bend.
    fn coastal_path() -> SlicedPath {
        SlicedPath::from_points(vec![
            GeoPoint::new(51.2296, -3.8292),
            GeoPoint::new(51.2260, -3.8800),
            GeoPoint::new(51.2150, -3.9400),
            GeoPoint::new(51.1995, -4.0243),
        ])
    }

    #[test]
    fn test_projection_round_trip() {
        let view = ViewContext::new(11.0, PixelPoint::new(250_000.0, 170_000.0));
        let p = GeoPoint::new(51.2296, -3.8292);
        let back = view.unproject(&view.project(&p));
        assert!(approx_eq(back.latitude, p.latitude, 1e-9));
        assert!(approx_eq(back.longitude, p.longitude, 1e-9));
    }

    #[test]
    fn test_projection_origin_and_scale() {
        let view = ViewContext::new(0.0, PixelPoint::new(0.0, 0.0));
        let center = view.project(&GeoPoint::new(0.0, 0.0));
        assert!(approx_eq(center.x, 128.0, 1e-9));
        assert!(approx_eq(center.y, 128.0, 1e-9));

        let panned = ViewContext::new(0.0, PixelPoint::new(28.0, 100.0));
        let moved = panned.project(&GeoPoint::new(0.0, 0.0));
        assert!(approx_eq(moved.x, 100.0, 1e-9));
        assert!(approx_eq(moved.y, 28.0, 1e-9));
    }

    #[test]
    fn test_screen_offset_constant_in_pixels_across_zooms() {
        let path = coastal_path();
        for zoom in [6.0, 9.0, 12.0, 15.0] {
            let view = ViewContext::new(zoom, PixelPoint::new(0.0, 0.0));
            let shifted = offset_screen(&path.points, 6.0, &view);
            for (orig, moved) in path.points.iter().zip(&shifted) {
                let d = view.project(orig).distance(&view.project(moved));
                assert!(approx_eq(d, 6.0, 1e-6), "zoom {}: moved {}px", zoom, d);
            }
        }
    }

    #[test]
    fn test_screen_offset_positive_is_right_of_travel() {
        // Heading due east: right-hand side is south
        let points = vec![GeoPoint::new(50.0, -3.0), GeoPoint::new(50.0, -2.9)];
        let view = ViewContext::new(10.0, PixelPoint::new(0.0, 0.0));
        let shifted = offset_screen(&points, 8.0, &view);
        assert!(shifted.iter().all(|p| p.latitude < 50.0));
        let shifted = offset_screen(&points, -8.0, &view);
        assert!(shifted.iter().all(|p| p.latitude > 50.0));
    }

    #[test]
    fn test_small_offset_is_identity() {
        let path = coastal_path();
        let view = ViewContext::new(10.0, PixelPoint::new(0.0, 0.0));
        assert_eq!(offset_screen(&path.points, 0.3, &view), path.points);
        assert_eq!(offset_geographic(&path.points, 0.0), path.points);
    }

    #[test]
    fn test_geographic_offset_is_meters() {
        let path = coastal_path();
        let shifted = offset_geographic(&path.points, 15.0);
        for (orig, moved) in path.points.iter().zip(&shifted) {
            let d = haversine_distance(orig, moved);
            assert!(approx_eq(d, 15.0, 0.2), "moved {}m", d);
        }

        // Heading due north: right-hand side is east
        let north = vec![GeoPoint::new(50.0, -3.0), GeoPoint::new(50.1, -3.0)];
        let shifted = offset_geographic(&north, 10.0);
        assert!(shifted.iter().all(|p| p.longitude > -3.0));
    }

    #[test]
    fn test_doubling_back_vertex_still_moves() {
        let points = vec![
            GeoPoint::new(50.0, -3.0),
            GeoPoint::new(50.0, -2.9),
            GeoPoint::new(50.0, -3.0),
        ];
        let view = ViewContext::new(10.0, PixelPoint::new(0.0, 0.0));
        let shifted = offset_screen(&points, 8.0, &view);
        let d = view.project(&points[1]).distance(&view.project(&shifted[1]));
        assert!(approx_eq(d, 8.0, 1e-6));
    }

    #[test]
    fn test_distinct_ranks_never_share_a_screen_point() {
        let path = coastal_path();
        let strategy = OffsetStrategy::Screen { schedule: SeparationSchedule::default() };
        for zoom in [5.0, 8.0, 11.0, 14.0] {
            let view = ViewContext::new(zoom, PixelPoint::new(0.0, 0.0));
            let traces = offset_traces(&path, &roster(), &strategy, &view);
            assert_eq!(traces.len(), 3);
            let separation = SeparationSchedule::default().pixels_at(zoom);

            for a in 0..traces.len() {
                for b in (a + 1)..traces.len() {
                    let lanes = f64::from((traces[a].rank - traces[b].rank).abs());
                    for (pa, pb) in traces[a].points.iter().zip(&traces[b].points) {
                        let d = view.project(pa).distance(&view.project(pb));
                        assert!(approx_eq(d, lanes * separation, 1e-6));
                    }
                }
            }
        }
    }

    #[test]
    fn test_traces_carry_rank_and_offset() {
        let path = coastal_path();
        let view = ViewContext::new(12.0, PixelPoint::new(0.0, 0.0));
        let strategy = OffsetStrategy::default();
        let traces = offset_traces(&path, &roster(), &strategy, &view);

        assert_eq!(traces[0].participant, "charlie");
        assert_eq!(traces[0].offset, -8.0);
        assert_eq!(traces[1].offset, 0.0);
        assert_eq!(traces[1].points, path.points);
        assert_eq!(traces[2].offset, 8.0);
    }

    #[test]
    fn test_geographic_ranks_never_share_a_point() {
        let path = coastal_path();
        let strategy = OffsetStrategy::Geographic { separation_meters: 15.0 };
        let view = ViewContext::new(10.0, PixelPoint::new(0.0, 0.0));
        let traces = offset_traces(&path, &roster(), &strategy, &view);
        assert_eq!(traces.len(), 3);

        for a in 0..traces.len() {
            for b in (a + 1)..traces.len() {
                let lanes = f64::from((traces[a].rank - traces[b].rank).abs());
                for (pa, pb) in traces[a].points.iter().zip(&traces[b].points) {
                    let d = haversine_distance(pa, pb);
                    assert!(d > 0.0);
                    assert!(approx_eq(d, lanes * 15.0, 0.5), "ranks {} / {}: {}m apart", traces[a].rank, traces[b].rank, d);
                    let px = view.project(pa).distance(&view.project(pb));
                    assert!(px > 0.0);
                }
            }
        }
    }

    #[test]
    fn test_geographic_traces_ignore_view() {
        let path = coastal_path();
        let strategy = OffsetStrategy::Geographic { separation_meters: 15.0 };
        let near = offset_traces(&path, &roster(), &strategy, &ViewContext::new(15.0, PixelPoint::new(0.0, 0.0)));
        let far = offset_traces(&path, &roster(), &strategy, &ViewContext::new(5.0, PixelPoint::new(9.0, 9.0)));
        assert_eq!(near, far);
    }
}
