//! Track loading.
//!
//! Reads a stitched, continuous track and flattens it into a [`RawTrack`].
//! Two encodings are accepted and detected from content:
//!
//! - GPX: every `<trkpt>` of every track and segment, in document order
//! - JSON: an array of `[lng, lat]` pairs, or a GeoJSON `LineString`
//!   (bare geometry or wrapped in a `Feature`)
//!
//! Individual points with missing, non-finite or out-of-range coordinates are
//! dropped. The track as a whole is rejected only when fewer than two points
//! survive.

use std::path::PathBuf;

use log::{debug, info};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::Value;

use crate::error::{Result, RouteError};
use crate::{GeoPoint, RawTrack};

/// Where a track is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    Path(PathBuf),
    Url(String),
}

impl TrackSource {
    /// Human-readable identifier used in errors and logs.
    pub fn id(&self) -> String {
        match self {
            TrackSource::Path(path) => path.display().to_string(),
            TrackSource::Url(url) => url.clone(),
        }
    }
}

impl From<&str> for TrackSource {
    fn from(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            TrackSource::Url(s.to_string())
        } else {
            TrackSource::Path(PathBuf::from(s))
        }
    }
}

/// Fetch and parse a track.
///
/// Suspends only on the read itself. There is no retry: a failed read is
/// terminal for the session.
pub async fn load_track(source: &TrackSource) -> Result<RawTrack> {
    let bytes = read_source(source).await?;
    debug!("[TrackLoader] Read {} bytes from {}", bytes.len(), source.id());
    let track = parse_track(&bytes)?;
    info!("[TrackLoader] Loaded {} points from {}", track.len(), source.id());
    Ok(track)
}

async fn read_source(source: &TrackSource) -> Result<Vec<u8>> {
    match source {
        TrackSource::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|e| RouteError::source_unavailable(source.id(), e)),
        TrackSource::Url(url) => fetch_url(url).await,
    }
}

#[cfg(feature = "http")]
async fn fetch_url(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| RouteError::source_unavailable(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RouteError::source_unavailable(url, format!("HTTP {}", status)));
    }

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| RouteError::source_unavailable(url, e))
}

#[cfg(not(feature = "http"))]
async fn fetch_url(url: &str) -> Result<Vec<u8>> {
    Err(RouteError::source_unavailable(
        url,
        "URL sources require the `http` feature",
    ))
}

/// Parse track bytes into a flat point sequence.
///
/// # Example
/// ```
/// use trail_sections::parse_track;
///
/// let track = parse_track(b"[[-3.477, 51.21], [-3.480, 51.211], null]").unwrap();
/// assert_eq!(track.len(), 2);
/// assert_eq!(track[0].latitude, 51.21);
/// ```
pub fn parse_track(data: &[u8]) -> Result<RawTrack> {
    let first = data.iter().find(|b| !b.is_ascii_whitespace()).copied();
    let points = match first {
        Some(b'[') | Some(b'{') => parse_json(data)?,
        Some(_) => parse_gpx(data)?,
        None => return Err(RouteError::MalformedTrack("track source is empty".to_string())),
    };

    if points.len() < 2 {
        return Err(RouteError::MalformedTrack(format!(
            "track has too few points ({} usable, need at least 2)",
            points.len()
        )));
    }
    Ok(points)
}

fn parse_gpx(data: &[u8]) -> Result<Vec<GeoPoint>> {
    let gpx = match gpx::read(data) {
        Ok(gpx) => gpx,
        Err(e) => {
            // Usually a single bad coordinate; salvage the rest point by point
            debug!("[TrackLoader] Strict GPX read failed ({}), scanning trkpts", e);
            return scan_trkpts(data);
        }
    };

    let mut total = 0usize;
    let points: Vec<GeoPoint> = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .map(|waypoint| {
            total += 1;
            let p = waypoint.point();
            GeoPoint::from_lng_lat(p.x(), p.y())
        })
        .filter(GeoPoint::is_valid)
        .collect();

    if points.len() < total {
        debug!("[TrackLoader] Dropped {} invalid GPX points", total - points.len());
    }
    Ok(points)
}

/// Read `lat`/`lon` off every `<trkpt>` in document order, skipping points
/// whose attributes are missing, unparsable or out of range.
fn scan_trkpts(data: &[u8]) -> Result<Vec<GeoPoint>> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut points = Vec::new();
    let mut total = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"trkpt" => {
                total += 1;
                let mut lat = None;
                let mut lon = None;
                for attr in e.attributes().flatten() {
                    let value = std::str::from_utf8(&attr.value)
                        .ok()
                        .and_then(|v| v.trim().parse::<f64>().ok());
                    match attr.key.local_name().as_ref() {
                        b"lat" => lat = value,
                        b"lon" => lon = value,
                        _ => {}
                    }
                }
                if let (Some(lat), Some(lon)) = (lat, lon) {
                    let point = GeoPoint::new(lat, lon);
                    if point.is_valid() {
                        points.push(point);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(RouteError::MalformedTrack(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if points.len() < total {
        debug!("[TrackLoader] Dropped {} invalid GPX points", total - points.len());
    }
    Ok(points)
}

fn parse_json(data: &[u8]) -> Result<Vec<GeoPoint>> {
    let value: Value =
        serde_json::from_slice(data).map_err(|e| RouteError::MalformedTrack(e.to_string()))?;

    let coords = match &value {
        Value::Array(items) => items,
        Value::Object(obj) => {
            let geometry = obj.get("geometry").unwrap_or(&value);
            match geometry.get("coordinates") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(RouteError::MalformedTrack(
                        "JSON track has no coordinate array".to_string(),
                    ))
                }
            }
        }
        _ => {
            return Err(RouteError::MalformedTrack(
                "JSON track must be an array or a GeoJSON line".to_string(),
            ))
        }
    };

    let points: Vec<GeoPoint> = coords.iter().filter_map(json_coordinate).collect();
    if points.len() < coords.len() {
        debug!("[TrackLoader] Dropped {} invalid JSON points", coords.len() - points.len());
    }
    Ok(points)
}

/// A `[lng, lat, ...]` entry; anything else (null, strings, short arrays) is skipped.
fn json_coordinate(entry: &Value) -> Option<GeoPoint> {
    let pair = entry.as_array()?;
    let lng = pair.first()?.as_f64()?;
    let lat = pair.get(1)?.as_f64()?;
    let point = GeoPoint::from_lng_lat(lng, lat);
    point.is_valid().then_some(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>South West Coast Path</name>
    <trkseg>
      <trkpt lat="51.2100" lon="-3.4770"></trkpt>
      <trkpt lat="51.2110" lon="-3.4800"></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="51.2120" lon="-3.4830"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("trail-sections-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_gpx_concatenates_segments() {
        let track = parse_track(GPX.as_bytes()).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track[0], GeoPoint::new(51.2100, -3.4770));
        assert_eq!(track[2], GeoPoint::new(51.2120, -3.4830));
    }

    fn gpx_with(points: &[(&str, &str)]) -> String {
        let trkpts: String = points
            .iter()
            .map(|(lat, lon)| format!("      <trkpt lat=\"{}\" lon=\"{}\"><ele>12</ele></trkpt>\n", lat, lon))
            .collect();
        format!(
            "<?xml version=\"1.0\"?>\n<gpx version=\"1.1\" creator=\"test\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n  <trk>\n    <trkseg>\n{}    </trkseg>\n  </trk>\n</gpx>",
            trkpts
        )
    }

    #[test]
    fn test_parse_gpx_drops_bad_trkpts() {
        for bad in ["abc", "NaN", "95.0", ""] {
            let gpx = gpx_with(&[
                ("51.2100", "-3.4770"),
                (bad, "-3.4800"),
                ("51.2120", "-3.4830"),
                ("51.2130", "-3.4860"),
            ]);
            let track = parse_track(gpx.as_bytes()).unwrap();
            assert_eq!(track.len(), 3, "bad lat {:?}", bad);
            assert_eq!(track[0], GeoPoint::new(51.2100, -3.4770));
            assert_eq!(track[1], GeoPoint::new(51.2120, -3.4830));
        }
    }

    #[test]
    fn test_parse_gpx_bad_trkpts_below_minimum_is_malformed() {
        let gpx = gpx_with(&[("51.2100", "-3.4770"), ("abc", "-3.4800"), ("51.2", "inf")]);
        assert!(matches!(parse_track(gpx.as_bytes()), Err(RouteError::MalformedTrack(_))));
    }

    #[test]
    fn test_parse_json_drops_bad_points() {
        let json = br#"[[-3.477, 51.21], null, ["x", 1.0], [-3.48], [-3.48, 51.211], [500.0, 0.0]]"#;
        let track = parse_track(json).unwrap();
        assert_eq!(track, vec![GeoPoint::new(51.21, -3.477), GeoPoint::new(51.211, -3.48)]);
    }

    #[test]
    fn test_parse_geojson_feature() {
        let json = br#"{"type":"Feature","properties":{},"geometry":{"type":"LineString","coordinates":[[0,0],[0,1],[0,2]]}}"#;
        let track = parse_track(json).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track[1], GeoPoint::new(1.0, 0.0));
    }

    #[test]
    fn test_single_point_is_malformed() {
        let err = parse_track(b"[[-3.477, 51.21]]").unwrap_err();
        assert!(matches!(err, RouteError::MalformedTrack(_)));
    }

    #[test]
    fn test_bad_points_below_minimum_is_malformed() {
        let err = parse_track(b"[[-3.477, 51.21], null, [\"a\", \"b\"]]").unwrap_err();
        assert!(matches!(err, RouteError::MalformedTrack(_)));
    }

    #[test]
    fn test_empty_and_garbage_are_malformed() {
        assert!(matches!(parse_track(b"   "), Err(RouteError::MalformedTrack(_))));
        assert!(matches!(parse_track(b"<not-gpx>"), Err(RouteError::MalformedTrack(_))));
        assert!(matches!(parse_track(b"42"), Err(RouteError::MalformedTrack(_))));
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!(TrackSource::from("https://example.org/route.gpx"), TrackSource::Url("https://example.org/route.gpx".into()));
        assert_eq!(TrackSource::from("route.gpx"), TrackSource::Path(PathBuf::from("route.gpx")));
    }

    #[tokio::test]
    async fn test_load_track_from_file() {
        let path = temp_file("route.gpx", GPX.as_bytes());
        let track = load_track(&TrackSource::Path(path.clone())).await.unwrap();
        assert_eq!(track.len(), 3);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let source = TrackSource::from("/definitely/not/here/route.gpx");
        let err = load_track(&source).await.unwrap_err();
        assert!(matches!(err, RouteError::SourceUnavailable { .. }));
    }

    #[cfg(not(feature = "http"))]
    #[tokio::test]
    async fn test_url_without_http_feature_is_source_unavailable() {
        let source = TrackSource::from("https://example.org/route.gpx");
        let err = load_track(&source).await.unwrap_err();
        assert!(matches!(err, RouteError::SourceUnavailable { .. }));
    }
}
