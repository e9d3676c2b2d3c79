//! # Section Builder
//!
//! Turns static section definitions into rendered sections: one sliced path per
//! section and one offset trace per participant who walked it.
//!
//! ## Definitions format
//!
//! A JSON array whose entries are either trips or bare section records:
//!
//! ```json
//! [
//!   { "name": "Exmoor 2023", "sections": [
//!     { "start": "Minehead", "end": "Porlock Weir", "direction": "S",
//!       "startCoords": [51.21, -3.477], "endCoords": [51.2178, -3.6266],
//!       "charlie": true, "olly": true, "dad": false,
//!       "date": "2023-05-27", "videoLink": "https://...", "fixEnd": false }
//!   ]}
//! ]
//! ```
//!
//! Coordinates are `[lat, lng]`. Any field named after a roster participant is
//! a walked flag. Records nobody walked are dropped before any geometry work.
//! Consecutive bare records are collected into an unnamed trip.

use std::collections::HashMap;

use log::{debug, info, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{OffsetStrategy, PipelineConfig};
use crate::error::{Result, RouteError};
use crate::offset::{offset_traces, OffsetTrace, ViewContext};
use crate::simplify::ReferenceRoute;
use crate::{Bounds, GeoPoint, Participant, SlicedPath};

// =============================================================================
// Definitions
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DefinitionEntry {
    Trip(TripRecord),
    Section(SectionRecord),
}

#[derive(Debug, Deserialize)]
struct TripRecord {
    name: String,
    sections: Vec<SectionRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionRecord {
    start: String,
    end: String,
    start_coords: [f64; 2],
    end_coords: [f64; 2],
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    video_link: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    fix_end: bool,
    #[serde(flatten)]
    flags: HashMap<String, Value>,
}

/// A walked section of the trail, as defined externally. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionRequest {
    pub id: String,
    pub trip: String,
    pub start_name: String,
    pub end_name: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// Direction hint from the definitions ("N", "S", ...), informational only
    pub direction: Option<String>,
    /// Who walked it, in roster order
    pub participants: Vec<Participant>,
    pub date: Option<String>,
    pub year: Option<i32>,
    pub video_link: Option<String>,
    /// Whether the end point gets its own marker
    pub fix_end: bool,
}

impl SectionRequest {
    pub fn has_video(&self) -> bool {
        self.video_link.is_some()
    }

    pub fn walked_by(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p.name == name)
    }
}

/// A trip and the walked sections it contains, in definition order.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRequests {
    pub name: String,
    pub sections: Vec<SectionRequest>,
}

/// Lowercase, collapse runs of anything but `[a-z0-9]` into `-`, trim dashes.
fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut dash = false;
    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if dash && !out.is_empty() {
                out.push('-');
            }
            dash = false;
            out.push(c);
        } else {
            dash = true;
        }
    }
    out
}

/// Stable identifier for a section: `{start}_to_{end}_{date}`.
///
/// ```
/// use trail_sections::sections::section_id;
/// assert_eq!(section_id("Porlock Weir", "Lynmouth", Some("2023-05-28")), "porlock-weir_to_lynmouth_2023-05-28");
/// assert_eq!(section_id("Coombe Martin", "Mortehoe", None), "coombe-martin_to_mortehoe_nodate");
/// ```
pub fn section_id(start: &str, end: &str, date: Option<&str>) -> String {
    format!("{}_to_{}_{}", slug(start), slug(end), date.unwrap_or("nodate"))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn year_of(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

impl SectionRecord {
    /// `None` if nobody on the roster walked it.
    fn into_request(self, trip: &str, roster: &[Participant]) -> Option<SectionRequest> {
        let participants: Vec<Participant> = roster
            .iter()
            .filter(|p| self.flags.get(&p.name).is_some_and(is_truthy))
            .cloned()
            .collect();

        if participants.is_empty() {
            debug!("[SectionBuilder] Skipping {} -> {}: nobody walked it", self.start, self.end);
            return None;
        }

        let date = non_empty(self.date);
        Some(SectionRequest {
            id: section_id(&self.start, &self.end, date.as_deref()),
            trip: trip.to_string(),
            start: GeoPoint::new(self.start_coords[0], self.start_coords[1]),
            end: GeoPoint::new(self.end_coords[0], self.end_coords[1]),
            start_name: self.start,
            end_name: self.end,
            direction: non_empty(self.direction),
            participants,
            year: year_of(date.as_deref()),
            date,
            video_link: non_empty(self.video_link),
            fix_end: self.fix_end,
        })
    }
}

/// Parse section definitions, keeping only sections someone walked.
pub fn parse_definitions(json: &str, roster: &[Participant]) -> Result<Vec<TripRequests>> {
    let entries: Vec<DefinitionEntry> =
        serde_json::from_str(json).map_err(|e| RouteError::InvalidSectionData(e.to_string()))?;

    let mut trips: Vec<TripRequests> = Vec::new();
    let mut loose: Option<TripRequests> = None;

    for entry in entries {
        match entry {
            DefinitionEntry::Trip(trip) => {
                trips.extend(loose.take());
                let sections = trip
                    .sections
                    .into_iter()
                    .filter_map(|r| r.into_request(&trip.name, roster))
                    .collect();
                trips.push(TripRequests { name: trip.name, sections });
            }
            DefinitionEntry::Section(record) => {
                let bucket = loose.get_or_insert_with(|| TripRequests {
                    name: String::new(),
                    sections: Vec::new(),
                });
                bucket.sections.extend(record.into_request("", roster));
            }
        }
    }
    trips.extend(loose);

    Ok(trips)
}

// =============================================================================
// Building
// =============================================================================

/// A section with its geometry, ready to draw.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedSection {
    pub request: SectionRequest,
    pub path: SlicedPath,
    pub bounds: Bounds,
    /// Current per-participant traces; replaced on every refresh
    pub traces: Vec<OffsetTrace>,
}

impl RenderedSection {
    pub fn id(&self) -> &str {
        &self.request.id
    }

    pub fn miles(&self) -> f64 {
        self.path.length_miles()
    }
}

/// A trip with at least one rendered section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trip {
    pub name: String,
    /// Year of the first dated section
    pub year: Option<i32>,
    pub section_ids: Vec<String>,
}

/// A section that could not be sliced. Reported, never drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionFailure {
    pub id: String,
    pub reason: String,
}

/// Every rendered section keyed by id, plus the trips they belong to.
#[derive(Debug, Clone, Default)]
pub struct SectionSet {
    sections: Vec<RenderedSection>,
    by_id: HashMap<String, usize>,
    pub trips: Vec<Trip>,
    pub failed: Vec<SectionFailure>,
}

impl SectionSet {
    pub fn get(&self, id: &str) -> Option<&RenderedSection> {
        self.by_id.get(id).map(|&i| &self.sections[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderedSection> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Union of all section bounds, for framing the initial view.
    pub fn bounds(&self) -> Option<Bounds> {
        self.sections
            .iter()
            .map(|s| s.bounds)
            .reduce(|acc, b| acc.extend(&b))
    }

    /// Bounds to fit when a single section is focused.
    pub fn focus_bounds(&self, id: &str, padding: f64) -> Option<Bounds> {
        self.get(id).map(|s| s.bounds.pad(padding))
    }

    /// Recompute every section's offset traces for a new view.
    pub fn refresh_offsets(&mut self, strategy: &OffsetStrategy, view: &ViewContext) {
        for section in &mut self.sections {
            section.traces = offset_traces(&section.path, &section.request.participants, strategy, view);
        }
    }

    /// Insert a section, suffixing its id if an earlier one already took it.
    fn push(&mut self, mut section: RenderedSection) -> String {
        if self.by_id.contains_key(&section.request.id) {
            let base = section.request.id.clone();
            let mut n = 2;
            while self.by_id.contains_key(&format!("{}-{}", base, n)) {
                n += 1;
            }
            section.request.id = format!("{}-{}", base, n);
            warn!("[SectionBuilder] Duplicate section id {}, using {}", base, section.request.id);
        }
        let id = section.request.id.clone();
        self.by_id.insert(id.clone(), self.sections.len());
        self.sections.push(section);
        id
    }
}

fn slice_all(requests: &[&SectionRequest], route: &ReferenceRoute) -> Vec<Result<SlicedPath>> {
    #[cfg(feature = "parallel")]
    let paths = requests
        .par_iter()
        .map(|r| route.slice(r.start, r.end))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let paths = requests
        .iter()
        .map(|r| route.slice(r.start, r.end))
        .collect();

    paths
}

/// Slice every walked section against the route and compute initial traces.
///
/// Sections that cannot be sliced are logged and listed in
/// [`SectionSet::failed`]; they never abort the build.
pub fn build_sections(
    trips: &[TripRequests],
    route: &ReferenceRoute,
    config: &PipelineConfig,
    view: &ViewContext,
) -> SectionSet {
    let requests: Vec<&SectionRequest> = trips.iter().flat_map(|t| t.sections.iter()).collect();
    let paths = slice_all(&requests, route);

    let mut set = SectionSet::default();
    let mut ids_by_trip: Vec<Vec<String>> = vec![Vec::new(); trips.len()];
    let mut cursor = 0;

    for (trip_index, trip) in trips.iter().enumerate() {
        for request in &trip.sections {
            let result = &paths[cursor];
            cursor += 1;

            let path = match result {
                Ok(path) => path.clone(),
                Err(e) => {
                    warn!("[SectionBuilder] {} excluded from map: {}", request.id, e);
                    set.failed.push(SectionFailure { id: request.id.clone(), reason: e.to_string() });
                    continue;
                }
            };

            let Some(bounds) = path.bounds() else {
                continue;
            };
            let traces = offset_traces(&path, &request.participants, &config.offset, view);
            let id = set.push(RenderedSection { request: request.clone(), path, bounds, traces });
            ids_by_trip[trip_index].push(id);
        }
    }

    for (trip, section_ids) in trips.iter().zip(ids_by_trip) {
        if section_ids.is_empty() {
            continue;
        }
        let year = section_ids
            .iter()
            .filter_map(|id| set.get(id))
            .find_map(|s| s.request.year);
        set.trips.push(Trip { name: trip.name.clone(), year, section_ids });
    }

    info!(
        "[SectionBuilder] Built {} sections in {} trips ({} failed)",
        set.len(),
        set.trips.len(),
        set.failed.len()
    );
    set
}
