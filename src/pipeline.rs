//! End-to-end wiring: load the track, build the route, slice every section,
//! and keep offsets current as the view changes.
//!
//! The route is built once and never mutated. Only the per-section offset
//! traces change after loading, through the debounced refresher.

use log::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::loader::{load_track, TrackSource};
use crate::offset::ViewContext;
use crate::refresh::{OffsetRefresher, ViewEvent};
use crate::sections::{build_sections, parse_definitions, SectionSet};
use crate::simplify::{simplify, ReferenceRoute};
use crate::stats::{compute_stats, TrailStats};
use crate::{Bounds, GeoPoint};

/// A loaded trail: reference route, rendered sections and refresh state.
#[derive(Debug)]
pub struct TrailMap {
    pub config: PipelineConfig,
    route: ReferenceRoute,
    sections: SectionSet,
    refresher: OffsetRefresher,
}

impl TrailMap {
    /// Load the track and build everything for the initial view.
    ///
    /// Any error here is fatal for the session, except unsliceable sections,
    /// which end up in [`SectionSet::failed`].
    pub async fn load(
        source: &TrackSource,
        definitions_json: &str,
        config: PipelineConfig,
        view: &ViewContext,
    ) -> Result<Self> {
        config.validate()?;
        let trips = parse_definitions(definitions_json, &config.participants)?;
        let raw = load_track(source).await?;
        Self::from_track(&raw, &trips, config, view)
    }

    /// Build from an already-loaded track.
    pub fn from_track(
        raw: &[GeoPoint],
        trips: &[crate::sections::TripRequests],
        config: PipelineConfig,
        view: &ViewContext,
    ) -> Result<Self> {
        config.validate()?;
        let route = simplify(raw, config.decimation_meters, config.simplification_meters)?;
        let sections = build_sections(trips, &route, &config, view);
        info!(
            "[TrailMap] Ready: {:.0} mi route, {} sections",
            route.length_miles(),
            sections.len()
        );
        Ok(Self { config, route, sections, refresher: OffsetRefresher::new() })
    }

    pub fn route(&self) -> &ReferenceRoute {
        &self.route
    }

    pub fn sections(&self) -> &SectionSet {
        &self.sections
    }

    /// Bounds to frame every section, padded for the overview.
    pub fn overview_bounds(&self) -> Option<Bounds> {
        self.sections.bounds().map(|b| b.pad(self.config.overview_padding))
    }

    /// Bounds to frame one section.
    pub fn focus_bounds(&self, id: &str) -> Option<Bounds> {
        self.sections.focus_bounds(id, self.config.focus_padding)
    }

    /// Forward a map event. Returns `true` if the host should request a frame.
    pub fn on_view_event(&mut self, event: ViewEvent) -> bool {
        self.refresher.notify(event)
    }

    /// Animation-frame callback: refresh offsets once with the latest view.
    pub fn on_frame(&mut self) -> Option<ViewContext> {
        self.refresher.run_frame_for(&mut self.sections, &self.config.offset)
    }

    /// Number of offset recomputation passes run so far.
    pub fn refresh_passes(&self) -> u64 {
        self.refresher.passes()
    }

    pub fn stats(&self) -> TrailStats {
        compute_stats(&self.sections, &self.route, &self.config.participants)
    }
}
