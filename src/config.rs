//! Pipeline configuration.
//!
//! Every tunable lives in [`PipelineConfig`]. Defaults match the values the
//! trail map ships with; a JSON file may override any subset of them.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouteError};
use crate::offset::MIN_PIXEL_OFFSET;
use crate::Participant;

/// How lateral offsets between participants are measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OffsetStrategy {
    /// Fixed real-world distance per lane. Shrinks on screen when zooming out.
    Geographic {
        #[serde(default = "default_separation_meters")]
        separation_meters: f64,
    },
    /// Fixed on-screen distance per lane. Recomputed on every view change.
    Screen {
        #[serde(default)]
        schedule: SeparationSchedule,
    },
}

fn default_separation_meters() -> f64 {
    15.0
}

impl Default for OffsetStrategy {
    fn default() -> Self {
        OffsetStrategy::Screen { schedule: SeparationSchedule::default() }
    }
}

/// Lane separation in pixels as a step function of zoom.
///
/// Steps are `(min_zoom, pixels)` pairs; the highest step whose `min_zoom`
/// does not exceed the current zoom wins, otherwise `base_pixels` applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparationSchedule {
    pub base_pixels: f64,
    pub steps: Vec<(f64, f64)>,
}

impl Default for SeparationSchedule {
    fn default() -> Self {
        // Tuned so three lanes stay apart even when zoomed far out
        Self {
            base_pixels: 5.0,
            steps: vec![(8.0, 6.0), (10.0, 7.0), (12.0, 8.0)],
        }
    }
}

impl SeparationSchedule {
    /// Every pixel value must be at least [`MIN_PIXEL_OFFSET`], otherwise
    /// adjacent lanes collapse onto the same line.
    pub fn validate(&self) -> Result<()> {
        let pixels = std::iter::once(self.base_pixels).chain(self.steps.iter().map(|(_, px)| *px));
        for px in pixels {
            if !(px.is_finite() && px >= MIN_PIXEL_OFFSET) {
                return Err(RouteError::InvalidConfig(format!(
                    "lane separation must be at least {} px, got {}",
                    MIN_PIXEL_OFFSET, px
                )));
            }
        }
        if let Some((zoom, _)) = self.steps.iter().find(|(zoom, _)| !zoom.is_finite()) {
            return Err(RouteError::InvalidConfig(format!("invalid schedule zoom {}", zoom)));
        }
        Ok(())
    }

    /// Separation in pixels at the given zoom.
    pub fn pixels_at(&self, zoom: f64) -> f64 {
        self.steps
            .iter()
            .filter(|(min_zoom, _)| zoom >= *min_zoom)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map_or(self.base_pixels, |(_, px)| *px)
    }
}

/// Configuration for the whole geometry pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum spacing between kept raw fixes (meters).
    /// Default: 5.0
    pub decimation_meters: f64,

    /// Douglas-Peucker tolerance (meters, converted to degrees internally).
    /// Smaller values keep the route curvier. Default: 20.0
    pub simplification_meters: f64,

    /// Offset strategy. Default: screen space with the standard zoom schedule.
    pub offset: OffsetStrategy,

    /// Walkers and their lanes. Default: charlie (-1), olly (0), dad (+1).
    pub participants: Vec<Participant>,

    /// Padding ratio when framing all sections. Default: 0.2
    pub overview_padding: f64,

    /// Padding ratio when focusing a single section. Default: 0.25
    pub focus_padding: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decimation_meters: 5.0,
            simplification_meters: 20.0,
            offset: OffsetStrategy::default(),
            participants: vec![
                Participant::new("charlie", -1),
                Participant::new("olly", 0),
                Participant::new("dad", 1),
            ],
            overview_padding: 0.2,
            focus_padding: 0.25,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)
            .map_err(|e| RouteError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tolerances that would make simplification meaningless and lane
    /// separations too small to keep participants apart.
    pub fn validate(&self) -> Result<()> {
        if !(self.decimation_meters.is_finite() && self.decimation_meters >= 0.0) {
            return Err(RouteError::InvalidConfig(format!(
                "decimation_meters must be a non-negative number, got {}",
                self.decimation_meters
            )));
        }
        if !(self.simplification_meters.is_finite() && self.simplification_meters >= 0.0) {
            return Err(RouteError::InvalidConfig(format!(
                "simplification_meters must be a non-negative number, got {}",
                self.simplification_meters
            )));
        }
        match &self.offset {
            OffsetStrategy::Geographic { separation_meters } => {
                if !(separation_meters.is_finite() && *separation_meters > 0.0) {
                    return Err(RouteError::InvalidConfig(format!(
                        "separation_meters must be a positive number, got {}",
                        separation_meters
                    )));
                }
            }
            OffsetStrategy::Screen { schedule } => schedule.validate()?,
        }
        Ok(())
    }

    /// Lane rank for a participant name, if they are on the roster.
    pub fn rank_of(&self, name: &str) -> Option<i32> {
        self.participants.iter().find(|p| p.name == name).map(|p| p.rank)
    }
}
