//! Error taxonomy for the route geometry pipeline.
//!
//! | Variant | Raised by | Fatal? |
//! |---------|-----------|--------|
//! | [`RouteError::SourceUnavailable`] | track loading | yes, "could not load route" |
//! | [`RouteError::MalformedTrack`] | track parsing | yes |
//! | [`RouteError::InsufficientPoints`] | decimation / simplification | yes |
//! | [`RouteError::UnsliceableSection`] | slicing | no, the section is skipped |
//! | [`RouteError::InvalidSectionData`] | section definition parsing | yes |
//! | [`RouteError::InvalidConfig`] | configuration loading | yes |

use thiserror::Error;

/// Errors produced while building the reference route and its sections.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The track resource could not be read or fetched.
    #[error("could not load route from {source_id}: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    /// Fewer than two usable coordinates could be parsed from the track.
    #[error("malformed track: {0}")]
    MalformedTrack(String),

    /// Fewer than two points remained after a simplification pass.
    #[error("insufficient points after {stage}: {remaining} remaining, need at least 2")]
    InsufficientPoints { stage: &'static str, remaining: usize },

    /// Neither traversal direction yields a usable sub-path.
    #[error("section cannot be sliced from the reference route: {0}")]
    UnsliceableSection(String),

    /// Section definitions could not be parsed.
    #[error("invalid section definitions: {0}")]
    InvalidSectionData(String),

    /// Configuration could not be parsed or holds unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RouteError {
    pub(crate) fn source_unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts pipeline initialization.
    ///
    /// Only [`RouteError::UnsliceableSection`] is recoverable: the section is
    /// reported and excluded, the rest of the trail still renders.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnsliceableSection(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unsliceable_is_recoverable() {
        assert!(!RouteError::UnsliceableSection("a to b".into()).is_fatal());
        assert!(RouteError::MalformedTrack("empty".into()).is_fatal());
        assert!(RouteError::InsufficientPoints { stage: "decimation", remaining: 1 }.is_fatal());
        assert!(RouteError::source_unavailable("route.gpx", "not found").is_fatal());
    }

    #[test]
    fn test_source_unavailable_message() {
        let err = RouteError::source_unavailable("route.gpx", "404 Not Found");
        assert_eq!(err.to_string(), "could not load route from route.gpx: 404 Not Found");
    }
}
