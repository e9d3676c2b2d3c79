//! Debounced offset recomputation.
//!
//! Screen-space offsets go stale on every zoom or pan. The host forwards each
//! view-change event to [`OffsetRefresher::notify`], which remembers the latest
//! view and tells the host whether it still needs to request an animation
//! frame. When the frame fires, [`OffsetRefresher::run_frame`] recomputes once
//! with the last view seen, however many events arrived in between.
//!
//! Everything here runs on the host's single event loop; there is no locking
//! and an in-flight pass is never cancelled.

use log::debug;

use crate::config::OffsetStrategy;
use crate::offset::ViewContext;
use crate::sections::SectionSet;

/// A view change reported by the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewEvent {
    ZoomStart(ViewContext),
    Zoom(ViewContext),
    ZoomEnd(ViewContext),
    MoveEnd(ViewContext),
}

impl ViewEvent {
    /// The view state after the event.
    pub fn view(&self) -> &ViewContext {
        match self {
            ViewEvent::ZoomStart(view)
            | ViewEvent::Zoom(view)
            | ViewEvent::ZoomEnd(view)
            | ViewEvent::MoveEnd(view) => view,
        }
    }
}

/// Coalesces view-change events into at most one recomputation per frame.
#[derive(Debug, Default)]
pub struct OffsetRefresher {
    pending: Option<ViewContext>,
    passes: u64,
}

impl OffsetRefresher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a view change.
    ///
    /// Returns `true` when this is the first event since the last frame, i.e.
    /// the caller should schedule a frame. Later events in the same frame only
    /// replace the pending view.
    pub fn notify(&mut self, event: ViewEvent) -> bool {
        let first = self.pending.is_none();
        self.pending = Some(*event.view());
        first
    }

    /// Whether a recomputation is waiting for the next frame.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Run the pending recomputation, if any, with the most recent view.
    ///
    /// Returns the view that was used, or `None` if nothing was pending.
    pub fn run_frame<F>(&mut self, recompute: F) -> Option<ViewContext>
    where
        F: FnOnce(&ViewContext),
    {
        let view = self.pending.take()?;
        recompute(&view);
        self.passes += 1;
        debug!("[OffsetRefresher] Pass {} at zoom {:.2}", self.passes, view.zoom);
        Some(view)
    }

    /// Frame callback for a [`SectionSet`]: refresh every section's traces.
    pub fn run_frame_for(
        &mut self,
        sections: &mut SectionSet,
        strategy: &OffsetStrategy,
    ) -> Option<ViewContext> {
        self.run_frame(|view| sections.refresh_offsets(strategy, view))
    }

    /// Number of recomputation passes executed so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offset::PixelPoint;
    use std::cell::RefCell;

    fn view(zoom: f64) -> ViewContext {
        ViewContext::new(zoom, PixelPoint::new(0.0, 0.0))
    }

    #[test]
    fn test_burst_of_events_runs_once_with_last_view() {
        let mut refresher = OffsetRefresher::new();
        assert!(refresher.notify(ViewEvent::ZoomStart(view(9.0))));
        assert!(!refresher.notify(ViewEvent::Zoom(view(9.5))));
        assert!(!refresher.notify(ViewEvent::ZoomEnd(view(10.0))));
        assert!(!refresher.notify(ViewEvent::MoveEnd(view(10.0))));

        let seen = RefCell::new(Vec::new());
        let used = refresher.run_frame(|v| seen.borrow_mut().push(v.zoom));
        assert_eq!(used, Some(view(10.0)));
        assert_eq!(*seen.borrow(), vec![10.0]);
        assert_eq!(refresher.passes(), 1);

        // Nothing pending: the next frame is a no-op
        assert_eq!(refresher.run_frame(|v| seen.borrow_mut().push(v.zoom)), None);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_events_after_frame_schedule_again() {
        let mut refresher = OffsetRefresher::new();
        refresher.notify(ViewEvent::MoveEnd(view(8.0)));
        refresher.run_frame(|_| {});
        assert!(!refresher.is_pending());

        assert!(refresher.notify(ViewEvent::ZoomEnd(view(12.0))));
        assert!(refresher.is_pending());
        assert_eq!(refresher.run_frame(|_| {}), Some(view(12.0)));
        assert_eq!(refresher.passes(), 2);
    }

    #[test]
    fn test_pan_keeps_latest_origin() {
        let mut refresher = OffsetRefresher::new();
        let a = ViewContext::new(11.0, PixelPoint::new(10.0, 10.0));
        let b = ViewContext::new(11.0, PixelPoint::new(400.0, -20.0));
        refresher.notify(ViewEvent::MoveEnd(a));
        refresher.notify(ViewEvent::MoveEnd(b));
        assert_eq!(refresher.run_frame(|_| {}), Some(b));
    }
}
