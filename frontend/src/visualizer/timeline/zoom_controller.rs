//! Zoom control for the timeline viewport
//!
//! Owns the time↔pixel mapping. Every gesture computes a candidate zoom ratio
//! and scroll offset and hands both to `apply`, which clamps them and
//! recomputes the derived ruler and scrollbar geometry.

use super::ruler::{RulerSpacing, RulerTick, ruler_ticks};
use super::time_domain::{DocumentInfo, TimeRange};
use crate::config::ViewportSection;

const DEFAULT_VIEWER_WIDTH: f64 = 800.0;

/// The pure coordinate mapping. Pixel 0 is the left edge of the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMapping {
    /// Pixels per time unit.
    pub zoom_ratio: f64,
    pub pseudo_scroll_left: f64,
    pub viewer_width: f64,
    pub time_stop: f64,
}

impl ViewportMapping {
    pub fn time_to_pixel(&self, time: f64) -> f64 {
        time * self.zoom_ratio - self.pseudo_scroll_left
    }

    pub fn pixel_to_time(&self, pixel: f64) -> f64 {
        (pixel + self.pseudo_scroll_left) / self.zoom_ratio
    }

    pub fn time_scroll_left(&self) -> f64 {
        self.pseudo_scroll_left / self.zoom_ratio
    }

    pub fn time_scroll_right(&self) -> f64 {
        (self.pseudo_scroll_left + self.viewer_width) / self.zoom_ratio
    }

    pub fn visible_range(&self) -> TimeRange {
        TimeRange::new(self.time_scroll_left(), self.time_scroll_right())
    }

    pub fn max_scroll_left(&self) -> f64 {
        (self.time_stop * self.zoom_ratio - self.viewer_width).max(0.0)
    }

    /// Width of one device pixel in time units.
    pub fn time_per_pixel(&self) -> f64 {
        1.0 / self.zoom_ratio
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollbarGeometry {
    pub thumb_width: f64,
    pub thumb_left: f64,
    pub track_width: f64,
}

/// Everything a host needs to repaint after a viewport change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSnapshot {
    pub mapping: ViewportMapping,
    pub visible: TimeRange,
    pub ruler: RulerSpacing,
    pub scrollbar: ScrollbarGeometry,
}

#[derive(Debug, Clone)]
pub struct ZoomController {
    mapping: ViewportMapping,
    settings: ViewportSection,
    ruler: RulerSpacing,
    scrollbar: ScrollbarGeometry,
}

impl ZoomController {
    /// A controller showing the whole document.
    pub fn new(settings: ViewportSection, time_stop: u64) -> Self {
        let time_stop = time_stop.max(1) as f64;
        let mut controller = ZoomController {
            mapping: ViewportMapping {
                zoom_ratio: DEFAULT_VIEWER_WIDTH / time_stop,
                pseudo_scroll_left: 0.0,
                viewer_width: DEFAULT_VIEWER_WIDTH,
                time_stop,
            },
            settings,
            ruler: RulerSpacing::compute(1.0, 1.0, 1.0, 1),
            scrollbar: ScrollbarGeometry {
                thumb_width: DEFAULT_VIEWER_WIDTH,
                thumb_left: 0.0,
                track_width: DEFAULT_VIEWER_WIDTH,
            },
        };
        controller.zoom_to_fit();
        controller
    }

    pub fn mapping(&self) -> &ViewportMapping {
        &self.mapping
    }

    pub fn snapshot(&self) -> ViewportSnapshot {
        ViewportSnapshot {
            mapping: self.mapping,
            visible: self.mapping.visible_range(),
            ruler: self.ruler,
            scrollbar: self.scrollbar,
        }
    }

    /// Zoom at which the whole `[0, time_stop]` range fits the viewer.
    pub fn min_zoom_ratio(&self) -> f64 {
        self.mapping.viewer_width / self.mapping.time_stop
    }

    pub fn max_zoom_ratio(&self) -> f64 {
        self.settings.max_zoom_ratio.max(self.min_zoom_ratio())
    }

    /// Zoom by `2^(-amount)` keeping `focal_time` under `focal_pixel`.
    pub fn zoom(&mut self, amount: f64, focal_time: f64, focal_pixel: f64) -> ViewportSnapshot {
        let zoom_ratio = self.clamp_zoom(self.mapping.zoom_ratio * (-amount).exp2());
        self.apply(zoom_ratio, focal_time * zoom_ratio - focal_pixel)
    }

    /// Frame `[start, end]` exactly (within the zoom limits).
    pub fn set_viewport_range(&mut self, start: f64, end: f64) -> ViewportSnapshot {
        let range = TimeRange::new(start, end);
        if range.duration() <= 0.0 {
            log::warn!("Ignoring empty viewport range {}", range);
            return self.snapshot();
        }
        let zoom_ratio = self.clamp_zoom(self.mapping.viewer_width / range.duration());
        self.apply(zoom_ratio, range.start * zoom_ratio)
    }

    pub fn scroll_to(&mut self, pixel_offset: f64) -> ViewportSnapshot {
        self.apply(self.mapping.zoom_ratio, pixel_offset)
    }

    /// Centre `time` in the viewer.
    pub fn scroll_to_time(&mut self, time: f64) -> ViewportSnapshot {
        let scroll_left = time * self.mapping.zoom_ratio - self.mapping.viewer_width / 2.0;
        self.apply(self.mapping.zoom_ratio, scroll_left)
    }

    pub fn zoom_to_fit(&mut self) -> ViewportSnapshot {
        self.apply(self.min_zoom_ratio(), 0.0)
    }

    /// Resize keeping the left edge time; the zoom floor moves with the width.
    pub fn set_viewer_width(&mut self, viewer_width: f64) -> ViewportSnapshot {
        if !(viewer_width.is_finite() && viewer_width > 0.0) {
            log::warn!("Ignoring viewer width {}", viewer_width);
            return self.snapshot();
        }
        let left_time = self.mapping.time_scroll_left();
        self.mapping.viewer_width = viewer_width;
        let zoom_ratio = self.clamp_zoom(self.mapping.zoom_ratio);
        self.apply(zoom_ratio, left_time * zoom_ratio)
    }

    /// Move the scrollbar thumb to `thumb_left` pixels from the track start.
    pub fn scroll_by_scrollbar(&mut self, thumb_left: f64) -> ViewportSnapshot {
        let travel = self.scrollbar.track_width - self.scrollbar.thumb_width;
        if travel <= 0.0 {
            return self.scroll_to(0.0);
        }
        let fraction = (thumb_left / travel).clamp(0.0, 1.0);
        self.scroll_to(fraction * self.mapping.max_scroll_left())
    }

    pub fn ruler_ticks(&self, document: &DocumentInfo) -> Vec<RulerTick> {
        let mapping = self.mapping;
        ruler_ticks(&self.ruler, mapping.visible_range(), document, |time| {
            mapping.time_to_pixel(time)
        })
    }

    fn clamp_zoom(&self, zoom_ratio: f64) -> f64 {
        if !zoom_ratio.is_finite() || zoom_ratio <= 0.0 {
            return self.min_zoom_ratio();
        }
        zoom_ratio.clamp(self.min_zoom_ratio(), self.max_zoom_ratio())
    }

    /// The single mutation path: clamp scroll, then derive ruler and scrollbar.
    fn apply(&mut self, zoom_ratio: f64, scroll_left: f64) -> ViewportSnapshot {
        self.mapping.zoom_ratio = zoom_ratio;
        let scroll_left = if scroll_left.is_finite() { scroll_left } else { 0.0 };
        self.mapping.pseudo_scroll_left = scroll_left.clamp(0.0, self.mapping.max_scroll_left());

        self.ruler = RulerSpacing::compute(
            zoom_ratio,
            self.min_zoom_ratio(),
            self.settings.ruler_number_spacing,
            self.settings.ruler_ticks_per_number,
        );
        self.scrollbar = self.scrollbar_geometry();
        log::debug!(
            "Viewport {} at {:.4} px/unit",
            self.mapping.visible_range(),
            zoom_ratio
        );
        self.snapshot()
    }

    fn scrollbar_geometry(&self) -> ScrollbarGeometry {
        let width = self.mapping.viewer_width;
        let thumb_width = (width * width / (self.mapping.time_stop * self.mapping.zoom_ratio))
            .round()
            .max(self.settings.min_scrollbar_width)
            .min(width);
        let max_scroll = self.mapping.max_scroll_left();
        let thumb_left = if max_scroll > 0.0 {
            self.mapping.pseudo_scroll_left / max_scroll * (width - thumb_width)
        } else {
            0.0
        };
        ScrollbarGeometry {
            thumb_width,
            thumb_left,
            track_width: width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(width: f64, time_stop: u64) -> ZoomController {
        let mut controller = ZoomController::new(ViewportSection::default(), time_stop);
        controller.set_viewer_width(width);
        controller.zoom_to_fit();
        controller
    }

    #[test]
    fn starts_fitted() {
        let controller = controller(1000.0, 500);
        assert_eq!(controller.mapping().zoom_ratio, 2.0);
        assert_eq!(controller.mapping().max_scroll_left(), 0.0);
        assert_eq!(controller.snapshot().scrollbar.thumb_width, 1000.0);
    }

    #[test]
    fn zoom_clamps_to_fit() {
        let mut controller = controller(1000.0, 500);
        let snapshot = controller.zoom(5.0, 250.0, 500.0);
        assert_eq!(snapshot.mapping.zoom_ratio, 2.0);
        assert_eq!(snapshot.mapping.max_scroll_left(), 0.0);
        assert_eq!(snapshot.mapping.pseudo_scroll_left, 0.0);
    }

    #[test]
    fn zoom_keeps_focal_time_under_pixel() {
        let mut controller = controller(1000.0, 500);
        let snapshot = controller.zoom(-2.0, 200.0, 400.0);
        assert_eq!(snapshot.mapping.zoom_ratio, 8.0);
        assert_eq!(snapshot.mapping.time_to_pixel(200.0), 400.0);
    }

    #[test]
    fn zoom_caps_at_maximum() {
        let mut controller = controller(1000.0, 500);
        let snapshot = controller.zoom(-20.0, 0.0, 0.0);
        assert_eq!(snapshot.mapping.zoom_ratio, 64.0);
    }

    #[test]
    fn window_width_is_constant_in_time() {
        let mut controller = controller(640.0, 10_000);
        controller.zoom(-3.5, 1234.0, 100.0);
        let mapping = *controller.mapping();
        let width_in_time = mapping.time_scroll_right() - mapping.time_scroll_left();
        assert!((width_in_time - 640.0 / mapping.zoom_ratio).abs() < 1e-9);
    }

    #[test]
    fn viewport_range_frames_window() {
        let mut controller = controller(1000.0, 10_000);
        let snapshot = controller.set_viewport_range(2000.0, 4000.0);
        assert_eq!(snapshot.mapping.zoom_ratio, 0.5);
        assert_eq!(snapshot.mapping.pseudo_scroll_left, 1000.0);
        assert_eq!(snapshot.visible, TimeRange::new(2000.0, 4000.0));
    }

    #[test]
    fn scroll_clamps_to_range() {
        let mut controller = controller(1000.0, 10_000);
        controller.set_viewport_range(0.0, 1000.0);
        assert_eq!(controller.scroll_to(-50.0).mapping.pseudo_scroll_left, 0.0);
        assert_eq!(controller.scroll_to(1e9).mapping.pseudo_scroll_left, 9000.0);
    }

    #[test]
    fn scrollbar_thumb_tracks_scroll() {
        let mut controller = controller(1000.0, 10_000);
        controller.set_viewport_range(0.0, 1000.0);
        let snapshot = controller.scroll_to(9000.0);
        assert_eq!(snapshot.scrollbar.thumb_width, 100.0);
        assert_eq!(snapshot.scrollbar.thumb_left, 900.0);

        let snapshot = controller.scroll_by_scrollbar(450.0);
        assert_eq!(snapshot.mapping.pseudo_scroll_left, 4500.0);
    }

    #[test]
    fn scrollbar_thumb_has_minimum_width() {
        let mut controller = controller(100.0, 1_000_000);
        controller.set_viewport_range(0.0, 10.0);
        assert_eq!(controller.snapshot().scrollbar.thumb_width, 17.0);
    }

    #[test]
    fn scroll_to_time_centres() {
        let mut controller = controller(1000.0, 10_000);
        controller.set_viewport_range(0.0, 1000.0);
        let snapshot = controller.scroll_to_time(5000.0);
        assert_eq!(snapshot.visible.center(), 5000.0);
    }

    #[test]
    fn resize_raises_zoom_floor() {
        let mut controller = controller(500.0, 1000);
        assert_eq!(controller.mapping().zoom_ratio, 0.5);
        let snapshot = controller.set_viewer_width(2000.0);
        assert_eq!(snapshot.mapping.zoom_ratio, 2.0);
        assert_eq!(snapshot.mapping.pseudo_scroll_left, 0.0);
    }
}
