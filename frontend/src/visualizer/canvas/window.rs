//! Windowed view of a signal and the pixel-space context renderers draw in.

use crate::config::{RenderSection, ThemeColors};
use crate::visualizer::timeline::{TimeRange, ViewportMapping};
use shared::Transition;

/// Vertical gap between the row edge and the high/low levels.
pub const LEVEL_MARGIN: f64 = 3.0;

/// Resolved drawing parameters for one redraw pass. Renderers never see the
/// scroll state, only where time 0 lands and how wide a time unit is.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub zoom_ratio: f64,
    /// Pixel position of time 0.
    pub origin_px: f64,
    pub viewer_width: f64,
    /// Drawable extent, including the overlap on both sides.
    pub left_px: f64,
    pub right_px: f64,
    /// Time extent of `left_px..right_px`.
    pub window: TimeRange,
    pub time_stop: f64,
    /// Elements narrower than this (in time) are merged into no-draw runs.
    pub min_draw_width: f64,
    pub row_height: f64,
    pub render: RenderSection,
    pub colors: ThemeColors,
}

impl RenderContext {
    pub fn new(
        mapping: &ViewportMapping,
        render: &RenderSection,
        overlap_px: f64,
        colors: ThemeColors,
    ) -> Self {
        let left_px = -overlap_px;
        let right_px = mapping.viewer_width + overlap_px;
        RenderContext {
            zoom_ratio: mapping.zoom_ratio,
            origin_px: -mapping.pseudo_scroll_left,
            viewer_width: mapping.viewer_width,
            left_px,
            right_px,
            window: TimeRange::new(mapping.pixel_to_time(left_px), mapping.pixel_to_time(right_px)),
            time_stop: mapping.time_stop,
            min_draw_width: mapping.time_per_pixel(),
            row_height: render.row_height,
            render: render.clone(),
            colors,
        }
    }

    pub fn x(&self, time: f64) -> f64 {
        time * self.zoom_ratio + self.origin_px
    }

    pub fn clamp_x(&self, x: f64) -> f64 {
        x.clamp(self.left_px, self.right_px)
    }

    pub fn high_y(&self) -> f64 {
        LEVEL_MARGIN
    }

    pub fn low_y(&self) -> f64 {
        self.row_height - LEVEL_MARGIN
    }

    pub fn mid_y(&self) -> f64 {
        self.row_height / 2.0
    }

    /// Last time that can carry data inside the window.
    pub fn data_end(&self) -> f64 {
        self.window.end.min(self.time_stop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSample<'a> {
    pub time: u64,
    pub value: &'a str,
    /// Formatted value; the raw value when no format applies.
    pub label: &'a str,
}

/// A signal's transitions restricted to the render window, plus the value
/// just before and just after it.
#[derive(Debug, Clone, Default)]
pub struct RenderWindow<'a> {
    pub samples: Vec<WindowSample<'a>>,
    pub before: Option<WindowSample<'a>>,
    pub after: Option<WindowSample<'a>>,
}

impl<'a> RenderWindow<'a> {
    /// `formatted`, when given, runs parallel to `transitions`.
    pub fn build(transitions: &'a [Transition], formatted: Option<&'a [String]>, window: TimeRange) -> Self {
        let sample = |index: usize| sample_at(transitions, formatted, index);
        let first = transitions.partition_point(|t| (t.time as f64) < window.start);
        let end = transitions.partition_point(|t| (t.time as f64) <= window.end);
        RenderWindow {
            samples: (first..end).map(sample).collect(),
            before: first.checked_sub(1).map(sample),
            after: (end < transitions.len()).then(|| sample(end)),
        }
    }

    /// True when there is nothing at all to draw.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.before.is_none()
    }
}

fn sample_at<'a>(transitions: &'a [Transition], formatted: Option<&'a [String]>, index: usize) -> WindowSample<'a> {
    let transition = &transitions[index];
    WindowSample {
        time: transition.time,
        value: &transition.value,
        label: formatted
            .and_then(|labels| labels.get(index))
            .map_or(transition.value.as_str(), String::as_str),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentKind<'a> {
    Value(WindowSample<'a>),
    /// Run of `count` elements each narrower than one pixel.
    NoDraw { count: usize },
}

/// One drawable time interval, in document time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment<'a> {
    pub start: f64,
    pub end: f64,
    pub kind: SegmentKind<'a>,
}

impl Segment<'_> {
    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

/// Split the window into value segments, merging sub-pixel elements into
/// no-draw runs. Zero-width elements are dropped.
pub fn build_segments<'a>(window: &RenderWindow<'a>, ctx: &RenderContext) -> Vec<Segment<'a>> {
    let values: Vec<WindowSample<'a>> = window.before.iter().chain(&window.samples).copied().collect();
    let mut segments: Vec<Segment<'a>> = Vec::with_capacity(values.len());
    for (index, sample) in values.iter().enumerate() {
        let start = sample.time as f64;
        let end = match values.get(index + 1) {
            Some(next) => next.time as f64,
            None => window
                .after
                .map_or_else(|| ctx.data_end(), |after| after.time as f64),
        };
        if end <= start {
            continue;
        }
        if end - start >= ctx.min_draw_width {
            segments.push(Segment {
                start,
                end,
                kind: SegmentKind::Value(*sample),
            });
            continue;
        }
        match segments.last_mut() {
            Some(Segment {
                end: last_end,
                kind: SegmentKind::NoDraw { count },
                ..
            }) if *last_end == start => {
                *last_end = end;
                *count += 1;
            }
            _ => segments.push(Segment {
                start,
                end,
                kind: SegmentKind::NoDraw { count: 1 },
            }),
        }
    }
    segments
}
