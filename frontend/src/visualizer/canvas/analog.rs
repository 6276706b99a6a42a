//! Analog waveforms: values mapped through a numeric evaluator onto the row
//! height, drawn either as steps or as a linear interpolation.
//!
//! Samples that do not evaluate (nine-state bit vectors, unparsable reals) are
//! drawn as gaps: the line breaks and the interval is shaded.

use super::binary::extend_line;
use super::draw_list::{DrawList, Point};
use super::rendering::WaveformRenderer;
use super::window::{RenderContext, RenderWindow, Segment, SegmentKind, build_segments};
use shared::{SignalEncoding, Transition, is_two_state};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogMode {
    Linear,
    Stepped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueEvaluator {
    Unsigned,
    /// Two's complement over the value's own width.
    Signed,
    Real,
}

impl ValueEvaluator {
    pub fn for_signal(encoding: SignalEncoding, width: u32, signed: bool) -> Self {
        match encoding {
            SignalEncoding::Real | SignalEncoding::String => ValueEvaluator::Real,
            SignalEncoding::BitVector if signed && width > 1 => ValueEvaluator::Signed,
            SignalEncoding::BitVector => ValueEvaluator::Unsigned,
        }
    }

    pub fn evaluate(&self, value: &str) -> Option<f64> {
        match self {
            ValueEvaluator::Real => value.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            ValueEvaluator::Unsigned => unsigned_value(value),
            ValueEvaluator::Signed => {
                let magnitude = unsigned_value(value)?;
                if value.starts_with('1') {
                    Some(magnitude - (value.len() as f64).exp2())
                } else {
                    Some(magnitude)
                }
            }
        }
    }
}

fn unsigned_value(value: &str) -> Option<f64> {
    if !is_two_state(value) {
        return None;
    }
    Some(
        value
            .bytes()
            .fold(0.0, |acc, bit| acc * 2.0 + f64::from(bit - b'0')),
    )
}

/// Scale used when neither the row nor the data source supplies one.
pub fn default_value_range(evaluator: ValueEvaluator, width: u32, transitions: &[Transition]) -> (f64, f64) {
    match evaluator {
        ValueEvaluator::Unsigned => (0.0, f64::from(width).exp2() - 1.0),
        ValueEvaluator::Signed => {
            let half = f64::from(width.max(1) - 1).exp2();
            (-half, half - 1.0)
        }
        ValueEvaluator::Real => {
            let (min, max) = transitions
                .iter()
                .filter_map(|transition| evaluator.evaluate(&transition.value))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| (min.min(v), max.max(v)));
            if !min.is_finite() {
                (0.0, 1.0)
            } else if min == max {
                (min - 1.0, max + 1.0)
            } else {
                (min, max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogRenderer {
    pub mode: AnalogMode,
    pub evaluator: ValueEvaluator,
    pub range: (f64, f64),
}

impl WaveformRenderer for AnalogRenderer {
    fn render(&self, window: &RenderWindow<'_>, ctx: &RenderContext) -> DrawList {
        let segments = build_segments(window, ctx);
        match self.mode {
            AnalogMode::Stepped => self.render_stepped(&segments, ctx),
            AnalogMode::Linear => self.render_linear(&segments, window, ctx),
        }
    }
}

impl AnalogRenderer {
    fn y(&self, value: f64, ctx: &RenderContext) -> f64 {
        let (min, max) = self.range;
        let span = max - min;
        if span.is_nan() || span <= 0.0 {
            return ctx.mid_y();
        }
        let fraction = ((value - min) / span).clamp(0.0, 1.0);
        ctx.low_y() - fraction * (ctx.low_y() - ctx.high_y())
    }

    fn render_stepped(&self, segments: &[Segment<'_>], ctx: &RenderContext) -> DrawList {
        let mut draw_list = DrawList::default();
        let mut line: Vec<Point> = Vec::new();
        for segment in segments {
            let x0 = ctx.clamp_x(ctx.x(segment.start));
            let x1 = ctx.clamp_x(ctx.x(segment.end));
            let value = match segment.kind {
                SegmentKind::Value(sample) => self.evaluator.evaluate(sample.value),
                SegmentKind::NoDraw { .. } => None,
            };
            match value {
                Some(value) => extend_line(&mut line, x0, x1, self.y(value, ctx)),
                None => {
                    draw_list.polyline(std::mem::take(&mut line), ctx.colors.line, ctx.render.line_width);
                    shade_gap(&mut draw_list, segment, x0, x1, ctx);
                }
            }
        }
        draw_list.polyline(line, ctx.colors.line, ctx.render.line_width);
        draw_list
    }

    /// Points are placed at each transition; the first and last points of a
    /// run are clipped to the window edges by interpolating (or, past the
    /// data, extrapolating) along the neighbouring slope, so adjacent windows
    /// meet at the same value.
    fn render_linear(&self, segments: &[Segment<'_>], window: &RenderWindow<'_>, ctx: &RenderContext) -> DrawList {
        let mut draw_list = DrawList::default();
        let mut run: Vec<(f64, f64)> = Vec::new();
        let mut run_end = 0.0;

        for segment in segments {
            let value = match segment.kind {
                SegmentKind::Value(sample) => self.evaluator.evaluate(sample.value),
                SegmentKind::NoDraw { .. } => None,
            };
            match value {
                Some(value) => {
                    run.push((segment.start, value));
                    run_end = segment.end;
                }
                None => {
                    // hold the last value up to the gap
                    if let Some(&(_, last)) = run.last() {
                        run.push((segment.start, last));
                    }
                    self.emit_run(&mut draw_list, std::mem::take(&mut run), ctx);
                    let x0 = ctx.clamp_x(ctx.x(segment.start));
                    let x1 = ctx.clamp_x(ctx.x(segment.end));
                    shade_gap(&mut draw_list, segment, x0, x1, ctx);
                }
            }
        }

        if !run.is_empty() {
            let next = window
                .after
                .and_then(|after| Some((after.time as f64, self.evaluator.evaluate(after.value)?)));
            match next {
                Some(point) => run.push(point),
                None => run.push((run_end, extrapolate(&run, run_end))),
            }
            self.emit_run(&mut draw_list, run, ctx);
        }
        draw_list
    }

    fn emit_run(&self, draw_list: &mut DrawList, run: Vec<(f64, f64)>, ctx: &RenderContext) {
        let points = clip_to_window(&run, ctx.window.start, ctx.window.end)
            .into_iter()
            .map(|(time, value)| Point::new(ctx.x(time), self.y(value, ctx)))
            .collect();
        draw_list.polyline(points, ctx.colors.line, ctx.render.line_width);
    }
}

fn shade_gap(draw_list: &mut DrawList, segment: &Segment<'_>, x0: f64, x1: f64, ctx: &RenderContext) {
    let color = match segment.kind {
        SegmentKind::Value(_) => ctx.colors.unknown,
        SegmentKind::NoDraw { .. } => ctx.colors.no_draw,
    };
    draw_list.rect(x0, ctx.high_y(), (x1 - x0).max(1.0), ctx.low_y() - ctx.high_y(), color);
}

/// Value at `time` along the slope of the last two points of `run`.
fn extrapolate(run: &[(f64, f64)], time: f64) -> f64 {
    match run {
        [.., a, b] => interpolate(*a, *b, time),
        [only] => only.1,
        [] => 0.0,
    }
}

fn interpolate(a: (f64, f64), b: (f64, f64), time: f64) -> f64 {
    if b.0 == a.0 {
        return a.1;
    }
    a.1 + (b.1 - a.1) * (time - a.0) / (b.0 - a.0)
}

fn clip_to_window(points: &[(f64, f64)], start: f64, end: f64) -> Vec<(f64, f64)> {
    let mut clipped: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b.0 < start || a.0 > end {
            continue;
        }
        let from = if a.0 < start { (start, interpolate(a, b, start)) } else { a };
        let to = if b.0 > end { (end, interpolate(a, b, end)) } else { b };
        if clipped.last() != Some(&from) {
            clipped.push(from);
        }
        clipped.push(to);
    }
    clipped
}
