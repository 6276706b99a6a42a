//! Bus waveform: a bubble polygon per value with its formatted label.

use super::draw_list::{DrawCommand, DrawList, Point, TextAlign};
use super::rendering::{WaveformRenderer, classify_signal_state, state_color, truncate_value_text};
use super::window::{RenderContext, RenderWindow, SegmentKind, build_segments};

#[derive(Debug, Clone, Copy, Default)]
pub struct MultiBitRenderer;

impl WaveformRenderer for MultiBitRenderer {
    fn render(&self, window: &RenderWindow<'_>, ctx: &RenderContext) -> DrawList {
        let mut draw_list = DrawList::default();
        let label_threshold = ctx.render.label_min_characters * ctx.render.character_width / ctx.zoom_ratio;

        for segment in build_segments(window, ctx) {
            let x0 = ctx.x(segment.start);
            let x1 = ctx.x(segment.end);
            match segment.kind {
                SegmentKind::Value(sample) => {
                    let fill = state_color(classify_signal_state(sample.value), &ctx.colors)
                        .unwrap_or(ctx.colors.bus_fill);
                    draw_list.push(DrawCommand::Polygon {
                        points: bubble(x0, x1, ctx),
                        fill,
                        stroke: Some(ctx.colors.line),
                    });
                    if segment.width() > label_threshold {
                        place_labels(&mut draw_list, sample.label, x0, x1, ctx);
                    }
                }
                SegmentKind::NoDraw { .. } => {
                    let left = ctx.clamp_x(x0);
                    let right = ctx.clamp_x(x1);
                    draw_list.rect(
                        left,
                        ctx.high_y(),
                        (right - left).max(1.0),
                        ctx.low_y() - ctx.high_y(),
                        ctx.colors.no_draw,
                    );
                }
            }
        }
        draw_list
    }
}

/// Hexagon with diagonal edges at both transitions. Off-screen edges are
/// pulled in to just past the drawable extent.
fn bubble(x0: f64, x1: f64, ctx: &RenderContext) -> Vec<Point> {
    let b = ctx.render.bubble_width.min((x1 - x0) / 2.0).max(0.0);
    let min_x = ctx.left_px - ctx.render.bubble_width;
    let max_x = ctx.right_px + ctx.render.bubble_width;
    let clamp = |x: f64| x.clamp(min_x, max_x);
    vec![
        Point::new(clamp(x0), ctx.mid_y()),
        Point::new(clamp(x0 + b), ctx.high_y()),
        Point::new(clamp(x1 - b), ctx.high_y()),
        Point::new(clamp(x1), ctx.mid_y()),
        Point::new(clamp(x1 - b), ctx.low_y()),
        Point::new(clamp(x0 + b), ctx.low_y()),
    ]
}

fn place_labels(draw_list: &mut DrawList, label: &str, x0: f64, x1: f64, ctx: &RenderContext) {
    let char_width = ctx.render.character_width;
    let bubble = ctx.render.bubble_width;
    let y = ctx.mid_y();

    if x1 - x0 > ctx.viewer_width {
        // labels anchored to the segment start, so they scroll with it
        let max_chars = ((x1 - x0 - 2.0 * bubble) / char_width).floor().max(0.0) as usize;
        let text = truncate_value_text(label, max_chars);
        if text.is_empty() {
            return;
        }
        let text_width = text.chars().count() as f64 * char_width;
        let interval = ctx.viewer_width.max(text_width + ctx.render.label_repeat_padding);
        let first_center = x0 + interval / 2.0;
        let lowest = -text_width;
        let highest = (x1 - text_width / 2.0).min(ctx.viewer_width + text_width);
        let first = ((lowest - first_center) / interval).ceil().max(0.0) as i64;
        let last = ((highest - first_center) / interval).floor() as i64;
        for k in first..=last {
            let x = first_center + k as f64 * interval;
            draw_list.text(x, y, text.clone(), ctx.colors.text, TextAlign::Center);
        }
        return;
    }

    // center on the visible part so an edge-straddling label stays on screen
    let visible_left = x0.max(0.0);
    let visible_right = x1.min(ctx.viewer_width);
    let available = visible_right - visible_left - 2.0 * bubble;
    if available <= 0.0 {
        return;
    }
    let text = truncate_value_text(label, (available / char_width).floor() as usize);
    if text.is_empty() {
        return;
    }
    let x = (visible_left + visible_right) / 2.0;
    draw_list.text(x, y, text, ctx.colors.text, TextAlign::Center);
}
