//! Single-bit waveform: one polyline between the 0 and 1 levels, with
//! nine-state values drawn at level 0 under a colored overlay.

use super::draw_list::{DrawList, Point};
use super::rendering::{WaveformRenderer, classify_signal_state, state_color};
use super::window::{RenderContext, RenderWindow, SegmentKind, build_segments};

#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryRenderer;

impl WaveformRenderer for BinaryRenderer {
    fn render(&self, window: &RenderWindow<'_>, ctx: &RenderContext) -> DrawList {
        let mut draw_list = DrawList::default();
        let mut line: Vec<Point> = Vec::new();
        let band_top = ctx.high_y();
        let band_height = ctx.low_y() - ctx.high_y();

        for segment in build_segments(window, ctx) {
            let x0 = ctx.clamp_x(ctx.x(segment.start));
            let x1 = ctx.clamp_x(ctx.x(segment.end));
            match segment.kind {
                SegmentKind::Value(sample) => {
                    let y = if sample.value == "1" { ctx.high_y() } else { ctx.low_y() };
                    extend_line(&mut line, x0, x1, y);
                    if let Some(color) = state_color(classify_signal_state(sample.value), &ctx.colors) {
                        draw_list.rect(x0, band_top, x1 - x0, band_height, color);
                    }
                }
                SegmentKind::NoDraw { .. } => {
                    draw_list.polyline(std::mem::take(&mut line), ctx.colors.line, ctx.render.line_width);
                    draw_list.rect(x0, band_top, (x1 - x0).max(1.0), band_height, ctx.colors.no_draw);
                }
            }
        }
        draw_list.polyline(line, ctx.colors.line, ctx.render.line_width);
        draw_list
    }
}

/// Continue the line to `x1` at level `y`, stepping vertically at `x0` when
/// the level changes.
pub(super) fn extend_line(line: &mut Vec<Point>, x0: f64, x1: f64, y: f64) {
    match line.last_mut() {
        Some(last) if last.y == y => last.x = x1,
        Some(_) => {
            line.push(Point::new(x0, y));
            line.push(Point::new(x1, y));
        }
        None => {
            line.push(Point::new(x0, y));
            line.push(Point::new(x1, y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::canvas::test_support::{context, transitions};

    /// (x, from_y, to_y) of every vertical step.
    fn level_changes(points: &[Point]) -> Vec<(f64, f64, f64)> {
        points
            .windows(2)
            .filter(|pair| pair[0].x == pair[1].x && pair[0].y != pair[1].y)
            .map(|pair| (pair[0].x, pair[0].y, pair[1].y))
            .collect()
    }

    #[test]
    fn two_level_changes_over_full_window() {
        let ctx = context(1.0, 0.0, 300.0, 300.0);
        // boundary-synthesised terminal value at time_stop
        let data = transitions(&[(0, "0"), (100, "1"), (200, "0"), (300, "x")]);
        let window = RenderWindow::build(&data, None, ctx.window);
        let draw_list = BinaryRenderer.render(&window, &ctx);

        let lines: Vec<&[Point]> = draw_list.polylines().collect();
        assert_eq!(lines.len(), 1);
        let points = lines[0];
        let (low, high) = (ctx.low_y(), ctx.high_y());
        assert_eq!(level_changes(points), vec![(100.0, low, high), (200.0, high, low)]);
        assert_eq!(points.first().map(|p| (p.x, p.y)), Some((0.0, low)));
        assert_eq!(points.last().map(|p| (p.x, p.y)), Some((300.0, low)));
    }

    #[test]
    fn boundary_values_alone_draw_flat_line() {
        let ctx = context(1.0, 500.0, 100.0, 2000.0);
        let data = transitions(&[(0, "1"), (1000, "0"), (2000, "x")]);
        let window = RenderWindow::build(&data, None, ctx.window);
        assert!(window.samples.is_empty());

        let draw_list = BinaryRenderer.render(&window, &ctx);
        let lines: Vec<&[Point]> = draw_list.polylines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], &[Point::new(0.0, ctx.high_y()), Point::new(100.0, ctx.high_y())]);
    }

    #[test]
    fn nine_state_values_sit_at_level_zero_with_overlay() {
        let ctx = context(1.0, 0.0, 100.0, 100.0);
        let data = transitions(&[(0, "1"), (40, "z"), (60, "x"), (100, "x")]);
        let window = RenderWindow::build(&data, None, ctx.window);
        let draw_list = BinaryRenderer.render(&window, &ctx);

        let points = draw_list.polylines().next().unwrap_or_default();
        assert_eq!(level_changes(points), vec![(40.0, ctx.high_y(), ctx.low_y())]);
        assert_eq!(draw_list.rects_of(ctx.colors.high_impedance).collect::<Vec<_>>(), vec![(40.0, 20.0)]);
        assert_eq!(draw_list.rects_of(ctx.colors.unknown).collect::<Vec<_>>(), vec![(60.0, 40.0)]);
    }

    #[test]
    fn dense_toggling_becomes_a_band() {
        let ctx = context(0.1, 0.0, 100.0, 1000.0);
        let mut pairs: Vec<(u64, &str)> = vec![(0, "0")];
        for step in 0..50u64 {
            pairs.push((300 + step * 2, if step % 2 == 0 { "1" } else { "0" }));
        }
        pairs.push((500, "1"));
        pairs.push((1000, "x"));
        let data = transitions(&pairs);
        let window = RenderWindow::build(&data, None, ctx.window);
        let draw_list = BinaryRenderer.render(&window, &ctx);

        let bands: Vec<(f64, f64)> = draw_list.rects_of(ctx.colors.no_draw).collect();
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].0, 30.0);
        assert_eq!(draw_list.polylines().count(), 2);
    }
}
