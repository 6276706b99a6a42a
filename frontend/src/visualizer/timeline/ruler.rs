//! Ruler subdivision.
//!
//! Number spacing is a nice value at the fit-to-window zoom and halves with
//! every doubling of zoom past it. Between two halvings an intermediate level
//! of numbers fades in, its opacity following the fractional zoom level.

use super::time_domain::{DocumentInfo, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RulerSpacing {
    /// `log2(zoom_ratio / fit_zoom_ratio)`.
    pub level: f64,
    /// Time between labelled numbers.
    pub number_spacing: f64,
    /// Time between minor ticks.
    pub tick_spacing: f64,
    /// Opacity of the numbers halfway between two labelled ones.
    pub intermediate_opacity: f64,
}

impl RulerSpacing {
    pub fn compute(
        zoom_ratio: f64,
        fit_zoom_ratio: f64,
        number_spacing_px: f64,
        ticks_per_number: u32,
    ) -> Self {
        let level = if zoom_ratio > 0.0 && fit_zoom_ratio > 0.0 {
            (zoom_ratio / fit_zoom_ratio).log2().max(0.0)
        } else {
            0.0
        };
        let base_spacing = round_to_nice_number(number_spacing_px / fit_zoom_ratio.max(f64::MIN_POSITIVE));
        let number_spacing = base_spacing / level.floor().exp2();
        RulerSpacing {
            level,
            number_spacing,
            tick_spacing: number_spacing / f64::from(ticks_per_number.max(1)),
            intermediate_opacity: level.fract(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickKind {
    Number { label: String },
    Intermediate { label: String, opacity: f64 },
    Minor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RulerTick {
    pub time: f64,
    pub x: f64,
    pub kind: TickKind,
}

/// Materialise every tick inside `visible`. `to_pixel` is the viewport
/// mapping.
pub fn ruler_ticks(
    spacing: &RulerSpacing,
    visible: TimeRange,
    document: &DocumentInfo,
    to_pixel: impl Fn(f64) -> f64,
) -> Vec<RulerTick> {
    let mut ticks = Vec::new();
    if !(spacing.tick_spacing > 0.0) || visible.duration() <= 0.0 {
        return ticks;
    }
    let ticks_per_number = (spacing.number_spacing / spacing.tick_spacing).round().max(1.0) as i64;
    let first = (visible.start / spacing.tick_spacing).ceil() as i64;
    let last = (visible.end / spacing.tick_spacing).floor() as i64;
    for index in first.max(0)..=last {
        let time = index as f64 * spacing.tick_spacing;
        let position = index.rem_euclid(ticks_per_number);
        let kind = if position == 0 {
            TickKind::Number {
                label: document.format_time(time),
            }
        } else if ticks_per_number % 2 == 0 && position == ticks_per_number / 2 {
            TickKind::Intermediate {
                label: document.format_time(time),
                opacity: spacing.intermediate_opacity,
            }
        } else {
            TickKind::Minor
        };
        ticks.push(RulerTick {
            time,
            x: to_pixel(time),
            kind,
        });
    }
    if ticks_per_number % 2 != 0 {
        add_intermediate_numbers(&mut ticks, spacing, visible, document, &to_pixel);
    }
    ticks
}

/// Odd tick counts have no minor tick at the half-way point; place the
/// intermediate numbers on their own.
fn add_intermediate_numbers(
    ticks: &mut Vec<RulerTick>,
    spacing: &RulerSpacing,
    visible: TimeRange,
    document: &DocumentInfo,
    to_pixel: &impl Fn(f64) -> f64,
) {
    let half = spacing.number_spacing / 2.0;
    let first = (visible.start / half).ceil() as i64;
    let last = (visible.end / half).floor() as i64;
    for index in first.max(0)..=last {
        if index % 2 == 0 {
            continue;
        }
        let time = index as f64 * half;
        ticks.push(RulerTick {
            time,
            x: to_pixel(time),
            kind: TickKind::Intermediate {
                label: document.format_time(time),
                opacity: spacing.intermediate_opacity,
            },
        });
    }
    ticks.sort_by(|a, b| a.time.total_cmp(&b.time));
}

/// Round up to the next 1, 2 or 5 times a power of ten.
pub fn round_to_nice_number(value: f64) -> f64 {
    if value <= 0.0 || !value.is_finite() {
        return 1.0;
    }

    let magnitude = 10_f64.powf(value.log10().floor());
    let normalized = value / magnitude;

    let nice_normalized = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };

    nice_normalized * magnitude
}
