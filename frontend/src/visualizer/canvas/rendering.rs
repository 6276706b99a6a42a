//! Renderer dispatch and helpers shared by the waveform renderers.

use super::analog::{AnalogMode, AnalogRenderer, ValueEvaluator};
use super::binary::BinaryRenderer;
use super::draw_list::{Color, DrawList};
use super::multi_bit::MultiBitRenderer;
use super::window::{RenderContext, RenderWindow};
use crate::config::ThemeColors;
use crate::rows::RenderType;
use shared::{SignalEncoding, Transition, is_bit_vector, is_two_state};

/// Turns one row's windowed transitions into drawing instructions.
/// Implementations must accept empty and single-sample windows.
pub trait WaveformRenderer {
    fn render(&self, window: &RenderWindow<'_>, ctx: &RenderContext) -> DrawList;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalState {
    Regular,
    HighImpedance,
    Unknown,
    Uninitialized,
}

/// Classify a raw value. Only bit vectors carry nine-state markers; real and
/// string values are always regular.
pub fn classify_signal_state(value: &str) -> SignalState {
    if !is_bit_vector(value) || is_two_state(value) {
        return SignalState::Regular;
    }
    let normalized = value.to_ascii_uppercase();
    if normalized.bytes().all(|b| b == b'Z') {
        SignalState::HighImpedance
    } else if normalized.bytes().all(|b| b == b'U') {
        SignalState::Uninitialized
    } else {
        SignalState::Unknown
    }
}

/// Overlay color for a nine-state value, `None` for regular values.
pub fn state_color(state: SignalState, colors: &ThemeColors) -> Option<Color> {
    match state {
        SignalState::Regular => None,
        SignalState::HighImpedance => Some(colors.high_impedance),
        SignalState::Unknown | SignalState::Uninitialized => Some(colors.unknown),
    }
}

pub fn truncate_value_text(value: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let char_count = value.chars().count();
    if char_count <= max_chars {
        return value.to_string();
    }
    if max_chars <= 3 {
        value.chars().take(max_chars).collect()
    } else {
        let mut truncated: String = value.chars().take(max_chars - 3).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Select the renderer for a row.
pub fn renderer_for(
    render_type: RenderType,
    encoding: SignalEncoding,
    width: u32,
    value_range: (f64, f64),
) -> Box<dyn WaveformRenderer> {
    match render_type {
        RenderType::Binary => Box::new(BinaryRenderer),
        RenderType::MultiBit => Box::new(MultiBitRenderer),
        RenderType::Linear { signed } => Box::new(AnalogRenderer {
            mode: AnalogMode::Linear,
            evaluator: ValueEvaluator::for_signal(encoding, width, signed),
            range: value_range,
        }),
        RenderType::Stepped { signed } => Box::new(AnalogRenderer {
            mode: AnalogMode::Stepped,
            evaluator: ValueEvaluator::for_signal(encoding, width, signed),
            range: value_range,
        }),
    }
}

/// Everything needed to draw one row.
#[derive(Debug, Clone, Copy)]
pub struct RowDrawRequest<'a> {
    pub render_type: RenderType,
    pub encoding: SignalEncoding,
    pub width: u32,
    pub value_range: (f64, f64),
    pub transitions: &'a [Transition],
    pub formatted: Option<&'a [String]>,
}

/// Draw one row. `None` means there was no data to draw and the row should be
/// retried on the next pass.
pub fn draw_row(request: RowDrawRequest<'_>, ctx: &RenderContext) -> Option<DrawList> {
    if request.transitions.is_empty() {
        return None;
    }
    let window = RenderWindow::build(request.transitions, request.formatted, ctx.window);
    if window.is_empty() {
        return None;
    }
    let renderer = renderer_for(
        request.render_type,
        request.encoding,
        request.width,
        request.value_range,
    );
    Some(renderer.render(&window, ctx))
}
