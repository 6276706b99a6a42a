//! Waveform renderers.
//!
//! Renderers are pure: they take a row's windowed transitions and a resolved
//! [`RenderContext`] and produce a [`DrawList`] for whatever backend paints it.

pub mod analog;
pub mod binary;
pub mod draw_list;
pub mod multi_bit;
pub mod rendering;
pub mod window;

pub use analog::{AnalogMode, AnalogRenderer, ValueEvaluator, default_value_range};
pub use binary::BinaryRenderer;
pub use draw_list::{Color, DrawCommand, DrawList, Point, TextAlign};
pub use multi_bit::MultiBitRenderer;
pub use rendering::{
    RowDrawRequest, SignalState, WaveformRenderer, classify_signal_state, draw_row, renderer_for, state_color,
};
pub use window::{RenderContext, RenderWindow, Segment, SegmentKind, WindowSample, build_segments};
