//! Viewport and rendering: time/pixel mapping, ruler and scrollbar geometry,
//! and the per-row waveform renderers.

pub mod canvas;
pub mod timeline;
