//! Timeline domain entry point.
//!
//! Exposes the viewport controller together with time-domain utilities and
//! ruler subdivision.

pub mod ruler;
pub mod time_domain;
pub mod zoom_controller;

pub use ruler::{RulerSpacing, RulerTick, TickKind};
pub use time_domain::{DocumentInfo, TimeRange, TimeUnit};
pub use zoom_controller::{ScrollbarGeometry, ViewportMapping, ViewportSnapshot, ZoomController};
