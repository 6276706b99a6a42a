//! Time domain for the viewer timeline
//!
//! Document times are integer ticks of the document's time unit. Viewport
//! math works on fractional ticks, so the visible window is a pair of `f64`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of one document time tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum TimeUnit {
    Femtoseconds,
    Picoseconds,
    #[default]
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl TimeUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Femtoseconds => "fs",
            TimeUnit::Picoseconds => "ps",
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "μs",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
        }
    }

    /// The next coarser unit, 1000 ticks of this one.
    pub fn coarser(self) -> Option<TimeUnit> {
        match self {
            TimeUnit::Femtoseconds => Some(TimeUnit::Picoseconds),
            TimeUnit::Picoseconds => Some(TimeUnit::Nanoseconds),
            TimeUnit::Nanoseconds => Some(TimeUnit::Microseconds),
            TimeUnit::Microseconds => Some(TimeUnit::Milliseconds),
            TimeUnit::Milliseconds => Some(TimeUnit::Seconds),
            TimeUnit::Seconds => None,
        }
    }

    /// Pick the coarsest unit in which `ticks` (of `self`) is still >= 1, and
    /// return it with the divisor that converts ticks into it.
    pub fn scaled_for(self, ticks: f64) -> (TimeUnit, f64) {
        let mut unit = self;
        let mut divisor = 1.0;
        while let Some(next) = unit.coarser() {
            if ticks.abs() < divisor * 1000.0 {
                break;
            }
            unit = next;
            divisor *= 1000.0;
        }
        (unit, divisor)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Static facts about the open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Last time of the global range `[0, time_stop]`.
    pub time_stop: u64,
    pub time_unit: TimeUnit,
}

impl DocumentInfo {
    pub fn new(time_stop: u64, time_unit: TimeUnit) -> Self {
        DocumentInfo {
            time_stop,
            time_unit,
        }
    }

    pub fn format_time(&self, time: f64) -> String {
        let (unit, divisor) = self.time_unit.scaled_for(time);
        format!("{}{}", format_axis_number(time / divisor), unit)
    }
}

/// Shortest readable rendering of an axis value: fewer decimals for larger
/// magnitudes, trailing zeros trimmed.
pub fn format_axis_number(value: f64) -> String {
    let mut s = if value.abs() >= 100.0 {
        format!("{:.0}", value.round())
    } else if value.abs() >= 10.0 {
        format!("{:.1}", value)
    } else if value.abs() >= 1.0 {
        format!("{:.2}", value)
    } else {
        format!("{:.3}", value)
    };

    if let Some(pos) = s.find('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.len() > pos && s.ends_with('.') {
            s.pop();
        }
    }

    s
}

/// A visible time window, in fractional document ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        TimeRange {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn duration(self) -> f64 {
        self.end - self.start
    }

    pub fn contains(self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }

    pub fn center(self) -> f64 {
        self.start + self.duration() / 2.0
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} → {:.3}", self.start, self.end)
    }
}
