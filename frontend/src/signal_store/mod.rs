//! Authoritative store of reassembled transitions.
//!
//! Signals are looked up by id only; rows and custom signals never hold
//! references into the store. Every merged sequence starts at time 0 and
//! ends at `time_stop`, so lookups do not special-case the boundaries.

pub mod custom_signal;
pub mod format_cache;

pub use custom_signal::{CustomSignal, CustomSignalId, CustomSignals};
pub use format_cache::{FormatCache, FormatKey, format_value};

use custom_signal::{SourceView, derive_transitions};
use shared::{BitRange, SignalEncoding, SignalId, Transition, unknown_value};
use std::collections::HashMap;

/// Anything a row can display: a source signal or a derived one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WaveKey {
    Signal(SignalId),
    Custom(CustomSignalId),
}

impl From<SignalId> for WaveKey {
    fn from(id: SignalId) -> Self {
        WaveKey::Signal(id)
    }
}

impl From<CustomSignalId> for WaveKey {
    fn from(id: CustomSignalId) -> Self {
        WaveKey::Custom(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalMeta {
    pub width: u32,
    pub encoding: SignalEncoding,
}

impl Default for SignalMeta {
    fn default() -> Self {
        SignalMeta {
            width: 1,
            encoding: SignalEncoding::BitVector,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalWaveform {
    pub meta: SignalMeta,
    pub transitions: Vec<Transition>,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Forward,
    Backward,
}

/// The transitions bracketing a query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueAtTime<'a> {
    /// Last transition strictly before the query time.
    pub before: Option<&'a Transition>,
    /// Transition exactly at the query time.
    pub at: Option<&'a Transition>,
}

impl<'a> ValueAtTime<'a> {
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.at.is_none()
    }

    pub fn len(&self) -> usize {
        usize::from(self.before.is_some()) + usize::from(self.at.is_some())
    }

    /// The value in effect at the query time.
    pub fn current(&self) -> Option<&'a Transition> {
        self.at.or(self.before)
    }
}

#[derive(Debug)]
pub struct SignalStore {
    time_stop: u64,
    metadata: HashMap<SignalId, SignalMeta>,
    waveforms: HashMap<SignalId, SignalWaveform>,
    custom_signals: CustomSignals,
    enums: HashMap<String, Vec<(String, String)>>,
    format_cache: FormatCache,
}

impl SignalStore {
    pub fn new(time_stop: u64) -> Self {
        SignalStore {
            time_stop,
            metadata: HashMap::new(),
            waveforms: HashMap::new(),
            custom_signals: CustomSignals::default(),
            enums: HashMap::new(),
            format_cache: FormatCache::default(),
        }
    }

    pub fn time_stop(&self) -> u64 {
        self.time_stop
    }

    pub fn reset(&mut self, time_stop: u64) {
        *self = SignalStore::new(time_stop);
    }

    pub fn declare_signal(&mut self, id: SignalId, meta: SignalMeta) {
        self.metadata.insert(id, meta);
    }

    /// Take the bit width a transfer carries when it differs from what
    /// was declared (or nothing was).
    pub fn adopt_width(&mut self, id: SignalId, width: u32) {
        if width == 0 {
            return;
        }
        let meta = self.metadata.entry(id).or_default();
        if meta.width != width {
            log::debug!("{} width {} -> {} from transfer", id, meta.width, width);
            meta.width = width;
        }
    }

    pub fn meta(&self, id: SignalId) -> SignalMeta {
        self.metadata.get(&id).copied().unwrap_or_default()
    }

    pub fn width(&self, key: WaveKey) -> u32 {
        match key {
            WaveKey::Signal(id) => self.meta(id).width,
            WaveKey::Custom(id) => self.custom_signals.get(id).map(CustomSignal::width).unwrap_or(1),
        }
    }

    pub fn encoding(&self, key: WaveKey) -> SignalEncoding {
        match key {
            WaveKey::Signal(id) => self.meta(id).encoding,
            WaveKey::Custom(_) => SignalEncoding::BitVector,
        }
    }

    pub fn has_data(&self, key: WaveKey) -> bool {
        self.transitions(key).is_some()
    }

    pub fn waveform(&self, id: SignalId) -> Option<&SignalWaveform> {
        self.waveforms.get(&id)
    }

    pub fn transitions(&self, key: WaveKey) -> Option<&[Transition]> {
        match key {
            WaveKey::Signal(id) => self.waveforms.get(&id).map(|w| w.transitions.as_slice()),
            WaveKey::Custom(id) => self
                .custom_signals
                .get(id)
                .and_then(|signal| signal.transitions.as_deref()),
        }
    }

    /// Analog bounds reported by the data source, if any.
    pub fn value_bounds(&self, key: WaveKey) -> Option<(f64, f64)> {
        match key {
            WaveKey::Signal(id) => self
                .waveforms
                .get(&id)
                .filter(|w| w.min.is_finite() && w.max.is_finite() && w.max > w.min)
                .map(|w| (w.min, w.max)),
            WaveKey::Custom(_) => None,
        }
    }

    /// Merge a fully reassembled transition list. Returns the custom signals
    /// that were re-derived from it.
    pub fn update_waveform(
        &mut self,
        id: SignalId,
        transitions: Vec<Transition>,
        min: f64,
        max: f64,
    ) -> Vec<CustomSignalId> {
        let meta = self.meta(id);
        let transitions = self.normalize(id, transitions, meta.width);
        log::debug!("Merged {} transitions for {}", transitions.len(), id);
        self.waveforms.insert(
            id,
            SignalWaveform {
                meta,
                transitions,
                min,
                max,
            },
        );
        self.format_cache.invalidate(WaveKey::Signal(id));
        self.rederive_dependents(id)
    }

    /// Store the "no data" waveform: unknown across the whole time range.
    pub fn fill_unknown(&mut self, id: SignalId) -> Vec<CustomSignalId> {
        let width = self.meta(id).width;
        self.update_waveform(id, vec![Transition::new(0, unknown_value(width))], 0.0, 0.0)
    }

    /// Sort, keep the last value of duplicated times, drop anything past
    /// `time_stop`, then pin both ends of the range.
    fn normalize(&self, id: SignalId, mut transitions: Vec<Transition>, width: u32) -> Vec<Transition> {
        transitions.sort_by_key(|transition| transition.time);
        let mut normalized: Vec<Transition> = Vec::with_capacity(transitions.len() + 2);
        let mut dropped = 0usize;
        for transition in transitions {
            if transition.time > self.time_stop {
                dropped += 1;
                continue;
            }
            match normalized.last_mut() {
                Some(last) if last.time == transition.time => *last = transition,
                _ => normalized.push(transition),
            }
        }
        if dropped > 0 {
            log::warn!("Dropped {} transitions of {} past time {}", dropped, id, self.time_stop);
        }

        if normalized.first().is_none_or(|first| first.time != 0) {
            normalized.insert(0, Transition::new(0, unknown_value(width)));
        }
        if normalized.last().is_some_and(|last| last.time != self.time_stop) {
            normalized.push(Transition::new(self.time_stop, unknown_value(width)));
        }
        normalized
    }

    // ===== CUSTOM SIGNALS =====

    /// Register (or find) the derived signal for `ranges` and try to resolve it.
    pub fn create_custom_signal(&mut self, ranges: Vec<BitRange>) -> (CustomSignalId, bool) {
        let ranges = ranges
            .into_iter()
            .map(|range| BitRange::new(range.source, range.msb, range.lsb))
            .collect();
        let (id, created) = self.custom_signals.get_or_create(ranges);
        if created {
            self.derive_custom_signal(id);
        }
        (id, created)
    }

    pub fn custom_signal(&self, id: CustomSignalId) -> Option<&CustomSignal> {
        self.custom_signals.get(id)
    }

    /// Source signals of a derived signal that still have no data.
    pub fn missing_sources(&self, id: CustomSignalId) -> Vec<SignalId> {
        let mut missing: Vec<SignalId> = self
            .custom_signals
            .get(id)
            .map(|signal| {
                signal
                    .ranges
                    .iter()
                    .map(|range| range.source)
                    .filter(|source| !self.waveforms.contains_key(source))
                    .collect()
            })
            .unwrap_or_default();
        missing.dedup();
        missing
    }

    fn rederive_dependents(&mut self, source: SignalId) -> Vec<CustomSignalId> {
        let dependents = self.custom_signals.dependents_of(source);
        for id in &dependents {
            self.derive_custom_signal(*id);
        }
        dependents
    }

    fn derive_custom_signal(&mut self, id: CustomSignalId) {
        let Some(signal) = self.custom_signals.get(id) else {
            return;
        };
        let sources: Option<Vec<SourceView<'_>>> = signal
            .ranges
            .iter()
            .map(|range| {
                self.waveforms.get(&range.source).map(|waveform| SourceView {
                    width: waveform.meta.width,
                    transitions: &waveform.transitions,
                })
            })
            .collect();
        let derived = sources.map(|sources| derive_transitions(&signal.ranges, &sources));
        if derived.is_none() {
            log::debug!("{} is waiting for source data", id);
        }
        self.custom_signals.set_transitions(id, derived);
        self.format_cache.invalidate(WaveKey::Custom(id));
    }

    // ===== ENUMS =====

    pub fn set_enum(&mut self, name: impl Into<String>, entries: Vec<(String, String)>) {
        let name = name.into();
        self.format_cache.invalidate_enum(&name);
        self.enums.insert(name, entries);
    }

    pub fn enum_table(&self, name: &str) -> Option<&[(String, String)]> {
        self.enums.get(name).map(Vec::as_slice)
    }

    pub fn has_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    // ===== FORMAT CACHE =====

    /// Formatted values parallel to the signal's transitions; `None` while
    /// the signal has no data.
    pub fn formatted_values(&mut self, key: WaveKey, format: &FormatKey) -> Option<&[String]> {
        self.formatted_waveform(key, format).map(|(_, formatted)| formatted)
    }

    /// Transitions together with their formatted values, for drawing.
    pub fn formatted_waveform(&mut self, key: WaveKey, format: &FormatKey) -> Option<(&[Transition], &[String])> {
        let encoding = self.encoding(key);
        let transitions = match key {
            WaveKey::Signal(id) => self.waveforms.get(&id).map(|w| w.transitions.as_slice()),
            WaveKey::Custom(id) => self
                .custom_signals
                .get(id)
                .and_then(|signal| signal.transitions.as_deref()),
        }?;
        let enum_table = format
            .enum_type
            .as_ref()
            .and_then(|name| self.enums.get(name))
            .map(Vec::as_slice);
        let formatted = self
            .format_cache
            .get_or_compute(key, format, transitions, encoding, enum_table);
        Some((transitions, formatted))
    }

    pub fn format_cache(&self) -> &FormatCache {
        &self.format_cache
    }

    pub fn format_cache_mut(&mut self) -> &mut FormatCache {
        &mut self.format_cache
    }

    // ===== LOOKUPS =====

    /// Transitions bracketing `time`. Empty for a missing time, a time past
    /// `time_stop`, or a signal without data.
    pub fn value_at_time(&self, key: WaveKey, time: Option<u64>) -> ValueAtTime<'_> {
        let (Some(time), Some(transitions)) = (time, self.transitions(key)) else {
            return ValueAtTime::default();
        };
        if time > self.time_stop {
            return ValueAtTime::default();
        }
        let index = transitions.partition_point(|transition| transition.time < time);
        ValueAtTime {
            before: index.checked_sub(1).map(|i| &transitions[i]),
            at: transitions.get(index).filter(|transition| transition.time == time),
        }
    }

    /// The transition closest to `time`; ties go to the earlier one.
    pub fn nearest_transition(&self, key: WaveKey, time: Option<u64>) -> Option<&Transition> {
        let time = time?;
        if time > self.time_stop {
            return None;
        }
        let transitions = self.transitions(key)?;
        let index = transitions.partition_point(|transition| transition.time < time);
        let before = index.checked_sub(1).map(|i| &transitions[i]);
        let after = transitions.get(index);
        match (before, after) {
            (Some(before), Some(after)) => {
                if after.time - time < time - before.time {
                    Some(after)
                } else {
                    Some(before)
                }
            }
            (before, after) => before.or(after),
        }
    }

    /// First transition strictly past `time` in `direction` whose value is in
    /// `value_filter`; any value matches an empty filter.
    pub fn next_edge(
        &self,
        key: WaveKey,
        time: u64,
        direction: EdgeDirection,
        value_filter: &[String],
    ) -> Option<&Transition> {
        let transitions = self.transitions(key)?;
        let matches = |transition: &&Transition| {
            value_filter.is_empty()
                || value_filter
                    .iter()
                    .any(|value| value.eq_ignore_ascii_case(&transition.value))
        };
        match direction {
            EdgeDirection::Forward => {
                let start = transitions.partition_point(|transition| transition.time <= time);
                transitions[start..].iter().find(matches)
            }
            EdgeDirection::Backward => {
                let end = transitions.partition_point(|transition| transition.time < time);
                transitions[..end].iter().rev().find(matches)
            }
        }
    }

    /// Annotation times: exact value matches for scalars, every transition
    /// of a vector when the filter is non-empty.
    pub fn all_edges(&self, value_filter: &[String], key: WaveKey) -> Vec<u64> {
        let Some(transitions) = self.transitions(key) else {
            return Vec::new();
        };
        if self.width(key) > 1 {
            if value_filter.is_empty() {
                return Vec::new();
            }
            return transitions.iter().map(|transition| transition.time).collect();
        }
        transitions
            .iter()
            .filter(|transition| {
                value_filter
                    .iter()
                    .any(|value| value.eq_ignore_ascii_case(&transition.value))
            })
            .map(|transition| transition.time)
            .collect()
    }
}
