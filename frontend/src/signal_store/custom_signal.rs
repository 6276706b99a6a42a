//! Derived signals assembled from bit-range slices of other signals.

use indexmap::IndexMap;
use shared::{BitRange, SignalId, Transition, unknown_value};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CustomSignalId(pub u32);

impl fmt::Display for CustomSignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "custom#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CustomSignal {
    pub id: CustomSignalId,
    pub ranges: Vec<BitRange>,
    /// `None` while at least one source has no data yet.
    pub transitions: Option<Vec<Transition>>,
}

impl CustomSignal {
    pub fn width(&self) -> u32 {
        self.ranges.iter().map(BitRange::width).sum()
    }

    pub fn is_resolved(&self) -> bool {
        self.transitions.is_some()
    }

    pub fn depends_on(&self, source: SignalId) -> bool {
        self.ranges.iter().any(|range| range.source == source)
    }
}

/// Content-addressed registry: identical descriptor lists map to one id.
#[derive(Debug, Default)]
pub struct CustomSignals {
    signals: IndexMap<CustomSignalId, CustomSignal>,
    by_ranges: HashMap<Vec<BitRange>, CustomSignalId>,
    next_id: u32,
}

impl CustomSignals {
    /// Returns the id for `ranges` and whether it was newly created.
    pub fn get_or_create(&mut self, ranges: Vec<BitRange>) -> (CustomSignalId, bool) {
        if let Some(id) = self.by_ranges.get(&ranges) {
            return (*id, false);
        }
        let id = CustomSignalId(self.next_id);
        self.next_id += 1;
        self.by_ranges.insert(ranges.clone(), id);
        self.signals.insert(
            id,
            CustomSignal {
                id,
                ranges,
                transitions: None,
            },
        );
        (id, true)
    }

    pub fn get(&self, id: CustomSignalId) -> Option<&CustomSignal> {
        self.signals.get(&id)
    }

    pub fn dependents_of(&self, source: SignalId) -> Vec<CustomSignalId> {
        self.signals
            .values()
            .filter(|signal| signal.depends_on(source))
            .map(|signal| signal.id)
            .collect()
    }

    pub fn set_transitions(&mut self, id: CustomSignalId, transitions: Option<Vec<Transition>>) {
        if let Some(signal) = self.signals.get_mut(&id) {
            signal.transitions = transitions;
        }
    }

    pub fn clear(&mut self) {
        self.signals.clear();
        self.by_ranges.clear();
        self.next_id = 0;
    }
}

/// Extract bits `msb..=lsb` from an msb-first value of `source_width` bits.
/// Positions at or above the source width are padded with `x`; positions the
/// string itself omits are zero-extended.
pub fn slice_bits(value: &str, source_width: u32, msb: u32, lsb: u32) -> String {
    let bytes = value.as_bytes();
    let len = bytes.len() as u32;
    (lsb..=msb)
        .rev()
        .map(|bit| {
            if bit >= source_width {
                'x'
            } else if bit < len {
                char::from(bytes[(len - 1 - bit) as usize])
            } else {
                '0'
            }
        })
        .collect()
}

/// A source as seen by the derivation: declared width plus its transitions.
pub struct SourceView<'a> {
    pub width: u32,
    pub transitions: &'a [Transition],
}

/// Compute a derived transition list. Every change time of every source
/// yields a candidate value built by concatenating each range's slice in
/// descriptor order; consecutive duplicates collapse.
pub fn derive_transitions(ranges: &[BitRange], sources: &[SourceView<'_>]) -> Vec<Transition> {
    debug_assert_eq!(ranges.len(), sources.len());
    let mut cursors = vec![0usize; sources.len()];
    let mut derived: Vec<Transition> = Vec::new();

    loop {
        let next_time = sources
            .iter()
            .zip(&cursors)
            .filter_map(|(source, cursor)| source.transitions.get(*cursor).map(|t| t.time))
            .min();
        let Some(time) = next_time else {
            break;
        };

        let mut value = String::new();
        for ((range, source), cursor) in ranges.iter().zip(sources).zip(cursors.iter_mut()) {
            while source
                .transitions
                .get(*cursor)
                .is_some_and(|transition| transition.time <= time)
            {
                *cursor += 1;
            }
            match cursor.checked_sub(1).and_then(|index| source.transitions.get(index)) {
                Some(current) => {
                    value.push_str(&slice_bits(&current.value, source.width, range.msb, range.lsb))
                }
                None => value.push_str(&unknown_value(range.width())),
            }
        }

        if derived.last().is_some_and(|last| last.value == value) {
            continue;
        }
        derived.push(Transition::new(time, value));
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(time: u64, value: &str) -> Transition {
        Transition::new(time, value)
    }

    #[test]
    fn slices_middle_bits() {
        let source = [t(0, "1010"), t(5, "1100")];
        let ranges = [BitRange::new(SignalId(1), 2, 1)];
        let derived = derive_transitions(
            &ranges,
            &[SourceView {
                width: 4,
                transitions: &source,
            }],
        );
        assert_eq!(derived, vec![t(0, "01"), t(5, "10")]);
    }

    #[test]
    fn pads_bits_beyond_source_width() {
        assert_eq!(slice_bits("10", 2, 3, 0), "xx10");
        assert_eq!(slice_bits("1", 4, 3, 0), "0001");
    }

    #[test]
    fn collapses_unchanged_slices() {
        let source = [t(0, "0001"), t(3, "0011"), t(9, "1011")];
        let ranges = [BitRange::new(SignalId(1), 3, 2)];
        let derived = derive_transitions(
            &ranges,
            &[SourceView {
                width: 4,
                transitions: &source,
            }],
        );
        assert_eq!(derived, vec![t(0, "00"), t(9, "10")]);
    }

    #[test]
    fn concatenates_multiple_sources() {
        let a = [t(0, "1"), t(4, "0")];
        let b = [t(0, "00"), t(2, "11")];
        let ranges = [BitRange::new(SignalId(1), 0, 0), BitRange::new(SignalId(2), 1, 0)];
        let derived = derive_transitions(
            &ranges,
            &[
                SourceView {
                    width: 1,
                    transitions: &a,
                },
                SourceView {
                    width: 2,
                    transitions: &b,
                },
            ],
        );
        assert_eq!(derived, vec![t(0, "100"), t(2, "111"), t(4, "011")]);
    }

    #[test]
    fn identical_descriptors_share_an_id() {
        let mut registry = CustomSignals::default();
        let ranges = vec![BitRange::new(SignalId(4), 7, 0)];
        let (first, created) = registry.get_or_create(ranges.clone());
        let (second, created_again) = registry.get_or_create(ranges);
        assert!(created);
        assert!(!created_again);
        assert_eq!(first, second);
        assert_eq!(registry.dependents_of(SignalId(4)), vec![first]);
    }
}
