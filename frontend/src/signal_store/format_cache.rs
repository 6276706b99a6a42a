//! Memoized formatted-value arrays, one per (signal, display format) pair.

use super::WaveKey;
use shared::{SignalEncoding, Transition, VarFormat, is_two_state};
use std::collections::HashMap;

/// A display format as a row configures it: the radix plus an optional enum
/// table that overrides it for known bit patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatKey {
    pub format: VarFormat,
    pub enum_type: Option<String>,
}

impl FormatKey {
    pub fn new(format: VarFormat) -> Self {
        FormatKey {
            format,
            enum_type: None,
        }
    }

    pub fn with_enum(format: VarFormat, enum_type: impl Into<String>) -> Self {
        FormatKey {
            format,
            enum_type: Some(enum_type.into()),
        }
    }
}

#[derive(Debug)]
struct FormatEntry {
    values: Vec<String>,
    ref_count: usize,
}

#[derive(Debug, Default)]
pub struct FormatCache {
    entries: HashMap<(WaveKey, FormatKey), FormatEntry>,
}

impl FormatCache {
    /// Formatted strings parallel to `transitions`, computed on first use.
    pub fn get_or_compute(
        &mut self,
        key: WaveKey,
        format: &FormatKey,
        transitions: &[Transition],
        encoding: SignalEncoding,
        enum_table: Option<&[(String, String)]>,
    ) -> &[String] {
        let entry = self
            .entries
            .entry((key, format.clone()))
            .or_insert_with(|| FormatEntry {
                values: Vec::new(),
                ref_count: 0,
            });
        // an entry created by `acquire` before data arrived is still empty
        if entry.values.len() != transitions.len() {
            entry.values = transitions
                .iter()
                .map(|transition| format_value(&transition.value, encoding, format, enum_table))
                .collect();
        }
        &entry.values
    }

    pub fn contains(&self, key: WaveKey, format: &FormatKey) -> bool {
        self.entries.contains_key(&(key, format.clone()))
    }

    pub fn ref_count(&self, key: WaveKey, format: &FormatKey) -> usize {
        self.entries
            .get(&(key, format.clone()))
            .map(|entry| entry.ref_count)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a displayed row as a consumer of this format.
    pub fn acquire(&mut self, key: WaveKey, format: &FormatKey) {
        self.entries
            .entry((key, format.clone()))
            .or_insert_with(|| FormatEntry {
                values: Vec::new(),
                ref_count: 0,
            })
            .ref_count += 1;
    }

    /// Drop computed values of a signal whose transitions changed. Counts
    /// survive so displayed rows keep their claim.
    pub fn invalidate(&mut self, key: WaveKey) {
        for ((entry_key, _), entry) in self.entries.iter_mut() {
            if *entry_key == key {
                entry.values.clear();
            }
        }
    }

    pub fn invalidate_enum(&mut self, enum_type: &str) {
        for ((_, format), entry) in self.entries.iter_mut() {
            if format.enum_type.as_deref() == Some(enum_type) {
                entry.values.clear();
            }
        }
    }

    /// Full collection pass: zero every count, recount from the displayed
    /// rows and evict entries nobody uses. Returns the number evicted.
    pub fn collect_garbage<'a>(
        &mut self,
        displayed: impl IntoIterator<Item = (WaveKey, &'a FormatKey)>,
    ) -> usize {
        for entry in self.entries.values_mut() {
            entry.ref_count = 0;
        }
        for (key, format) in displayed {
            if let Some(entry) = self.entries.get_mut(&(key, format.clone())) {
                entry.ref_count += 1;
            }
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.ref_count > 0);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            log::debug!("Evicted {} unused format caches", evicted);
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Format one raw value for display.
pub fn format_value(
    raw: &str,
    encoding: SignalEncoding,
    format: &FormatKey,
    enum_table: Option<&[(String, String)]>,
) -> String {
    if let Some(name) = enum_table.and_then(|table| lookup_enum(table, raw)) {
        return name.to_string();
    }
    match encoding {
        SignalEncoding::BitVector => format.format.format(raw),
        SignalEncoding::Real | SignalEncoding::String => raw.to_string(),
    }
}

fn lookup_enum<'a>(table: &'a [(String, String)], raw: &str) -> Option<&'a str> {
    let normalized = normalize_bits(raw);
    table
        .iter()
        .find(|(pattern, _)| pattern == raw || normalize_bits(pattern) == normalized)
        .map(|(_, name)| name.as_str())
}

/// Two-state patterns compare by numeric value, so leading zeros are ignored.
fn normalize_bits(value: &str) -> &str {
    if is_two_state(value) {
        let trimmed = value.trim_start_matches('0');
        if trimmed.is_empty() { "0" } else { trimmed }
    } else {
        value
    }
}
