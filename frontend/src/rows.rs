//! Display rows: the host's visible lines, each pointing at a signal by id.

use crate::signal_store::{FormatKey, WaveKey};
use indexmap::IndexMap;
use palette::Srgba;
use shared::{SignalEncoding, VarFormat};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub u32);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderType {
    Binary,
    MultiBit,
    Linear { signed: bool },
    Stepped { signed: bool },
}

impl RenderType {
    pub fn default_for(width: u32, encoding: SignalEncoding) -> Self {
        match encoding {
            SignalEncoding::Real => RenderType::Linear { signed: true },
            SignalEncoding::String => RenderType::MultiBit,
            SignalEncoding::BitVector if width == 1 => RenderType::Binary,
            SignalEncoding::BitVector => RenderType::MultiBit,
        }
    }
}

pub fn default_format(width: u32) -> VarFormat {
    if width == 1 {
        VarFormat::Binary
    } else {
        VarFormat::Hexadecimal
    }
}

#[derive(Debug, Clone)]
pub struct DisplayRow {
    pub id: RowId,
    pub signal: WaveKey,
    pub format: FormatKey,
    pub render_type: RenderType,
    /// Analog scale override; falls back to the source-reported bounds.
    pub value_range: Option<(f64, f64)>,
    pub color: Option<Srgba<u8>>,
    /// False until a draw pass found data for this row.
    pub rendered: bool,
}

/// Rows in display order.
#[derive(Debug, Default)]
pub struct RowArena {
    rows: IndexMap<RowId, DisplayRow>,
    next_id: u32,
}

impl RowArena {
    pub fn insert(&mut self, signal: WaveKey, format: FormatKey, render_type: RenderType) -> RowId {
        let id = RowId(self.next_id);
        self.next_id += 1;
        self.rows.insert(
            id,
            DisplayRow {
                id,
                signal,
                format,
                render_type,
                value_range: None,
                color: None,
                rendered: false,
            },
        );
        id
    }

    pub fn remove(&mut self, id: RowId) -> Option<DisplayRow> {
        self.rows.shift_remove(&id)
    }

    pub fn get(&self, id: RowId) -> Option<&DisplayRow> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut DisplayRow> {
        self.rows.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_showing(&self, signal: WaveKey) -> Vec<RowId> {
        self.rows
            .values()
            .filter(|row| row.signal == signal)
            .map(|row| row.id)
            .collect()
    }

    pub fn rows_using_enum(&self, enum_type: &str) -> Vec<RowId> {
        self.rows
            .values()
            .filter(|row| row.format.enum_type.as_deref() == Some(enum_type))
            .map(|row| row.id)
            .collect()
    }

    /// Rows that still need a successful draw pass.
    pub fn pending_render(&self) -> Vec<RowId> {
        self.rows
            .values()
            .filter(|row| !row.rendered)
            .map(|row| row.id)
            .collect()
    }

    /// Move a row to a new display position.
    pub fn move_row(&mut self, id: RowId, index: usize) -> bool {
        let Some(from) = self.rows.get_index_of(&id) else {
            return false;
        };
        let to = index.min(self.rows.len() - 1);
        self.rows.move_index(from, to);
        true
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::SignalId;

    #[test]
    fn default_render_type_by_width_and_encoding() {
        assert_eq!(RenderType::default_for(1, SignalEncoding::BitVector), RenderType::Binary);
        assert_eq!(RenderType::default_for(8, SignalEncoding::BitVector), RenderType::MultiBit);
        assert_eq!(
            RenderType::default_for(64, SignalEncoding::Real),
            RenderType::Linear { signed: true }
        );
    }

    #[test]
    fn rows_keep_display_order() {
        let mut arena = RowArena::default();
        let key = WaveKey::Signal(SignalId(1));
        let a = arena.insert(key, FormatKey::new(VarFormat::Binary), RenderType::Binary);
        let b = arena.insert(key, FormatKey::new(VarFormat::Hexadecimal), RenderType::MultiBit);
        let c = arena.insert(WaveKey::Signal(SignalId(2)), FormatKey::new(VarFormat::Binary), RenderType::Binary);

        assert!(arena.move_row(c, 0));
        let order: Vec<RowId> = arena.iter().map(|row| row.id).collect();
        assert_eq!(order, vec![c, a, b]);
        assert_eq!(arena.rows_showing(key), vec![a, b]);

        arena.remove(a);
        assert_eq!(arena.iter().map(|row| row.id).collect::<Vec<_>>(), vec![c, b]);
    }
}
