//! Reassembly of chunked and compressed transfers.
//!
//! A transfer exists from its first chunk until every index `0..total` has
//! arrived; chunks may arrive in any order and a repeated index overwrites
//! the earlier copy.

use crate::error::ChunkError;
use shared::{ChunkPayload, SignalId, Transition};
use std::collections::HashMap;

/// Size of the little-endian delta-time prefix of a compressed record.
const DELTA_TIME_BYTES: usize = 8;
/// Upper bound of the LZ4 block format's expansion ratio.
const LZ4_MAX_RATIO: usize = 255;

#[derive(Debug)]
struct ChunkTransfer<T> {
    loaded: Vec<bool>,
    payloads: Vec<Option<T>>,
}

impl<T> ChunkTransfer<T> {
    fn new(total_chunks: usize) -> Self {
        let total_chunks = total_chunks.max(1);
        ChunkTransfer {
            loaded: vec![false; total_chunks],
            payloads: (0..total_chunks).map(|_| None).collect(),
        }
    }

    fn total_chunks(&self) -> usize {
        self.loaded.len()
    }

    /// Store a chunk; returns true once every index is loaded.
    fn insert(&mut self, chunk_index: usize, payload: T) -> bool {
        self.loaded[chunk_index] = true;
        self.payloads[chunk_index] = Some(payload);
        self.loaded.iter().all(|loaded| *loaded)
    }

    fn into_ordered(self) -> impl Iterator<Item = T> {
        self.payloads.into_iter().flatten()
    }
}

#[derive(Debug)]
struct WaveformTransfer {
    chunks: ChunkTransfer<WaveformPiece>,
    min: f64,
    max: f64,
}

#[derive(Debug)]
enum WaveformPiece {
    Plain(ChunkPayload),
    Compressed(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressedFrame {
    pub signal_width: u32,
    pub original_size: usize,
}

/// Header fields shared by both waveform chunk kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkHeader {
    pub signal_id: SignalId,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledWaveform {
    pub signal_id: SignalId,
    pub transitions: Vec<Transition>,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Default)]
pub struct ChunkAssembler {
    waveforms: HashMap<SignalId, WaveformTransfer>,
    enums: HashMap<String, ChunkTransfer<String>>,
}

impl ChunkAssembler {
    pub fn in_flight(&self) -> usize {
        self.waveforms.len() + self.enums.len()
    }

    pub fn is_receiving(&self, signal_id: SignalId) -> bool {
        self.waveforms.contains_key(&signal_id)
    }

    /// Loaded flags of a pending transfer, for diagnostics.
    pub fn loaded_chunks(&self, signal_id: SignalId) -> Option<&[bool]> {
        self.waveforms
            .get(&signal_id)
            .map(|transfer| transfer.chunks.loaded.as_slice())
    }

    pub fn discard(&mut self, signal_id: SignalId) {
        self.waveforms.remove(&signal_id);
    }

    pub fn clear(&mut self) {
        self.waveforms.clear();
        self.enums.clear();
    }

    pub fn accept_waveform_chunk(
        &mut self,
        header: ChunkHeader,
        payload: ChunkPayload,
    ) -> Result<Option<AssembledWaveform>, ChunkError> {
        let Some(transfer) = self.waveform_transfer(header) else {
            return Ok(None);
        };
        if !transfer
            .chunks
            .insert(header.chunk_index, WaveformPiece::Plain(payload))
        {
            return Ok(None);
        }
        let Some(transfer) = self.waveforms.remove(&header.signal_id) else {
            return Ok(None);
        };
        let transitions = assemble_plain(transfer.chunks.into_ordered())?;
        Ok(Some(AssembledWaveform {
            signal_id: header.signal_id,
            transitions,
            min: transfer.min,
            max: transfer.max,
        }))
    }

    pub fn accept_compressed_chunk(
        &mut self,
        header: ChunkHeader,
        frame: CompressedFrame,
        compressed_bytes: Vec<u8>,
    ) -> Result<Option<AssembledWaveform>, ChunkError> {
        let Some(transfer) = self.waveform_transfer(header) else {
            return Ok(None);
        };
        if !transfer
            .chunks
            .insert(header.chunk_index, WaveformPiece::Compressed(compressed_bytes))
        {
            return Ok(None);
        }
        let Some(transfer) = self.waveforms.remove(&header.signal_id) else {
            return Ok(None);
        };
        let mut compressed = Vec::new();
        for piece in transfer.chunks.into_ordered() {
            if let WaveformPiece::Compressed(bytes) = piece {
                compressed.extend_from_slice(&bytes);
            }
        }
        let transitions = decode_compressed(&compressed, frame)?;
        Ok(Some(AssembledWaveform {
            signal_id: header.signal_id,
            transitions,
            min: transfer.min,
            max: transfer.max,
        }))
    }

    pub fn accept_enum_chunk(
        &mut self,
        enum_name: &str,
        chunk_index: usize,
        total_chunks: usize,
        payload: String,
    ) -> Result<Option<Vec<(String, String)>>, ChunkError> {
        let transfer = self
            .enums
            .entry(enum_name.to_string())
            .or_insert_with(|| ChunkTransfer::new(total_chunks));
        if chunk_index >= transfer.total_chunks() {
            log::warn!(
                "Ignoring enum chunk {} of '{}' ({} chunks expected)",
                chunk_index,
                enum_name,
                transfer.total_chunks()
            );
            return Ok(None);
        }
        if !transfer.insert(chunk_index, payload) {
            return Ok(None);
        }
        let Some(transfer) = self.enums.remove(enum_name) else {
            return Ok(None);
        };
        let text: String = transfer.into_ordered().collect();
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// The pending transfer for a chunk, created on first arrival. `None`
    /// when the chunk index is unusable.
    fn waveform_transfer(&mut self, header: ChunkHeader) -> Option<&mut WaveformTransfer> {
        let restart = self
            .waveforms
            .get(&header.signal_id)
            .is_some_and(|transfer| transfer.chunks.total_chunks() != header.total_chunks.max(1));
        if restart {
            log::warn!(
                "{} changed chunk count to {}, restarting transfer",
                header.signal_id,
                header.total_chunks
            );
            self.waveforms.remove(&header.signal_id);
        }
        let transfer = self
            .waveforms
            .entry(header.signal_id)
            .or_insert_with(|| WaveformTransfer {
                chunks: ChunkTransfer::new(header.total_chunks),
                min: header.min,
                max: header.max,
            });
        if header.chunk_index >= transfer.chunks.total_chunks() {
            log::warn!(
                "Ignoring chunk {} of {} ({} chunks expected)",
                header.chunk_index,
                header.signal_id,
                transfer.chunks.total_chunks()
            );
            return None;
        }
        Some(transfer)
    }
}

fn assemble_plain(pieces: impl Iterator<Item = WaveformPiece>) -> Result<Vec<Transition>, ChunkError> {
    let mut text = String::new();
    let mut transitions = Vec::new();
    for piece in pieces {
        match piece {
            WaveformPiece::Plain(ChunkPayload::Text(fragment)) => text.push_str(&fragment),
            WaveformPiece::Plain(ChunkPayload::Transitions(typed)) => transitions.extend(typed),
            WaveformPiece::Compressed(_) => {}
        }
    }
    if !text.trim().is_empty() {
        let mut parsed = parse_transition_text(&text)?;
        parsed.append(&mut transitions);
        transitions = parsed;
    }
    Ok(transitions)
}

/// Parse `[[time, value], ...]`. Values may be strings or bare numbers
/// (real-encoded signals).
pub fn parse_transition_text(text: &str) -> Result<Vec<Transition>, ChunkError> {
    let raw: Vec<(u64, serde_json::Value)> = serde_json::from_str(text)?;
    Ok(raw
        .into_iter()
        .map(|(time, value)| {
            let value = match value {
                serde_json::Value::String(value) => value,
                other => other.to_string(),
            };
            Transition::new(time, value)
        })
        .collect())
}

/// Decompress one frame and decode its `(delta time, value bytes)` records.
pub fn decode_compressed(compressed: &[u8], frame: CompressedFrame) -> Result<Vec<Transition>, ChunkError> {
    if frame.original_size > compressed.len().saturating_mul(LZ4_MAX_RATIO) {
        return Err(ChunkError::OversizedFrame {
            original_size: frame.original_size,
            compressed_size: compressed.len(),
        });
    }
    let decompressed = lz4_flex::block::decompress(compressed, frame.original_size)?;
    if decompressed.len() != frame.original_size {
        return Err(ChunkError::SizeMismatch {
            expected: frame.original_size,
            actual: decompressed.len(),
        });
    }
    decode_records(&decompressed, frame.signal_width as usize)
}

fn decode_records(bytes: &[u8], signal_width: usize) -> Result<Vec<Transition>, ChunkError> {
    let record_size = DELTA_TIME_BYTES + signal_width.max(1);
    let trailing = bytes.len() % record_size;
    if trailing != 0 {
        return Err(ChunkError::TruncatedRecord {
            trailing,
            record_size,
        });
    }
    let mut time = 0u64;
    let mut transitions = Vec::with_capacity(bytes.len() / record_size);
    for record in bytes.chunks_exact(record_size) {
        let (delta, value) = record.split_at(DELTA_TIME_BYTES);
        let mut delta_bytes = [0u8; DELTA_TIME_BYTES];
        delta_bytes.copy_from_slice(delta);
        time = time.saturating_add(u64::from_le_bytes(delta_bytes));
        transitions.push(Transition::new(time, value.iter().map(|b| bit_char(*b)).collect::<String>()));
    }
    Ok(transitions)
}

/// One value byte to one bit-vector character.
fn bit_char(byte: u8) -> char {
    match byte {
        0 => '0',
        1 => '1',
        2 => 'x',
        3 => 'z',
        b'0' | b'1' => char::from(byte),
        b if shared::is_nine_state_char(char::from(b)) => char::from(b).to_ascii_lowercase(),
        _ => 'x',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(signal: u32, chunk_index: usize, total_chunks: usize) -> ChunkHeader {
        ChunkHeader {
            signal_id: SignalId(signal),
            chunk_index,
            total_chunks,
            min: 0.0,
            max: 1.0,
        }
    }

    fn record(delta: u64, value: &[u8]) -> Vec<u8> {
        let mut bytes = delta.to_le_bytes().to_vec();
        bytes.extend_from_slice(value);
        bytes
    }

    #[test]
    fn reassembles_text_chunks_in_index_order() {
        let mut assembler = ChunkAssembler::default();
        let second = assembler
            .accept_waveform_chunk(header(1, 1, 2), ChunkPayload::Text(r#"[10,"1"]]"#.to_string()))
            .unwrap();
        assert!(second.is_none());
        assert!(assembler.is_receiving(SignalId(1)));

        let done = assembler
            .accept_waveform_chunk(header(1, 0, 2), ChunkPayload::Text(r#"[[0,"0"],"#.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(
            done.transitions,
            vec![Transition::new(0, "0"), Transition::new(10, "1")]
        );
        assert_eq!(assembler.in_flight(), 0);
    }

    #[test]
    fn duplicate_chunk_overwrites() {
        let mut assembler = ChunkAssembler::default();
        let first = ChunkPayload::Text(r#"[[0,"0"],"#.to_string());
        assembler.accept_waveform_chunk(header(1, 0, 2), first.clone()).unwrap();
        assembler.accept_waveform_chunk(header(1, 0, 2), first).unwrap();
        assert_eq!(assembler.loaded_chunks(SignalId(1)), Some(&[true, false][..]));
        let done = assembler
            .accept_waveform_chunk(header(1, 1, 2), ChunkPayload::Text(r#"[5,"1"]]"#.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(done.transitions.len(), 2);
    }

    #[test]
    fn typed_chunks_concatenate_directly() {
        let mut assembler = ChunkAssembler::default();
        assembler
            .accept_waveform_chunk(
                header(3, 1, 2),
                ChunkPayload::Transitions(vec![Transition::new(9, "1")]),
            )
            .unwrap();
        let done = assembler
            .accept_waveform_chunk(
                header(3, 0, 2),
                ChunkPayload::Transitions(vec![Transition::new(0, "0")]),
            )
            .unwrap()
            .unwrap();
        assert_eq!(done.transitions, vec![Transition::new(0, "0"), Transition::new(9, "1")]);
    }

    #[test]
    fn numeric_values_become_strings() {
        let parsed = parse_transition_text("[[0, 1.5], [4, \"2.25\"]]").unwrap();
        assert_eq!(parsed, vec![Transition::new(0, "1.5"), Transition::new(4, "2.25")]);
    }

    #[test]
    fn decodes_compressed_record() {
        let raw = record(10, b"1001");
        let compressed = lz4_flex::block::compress(&raw);
        let frame = CompressedFrame {
            signal_width: 4,
            original_size: raw.len(),
        };
        let mut assembler = ChunkAssembler::default();
        let done = assembler
            .accept_compressed_chunk(header(2, 0, 1), frame, compressed)
            .unwrap()
            .unwrap();
        assert_eq!(done.transitions, vec![Transition::new(10, "1001")]);
    }

    #[test]
    fn compressed_chunks_concatenate_before_decompressing() {
        let mut raw = record(10, &[1, 0]);
        raw.extend(record(5, &[2, 3]));
        let compressed = lz4_flex::block::compress(&raw);
        let (head, tail) = compressed.split_at(compressed.len() / 2);
        let frame = CompressedFrame {
            signal_width: 2,
            original_size: raw.len(),
        };
        let mut assembler = ChunkAssembler::default();
        assert!(
            assembler
                .accept_compressed_chunk(header(2, 1, 2), frame, tail.to_vec())
                .unwrap()
                .is_none()
        );
        let done = assembler
            .accept_compressed_chunk(header(2, 0, 2), frame, head.to_vec())
            .unwrap()
            .unwrap();
        assert_eq!(
            done.transitions,
            vec![Transition::new(10, "10"), Transition::new(15, "xz")]
        );
    }

    #[test]
    fn corrupt_frame_fails_and_clears_state() {
        let frame = CompressedFrame {
            signal_width: 4,
            original_size: 64,
        };
        let mut assembler = ChunkAssembler::default();
        let result = assembler.accept_compressed_chunk(header(5, 0, 1), frame, vec![0xff, 0x00, 0x13]);
        assert!(result.is_err());
        assert!(!assembler.is_receiving(SignalId(5)));
    }

    #[test]
    fn implausible_original_size_is_rejected() {
        let raw = record(10, b"1");
        let frame = CompressedFrame {
            signal_width: 1,
            original_size: usize::MAX,
        };
        let mut assembler = ChunkAssembler::default();
        let result = assembler.accept_compressed_chunk(header(6, 0, 1), frame, lz4_flex::block::compress(&raw));
        assert!(matches!(result, Err(ChunkError::OversizedFrame { .. })));
        assert!(!assembler.is_receiving(SignalId(6)));
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut assembler = ChunkAssembler::default();
        let result = assembler
            .accept_waveform_chunk(header(1, 4, 2), ChunkPayload::Text("[]".to_string()))
            .unwrap();
        assert!(result.is_none());
        assert_eq!(assembler.loaded_chunks(SignalId(1)), Some(&[false, false][..]));
    }

    #[test]
    fn enum_table_reassembles() {
        let mut assembler = ChunkAssembler::default();
        assert!(
            assembler
                .accept_enum_chunk("state_t", 1, 2, r#"["1","BUSY"]]"#.to_string())
                .unwrap()
                .is_none()
        );
        let table = assembler
            .accept_enum_chunk("state_t", 0, 2, r#"[["0","IDLE"],"#.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(
            table,
            vec![
                ("0".to_string(), "IDLE".to_string()),
                ("1".to_string(), "BUSY".to_string())
            ]
        );
    }
}
