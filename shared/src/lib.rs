use serde::{Deserialize, Serialize};
use std::fmt;

mod var_format;

pub use var_format::VarFormat;

// ===== MESSAGE TYPES =====

/// Requests sent from the viewer to the data source (parser or remote server).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum UpMsg {
    RequestSignalData { signal_ids: Vec<SignalId> },
    RequestEnumData { enums: Vec<EnumRef> },
}

/// Asynchronous deliveries from the data source. Chunks of different signals
/// may interleave in any order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum DownMsg {
    WaveformChunk {
        signal_id: SignalId,
        chunk_index: usize,
        total_chunks: usize,
        payload: ChunkPayload,
        min: f64,
        max: f64,
    },
    CompressedWaveformChunk {
        signal_id: SignalId,
        signal_width: u32,
        chunk_index: usize,
        total_chunks: usize,
        compressed_bytes: Vec<u8>,
        original_size: usize,
        min: f64,
        max: f64,
    },
    EnumChunk {
        enum_name: String,
        chunk_index: usize,
        total_chunks: usize,
        payload: String,
    },
    SignalError {
        signal_id: SignalId,
        error: String,
    },
}

/// A plain waveform chunk is either a fragment of serialized text or an
/// already decoded run of transitions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ChunkPayload {
    Text(String),
    Transitions(Vec<Transition>),
}

// ===== CORE DATA TYPES =====

/// Opaque identifier the data source uses for a signal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct SignalId(pub u32);

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal#{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignalEncoding {
    #[default]
    BitVector,
    Real,
    String,
}

/// A single recorded value change. Serialized as a `[time, value]` pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(from = "(u64, String)", into = "(u64, String)")]
pub struct Transition {
    pub time: u64,
    pub value: String,
}

impl Transition {
    pub fn new(time: u64, value: impl Into<String>) -> Self {
        Transition {
            time,
            value: value.into(),
        }
    }
}

impl From<(u64, String)> for Transition {
    fn from((time, value): (u64, String)) -> Self {
        Transition { time, value }
    }
}

impl From<Transition> for (u64, String) {
    fn from(transition: Transition) -> Self {
        (transition.time, transition.value)
    }
}

/// Reference to an enum type, resolved by the data source through the
/// signal that declares it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumRef {
    pub name: String,
    pub source_id: SignalId,
}

/// Bit-range descriptor of a derived signal: bits `msb..=lsb` of `source`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    pub source: SignalId,
    pub msb: u32,
    pub lsb: u32,
}

impl BitRange {
    pub fn new(source: SignalId, msb: u32, lsb: u32) -> Self {
        BitRange {
            source,
            msb: msb.max(lsb),
            lsb: msb.min(lsb),
        }
    }

    pub fn width(&self) -> u32 {
        self.msb.abs_diff(self.lsb) + 1
    }
}

// ===== NINE-STATE UTILITIES =====

/// Bit-vector characters beyond strict 0/1.
pub const NINE_STATE_MARKERS: [char; 7] = ['x', 'z', 'u', 'w', 'l', 'h', '-'];

pub fn is_nine_state_char(c: char) -> bool {
    NINE_STATE_MARKERS.contains(&c.to_ascii_lowercase())
}

pub fn is_bit_char(c: char) -> bool {
    c == '0' || c == '1' || is_nine_state_char(c)
}

/// True when every character is a strict `0` or `1`.
pub fn is_two_state(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b == b'0' || b == b'1')
}

/// True when the value looks like a bit vector (possibly with nine-state markers).
pub fn is_bit_vector(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_bit_char)
}

/// The all-unknown value of a given width.
pub fn unknown_value(width: u32) -> String {
    "x".repeat(width.max(1) as usize)
}
