use std::path::PathBuf;

/// Failures while reassembling a chunked transfer. These never escape the
/// session: the affected signal is left without data and the error is logged.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    #[error("frame claims {original_size} bytes from {compressed_size} compressed bytes")]
    OversizedFrame { original_size: usize, compressed_size: usize },
    #[error("decompressed {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("record stream ends mid-record ({trailing} trailing bytes, record size {record_size})")]
    TruncatedRecord { trailing: usize, record_size: usize },
    #[error("malformed chunk payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid color '{value}' for theme.{field}")]
    InvalidColor { field: &'static str, value: String },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
