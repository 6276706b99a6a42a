//! Waveform viewer core: chunked signal loading, the signal store, viewport
//! mapping and the waveform renderers, tied together by [`ViewerSession`].
//!
//! The host owns the event loop. It forwards data-source messages into
//! [`ViewerSession::handle_down_msg`], drains the session's relays, and turns
//! the [`DrawList`]s returned by [`ViewerSession::draw_row`] into pixels.

pub mod chunk_assembly;
pub mod config;
pub mod dataflow;
pub mod error;
pub mod rows;
pub mod session;
pub mod signal_data_service;
pub mod signal_store;
pub mod visualizer;

pub use config::{ThemeColors, ViewerConfig};
pub use error::{ChunkError, ConfigError};
pub use rows::{DisplayRow, RenderType, RowId};
pub use session::{ViewerEvent, ViewerSession};
pub use signal_data_service::{DataNotice, SignalDataService, SignalRequest, Waiter};
pub use signal_store::{CustomSignalId, EdgeDirection, FormatKey, SignalStore, WaveKey};
pub use visualizer::canvas::{DrawCommand, DrawList};
pub use visualizer::timeline::{DocumentInfo, TimeUnit, ViewportSnapshot};
