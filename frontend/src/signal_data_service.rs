//! Signal Data Service - single-flight, coalescing fetch pipeline
//!
//! Requests are queued, deduplicated and dispatched to the data source one
//! batch at a time. Chunks coming back are reassembled by `ChunkAssembler`
//! and merged into the `SignalStore`; the service reports who was waiting.

use crate::chunk_assembly::{AssembledWaveform, ChunkAssembler, ChunkHeader, CompressedFrame};
use crate::dataflow::Relay;
use crate::error::ChunkError;
use crate::rows::RowId;
use crate::signal_store::{CustomSignalId, SignalStore, WaveKey};
use indexmap::{IndexMap, IndexSet};
use shared::{DownMsg, EnumRef, SignalId, UpMsg};
use std::collections::HashSet;

// ===== DATA STRUCTURES =====

/// Something blocked on a signal's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waiter {
    Row(RowId),
    Custom(CustomSignalId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub signal_id: SignalId,
    pub waiter: Option<Waiter>,
}

impl SignalRequest {
    pub fn new(signal_id: SignalId) -> Self {
        SignalRequest {
            signal_id,
            waiter: None,
        }
    }

    pub fn for_row(signal_id: SignalId, row: RowId) -> Self {
        SignalRequest {
            signal_id,
            waiter: Some(Waiter::Row(row)),
        }
    }

    pub fn for_custom(signal_id: SignalId, custom: CustomSignalId) -> Self {
        SignalRequest {
            signal_id,
            waiter: Some(Waiter::Custom(custom)),
        }
    }
}

/// Outcome of a request or delivery, handed to the session for notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DataNotice {
    /// Data for the signal is in the store (freshly merged or already there).
    SignalReady {
        signal_id: SignalId,
        waiters: Vec<Waiter>,
        rederived: Vec<CustomSignalId>,
    },
    /// Reassembly failed; the signal has no data and may be requested again.
    SignalFailed {
        signal_id: SignalId,
        waiters: Vec<Waiter>,
    },
    EnumReady {
        name: String,
    },
}

/// Dispatch counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatistics {
    pub dispatches: usize,
    pub signals_requested: usize,
    pub merges: usize,
    pub failures: usize,
}

// ===== PUBLIC API =====

pub struct SignalDataService {
    up_msg_relay: Relay<UpMsg>,
    queued: Vec<SignalRequest>,
    queued_enums: Vec<EnumRef>,
    /// Dispatched signals still waiting for their last chunk.
    outstanding: IndexMap<SignalId, Vec<Waiter>>,
    requested_enums: HashSet<String>,
    batch_mode: bool,
    assembler: ChunkAssembler,
    statistics: ServiceStatistics,
}

impl SignalDataService {
    pub fn new(up_msg_relay: Relay<UpMsg>) -> Self {
        SignalDataService {
            up_msg_relay,
            queued: Vec::new(),
            queued_enums: Vec::new(),
            outstanding: IndexMap::new(),
            requested_enums: HashSet::new(),
            batch_mode: false,
            assembler: ChunkAssembler::default(),
            statistics: ServiceStatistics::default(),
        }
    }

    /// Queue signal and enum requests, dispatching immediately when no fetch
    /// is active. Waiters on a signal that is already in flight are attached
    /// to that fetch instead of being queued again.
    pub fn request_data(
        &mut self,
        store: &SignalStore,
        signal_requests: Vec<SignalRequest>,
        enum_requests: Vec<EnumRef>,
    ) -> Vec<DataNotice> {
        for request in signal_requests {
            match self.outstanding.get_mut(&request.signal_id) {
                Some(waiters) => {
                    if let Some(waiter) = request.waiter {
                        push_unique(waiters, waiter);
                    }
                }
                None => self.queued.push(request),
            }
        }
        self.queued_enums.extend(enum_requests);
        self.dispatch(store)
    }

    pub fn begin_batch(&mut self) {
        self.batch_mode = true;
    }

    /// Leave batch mode and fire one dispatch for everything queued.
    pub fn end_batch(&mut self, store: &SignalStore) -> Vec<DataNotice> {
        self.batch_mode = false;
        self.dispatch(store)
    }

    pub fn is_batch_mode(&self) -> bool {
        self.batch_mode
    }

    pub fn is_request_active(&self) -> bool {
        !self.outstanding.is_empty()
    }

    pub fn is_outstanding(&self, signal_id: SignalId) -> bool {
        self.outstanding.contains_key(&signal_id)
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn assembler(&self) -> &ChunkAssembler {
        &self.assembler
    }

    pub fn statistics(&self) -> ServiceStatistics {
        self.statistics
    }

    /// Feed one inbound message. Merges completed transfers into `store`.
    pub fn handle_down_msg(&mut self, store: &mut SignalStore, down_msg: DownMsg) -> Vec<DataNotice> {
        let mut notices = Vec::new();
        match down_msg {
            DownMsg::WaveformChunk {
                signal_id,
                chunk_index,
                total_chunks,
                payload,
                min,
                max,
            } => {
                let header = ChunkHeader {
                    signal_id,
                    chunk_index,
                    total_chunks,
                    min,
                    max,
                };
                let result = self.assembler.accept_waveform_chunk(header, payload);
                self.complete_waveform(store, signal_id, result, &mut notices);
            }
            DownMsg::CompressedWaveformChunk {
                signal_id,
                signal_width,
                chunk_index,
                total_chunks,
                compressed_bytes,
                original_size,
                min,
                max,
            } => {
                let header = ChunkHeader {
                    signal_id,
                    chunk_index,
                    total_chunks,
                    min,
                    max,
                };
                let frame = CompressedFrame {
                    signal_width,
                    original_size,
                };
                let result = self
                    .assembler
                    .accept_compressed_chunk(header, frame, compressed_bytes);
                if matches!(result, Ok(Some(_))) {
                    store.adopt_width(signal_id, signal_width);
                }
                self.complete_waveform(store, signal_id, result, &mut notices);
            }
            DownMsg::EnumChunk {
                enum_name,
                chunk_index,
                total_chunks,
                payload,
            } => match self
                .assembler
                .accept_enum_chunk(&enum_name, chunk_index, total_chunks, payload)
            {
                Ok(Some(entries)) => {
                    log::debug!("Loaded enum '{}' with {} entries", enum_name, entries.len());
                    store.set_enum(enum_name.clone(), entries);
                    notices.push(DataNotice::EnumReady { name: enum_name });
                }
                Ok(None) => {}
                Err(error) => {
                    log::warn!("Dropping enum '{}': {}", enum_name, error);
                    // allow a later request to fetch it again
                    self.requested_enums.remove(&enum_name);
                }
            },
            DownMsg::SignalError { signal_id, error } => {
                log::error!("Data source failed to load {}: {}", signal_id, error);
                self.assembler.discard(signal_id);
                let rederived = store.fill_unknown(signal_id);
                self.statistics.merges += 1;
                notices.push(DataNotice::SignalReady {
                    signal_id,
                    waiters: self.finish(signal_id),
                    rederived,
                });
            }
        }
        if !self.is_request_active() && !(self.queued.is_empty() && self.queued_enums.is_empty()) {
            notices.extend(self.dispatch(store));
        }
        notices
    }

    /// Drop all queued, outstanding and partially assembled state.
    pub fn reset(&mut self) {
        self.queued.clear();
        self.queued_enums.clear();
        self.outstanding.clear();
        self.requested_enums.clear();
        self.batch_mode = false;
        self.assembler.clear();
    }

    // ===== INTERNAL =====

    fn complete_waveform(
        &mut self,
        store: &mut SignalStore,
        signal_id: SignalId,
        result: Result<Option<AssembledWaveform>, ChunkError>,
        notices: &mut Vec<DataNotice>,
    ) {
        match result {
            Ok(Some(assembled)) => {
                let rederived =
                    store.update_waveform(signal_id, assembled.transitions, assembled.min, assembled.max);
                self.statistics.merges += 1;
                notices.push(DataNotice::SignalReady {
                    signal_id,
                    waiters: self.finish(signal_id),
                    rederived,
                });
            }
            Ok(None) => {}
            Err(error) => {
                log::error!("Failed to reassemble {}: {}", signal_id, error);
                self.assembler.discard(signal_id);
                self.statistics.failures += 1;
                notices.push(DataNotice::SignalFailed {
                    signal_id,
                    waiters: self.finish(signal_id),
                });
            }
        }
    }

    fn finish(&mut self, signal_id: SignalId) -> Vec<Waiter> {
        self.outstanding
            .shift_remove(&signal_id)
            .unwrap_or_default()
    }

    fn dispatch(&mut self, store: &SignalStore) -> Vec<DataNotice> {
        if self.batch_mode || self.is_request_active() {
            return Vec::new();
        }

        let mut ready: IndexMap<SignalId, Vec<Waiter>> = IndexMap::new();
        let mut signal_ids: IndexSet<SignalId> = IndexSet::new();
        for request in std::mem::take(&mut self.queued) {
            let waiters = if store.has_data(WaveKey::Signal(request.signal_id)) {
                ready.entry(request.signal_id).or_default()
            } else {
                signal_ids.insert(request.signal_id);
                self.outstanding.entry(request.signal_id).or_default()
            };
            if let Some(waiter) = request.waiter {
                push_unique(waiters, waiter);
            }
        }

        let mut enums = Vec::new();
        for enum_ref in std::mem::take(&mut self.queued_enums) {
            if store.has_enum(&enum_ref.name) || !self.requested_enums.insert(enum_ref.name.clone()) {
                continue;
            }
            enums.push(enum_ref);
        }

        if !signal_ids.is_empty() {
            log::debug!("Requesting data for {} signals", signal_ids.len());
            self.statistics.dispatches += 1;
            self.statistics.signals_requested += signal_ids.len();
            self.up_msg_relay.send(UpMsg::RequestSignalData {
                signal_ids: signal_ids.into_iter().collect(),
            });
        }
        if !enums.is_empty() {
            log::debug!("Requesting {} enum tables", enums.len());
            self.up_msg_relay.send(UpMsg::RequestEnumData { enums });
        }

        ready
            .into_iter()
            .map(|(signal_id, waiters)| DataNotice::SignalReady {
                signal_id,
                waiters,
                rederived: Vec::new(),
            })
            .collect()
    }
}

fn push_unique(waiters: &mut Vec<Waiter>, waiter: Waiter) {
    if !waiters.contains(&waiter) {
        waiters.push(waiter);
    }
}
