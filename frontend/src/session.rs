//! The viewer session: one open document's store, fetch pipeline, rows,
//! viewport and marker, owned together and passed around explicitly.
//!
//! Outbound traffic goes through two relays. Data requests leave on the
//! `up_msg_relay`; everything the host should react to (rows with new data,
//! redraws, selection, viewport changes) leaves on the `viewer_event_relay`.

use crate::config::{ThemeColors, ViewerConfig};
use crate::dataflow::Relay;
use crate::error::ConfigError;
use crate::rows::{DisplayRow, RenderType, RowArena, RowId, default_format};
use crate::signal_data_service::{DataNotice, SignalDataService, SignalRequest, Waiter};
use crate::signal_store::{
    CustomSignalId, EdgeDirection, FormatKey, SignalMeta, SignalStore, WaveKey, format_value,
};
use crate::visualizer::canvas::{
    Color, DrawList, RenderContext, RowDrawRequest, ValueEvaluator, default_value_range, draw_row,
};
use crate::visualizer::timeline::{DocumentInfo, RulerTick, ScrollbarGeometry, ViewportSnapshot, ZoomController};
use indexmap::IndexMap;
use shared::{BitRange, DownMsg, EnumRef, SignalEncoding, SignalId, UpMsg, VarFormat};

/// Notifications for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// New data for `signal`; `rows` should refresh their displayed value.
    RowsUpdated { signal: WaveKey, rows: Vec<RowId> },
    RedrawRequested,
    SelectionChanged(Option<RowId>),
    ViewportChanged(ViewportSnapshot),
    CustomSignalResolved(CustomSignalId),
}

/// Host notifications held back while batch mode is active.
#[derive(Debug, Default)]
struct PendingNotifications {
    redraw: bool,
    selection: Option<Option<RowId>>,
    viewport: Option<ViewportSnapshot>,
}

pub struct ViewerSession {
    config: ViewerConfig,
    colors: ThemeColors,
    document: DocumentInfo,
    store: SignalStore,
    data_service: SignalDataService,
    rows: RowArena,
    zoom: ZoomController,
    selected_row: Option<RowId>,
    marker: Option<u64>,
    viewer_event_relay: Relay<ViewerEvent>,
    batch: Option<PendingNotifications>,
}

impl ViewerSession {
    pub fn new(
        config: ViewerConfig,
        document: DocumentInfo,
        up_msg_relay: Relay<UpMsg>,
        viewer_event_relay: Relay<ViewerEvent>,
    ) -> Result<Self, ConfigError> {
        let colors = config.theme_colors()?;
        let zoom = ZoomController::new(config.viewport.clone(), document.time_stop);
        log::info!("Opened session with time range 0..{}", document.time_stop);
        Ok(ViewerSession {
            config,
            colors,
            document,
            store: SignalStore::new(document.time_stop),
            data_service: SignalDataService::new(up_msg_relay),
            rows: RowArena::default(),
            zoom,
            selected_row: None,
            marker: None,
            viewer_event_relay,
            batch: None,
        })
    }

    /// Drop everything tied to the current document and start over with
    /// `document`. The viewer width survives.
    pub fn reset(&mut self, document: DocumentInfo) {
        let viewer_width = self.zoom.mapping().viewer_width;
        self.document = document;
        self.store.reset(document.time_stop);
        self.data_service.reset();
        self.rows.clear();
        self.zoom = ZoomController::new(self.config.viewport.clone(), document.time_stop);
        self.zoom.set_viewer_width(viewer_width);
        let snapshot = self.zoom.zoom_to_fit();
        self.selected_row = None;
        self.marker = None;
        self.batch = None;
        log::info!("Session reset to time range 0..{}", document.time_stop);

        self.notify_selection(None);
        self.notify_viewport(snapshot);
    }

    // ===== ACCESSORS =====

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn document(&self) -> &DocumentInfo {
        &self.document
    }

    pub fn store(&self) -> &SignalStore {
        &self.store
    }

    pub fn data_service(&self) -> &SignalDataService {
        &self.data_service
    }

    pub fn rows(&self) -> &RowArena {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&DisplayRow> {
        self.rows.get(id)
    }

    pub fn viewport(&self) -> ViewportSnapshot {
        self.zoom.snapshot()
    }

    pub fn scrollbar(&self) -> ScrollbarGeometry {
        self.zoom.snapshot().scrollbar
    }

    pub fn ruler_ticks(&self) -> Vec<RulerTick> {
        self.zoom.ruler_ticks(&self.document)
    }

    pub fn selected_row(&self) -> Option<RowId> {
        self.selected_row
    }

    pub fn marker(&self) -> Option<u64> {
        self.marker
    }

    // ===== SIGNALS & DATA =====

    pub fn declare_signal(&mut self, id: SignalId, width: u32, encoding: SignalEncoding) {
        self.store.declare_signal(id, SignalMeta { width, encoding });
    }

    /// Queue data requests. Signals already loaded are reported right away
    /// (unless a fetch is in flight or batch mode is on).
    pub fn request_data(&mut self, signal_requests: Vec<SignalRequest>, enum_requests: Vec<EnumRef>) {
        let notices = self
            .data_service
            .request_data(&self.store, signal_requests, enum_requests);
        self.apply_notices(notices);
    }

    /// Feed one inbound message from the data source.
    pub fn handle_down_msg(&mut self, down_msg: DownMsg) {
        let notices = self.data_service.handle_down_msg(&mut self.store, down_msg);
        self.apply_notices(notices);
    }

    /// Request again every displayed signal that has no data and nothing in
    /// flight, e.g. after a failed transfer.
    pub fn retry_missing_data(&mut self) {
        let mut requests = Vec::new();
        for row in self.rows.iter() {
            if self.store.has_data(row.signal) {
                continue;
            }
            let pending = match row.signal {
                WaveKey::Signal(id) => vec![SignalRequest::for_row(id, row.id)],
                WaveKey::Custom(id) => self
                    .store
                    .missing_sources(id)
                    .into_iter()
                    .map(|source| SignalRequest::for_custom(source, id))
                    .collect(),
            };
            requests.extend(
                pending
                    .into_iter()
                    .filter(|request| !self.data_service.is_outstanding(request.signal_id)),
            );
        }
        if !requests.is_empty() {
            log::debug!("Retrying {} signal requests", requests.len());
            self.request_data(requests, Vec::new());
        }
    }

    /// Register a derived signal and fetch whatever sources it still lacks.
    pub fn create_custom_signal(&mut self, ranges: Vec<BitRange>) -> CustomSignalId {
        let (id, _created) = self.store.create_custom_signal(ranges);
        let requests: Vec<SignalRequest> = self
            .store
            .missing_sources(id)
            .into_iter()
            .map(|source| SignalRequest::for_custom(source, id))
            .collect();
        if requests.is_empty() {
            if self.store.has_data(WaveKey::Custom(id)) {
                self.send_event(ViewerEvent::CustomSignalResolved(id));
            }
        } else {
            self.request_data(requests, Vec::new());
        }
        id
    }

    // ===== BATCH MODE =====

    /// Hold back dispatches, redraws and selection changes until
    /// [`end_batch`](Self::end_batch).
    pub fn begin_batch(&mut self) {
        if self.batch.is_none() {
            self.batch = Some(PendingNotifications::default());
            self.data_service.begin_batch();
        }
    }

    /// One dispatch for everything queued, then one notification of each
    /// kind that was held back.
    pub fn end_batch(&mut self) {
        let Some(pending) = self.batch.take() else {
            return;
        };
        let notices = self.data_service.end_batch(&self.store);
        self.apply_notices(notices);
        if let Some(snapshot) = pending.viewport {
            self.send_event(ViewerEvent::ViewportChanged(snapshot));
        }
        if let Some(selection) = pending.selection {
            self.send_event(ViewerEvent::SelectionChanged(selection));
        }
        if pending.redraw || pending.viewport.is_some() {
            self.send_event(ViewerEvent::RedrawRequested);
        }
    }

    pub fn is_batch_mode(&self) -> bool {
        self.batch.is_some()
    }

    // ===== ROWS =====

    /// Show `signal` in a new row with the default format and render type,
    /// and request its data.
    pub fn add_row(&mut self, signal: WaveKey) -> RowId {
        let width = self.store.width(signal);
        let encoding = self.store.encoding(signal);
        let format = FormatKey::new(default_format(width));
        self.store.format_cache_mut().acquire(signal, &format);
        let row = self
            .rows
            .insert(signal, format, RenderType::default_for(width, encoding));

        let requests = match signal {
            WaveKey::Signal(id) => vec![SignalRequest::for_row(id, row)],
            WaveKey::Custom(id) => self
                .store
                .missing_sources(id)
                .into_iter()
                .map(|source| SignalRequest::for_custom(source, id))
                .collect(),
        };
        if requests.is_empty() {
            if self.store.has_data(signal) {
                self.send_event(ViewerEvent::RowsUpdated {
                    signal,
                    rows: vec![row],
                });
            }
            self.notify_redraw();
        } else {
            self.request_data(requests, Vec::new());
        }
        row
    }

    pub fn remove_row(&mut self, id: RowId) -> bool {
        if self.rows.remove(id).is_none() {
            return false;
        }
        if self.selected_row == Some(id) {
            self.select_row(None);
        }
        self.collect_format_garbage();
        self.notify_redraw();
        true
    }

    pub fn move_row(&mut self, id: RowId, index: usize) -> bool {
        let moved = self.rows.move_row(id, index);
        if moved {
            self.notify_redraw();
        }
        moved
    }

    pub fn set_row_format(&mut self, id: RowId, format: VarFormat) -> bool {
        let Some(row) = self.rows.get(id) else {
            return false;
        };
        let key = FormatKey {
            format,
            enum_type: row.format.enum_type.clone(),
        };
        self.replace_row_format(id, key);
        true
    }

    /// Name the enum type whose table labels this row, or `None` to go back
    /// to plain formatting. The table is fetched if not loaded yet.
    pub fn set_row_enum_type(&mut self, id: RowId, enum_type: Option<String>) -> bool {
        let Some(row) = self.rows.get(id) else {
            return false;
        };
        let key = FormatKey {
            format: row.format.format,
            enum_type: enum_type.clone(),
        };
        let source = match row.signal {
            WaveKey::Signal(signal_id) => Some(signal_id),
            WaveKey::Custom(custom_id) => self
                .store
                .custom_signal(custom_id)
                .and_then(|signal| signal.ranges.first())
                .map(|range| range.source),
        };
        self.replace_row_format(id, key);
        if let (Some(name), Some(source_id)) = (enum_type, source) {
            if !self.store.has_enum(&name) {
                self.request_data(Vec::new(), vec![EnumRef { name, source_id }]);
            }
        }
        true
    }

    pub fn set_row_render_type(&mut self, id: RowId, render_type: RenderType) -> bool {
        let Some(row) = self.rows.get_mut(id) else {
            return false;
        };
        row.render_type = render_type;
        row.rendered = false;
        self.notify_redraw();
        true
    }

    /// Override the analog scale; `None` falls back to the source bounds.
    pub fn set_row_value_range(&mut self, id: RowId, value_range: Option<(f64, f64)>) -> bool {
        let Some(row) = self.rows.get_mut(id) else {
            return false;
        };
        row.value_range = value_range;
        row.rendered = false;
        self.notify_redraw();
        true
    }

    /// Line colour for this row only; `None` restores the theme colour.
    pub fn set_row_color(&mut self, id: RowId, color: Option<Color>) -> bool {
        let Some(row) = self.rows.get_mut(id) else {
            return false;
        };
        row.color = color;
        self.notify_redraw();
        true
    }

    pub fn select_row(&mut self, id: Option<RowId>) {
        let id = id.filter(|id| self.rows.get(*id).is_some());
        if self.selected_row == id {
            return;
        }
        self.selected_row = id;
        self.notify_selection(id);
    }

    fn replace_row_format(&mut self, id: RowId, key: FormatKey) {
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        if row.format == key {
            return;
        }
        self.store.format_cache_mut().acquire(row.signal, &key);
        row.format = key;
        row.rendered = false;
        self.collect_format_garbage();
        self.notify_redraw();
    }

    fn collect_format_garbage(&mut self) {
        let displayed = self.rows.iter().map(|row| (row.signal, &row.format));
        self.store.format_cache_mut().collect_garbage(displayed);
    }

    // ===== VIEWPORT =====

    pub fn zoom(&mut self, amount: f64, focal_time: f64, focal_pixel: f64) -> ViewportSnapshot {
        let snapshot = self.zoom.zoom(amount, focal_time, focal_pixel);
        self.notify_viewport(snapshot);
        snapshot
    }

    pub fn set_viewport_range(&mut self, start: f64, end: f64) -> ViewportSnapshot {
        let snapshot = self.zoom.set_viewport_range(start, end);
        self.notify_viewport(snapshot);
        snapshot
    }

    pub fn scroll_to(&mut self, pixel_offset: f64) -> ViewportSnapshot {
        let snapshot = self.zoom.scroll_to(pixel_offset);
        self.notify_viewport(snapshot);
        snapshot
    }

    pub fn scroll_to_time(&mut self, time: f64) -> ViewportSnapshot {
        let snapshot = self.zoom.scroll_to_time(time);
        self.notify_viewport(snapshot);
        snapshot
    }

    pub fn zoom_to_fit(&mut self) -> ViewportSnapshot {
        let snapshot = self.zoom.zoom_to_fit();
        self.notify_viewport(snapshot);
        snapshot
    }

    pub fn set_viewer_width(&mut self, viewer_width: f64) -> ViewportSnapshot {
        let snapshot = self.zoom.set_viewer_width(viewer_width);
        self.notify_viewport(snapshot);
        snapshot
    }

    pub fn scroll_by_scrollbar(&mut self, thumb_left: f64) -> ViewportSnapshot {
        let snapshot = self.zoom.scroll_by_scrollbar(thumb_left);
        self.notify_viewport(snapshot);
        snapshot
    }

    // ===== DRAWING =====

    /// Draw one row for the current viewport. `None` leaves the row marked
    /// as not rendered so the next pass retries it.
    pub fn draw_row(&mut self, id: RowId) -> Option<DrawList> {
        let draw_list = self.render_row(id);
        if let Some(row) = self.rows.get_mut(id) {
            row.rendered = draw_list.is_some();
        }
        draw_list
    }

    fn render_row(&mut self, id: RowId) -> Option<DrawList> {
        let row = self.rows.get(id)?;
        let (key, format, render_type, value_range) =
            (row.signal, row.format.clone(), row.render_type, row.value_range);
        let mut colors = self.colors;
        if let Some(color) = row.color {
            colors.line = color;
        }
        let ctx = RenderContext::new(
            self.zoom.mapping(),
            &self.config.render,
            self.config.viewport.render_overlap_px,
            colors,
        );
        let encoding = self.store.encoding(key);
        let width = self.store.width(key);
        let bounds = value_range.or_else(|| self.store.value_bounds(key));

        let (transitions, formatted) = if render_type == RenderType::MultiBit {
            let (transitions, formatted) = self.store.formatted_waveform(key, &format)?;
            (transitions, Some(formatted))
        } else {
            (self.store.transitions(key)?, None)
        };
        let value_range = bounds.unwrap_or_else(|| match render_type {
            RenderType::Linear { signed } | RenderType::Stepped { signed } => {
                default_value_range(ValueEvaluator::for_signal(encoding, width, signed), width, transitions)
            }
            RenderType::Binary | RenderType::MultiBit => (0.0, 1.0),
        });
        let request = RowDrawRequest {
            render_type,
            encoding,
            width,
            value_range,
            transitions,
            formatted,
        };
        draw_row(request, &ctx)
    }

    /// Rows that have not been drawn with data yet.
    pub fn rows_pending_render(&self) -> Vec<RowId> {
        self.rows.pending_render()
    }

    // ===== MARKER & QUERIES =====

    pub fn set_marker(&mut self, time: Option<u64>) {
        self.marker = time.map(|time| time.min(self.document.time_stop));
        self.notify_redraw();
    }

    /// The row's formatted value at the marker, enum names applied.
    pub fn row_value_at_marker(&self, id: RowId) -> Option<String> {
        let row = self.rows.get(id)?;
        let value = self.store.value_at_time(row.signal, self.marker).current()?;
        let enum_table = row
            .format
            .enum_type
            .as_deref()
            .and_then(|name| self.store.enum_table(name));
        Some(format_value(
            &value.value,
            self.store.encoding(row.signal),
            &row.format,
            enum_table,
        ))
    }

    /// Time under `pixel`, snapped to the row's nearest transition when that
    /// transition lies within `snap_px` pixels.
    pub fn time_at_pixel_snapped(&self, id: RowId, pixel: f64, snap_px: f64) -> u64 {
        let mapping = self.zoom.mapping();
        let time = mapping
            .pixel_to_time(pixel)
            .clamp(0.0, self.document.time_stop as f64)
            .round() as u64;
        let Some(row) = self.rows.get(id) else {
            return time;
        };
        match self.store.nearest_transition(row.signal, Some(time)) {
            Some(nearest) if (mapping.time_to_pixel(nearest.time as f64) - pixel).abs() <= snap_px => nearest.time,
            _ => time,
        }
    }

    /// Move the marker to the row's next (or previous) transition whose
    /// value is in `value_filter`, scrolling it into view when needed.
    pub fn jump_to_edge(&mut self, id: RowId, direction: EdgeDirection, value_filter: &[String]) -> Option<u64> {
        let row = self.rows.get(id)?;
        let from = self.marker.unwrap_or(0);
        let time = self.store.next_edge(row.signal, from, direction, value_filter)?.time;
        self.set_marker(Some(time));
        if !self.zoom.snapshot().visible.contains(time as f64) {
            self.scroll_to_time(time as f64);
        }
        Some(time)
    }

    // ===== NOTIFICATIONS =====

    fn apply_notices(&mut self, notices: Vec<DataNotice>) {
        if notices.is_empty() {
            return;
        }
        for notice in notices {
            match notice {
                DataNotice::SignalReady {
                    signal_id,
                    waiters,
                    rederived,
                } => {
                    let mut rows = self.rows.rows_showing(WaveKey::Signal(signal_id));
                    for waiter in waiters {
                        if let Waiter::Row(row) = waiter {
                            if self.rows.get(row).is_some() && !rows.contains(&row) {
                                rows.push(row);
                            }
                        }
                    }
                    self.rows_updated(WaveKey::Signal(signal_id), rows);
                    for custom_id in rederived {
                        if !self.store.has_data(WaveKey::Custom(custom_id)) {
                            continue;
                        }
                        self.send_event(ViewerEvent::CustomSignalResolved(custom_id));
                        let rows = self.rows.rows_showing(WaveKey::Custom(custom_id));
                        self.rows_updated(WaveKey::Custom(custom_id), rows);
                    }
                }
                DataNotice::SignalFailed { signal_id, waiters } => {
                    log::warn!(
                        "{} has no data after a failed transfer ({} waiting)",
                        signal_id,
                        waiters.len()
                    );
                }
                DataNotice::EnumReady { name } => {
                    let mut by_signal: IndexMap<WaveKey, Vec<RowId>> = IndexMap::new();
                    for row in self.rows.rows_using_enum(&name) {
                        if let Some(display_row) = self.rows.get(row) {
                            by_signal.entry(display_row.signal).or_default().push(row);
                        }
                    }
                    for (signal, rows) in by_signal {
                        self.rows_updated(signal, rows);
                    }
                }
            }
        }
        self.notify_redraw();
    }

    fn rows_updated(&mut self, signal: WaveKey, rows: Vec<RowId>) {
        if rows.is_empty() {
            return;
        }
        for row in &rows {
            if let Some(display_row) = self.rows.get_mut(*row) {
                display_row.rendered = false;
            }
        }
        self.send_event(ViewerEvent::RowsUpdated { signal, rows });
    }

    fn notify_redraw(&mut self) {
        match self.batch.as_mut() {
            Some(pending) => pending.redraw = true,
            None => self.send_event(ViewerEvent::RedrawRequested),
        }
    }

    fn notify_selection(&mut self, selection: Option<RowId>) {
        match self.batch.as_mut() {
            Some(pending) => pending.selection = Some(selection),
            None => self.send_event(ViewerEvent::SelectionChanged(selection)),
        }
    }

    fn notify_viewport(&mut self, snapshot: ViewportSnapshot) {
        match self.batch.as_mut() {
            Some(pending) => pending.viewport = Some(snapshot),
            None => {
                self.send_event(ViewerEvent::ViewportChanged(snapshot));
                self.send_event(ViewerEvent::RedrawRequested);
            }
        }
    }

    fn send_event(&self, event: ViewerEvent) {
        self.viewer_event_relay.send(event);
    }
}
