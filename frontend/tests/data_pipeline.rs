use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use shared::{BitRange, ChunkPayload, DownMsg, SignalEncoding, SignalId, Transition, UpMsg};
use waveview::dataflow::{drain, relay};
use waveview::{
    DocumentInfo, SignalRequest, TimeUnit, ViewerConfig, ViewerEvent, ViewerSession, WaveKey,
};

struct Viewer {
    session: ViewerSession,
    up_msgs: UnboundedReceiver<UpMsg>,
    events: UnboundedReceiver<ViewerEvent>,
}

fn viewer(time_stop: u64) -> Viewer {
    let (up_msg_relay, up_msgs) = relay();
    let (viewer_event_relay, events) = relay();
    let session = ViewerSession::new(
        ViewerConfig::default(),
        DocumentInfo::new(time_stop, TimeUnit::Nanoseconds),
        up_msg_relay,
        viewer_event_relay,
    )
    .unwrap();
    Viewer {
        session,
        up_msgs,
        events,
    }
}

fn text_chunk(signal: u32, chunk_index: usize, total_chunks: usize, payload: &str) -> DownMsg {
    DownMsg::WaveformChunk {
        signal_id: SignalId(signal),
        chunk_index,
        total_chunks,
        payload: ChunkPayload::Text(payload.to_string()),
        min: 0.0,
        max: 0.0,
    }
}

fn stored(session: &ViewerSession, key: WaveKey) -> Vec<(u64, String)> {
    session
        .store()
        .transitions(key)
        .unwrap_or_default()
        .iter()
        .map(|transition| (transition.time, transition.value.clone()))
        .collect()
}

fn pairs(expected: &[(u64, &str)]) -> Vec<(u64, String)> {
    expected
        .iter()
        .map(|&(time, value)| (time, value.to_string()))
        .collect()
}

#[test]
fn fifty_requests_in_batch_mode_make_one_dispatch() {
    let mut v = viewer(1000);
    v.session.begin_batch();
    for index in 0..50u32 {
        v.session
            .request_data(vec![SignalRequest::new(SignalId(index % 20))], Vec::new());
    }
    assert!(drain(&mut v.up_msgs).is_empty());

    v.session.end_batch();
    let messages = drain(&mut v.up_msgs);
    assert_eq!(
        messages,
        vec![UpMsg::RequestSignalData {
            signal_ids: (0..20).map(SignalId).collect(),
        }]
    );
}

#[test]
fn requests_during_a_fetch_ride_the_next_dispatch() {
    let mut v = viewer(100);
    v.session.add_row(WaveKey::Signal(SignalId(1)));
    v.session.add_row(WaveKey::Signal(SignalId(2)));
    v.session.add_row(WaveKey::Signal(SignalId(3)));
    assert_eq!(drain(&mut v.up_msgs).len(), 1);

    v.session.handle_down_msg(text_chunk(1, 0, 1, r#"[[0,"1"]]"#));
    assert_eq!(
        drain(&mut v.up_msgs),
        vec![UpMsg::RequestSignalData {
            signal_ids: vec![SignalId(2), SignalId(3)],
        }]
    );
}

#[test]
fn merged_signals_cover_the_whole_time_range() {
    let mut v = viewer(100);
    v.session.declare_signal(SignalId(1), 2, SignalEncoding::BitVector);
    v.session.add_row(WaveKey::Signal(SignalId(1)));
    v.session
        .handle_down_msg(text_chunk(1, 0, 1, r#"[[20,"10"],[5,"01"],[20,"11"],[150,"00"]]"#));

    assert_eq!(
        stored(&v.session, WaveKey::Signal(SignalId(1))),
        pairs(&[(0, "xx"), (5, "01"), (20, "11"), (100, "xx")])
    );
}

#[test]
fn duplicate_chunk_delivery_is_idempotent() {
    let deliver = |repeat_first: bool| {
        let mut v = viewer(50);
        v.session.add_row(WaveKey::Signal(SignalId(1)));
        v.session.handle_down_msg(text_chunk(1, 0, 2, r#"[[0,"0"],[10,"1"],"#));
        if repeat_first {
            v.session.handle_down_msg(text_chunk(1, 0, 2, r#"[[0,"0"],[10,"1"],"#));
        }
        v.session.handle_down_msg(text_chunk(1, 1, 2, r#"[20,"0"]]"#));
        stored(&v.session, WaveKey::Signal(SignalId(1)))
    };
    let once = deliver(false);
    assert_eq!(once, pairs(&[(0, "0"), (10, "1"), (20, "0"), (50, "x")]));
    assert_eq!(deliver(true), once);
}

#[test]
fn compressed_record_decodes_to_a_transition() {
    let mut v = viewer(100);
    v.session.declare_signal(SignalId(9), 4, SignalEncoding::BitVector);
    v.session.add_row(WaveKey::Signal(SignalId(9)));

    let mut record = 10u64.to_le_bytes().to_vec();
    record.extend_from_slice(b"1001");
    v.session.handle_down_msg(DownMsg::CompressedWaveformChunk {
        signal_id: SignalId(9),
        signal_width: 4,
        chunk_index: 0,
        total_chunks: 1,
        compressed_bytes: lz4_flex::block::compress(&record),
        original_size: record.len(),
        min: 0.0,
        max: 15.0,
    });

    assert_eq!(
        stored(&v.session, WaveKey::Signal(SignalId(9))),
        pairs(&[(0, "xxxx"), (10, "1001"), (100, "xxxx")])
    );
}

#[test]
fn compressed_transfer_supplies_width_of_undeclared_signal() {
    let mut v = viewer(100);
    v.session.add_row(WaveKey::Signal(SignalId(11)));

    let mut record = 10u64.to_le_bytes().to_vec();
    record.extend_from_slice(b"1001");
    v.session.handle_down_msg(DownMsg::CompressedWaveformChunk {
        signal_id: SignalId(11),
        signal_width: 4,
        chunk_index: 0,
        total_chunks: 1,
        compressed_bytes: lz4_flex::block::compress(&record),
        original_size: record.len(),
        min: 0.0,
        max: 15.0,
    });

    assert_eq!(v.session.store().width(WaveKey::Signal(SignalId(11))), 4);
    assert_eq!(
        stored(&v.session, WaveKey::Signal(SignalId(11))),
        pairs(&[(0, "xxxx"), (10, "1001"), (100, "xxxx")])
    );
}

#[test]
fn oversized_compressed_frame_fails_the_signal() {
    let mut v = viewer(100);
    v.session.add_row(WaveKey::Signal(SignalId(12)));
    drain(&mut v.up_msgs);

    let mut record = 0u64.to_le_bytes().to_vec();
    record.push(1);
    v.session.handle_down_msg(DownMsg::CompressedWaveformChunk {
        signal_id: SignalId(12),
        signal_width: 1,
        chunk_index: 0,
        total_chunks: 1,
        compressed_bytes: lz4_flex::block::compress(&record),
        original_size: usize::MAX,
        min: 0.0,
        max: 1.0,
    });

    assert!(!v.session.store().has_data(WaveKey::Signal(SignalId(12))));
    assert!(!v.session.data_service().is_request_active());
    v.session.retry_missing_data();
    assert_eq!(
        drain(&mut v.up_msgs),
        vec![UpMsg::RequestSignalData {
            signal_ids: vec![SignalId(12)],
        }]
    );
}

#[test]
fn broken_compressed_transfer_leaves_signal_requestable() {
    let mut v = viewer(100);
    v.session.add_row(WaveKey::Signal(SignalId(4)));
    drain(&mut v.up_msgs);

    v.session.handle_down_msg(DownMsg::CompressedWaveformChunk {
        signal_id: SignalId(4),
        signal_width: 1,
        chunk_index: 0,
        total_chunks: 1,
        compressed_bytes: vec![0xff, 0xff, 0xff],
        original_size: 9,
        min: 0.0,
        max: 1.0,
    });
    assert!(!v.session.store().has_data(WaveKey::Signal(SignalId(4))));
    assert!(!v.session.data_service().is_request_active());

    v.session.retry_missing_data();
    assert_eq!(
        drain(&mut v.up_msgs),
        vec![UpMsg::RequestSignalData {
            signal_ids: vec![SignalId(4)],
        }]
    );
}

#[test]
fn source_errors_render_as_unknown() {
    let mut v = viewer(100);
    v.session.declare_signal(SignalId(2), 3, SignalEncoding::BitVector);
    let row = v.session.add_row(WaveKey::Signal(SignalId(2)));
    drain(&mut v.events);

    v.session.handle_down_msg(DownMsg::SignalError {
        signal_id: SignalId(2),
        error: "variable not found".to_string(),
    });

    assert_eq!(
        stored(&v.session, WaveKey::Signal(SignalId(2))),
        pairs(&[(0, "xxx"), (100, "xxx")])
    );
    assert!(drain(&mut v.events).contains(&ViewerEvent::RowsUpdated {
        signal: WaveKey::Signal(SignalId(2)),
        rows: vec![row],
    }));
    assert!(v.session.draw_row(row).is_some());
}

#[test]
fn derived_signal_slices_source_bits() {
    let mut v = viewer(5);
    v.session.declare_signal(SignalId(1), 4, SignalEncoding::BitVector);
    let custom = v
        .session
        .create_custom_signal(vec![BitRange::new(SignalId(1), 2, 1)]);
    assert!(!v.session.store().has_data(WaveKey::Custom(custom)));

    v.session
        .handle_down_msg(text_chunk(1, 0, 1, r#"[[0,"1010"],[5,"1100"]]"#));
    assert_eq!(
        stored(&v.session, WaveKey::Custom(custom)),
        pairs(&[(0, "01"), (5, "10")])
    );

    let again = v
        .session
        .create_custom_signal(vec![BitRange::new(SignalId(1), 2, 1)]);
    assert_eq!(again, custom);
}

#[tokio::test]
async fn host_receives_row_updates_over_the_relay() {
    let mut v = viewer(100);
    let row = v.session.add_row(WaveKey::Signal(SignalId(6)));
    v.session.handle_down_msg(DownMsg::WaveformChunk {
        signal_id: SignalId(6),
        chunk_index: 0,
        total_chunks: 1,
        payload: ChunkPayload::Transitions(vec![Transition::new(0, "1")]),
        min: 0.0,
        max: 1.0,
    });

    let first = v.events.next().await;
    assert_eq!(
        first,
        Some(ViewerEvent::RowsUpdated {
            signal: WaveKey::Signal(SignalId(6)),
            rows: vec![row],
        })
    );
    assert_eq!(v.events.next().await, Some(ViewerEvent::RedrawRequested));
}
