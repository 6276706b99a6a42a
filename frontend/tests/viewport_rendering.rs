use futures::channel::mpsc::UnboundedReceiver;
use shared::{ChunkPayload, DownMsg, SignalEncoding, SignalId, Transition, UpMsg};
use waveview::dataflow::{drain, relay};
use waveview::visualizer::canvas::{DrawCommand, Point};
use waveview::visualizer::timeline::TickKind;
use waveview::{
    ConfigError, DocumentInfo, RenderType, TimeUnit, ViewerConfig, ViewerEvent, ViewerSession, WaveKey,
};

fn session(time_stop: u64, viewer_width: f64) -> (ViewerSession, UnboundedReceiver<ViewerEvent>) {
    let (up_msg_relay, _up_msgs) = relay::<UpMsg>();
    let (viewer_event_relay, events) = relay();
    let mut session = ViewerSession::new(
        ViewerConfig::default(),
        DocumentInfo::new(time_stop, TimeUnit::Nanoseconds),
        up_msg_relay,
        viewer_event_relay,
    )
    .unwrap();
    session.set_viewer_width(viewer_width);
    session.zoom_to_fit();
    (session, events)
}

fn load(session: &mut ViewerSession, signal: u32, transitions: &[(u64, &str)]) {
    session.handle_down_msg(DownMsg::WaveformChunk {
        signal_id: SignalId(signal),
        chunk_index: 0,
        total_chunks: 1,
        payload: ChunkPayload::Transitions(
            transitions
                .iter()
                .map(|&(time, value)| Transition::new(time, value))
                .collect(),
        ),
        min: 0.0,
        max: 0.0,
    });
}

#[test]
fn zooming_out_past_the_document_clamps_to_fit() {
    let (mut session, _events) = session(10_000, 500.0);
    session.zoom(-3.0, 5000.0, 250.0);
    let snapshot = session.zoom(40.0, 5000.0, 250.0);

    assert_eq!(snapshot.mapping.zoom_ratio, 500.0 / 10_000.0);
    assert_eq!(snapshot.mapping.max_scroll_left(), 0.0);
    assert_eq!(snapshot.mapping.pseudo_scroll_left, 0.0);
    assert_eq!(snapshot.scrollbar.thumb_width, snapshot.scrollbar.track_width);
}

#[test]
fn pixel_and_time_round_trip() {
    let (mut session, _events) = session(123_457, 977.0);
    session.zoom(-5.5, 61_000.0, 300.0);
    let mapping = session.viewport().mapping;
    for step in 0..=977 {
        let pixel = step as f64;
        let back = mapping.time_to_pixel(mapping.pixel_to_time(pixel));
        assert!((back - pixel).abs() <= 1.0, "pixel {} came back as {}", pixel, back);
    }
    let visible = session.viewport().visible;
    assert!((visible.duration() - 977.0 / mapping.zoom_ratio).abs() < 1e-6);
}

#[test]
fn framing_a_range_shows_exactly_that_range() {
    let (mut session, mut events) = session(1000, 400.0);
    drain(&mut events);
    let snapshot = session.set_viewport_range(200.0, 400.0);

    assert_eq!(snapshot.mapping.zoom_ratio, 2.0);
    assert_eq!(snapshot.visible.start, 200.0);
    assert_eq!(snapshot.visible.end, 400.0);
    assert_eq!(
        drain(&mut events),
        vec![ViewerEvent::ViewportChanged(snapshot), ViewerEvent::RedrawRequested]
    );
}

#[test]
fn ruler_labels_carry_the_time_unit() {
    let (session, _events) = session(500, 1000.0);
    let labels: Vec<String> = session
        .ruler_ticks()
        .into_iter()
        .filter_map(|tick| match tick.kind {
            TickKind::Number { label } => Some(label),
            _ => None,
        })
        .collect();
    assert!(!labels.is_empty());
    assert!(labels.iter().all(|label| label.ends_with("ns")));
}

#[test]
fn binary_row_changes_level_at_each_transition() {
    let (mut session, _events) = session(300, 300.0);
    let row = session.add_row(WaveKey::Signal(SignalId(1)));
    load(&mut session, 1, &[(0, "0"), (100, "1"), (200, "0")]);

    let draw_list = session.draw_row(row).unwrap();
    let lines: Vec<&[Point]> = draw_list.polylines().collect();
    assert_eq!(lines.len(), 1);
    let steps: Vec<f64> = lines[0]
        .windows(2)
        .filter(|pair| pair[0].x == pair[1].x && pair[0].y != pair[1].y)
        .map(|pair| pair[0].x)
        .collect();
    assert_eq!(steps, vec![100.0, 200.0]);

    let low = lines[0][0].y;
    assert_eq!(lines[0].first().map(|p| p.x), Some(0.0));
    assert_eq!(lines[0].last().map(|p| (p.x, p.y)), Some((300.0, low)));
}

#[test]
fn bus_rows_label_wide_values() {
    let (mut session, _events) = session(1000, 1000.0);
    session.declare_signal(SignalId(2), 8, SignalEncoding::BitVector);
    let row = session.add_row(WaveKey::Signal(SignalId(2)));
    load(&mut session, 2, &[(0, "00000000"), (500, "10101010")]);

    let draw_list = session.draw_row(row).unwrap();
    let labels: Vec<&str> = draw_list.texts().map(|(_, text)| text).collect();
    assert_eq!(labels, vec!["00", "aa"]);
    let bubbles = draw_list
        .commands()
        .iter()
        .filter(|command| matches!(command, DrawCommand::Polygon { .. }))
        .count();
    assert_eq!(bubbles, 2);
}

#[test]
fn analog_rows_break_at_unknown_samples() {
    let (mut session, _events) = session(100, 100.0);
    session.declare_signal(SignalId(3), 4, SignalEncoding::BitVector);
    let row = session.add_row(WaveKey::Signal(SignalId(3)));
    session.set_row_render_type(row, RenderType::Linear { signed: false });
    load(&mut session, 3, &[(0, "0001"), (40, "1x00"), (70, "1111")]);

    let draw_list = session.draw_row(row).unwrap();
    assert_eq!(draw_list.polylines().count(), 2);
}

#[test]
fn invalid_theme_colors_are_rejected() {
    assert!(matches!(
        ViewerConfig::from_toml_str("[theme]\nline = \"not-a-color\"\n"),
        Err(ConfigError::InvalidColor { field: "line", .. })
    ));

    let mut config = ViewerConfig::default();
    config.theme.line = "not-a-color".to_string();
    let (up_msg_relay, _up_msgs) = relay::<UpMsg>();
    let (viewer_event_relay, _events) = relay::<ViewerEvent>();
    let result = ViewerSession::new(
        config,
        DocumentInfo::new(10, TimeUnit::Nanoseconds),
        up_msg_relay,
        viewer_event_relay,
    );
    assert!(matches!(result, Err(ConfigError::InvalidColor { field: "line", .. })));
}
