//! End-to-end session flow over a scripted transport.
//!
//! Exercises the full inbound path the way the cloud delivers it: map
//! metadata, spot-area boundaries, virtual boundaries, full-map image
//! pieces, the live map stream, and the position/clean/charge telemetry
//! that a cleaning run produces, all through the public session API.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use megha_link::catalog::CommandRequest;
use megha_link::config::{DeviceConfig, MapConfig};
use megha_link::transport::CommandTransport;
use megha_link::types::ChargeStatus;
use megha_link::{ClientConfig, DeviceSession, Dictionaries, Payload, Result, SessionEvent};
use parking_lot::Mutex;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<CommandRequest>>>,
}

impl CommandTransport for RecordingTransport {
    fn send(&mut self, request: &CommandRequest) -> Result<()> {
        self.sent.lock().push(request.clone());
        Ok(())
    }
}

fn compress(data: &[u8]) -> String {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    BASE64.encode(encoder.finish().unwrap())
}

fn make_session(model_class: &str) -> (DeviceSession, RecordingTransport) {
    let _ = env_logger::builder().is_test(true).try_init();
    let transport = RecordingTransport::default();
    let config = ClientConfig {
        device: DeviceConfig {
            device_id: "E000INTEGR01".to_string(),
            model_class: model_class.to_string(),
            nickname: Some("testbot".to_string()),
            protocol_override: None,
        },
        map: MapConfig::default(),
    };
    let session = DeviceSession::new(
        &config,
        Arc::new(Dictionaries::builtin()),
        Box::new(transport.clone()),
    );
    (session, transport)
}

#[test]
fn cleaning_run_with_region_membership() {
    let (mut session, _transport) = make_session("yna5xi");
    let events = session.subscribe();

    // Map metadata and one decompressed spot area
    session.handle_message(
        "CachedMapInfo",
        Payload::json(json!({"info": [
            {"mid": "199", "name": "ground floor", "using": 1, "built": 1}
        ]})),
    );
    session.handle_message(
        "MapSubSet",
        Payload::json(json!({
            "mid": "199", "mssid": "2", "name": "kitchen",
            "value": compress(b"0,0;3000,0;3000,3000;0,3000")
        })),
    );

    // Charger dock, then a device fix inside the kitchen polygon
    session.handle_message(
        "Pos",
        Payload::json(json!({"chargePos": {"x": -500, "y": 0, "a": 180}})),
    );
    session.handle_message(
        "Pos",
        Payload::json(json!({"deebotPos": {"x": 1500, "y": 1500, "a": 90, "invalid": 0}})),
    );

    // The cleaning run starts targeting two areas
    session.handle_message(
        "CleanInfo",
        Payload::json(json!({
            "state": "clean",
            "cleanState": {
                "motionState": "working",
                "type": "spotArea",
                "content": {"type": "spotArea", "value": "1,2"}
            }
        })),
    );

    let received: Vec<SessionEvent> = events.try_iter().collect();

    let position = received.iter().find_map(|e| match e {
        SessionEvent::Position(update) => Some(update),
        _ => None,
    });
    let position = position.expect("position event");
    assert!(position.changed);
    assert_eq!(position.spot_area_id.as_deref(), Some("2"));
    let distance = position.distance_to_charger.expect("charger distance");
    assert!((distance - 2500.0).abs() < 1.0);

    assert!(received.iter().any(|e| matches!(
        e,
        SessionEvent::CleanReport(report)
            if report.mode == "spotArea" && report.areas.as_deref() == Some("1,2")
    )));
    assert_eq!(session.state().current_spot_area.as_deref(), Some("2"));
}

#[test]
fn full_map_image_assembly_and_on_demand_render() {
    let (mut session, _transport) = make_session("yna5xi");
    let events = session.subscribe();

    let piece = |index: u32, fill: u8| {
        json!({
            "mid": "199", "type": "outline",
            "totalWidth": 8, "totalHeight": 8, "pixel": 50,
            "totalCount": 2, "index": index,
            "startX": 0, "startY": index * 4, "width": 8, "height": 4,
            "value": compress(&[fill; 32])
        })
    };

    // Render before any piece: caller-visible error, not a crash
    assert!(session.render_map_image("199", "outline").is_err());

    session.handle_message("MapInfo", Payload::json(piece(0, 0x01)));
    assert!(session.render_map_image("199", "outline").is_err());

    session.handle_message("MapInfo", Payload::json(piece(1, 0x02)));
    let received: Vec<SessionEvent> = events.try_iter().collect();
    let rendered = received
        .iter()
        .find_map(|e| match e {
            SessionEvent::MapImage(rendered) => Some(rendered),
            _ => None,
        })
        .expect("completed image emits a render");
    assert_eq!((rendered.width, rendered.height), (8, 8));

    // On-demand render now succeeds and is idempotent
    let again = session.render_map_image("199", "outline").unwrap();
    assert_eq!(again.base64_png, rendered.base64_png);
}

#[test]
fn virtual_boundary_join_across_payloads() {
    let (mut session, _transport) = make_session("yna5xi");
    let events = session.subscribe();

    session.handle_message(
        "MapSet",
        Payload::json(json!({
            "type": "vw", "mid": "199",
            "subsets": [{"mssid": "0", "value": "[-1000,0,1000,0]"}]
        })),
    );
    assert!(
        events.try_iter().count() == 0,
        "wall payload alone must stay buffered"
    );

    session.handle_message(
        "MapSet",
        Payload::json(json!({
            "type": "mw", "mid": "199",
            "subsets": [{"mssid": "1", "value": "[0,-1000,0,1000]"}]
        })),
    );
    let received: Vec<SessionEvent> = events.try_iter().collect();
    let boundary_events: Vec<_> = received
        .iter()
        .filter(|e| matches!(e, SessionEvent::MapVirtualBoundaries { .. }))
        .collect();
    assert_eq!(boundary_events.len(), 1, "exactly one consolidated event");
    let SessionEvent::MapVirtualBoundaries { map_id, boundaries } = boundary_events[0] else {
        unreachable!();
    };
    assert_eq!(map_id, "199");
    assert_eq!(boundaries.len(), 2);
}

#[test]
fn live_map_stream_and_graceful_render_failure() {
    let (mut session, _transport) = make_session("yna5xi");

    assert!(session.render_live_map("199").is_err());

    session.handle_message(
        "MajorMap",
        Payload::json(json!({
            "mid": "199", "pieceWidth": 2, "pieceHeight": 2,
            "pixel": 50, "value": "0,0,0,0"
        })),
    );
    session.handle_message(
        "MinorMap",
        Payload::json(json!({
            "mid": "199", "pieceIndex": 0, "pieceValue": compress(&[0x02; 4])
        })),
    );

    let rendered = session.render_live_map("199").unwrap();
    assert_eq!((rendered.width, rendered.height), (4, 4));
    // A different map id still has no geometry
    assert!(session.render_live_map("200").is_err());
}

#[test]
fn legacy_family_telemetry_round() {
    use megha_link::AttrBag;

    let (mut session, transport) = make_session("ls1ok3");
    let events = session.subscribe();

    // Outbound request goes to the XMPP channel with legacy naming
    session.run("GetBatteryState", &[]);
    {
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "GetBatteryInfo");
    }

    // Inbound attribute-bag telemetry
    session.handle_message(
        "BatteryInfo",
        Payload::Attrs(AttrBag::new("battery").attr("power", "087")),
    );
    session.handle_message(
        "ChargeState",
        Payload::Attrs(AttrBag::new("ctl").child(AttrBag::new("charge").attr("type", "SlotCharging"))),
    );

    let received: Vec<SessionEvent> = events.try_iter().collect();
    assert!(received
        .iter()
        .any(|e| matches!(e, SessionEvent::BatteryInfo { level, .. } if *level == 87.0)));
    assert!(received
        .iter()
        .any(|e| matches!(e, SessionEvent::ChargeState(ChargeStatus::Charging))));
}

#[test]
fn compound_lifespan_round_trip() {
    let (mut session, transport) = make_session("vi829v");
    let events = session.subscribe();

    session.run("GetLifeSpan", &[]);
    {
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1, "compound query is one wire request");
    }

    session.handle_message(
        "LifeSpan",
        Payload::json(json!([
            {"type": "heap", "left": 4500, "total": 9000},
            {"type": "sideBrush", "left": 9000, "total": 9000},
            {"type": "brush", "val": 62.5},
            {"type": "unitCare", "left": 25, "total": 100}
        ])),
    );

    let received: Vec<SessionEvent> = events.try_iter().collect();
    let spans: Vec<f64> = received
        .iter()
        .filter_map(|e| match e {
            SessionEvent::LifeSpan { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(spans, vec![50.0, 100.0, 62.5, 25.0]);
}
