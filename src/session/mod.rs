//! Device session: command dispatch and inbound event routing.
//!
//! One [`DeviceSession`] per connected vacuum. The transport collaborator
//! drives it from a single thread: `handle_message` runs each decoded
//! payload to completion before the next one arrives, so session state
//! needs no internal locking. Outbound sends are fire-and-forget; delivery
//! guarantees, keep-alive and retry live in the transport.

pub mod state;

use crate::capability::{capabilities_for, DeviceCapabilities};
use crate::catalog::{self, build_request, DeviceCommand};
use crate::config::{ClientConfig, MapConfig};
use crate::decode::{Decoder, FollowUp};
use crate::dictionary::Dictionaries;
use crate::error::Result;
use crate::events::{EventBus, SessionEvent};
use crate::map::{MapEngine, RenderedMap};
use crate::payload::Payload;
use crate::transport::{CleanLogFetcher, CommandTransport};
use crate::types::ProtocolFlavor;
use crossbeam_channel::Receiver;
use state::DeviceState;
use std::sync::Arc;

/// Per-device session over one transport connection
pub struct DeviceSession {
    device_id: String,
    model_class: String,
    caps: DeviceCapabilities,
    dict: Arc<Dictionaries>,
    transport: Box<dyn CommandTransport>,
    log_fetcher: Option<Box<dyn CleanLogFetcher>>,
    map_config: MapConfig,
    state: DeviceState,
    maps: MapEngine,
    bus: EventBus,
    connected: bool,
}

impl DeviceSession {
    /// Create a session for the configured device over the given transport
    pub fn new(
        config: &ClientConfig,
        dict: Arc<Dictionaries>,
        transport: Box<dyn CommandTransport>,
    ) -> Self {
        let mut caps = capabilities_for(&config.device.model_class);
        if let Some(flavor) = config.device.protocol_override {
            log::info!("Protocol override: forcing {:?}", flavor);
            caps.flavor = flavor;
        }
        log::info!(
            "Session for device {} (model class {}, {:?} protocol)",
            config.device.device_id,
            config.device.model_class,
            caps.flavor
        );
        Self {
            device_id: config.device.device_id.clone(),
            model_class: config.device.model_class.clone(),
            caps,
            dict,
            transport,
            log_fetcher: None,
            map_config: config.map.clone(),
            state: DeviceState::new(),
            maps: MapEngine::default(),
            bus: EventBus::new(),
            connected: true,
        }
    }

    /// Attach the clean-log REST collaborator (JSON model family)
    pub fn with_log_fetcher(mut self, fetcher: Box<dyn CleanLogFetcher>) -> Self {
        self.log_fetcher = Some(fetcher);
        self
    }

    /// Subscribe to emitted events
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Current state snapshot
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Map registry and reassembly state
    pub fn maps(&self) -> &MapEngine {
        &self.maps
    }

    /// Model class this session was created for
    pub fn model_class(&self) -> &str {
        &self.model_class
    }

    /// Capability flags of the model class
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.caps
    }

    /// Run a named command. Unknown names, missing arguments, and transport
    /// failures are all swallowed with a log line; a successful run sends
    /// exactly one wire request, except for local log queries.
    pub fn run(&mut self, command: &str, args: &[&str]) {
        if !self.connected {
            log::warn!("Session disconnected, dropping command '{}'", command);
            return;
        }
        let Some(cmd) = catalog::parse(command, args, &self.caps, &self.dict) else {
            return;
        };

        // The JSON family answers clean logs from the log service and
        // synthesizes events instead of sending a wire request
        if cmd.is_local_log_query() && self.caps.flavor == ProtocolFlavor::Json {
            if let DeviceCommand::GetCleanLogs { count } = cmd {
                self.run_clean_log_query(count);
            }
            return;
        }

        let request = build_request(&cmd, self.caps.flavor, &self.dict);
        log::debug!("Sending '{}' via {:?}", request.name, request.channel);
        if let Err(e) = self.transport.send(&request) {
            log::warn!("Transport send of '{}' failed: {}", request.name, e);
        }
    }

    /// Deliver one inbound payload for a named event
    pub fn handle_message(&mut self, event: &str, payload: Payload) {
        if !self.connected {
            log::debug!("Session disconnected, dropping event '{}'", event);
            return;
        }

        let mut decoder = Decoder::new(
            &mut self.state,
            &mut self.maps,
            &self.dict,
            self.map_config.live_render_on_patch,
        );
        decoder.dispatch(event, payload);
        let output = decoder.out;

        for event in output.events {
            self.bus.emit(event);
        }
        for follow_up in output.follow_ups {
            match follow_up {
                // "idle" is ambiguous between docked and return-canceled;
                // only the device can tell us which
                FollowUp::RequeryChargeState => {
                    log::debug!("Clean state idle, re-requesting charge state");
                    self.run("GetChargeState", &[]);
                }
            }
        }
    }

    /// Render a completed full-map image on demand
    pub fn render_map_image(&self, map_id: &str, image_type: &str) -> Result<RenderedMap> {
        self.maps.render_image(
            map_id,
            image_type,
            self.state.position,
            self.state.charger_position,
        )
    }

    /// Render the live map on demand; fails when no major payload has
    /// established geometry for this map id.
    pub fn render_live_map(&self, map_id: &str) -> Result<RenderedMap> {
        self.maps
            .render_live(map_id, self.state.position, self.state.charger_position)
    }

    /// Scoped teardown: no further commands are sent and buffered transfer
    /// state is dropped. Keep-alive timers live in the transport and are the
    /// transport's to cancel.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        log::info!("Session for device {} disconnected", self.device_id);
        self.connected = false;
        self.maps.clear_transfers();
    }

    /// Reset for a fresh connection over the same transport: previous state
    /// is cleared rather than trusted across the gap.
    pub fn reconnect(&mut self) {
        log::info!("Session for device {} reconnecting", self.device_id);
        self.state.reset();
        self.maps.clear_transfers();
        self.connected = true;
    }

    fn run_clean_log_query(&mut self, count: usize) {
        let Some(fetcher) = self.log_fetcher.as_mut() else {
            log::warn!("No clean-log fetcher attached, dropping log query");
            return;
        };
        let count = if count == 0 {
            self.map_config.clean_log_count
        } else {
            count
        };
        match fetcher.fetch_clean_logs(&self.device_id, count) {
            Ok(value) => {
                log::debug!("Clean-log fetch returned, decoding");
                self.handle_message("CleanLogs", Payload::json(value));
            }
            Err(e) => log::warn!("Clean-log fetch failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CommandRequest;
    use crate::config::DeviceConfig;
    use crate::error::Error;
    use crate::types::ChargeStatus;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Transport stub that records every request it is asked to send
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

    struct StubLogFetcher {
        calls: Arc<Mutex<Vec<(String, usize)>>>,
    }

    impl CleanLogFetcher for StubLogFetcher {
        fn fetch_clean_logs(&mut self, device_id: &str, count: usize) -> Result<serde_json::Value> {
            self.calls.lock().push((device_id.to_string(), count));
            Ok(json!({"logs": [
                {"id": "log-9", "ts": 1700000000, "last": 1800, "area": 42,
                 "type": "spotArea", "stopReason": "finished"}
            ]}))
        }
    }

    fn config(model_class: &str) -> ClientConfig {
        ClientConfig {
            device: DeviceConfig {
                device_id: "E000DEVICE01".to_string(),
                model_class: model_class.to_string(),
                nickname: None,
                protocol_override: None,
            },
            map: MapConfig::default(),
        }
    }

    fn session(model_class: &str) -> (DeviceSession, RecordingTransport) {
        let transport = RecordingTransport::default();
        let session = DeviceSession::new(
            &config(model_class),
            Arc::new(Dictionaries::builtin()),
            Box::new(transport.clone()),
        );
        (session, transport)
    }

    #[test]
    fn test_run_sends_exactly_one_request() {
        let (mut session, transport) = session("yna5xi");
        session.run("Clean", &[]);
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "clean");
    }

    #[test]
    fn test_unknown_and_invalid_commands_send_nothing() {
        let (mut session, transport) = session("yna5xi");
        session.run("selfdestruct", &[]);
        session.run("spotarea", &[]); // missing areas argument
        session.run("setfanspeed", &["ludicrous"]);
        assert!(transport.sent.lock().is_empty());
    }

    #[test]
    fn test_idle_clean_state_requeries_charge_state() {
        let (mut session, transport) = session("yna5xi");
        session.handle_message("CleanInfo", Payload::json(json!({"state": "idle"})));
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "getChargeState");
    }

    #[test]
    fn test_clean_logs_local_on_json_family() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (session, transport) = session("yna5xi");
        let mut session = session.with_log_fetcher(Box::new(StubLogFetcher {
            calls: Arc::clone(&calls),
        }));
        let events = session.subscribe();

        session.run("GetCleanLogs", &["5"]);

        // Fetched via REST, decoded, emitted; no wire request
        assert!(transport.sent.lock().is_empty());
        assert_eq!(calls.lock().as_slice(), &[("E000DEVICE01".to_string(), 5)]);
        let received: Vec<SessionEvent> = events.try_iter().collect();
        assert!(received
            .iter()
            .any(|e| matches!(e, SessionEvent::CleanLog(logs) if logs.len() == 1)));
        assert!(received
            .iter()
            .any(|e| matches!(e, SessionEvent::LastCleanLogs(last) if last.square_meters == 42)));
    }

    #[test]
    fn test_clean_logs_on_wire_for_legacy_family() {
        let (mut session, transport) = session("ls1ok3");
        session.run("GetCleanLogs", &[]);
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "GetCleanLogs");
    }

    #[test]
    fn test_disconnect_blocks_sends_and_drops_events() {
        let (mut session, transport) = session("yna5xi");
        session.disconnect();
        session.run("Clean", &[]);
        session.handle_message("BatteryInfo", Payload::json(json!({"value": 50})));
        assert!(transport.sent.lock().is_empty());
        assert!(session.state().battery_level.is_none());
    }

    #[test]
    fn test_reconnect_resets_state() {
        let (mut session, _transport) = session("yna5xi");
        session.handle_message("BatteryInfo", Payload::json(json!({"value": 50})));
        assert!(session.state().battery_level.is_some());
        session.disconnect();
        session.reconnect();
        assert!(session.state().battery_level.is_none());
        assert_eq!(session.state().revision, 0);
    }

    #[test]
    fn test_spot_area_clean_scenario_end_to_end() {
        let (mut session, _transport) = session("yna5xi");
        let events = session.subscribe();
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
        assert!(received.iter().any(|e| matches!(
            e,
            SessionEvent::CleanReport(report)
                if report.mode == "spotArea" && report.areas.as_deref() == Some("1,2")
        )));
    }

    #[test]
    fn test_charge_state_changes_flow_to_subscribers() {
        let (mut session, _transport) = session("yna5xi");
        let events = session.subscribe();
        session.handle_message("CleanInfo", Payload::json(json!({"state": "goCharging"})));
        session.handle_message("ChargeState", Payload::json(json!({"isCharging": 1})));
        let received: Vec<SessionEvent> = events.try_iter().collect();
        let charge_states: Vec<ChargeStatus> = received
            .iter()
            .filter_map(|e| match e {
                SessionEvent::ChargeState(status) => Some(*status),
                _ => None,
            })
            .collect();
        assert_eq!(
            charge_states,
            vec![ChargeStatus::Returning, ChargeStatus::Charging]
        );
    }

    #[test]
    fn test_render_live_map_before_geometry_is_an_error() {
        let (session, _transport) = session("yna5xi");
        assert!(matches!(
            session.render_live_map("199"),
            Err(Error::MapGeometryUnknown(_))
        ));
    }

    #[test]
    fn test_failing_transport_does_not_poison_session() {
        struct FailingTransport;
        impl CommandTransport for FailingTransport {
            fn send(&mut self, _request: &CommandRequest) -> Result<()> {
                Err(Error::Transport("broker unreachable".to_string()))
            }
        }

        let mut session = DeviceSession::new(
            &config("yna5xi"),
            Arc::new(Dictionaries::builtin()),
            Box::new(FailingTransport),
        );
        session.run("Clean", &[]);
        // Still usable afterwards
        session.handle_message("BatteryInfo", Payload::json(json!({"value": 80})));
        assert_eq!(session.state().battery_level, Some(80.0));
    }
}
