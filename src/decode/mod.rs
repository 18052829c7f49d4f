//! Telemetry event decoding.
//!
//! One handler per event kind, dispatched by canonical event name. Handlers
//! follow the same rules throughout:
//!
//! - **Tolerant extraction**: known payload shapes are tried in a fixed
//!   priority order; a field that matches no shape is logged and skipped,
//!   never fatal to the rest of the payload.
//! - **Numeric coercion**: wire numbers arrive as strings or numbers and are
//!   parsed defensively before any arithmetic.
//! - **Change suppression**: position-like events recompute derived state
//!   and re-emit only when something actually differed.
//! - Nothing in here can terminate the session; the worst case is a skipped
//!   field and a log line.

mod lifespan;
mod logs;
mod maps;
mod position;
mod status;

use crate::dictionary::Dictionaries;
use crate::events::SessionEvent;
use crate::map::MapEngine;
use crate::payload::Payload;
use crate::session::state::DeviceState;

/// Compensating requests a handler asks the session to send after it returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FollowUp {
    /// Re-request charge state: an "idle" clean state is ambiguous between
    /// "docked" and "return canceled"
    RequeryChargeState,
}

/// Everything produced by one dispatched payload
#[derive(Debug, Default)]
pub(crate) struct DecodeOutput {
    pub events: Vec<SessionEvent>,
    pub follow_ups: Vec<FollowUp>,
}

/// Handler context borrowing the session's mutable state
pub(crate) struct Decoder<'a> {
    pub state: &'a mut DeviceState,
    pub maps: &'a mut MapEngine,
    pub dict: &'a Dictionaries,
    /// Emit a live-map frame after every minor patch
    pub live_render_on_patch: bool,
    pub out: DecodeOutput,
}

impl<'a> Decoder<'a> {
    pub fn new(
        state: &'a mut DeviceState,
        maps: &'a mut MapEngine,
        dict: &'a Dictionaries,
        live_render_on_patch: bool,
    ) -> Self {
        Self {
            state,
            maps,
            dict,
            live_render_on_patch,
            out: DecodeOutput::default(),
        }
    }

    /// Route one named payload to its handler. Unknown event names are
    /// logged and ignored.
    pub fn dispatch(&mut self, event: &str, payload: Payload) {
        let payload = payload.unwrap_envelope();
        match normalize(event).as_str() {
            "battery" | "batteryinfo" => self.on_battery(&payload),
            "clean" | "cleaninfo" | "cleanreport" | "cleanstate" => self.on_clean(&payload),
            "charge" | "chargestate" => self.on_charge_state(&payload),
            "speed" | "fanspeed" | "cleanspeed" => self.on_fan_speed(&payload),
            "waterinfo" | "waterlevel" | "waterpermeability" => self.on_water(&payload),
            "error" | "errors" => self.on_error(&payload),
            "sleep" | "sleepstatus" => self.on_sleep(&payload),
            "netinfo" => self.on_net_info(&payload),
            "version" | "firmwareversion" => self.on_version(&payload),
            "pos" | "position" | "deviceposition" => self.on_position(&payload),
            "chargepos" | "chargerpos" | "chargeposition" | "chargerposition" => {
                self.on_charger_position(&payload)
            }
            "lifespan" => self.on_life_span(&payload),
            "cleansum" | "totalstats" => self.on_clean_sum(&payload),
            "cleanlogs" => self.on_clean_logs(&payload),
            "sched" | "schedule" | "schedules" => self.on_schedules(&payload),
            "mapm" | "maps" | "cachedmapinfo" => self.on_maps(&payload),
            "mapset" => self.on_map_set(&payload),
            "mapsubset" | "pullm" => self.on_map_subset(&payload),
            "mapinfo" | "mapimage" | "mappiece" | "pullmp" => self.on_map_piece(&payload),
            "majormap" => self.on_major_map(&payload),
            "minormap" => self.on_minor_map(&payload),
            "maptrace" | "trace" | "trm" => self.on_map_trace(&payload),
            other => log::debug!("Unhandled event '{}' ({})", event, other),
        }
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        self.out.events.push(event);
    }
}

/// Canonical form of an event name: lowercase with the customary `on`/`get`
/// prefixes stripped.
fn normalize(event: &str) -> String {
    let lower = event.to_ascii_lowercase();
    let stripped = lower
        .strip_prefix("on")
        .or_else(|| lower.strip_prefix("get"))
        .unwrap_or(&lower);
    stripped.to_string()
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Owns everything a handler borrows, so tests can dispatch payloads
    /// without standing up a session.
    pub(crate) struct Harness {
        pub state: DeviceState,
        pub maps: MapEngine,
        pub dict: Dictionaries,
        pub live_render_on_patch: bool,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                state: DeviceState::new(),
                maps: MapEngine::default(),
                dict: Dictionaries::builtin(),
                live_render_on_patch: false,
            }
        }

        pub fn dispatch(&mut self, event: &str, payload: Payload) -> DecodeOutput {
            let mut decoder = Decoder::new(
                &mut self.state,
                &mut self.maps,
                &self.dict,
                self.live_render_on_patch,
            );
            decoder.dispatch(event, payload);
            decoder.out
        }
    }
}
