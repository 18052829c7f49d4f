//! Handlers for scalar status events: battery, clean state, charge state,
//! fan speed, water, errors, sleep, network, firmware, clean totals.

use super::{Decoder, FollowUp};
use crate::events::SessionEvent;
use crate::payload::Payload;
use crate::types::{ChargeStatus, CleanReport, CleanSum, DeviceError, NetworkInfo, WaterInfo};

impl Decoder<'_> {
    /// Battery level. JSON reports `value` (+ `isLow`), legacy an ASCII
    /// `power` attribute.
    pub(super) fn on_battery(&mut self, payload: &Payload) {
        let Some(level) = payload.f64_of(&["value", "power"]) else {
            log::warn!("Battery payload without a level field, skipping");
            return;
        };
        self.state.battery_level = Some(level);
        self.state.battery_low = payload.bool_of(&["isLow"]);
        self.state.touch();
        self.emit(SessionEvent::BatteryInfo {
            level,
            low: self.state.battery_low,
        });
    }

    /// Clean state, both families. Besides the clean report itself this
    /// feeds the charge-status side channel: "returning to dock" propagates
    /// into charge status, and "idle" triggers a compensating charge-state
    /// re-query because idle is ambiguous between "docked" and "return
    /// canceled".
    pub(super) fn on_clean(&mut self, payload: &Payload) {
        if let Some(state) = payload.str_of(&["state"]) {
            self.decode_json_clean(&state, payload);
        } else {
            self.decode_xml_clean(payload);
        }
    }

    fn decode_json_clean(&mut self, state: &str, payload: &Payload) {
        match state {
            "clean" => {
                let Some(inner) = payload.sub("cleanState") else {
                    log::warn!("Clean payload without cleanState, skipping");
                    return;
                };
                let motion = inner.str_of(&["motionState"]);
                match motion.as_deref() {
                    Some("pause") => self.apply_clean_report("pause", None),
                    Some("goCharging") => self.clean_returning(),
                    _ => {
                        // "working" or firmware that omits motionState
                        let wire = inner.str_of(&["type"]).unwrap_or_default();
                        let mode = self
                            .dict
                            .clean_mode_from_wire(&wire)
                            .map(str::to_string)
                            .unwrap_or_else(|| {
                                log::warn!("Unknown clean type '{}', passing through", wire);
                                wire.clone()
                            });
                        let areas = clean_content_value(&inner);
                        self.apply_clean_report(&mode, areas);
                    }
                }
            }
            "pause" => self.apply_clean_report("pause", None),
            "goCharging" => self.clean_returning(),
            "idle" => {
                self.apply_clean_report("stop", None);
                self.out.follow_ups.push(FollowUp::RequeryChargeState);
            }
            other => log::debug!("Clean state '{}' not decoded", other),
        }
    }

    fn decode_xml_clean(&mut self, payload: &Payload) {
        // The legacy family nests a <clean .../> element; flat attribute
        // bags from older firmware carry the attrs directly.
        let elem = payload.sub("clean").unwrap_or_else(|| payload.clone());
        match elem.str_of(&["st"]).as_deref() {
            Some("p") => {
                self.apply_clean_report("pause", None);
                return;
            }
            Some("h") => {
                self.apply_clean_report("stop", None);
                return;
            }
            Some("g") => {
                self.clean_returning();
                return;
            }
            _ => {}
        }

        let Some(wire) = elem.str_of(&["type"]) else {
            log::warn!("Clean payload without type attribute, skipping");
            return;
        };
        let mode = self
            .dict
            .clean_mode_from_wire(&wire)
            .map(str::to_string)
            .unwrap_or_else(|| {
                log::warn!("Unknown clean type '{}', passing through", wire);
                wire.clone()
            });
        let areas = if mode == "spotArea" || mode == "customArea" {
            elem.str_of(&["p", "mid"])
        } else {
            None
        };
        self.apply_clean_report(&mode, areas);

        // The legacy clean report carries the fan speed alongside
        if let Some(speed) = elem.str_of(&["speed"]) {
            self.apply_fan_speed(&speed);
        }
    }

    fn clean_returning(&mut self) {
        self.apply_clean_report("returning", None);
        self.set_charge_status(ChargeStatus::Returning);
    }

    fn apply_clean_report(&mut self, mode: &str, areas: Option<String>) {
        let report = CleanReport {
            mode: mode.to_string(),
            areas,
        };
        self.state.clean_report = Some(report.clone());
        self.state.touch();
        self.emit(SessionEvent::CleanReport(report));
    }

    /// Charge state, both families
    pub(super) fn on_charge_state(&mut self, payload: &Payload) {
        if let Some(charging) = payload.bool_of(&["isCharging"]) {
            let status = if charging {
                ChargeStatus::Charging
            } else {
                ChargeStatus::Idle
            };
            self.set_charge_status(status);
            return;
        }

        let elem = payload.sub("charge").unwrap_or_else(|| payload.clone());
        let Some(wire) = elem.str_of(&["type"]) else {
            log::warn!("Charge payload without type, skipping");
            return;
        };
        let status = match wire.as_str() {
            "SlotCharging" | "WireCharging" => ChargeStatus::Charging,
            "Going" => ChargeStatus::Returning,
            "Idle" => ChargeStatus::Idle,
            other => {
                log::warn!("Unknown charge type '{}', skipping", other);
                return;
            }
        };
        self.set_charge_status(status);
    }

    pub(super) fn set_charge_status(&mut self, status: ChargeStatus) {
        self.state.charge_status = Some(status);
        self.state.touch();
        self.emit(SessionEvent::ChargeState(status));
    }

    /// Fan speed
    pub(super) fn on_fan_speed(&mut self, payload: &Payload) {
        let Some(wire) = payload.str_of(&["speed", "value"]) else {
            log::warn!("Fan speed payload without a value, skipping");
            return;
        };
        self.apply_fan_speed(&wire);
    }

    fn apply_fan_speed(&mut self, wire: &str) {
        let canonical = match self.dict.fan_speed_from_wire(wire) {
            Some(c) => c.to_string(),
            None => {
                log::warn!("Unknown fan speed '{}', substituting placeholder", wire);
                "unknown".to_string()
            }
        };
        self.state.fan_speed = Some(canonical.clone());
        self.state.touch();
        self.emit(SessionEvent::FanSpeed(canonical));
    }

    /// Water system: mop plate presence and permeability level
    pub(super) fn on_water(&mut self, payload: &Payload) {
        let mop_attached = payload.bool_of(&["enable", "onoff"]);
        let level = payload.str_of(&["amount", "v", "level"]).map(|wire| {
            self.dict
                .water_level_from_wire(&wire)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    log::warn!("Unknown water level '{}', substituting placeholder", wire);
                    "unknown".to_string()
                })
        });
        if mop_attached.is_none() && level.is_none() {
            log::warn!("Water payload without known fields, skipping");
            return;
        }
        let info = WaterInfo {
            mop_attached,
            level,
        };
        self.state.water_info = info.clone();
        self.state.touch();
        self.emit(SessionEvent::WaterLevel(info));
    }

    /// Device-reported error code. Codes 0 and 100 mean "no error" and
    /// clear the stored error without surfacing an event.
    pub(super) fn on_error(&mut self, payload: &Payload) {
        let code = payload
            .str_of(&["code", "errno", "error", "errs"])
            .or_else(|| {
                // Some firmware reports `code` as a one-element array
                payload
                    .sub_list("code")
                    .first()
                    .and_then(|p| p.as_scalar())
            });
        let Some(code) = code else {
            log::warn!("Error payload without a code, skipping");
            return;
        };

        if self.dict.is_no_error(&code) {
            self.state.last_error = None;
            self.state.touch();
            return;
        }

        let error = DeviceError {
            description: self.dict.error_description(&code),
            code,
        };
        self.state.last_error = Some(error.clone());
        self.state.touch();
        self.emit(SessionEvent::Error(error));
    }

    /// Sleep status
    pub(super) fn on_sleep(&mut self, payload: &Payload) {
        let Some(sleeping) = payload.bool_of(&["enable", "sleep", "sleepStatus"]) else {
            log::warn!("Sleep payload without a status, skipping");
            return;
        };
        self.state.sleeping = Some(sleeping);
        self.state.touch();
        self.emit(SessionEvent::SleepStatus(sleeping));
    }

    /// Network diagnostics
    pub(super) fn on_net_info(&mut self, payload: &Payload) {
        let info = NetworkInfo {
            ip: payload.str_of(&["ip", "wi"]),
            ssid: payload.str_of(&["ssid", "s"]),
            rssi: payload.i64_of(&["rssi"]),
            mac: payload.str_of(&["mac"]),
        };
        if info == NetworkInfo::default() {
            log::warn!("Network payload without known fields, skipping");
            return;
        }
        self.state.network = info.clone();
        self.state.touch();
        self.emit(SessionEvent::NetworkInfo(info));
    }

    /// Firmware version
    pub(super) fn on_version(&mut self, payload: &Payload) {
        let version = payload
            .str_of(&["ver", "value", "version", "fwVer"])
            .or_else(|| payload.as_scalar());
        let Some(version) = version else {
            log::warn!("Version payload without a value, skipping");
            return;
        };
        self.state.firmware_version = Some(version.clone());
        self.state.touch();
        self.emit(SessionEvent::FirmwareVersion(version));
    }

    /// Lifetime cleaning totals
    pub(super) fn on_clean_sum(&mut self, payload: &Payload) {
        let sum = CleanSum {
            square_meters: payload.f64_of(&["area", "a"]).unwrap_or(0.0).max(0.0) as u64,
            seconds: payload.f64_of(&["time", "l"]).unwrap_or(0.0).max(0.0) as u64,
            count: payload.f64_of(&["count", "c"]).unwrap_or(0.0).max(0.0) as u64,
        };
        self.state.clean_sum = Some(sum);
        self.state.touch();
        self.emit(SessionEvent::CleanSum(sum));
    }
}

/// Target value of a region clean: `content` is either an object with a
/// `value` field or a bare string, depending on firmware.
fn clean_content_value(clean_state: &Payload) -> Option<String> {
    let content = clean_state.sub("content")?;
    content
        .str_of(&["value"])
        .or_else(|| content.as_scalar())
        .filter(|v| !v.is_empty())
}
