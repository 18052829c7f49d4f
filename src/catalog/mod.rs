//! Command catalog: canonical command names and wire-request construction.
//!
//! `parse` resolves a caller-facing command name (case-insensitive) plus its
//! string arguments into a typed [`DeviceCommand`]. Unknown names and
//! missing or unparseable required arguments drop the command silently —
//! a deliberate compatibility policy, callers get a debug log and nothing
//! else. `shaping` then turns the typed command into the model family's wire
//! request.

mod shaping;

pub use shaping::build_request;

use crate::capability::DeviceCapabilities;
use crate::dictionary::Dictionaries;
use crate::map::BoundaryKind;
use crate::payload::AttrBag;
use crate::types::ComponentKind;

/// Default sound id for the locate beep
const DEFAULT_SOUND_ID: u32 = 30;

/// Default piece-image type for map image requests
const DEFAULT_IMAGE_TYPE: &str = "outline";

/// Which API surface a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiChannel {
    /// Legacy XMPP command stanza
    LegacyXmpp,
    /// MQTT/REST IoT proxy request
    IotProxy,
}

/// Request payload in the model family's wire shape
#[derive(Debug, Clone)]
pub enum RequestPayload {
    Xml(AttrBag),
    Json(serde_json::Value),
}

/// One constructed outbound request
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Wire command name
    pub name: String,
    pub payload: RequestPayload,
    pub channel: ApiChannel,
}

/// Typed command after name/argument resolution
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    Clean { mode: &'static str },
    SpotArea { areas: String },
    CustomArea { coords: String, passes: u32 },
    Pause,
    Resume,
    Stop,
    Charge,
    PlaySound { sid: u32 },
    SetFanSpeed { level: &'static str },
    SetWaterLevel { level: &'static str },
    ResetLifeSpan { component: ComponentKind },
    GetBattery,
    GetCleanState,
    GetChargeState,
    GetFanSpeed,
    GetWaterLevel,
    GetPosition,
    GetChargerPosition,
    GetLifeSpan { components: Vec<ComponentKind> },
    GetNetInfo,
    GetSleepStatus,
    GetFirmwareVersion,
    GetMaps,
    GetSpotAreas { map_id: String },
    GetSpotAreaInfo { map_id: String, area_id: String },
    GetVirtualBoundaries { map_id: String, kind: BoundaryKind },
    GetMapImage { map_id: String, image_type: String },
    GetMapTrace,
    GetSchedules,
    GetCleanSum,
    GetCleanLogs { count: usize },
}

impl DeviceCommand {
    /// Commands that are answered locally (REST collaborator) on the JSON
    /// family instead of producing a wire request
    pub fn is_local_log_query(&self) -> bool {
        matches!(self, DeviceCommand::GetCleanLogs { .. })
    }
}

/// Resolve a canonical command name and arguments into a typed command.
///
/// Returns `None` for unknown names, missing required arguments, or
/// arguments that fail validation; all three are logged and swallowed.
pub fn parse(
    command: &str,
    args: &[&str],
    caps: &DeviceCapabilities,
    dict: &Dictionaries,
) -> Option<DeviceCommand> {
    let cmd = match command.to_ascii_lowercase().as_str() {
        "clean" | "auto" => DeviceCommand::Clean { mode: "auto" },
        "edge" => DeviceCommand::Clean { mode: "edge" },
        "spot" => DeviceCommand::Clean { mode: "spot" },
        "spotarea" => DeviceCommand::SpotArea {
            areas: required(command, args, 0)?.to_string(),
        },
        "customarea" => DeviceCommand::CustomArea {
            coords: required(command, args, 0)?.to_string(),
            passes: optional_u32(command, args, 1).unwrap_or(1).clamp(1, 2),
        },
        "pause" => DeviceCommand::Pause,
        "resume" => DeviceCommand::Resume,
        "stop" => DeviceCommand::Stop,
        "charge" => DeviceCommand::Charge,
        "playsound" => DeviceCommand::PlaySound {
            sid: optional_u32(command, args, 0).unwrap_or(DEFAULT_SOUND_ID),
        },
        "setfanspeed" => DeviceCommand::SetFanSpeed {
            level: validated(command, args, 0, |v| {
                dict.fan_speed_from_wire(v)
            })?,
        },
        "setwaterlevel" => DeviceCommand::SetWaterLevel {
            level: validated(command, args, 0, |v| {
                dict.water_level_from_wire(v)
            })?,
        },
        "resetlifespan" => DeviceCommand::ResetLifeSpan {
            component: validated(command, args, 0, |v| parse_component(v, dict))?,
        },
        "getbatterystate" | "getbattery" => DeviceCommand::GetBattery,
        "getcleanstate" => DeviceCommand::GetCleanState,
        "getchargestate" => DeviceCommand::GetChargeState,
        "getfanspeed" => DeviceCommand::GetFanSpeed,
        "getwaterlevel" => DeviceCommand::GetWaterLevel,
        "getposition" => DeviceCommand::GetPosition,
        "getchargerpos" | "getchargerposition" => DeviceCommand::GetChargerPosition,
        "getlifespan" => DeviceCommand::GetLifeSpan {
            components: lifespan_components(caps),
        },
        "getnetinfo" => DeviceCommand::GetNetInfo,
        "getsleepstatus" => DeviceCommand::GetSleepStatus,
        "getversion" | "getfirmwareversion" => DeviceCommand::GetFirmwareVersion,
        "getmaps" => DeviceCommand::GetMaps,
        "getspotareas" => DeviceCommand::GetSpotAreas {
            map_id: required(command, args, 0)?.to_string(),
        },
        "getspotareainfo" => DeviceCommand::GetSpotAreaInfo {
            map_id: required(command, args, 0)?.to_string(),
            area_id: required(command, args, 1)?.to_string(),
        },
        "getvirtualboundaries" => DeviceCommand::GetVirtualBoundaries {
            map_id: required(command, args, 0)?.to_string(),
            kind: validated(command, args, 1, parse_boundary_kind)?,
        },
        "getmapimage" => DeviceCommand::GetMapImage {
            map_id: required(command, args, 0)?.to_string(),
            image_type: args
                .get(1)
                .map(|t| t.to_string())
                .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string()),
        },
        "getmaptrace" => DeviceCommand::GetMapTrace,
        "getschedules" => DeviceCommand::GetSchedules,
        "getcleansum" => DeviceCommand::GetCleanSum,
        "getcleanlogs" => DeviceCommand::GetCleanLogs {
            count: optional_u32(command, args, 0).unwrap_or(20) as usize,
        },
        _ => {
            log::debug!("Unknown command '{}', ignoring", command);
            return None;
        }
    };
    Some(cmd)
}

/// Component subset for the compound life-span query, per model capabilities
pub fn lifespan_components(caps: &DeviceCapabilities) -> Vec<ComponentKind> {
    let mut components = vec![ComponentKind::Filter, ComponentKind::SideBrush];
    if caps.has_main_brush {
        components.push(ComponentKind::MainBrush);
    }
    if caps.has_unit_care {
        components.push(ComponentKind::UnitCare);
    }
    if caps.has_round_mop {
        components.push(ComponentKind::RoundMop);
    }
    components
}

fn required<'a>(command: &str, args: &[&'a str], index: usize) -> Option<&'a str> {
    let value = args.get(index).filter(|v| !v.is_empty());
    if value.is_none() {
        log::debug!(
            "Command '{}' missing required argument {}, dropping",
            command,
            index
        );
    }
    value.copied()
}

fn optional_u32(command: &str, args: &[&str], index: usize) -> Option<u32> {
    let raw = args.get(index)?;
    match raw.parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            log::debug!(
                "Command '{}' argument {} is not numeric ('{}'), using default",
                command,
                index,
                raw
            );
            None
        }
    }
}

fn validated<'a, T>(
    command: &str,
    args: &[&'a str],
    index: usize,
    check: impl Fn(&'a str) -> Option<T>,
) -> Option<T> {
    let raw = required(command, args, index)?;
    let value = check(raw);
    if value.is_none() {
        log::debug!(
            "Command '{}' argument '{}' failed validation, dropping",
            command,
            raw
        );
    }
    value
}

fn parse_component(value: &str, dict: &Dictionaries) -> Option<ComponentKind> {
    for kind in [
        ComponentKind::Filter,
        ComponentKind::SideBrush,
        ComponentKind::MainBrush,
        ComponentKind::UnitCare,
        ComponentKind::RoundMop,
    ] {
        if value.eq_ignore_ascii_case(kind.label()) {
            return Some(kind);
        }
    }
    dict.component_from_wire(value)
}

fn parse_boundary_kind(value: &str) -> Option<BoundaryKind> {
    match value.to_ascii_lowercase().as_str() {
        "wall" | "vw" => Some(BoundaryKind::Wall),
        "mop" | "mw" => Some(BoundaryKind::MopRestriction),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::capabilities_for;

    fn dict() -> Dictionaries {
        Dictionaries::builtin()
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let caps = capabilities_for("yna5xi");
        assert_eq!(
            parse("SpotArea", &["1,2"], &caps, &dict()),
            Some(DeviceCommand::SpotArea {
                areas: "1,2".to_string()
            })
        );
        assert_eq!(
            parse("CHARGE", &[], &caps, &dict()),
            Some(DeviceCommand::Charge)
        );
    }

    #[test]
    fn test_unknown_command_is_dropped() {
        let caps = capabilities_for("yna5xi");
        assert_eq!(parse("warpdrive", &[], &caps, &dict()), None);
    }

    #[test]
    fn test_missing_required_argument_is_dropped() {
        let caps = capabilities_for("yna5xi");
        assert_eq!(parse("spotarea", &[], &caps, &dict()), None);
        assert_eq!(parse("setfanspeed", &[], &caps, &dict()), None);
        assert_eq!(parse("getspotareainfo", &["1"], &caps, &dict()), None);
    }

    #[test]
    fn test_invalid_argument_is_dropped() {
        let caps = capabilities_for("yna5xi");
        assert_eq!(parse("setfanspeed", &["ludicrous"], &caps, &dict()), None);
        assert_eq!(
            parse("getvirtualboundaries", &["1", "fence"], &caps, &dict()),
            None
        );
    }

    #[test]
    fn test_lifespan_expansion_follows_capabilities() {
        let with_main = capabilities_for("vi829v"); // main brush + unit care
        let Some(DeviceCommand::GetLifeSpan { components }) =
            parse("getlifespan", &[], &with_main, &dict())
        else {
            panic!("expected lifespan command");
        };
        assert_eq!(
            components,
            vec![
                ComponentKind::Filter,
                ComponentKind::SideBrush,
                ComponentKind::MainBrush,
                ComponentKind::UnitCare
            ]
        );

        let round_mop = capabilities_for("x5d34r"); // no main brush, round mop
        let Some(DeviceCommand::GetLifeSpan { components }) =
            parse("getlifespan", &[], &round_mop, &dict())
        else {
            panic!("expected lifespan command");
        };
        assert!(!components.contains(&ComponentKind::MainBrush));
        assert!(components.contains(&ComponentKind::RoundMop));
    }

    #[test]
    fn test_custom_area_pass_count_clamped() {
        let caps = capabilities_for("yna5xi");
        assert_eq!(
            parse("customarea", &["0,0,1000,1000", "5"], &caps, &dict()),
            Some(DeviceCommand::CustomArea {
                coords: "0,0,1000,1000".to_string(),
                passes: 2
            })
        );
    }

    #[test]
    fn test_component_parse_accepts_labels_and_wire_codes() {
        let caps = capabilities_for("yna5xi");
        assert_eq!(
            parse("resetlifespan", &["sideBrush"], &caps, &dict()),
            Some(DeviceCommand::ResetLifeSpan {
                component: ComponentKind::SideBrush
            })
        );
        assert_eq!(
            parse("resetlifespan", &["DustCaseHeap"], &caps, &dict()),
            Some(DeviceCommand::ResetLifeSpan {
                component: ComponentKind::Filter
            })
        );
    }
}
