//! Argument shaping: typed commands to model-family wire requests.
//!
//! The two families disagree on command names, argument spelling, and even
//! where values live (attributes vs JSON fields, words vs small integers).
//! Shaping is grouped by command family; each arm produces the complete wire
//! request for one flavor.

use super::{ApiChannel, CommandRequest, DeviceCommand, RequestPayload};
use crate::dictionary::Dictionaries;
use crate::map::BoundaryKind;
use crate::payload::AttrBag;
use crate::types::{ComponentKind, ProtocolFlavor};
use serde_json::json;

/// Build the wire request for a typed command on the given model family
pub fn build_request(
    cmd: &DeviceCommand,
    flavor: ProtocolFlavor,
    dict: &Dictionaries,
) -> CommandRequest {
    match flavor {
        ProtocolFlavor::Xml => build_xml(cmd, dict),
        ProtocolFlavor::Json => build_json(cmd, dict),
    }
}

fn xml(name: &str, payload: AttrBag) -> CommandRequest {
    CommandRequest {
        name: name.to_string(),
        payload: RequestPayload::Xml(payload),
        channel: ApiChannel::LegacyXmpp,
    }
}

fn jsn(name: &str, payload: serde_json::Value) -> CommandRequest {
    CommandRequest {
        name: name.to_string(),
        payload: RequestPayload::Json(payload),
        channel: ApiChannel::IotProxy,
    }
}

fn boundary_wire(kind: BoundaryKind) -> &'static str {
    match kind {
        BoundaryKind::Wall => "vw",
        BoundaryKind::MopRestriction => "mw",
    }
}

fn build_xml(cmd: &DeviceCommand, dict: &Dictionaries) -> CommandRequest {
    match cmd {
        DeviceCommand::Clean { mode } => {
            let wire = dict
                .clean_mode_to_wire(mode, ProtocolFlavor::Xml)
                .unwrap_or("auto");
            xml(
                "Clean",
                AttrBag::new("clean")
                    .attr("type", wire)
                    .attr("speed", "standard")
                    .attr("act", "go"),
            )
        }
        DeviceCommand::SpotArea { areas } => xml(
            "Clean",
            AttrBag::new("clean")
                .attr("type", "SpotArea")
                .attr("speed", "standard")
                .attr("act", "go")
                .attr("p", areas),
        ),
        DeviceCommand::CustomArea { coords, passes } => xml(
            "Clean",
            AttrBag::new("clean")
                .attr("type", "CustomArea")
                .attr("speed", "standard")
                .attr("act", "go")
                .attr("p", coords)
                .attr("deep", &passes.to_string()),
        ),
        DeviceCommand::Pause => xml("Clean", AttrBag::new("clean").attr("act", "pause")),
        DeviceCommand::Resume => xml("Clean", AttrBag::new("clean").attr("act", "resume")),
        DeviceCommand::Stop => xml("Clean", AttrBag::new("clean").attr("act", "stop")),
        DeviceCommand::Charge => xml("Charge", AttrBag::new("charge").attr("type", "go")),
        DeviceCommand::PlaySound { sid } => {
            xml("PlaySound", AttrBag::new("playSound").attr("sid", &sid.to_string()))
        }
        DeviceCommand::SetFanSpeed { level } => {
            let wire = dict
                .fan_speed_to_wire(level, ProtocolFlavor::Xml)
                .unwrap_or("standard");
            xml("SetCleanSpeed", AttrBag::new("speed").attr("value", wire))
        }
        DeviceCommand::SetWaterLevel { level } => {
            let wire = dict
                .water_level_to_wire(level, ProtocolFlavor::Xml)
                .unwrap_or("medium");
            xml(
                "SetWaterPermeability",
                AttrBag::new("water").attr("v", wire),
            )
        }
        DeviceCommand::ResetLifeSpan { component } => xml(
            "ResetLifeSpan",
            AttrBag::new("reset")
                .attr("type", dict.component_to_wire(*component, ProtocolFlavor::Xml)),
        ),
        DeviceCommand::GetBattery => xml("GetBatteryInfo", AttrBag::new("battery")),
        DeviceCommand::GetCleanState => xml("GetCleanState", AttrBag::new("clean")),
        DeviceCommand::GetChargeState => xml("GetChargeState", AttrBag::new("charge")),
        DeviceCommand::GetFanSpeed => xml("GetCleanSpeed", AttrBag::new("speed")),
        DeviceCommand::GetWaterLevel => xml("GetWaterPermeability", AttrBag::new("water")),
        DeviceCommand::GetPosition => xml("GetPos", AttrBag::new("pos")),
        DeviceCommand::GetChargerPosition => xml("GetChargerPos", AttrBag::new("pos")),
        DeviceCommand::GetLifeSpan { components } => {
            xml("GetLifeSpan", lifespan_xml(components, dict))
        }
        DeviceCommand::GetNetInfo => xml("GetNetInfo", AttrBag::new("net")),
        DeviceCommand::GetSleepStatus => xml("GetSleepStatus", AttrBag::new("sleep")),
        DeviceCommand::GetFirmwareVersion => {
            xml("GetVersion", AttrBag::new("ver").attr("name", "FW"))
        }
        DeviceCommand::GetMaps => xml("GetMapM", AttrBag::new("map")),
        DeviceCommand::GetSpotAreas { map_id } => xml(
            "GetMapSet",
            AttrBag::new("mapset").attr("tp", "sa").attr("mid", map_id),
        ),
        DeviceCommand::GetSpotAreaInfo { map_id, area_id } => xml(
            "PullM",
            AttrBag::new("pullm")
                .attr("tp", "sa")
                .attr("mid", map_id)
                .attr("pid", area_id),
        ),
        DeviceCommand::GetVirtualBoundaries { map_id, kind } => xml(
            "GetMapSet",
            AttrBag::new("mapset")
                .attr("tp", boundary_wire(*kind))
                .attr("mid", map_id),
        ),
        DeviceCommand::GetMapImage { map_id, image_type } => xml(
            "PullMP",
            AttrBag::new("pullmp")
                .attr("mid", map_id)
                .attr("tp", image_type),
        ),
        DeviceCommand::GetMapTrace => xml("GetTrM", AttrBag::new("trace")),
        DeviceCommand::GetSchedules => xml("GetSched", AttrBag::new("sched")),
        DeviceCommand::GetCleanSum => xml("GetCleanSum", AttrBag::new("cleansum")),
        DeviceCommand::GetCleanLogs { count } => xml(
            "GetCleanLogs",
            AttrBag::new("logs").attr("count", &count.to_string()),
        ),
    }
}

fn build_json(cmd: &DeviceCommand, dict: &Dictionaries) -> CommandRequest {
    match cmd {
        DeviceCommand::Clean { mode } => {
            let wire = dict
                .clean_mode_to_wire(mode, ProtocolFlavor::Json)
                .unwrap_or("auto");
            jsn("clean", json!({"act": "start", "type": wire}))
        }
        DeviceCommand::SpotArea { areas } => jsn(
            "clean",
            json!({"act": "start", "type": "spotArea", "content": areas}),
        ),
        DeviceCommand::CustomArea { coords, passes } => jsn(
            "clean",
            json!({"act": "start", "type": "customArea", "content": coords, "count": passes}),
        ),
        DeviceCommand::Pause => jsn("clean", json!({"act": "pause"})),
        DeviceCommand::Resume => jsn("clean", json!({"act": "resume"})),
        DeviceCommand::Stop => jsn("clean", json!({"act": "stop"})),
        DeviceCommand::Charge => jsn("charge", json!({"act": "go"})),
        DeviceCommand::PlaySound { sid } => jsn("playSound", json!({"sid": sid})),
        DeviceCommand::SetFanSpeed { level } => {
            let wire = numeric_wire(dict.fan_speed_to_wire(level, ProtocolFlavor::Json));
            jsn("setSpeed", json!({"speed": wire}))
        }
        DeviceCommand::SetWaterLevel { level } => {
            let wire = numeric_wire(dict.water_level_to_wire(level, ProtocolFlavor::Json));
            jsn("setWaterInfo", json!({"amount": wire}))
        }
        DeviceCommand::ResetLifeSpan { component } => jsn(
            "resetLifeSpan",
            json!({"type": dict.component_to_wire(*component, ProtocolFlavor::Json)}),
        ),
        DeviceCommand::GetBattery => jsn("getBattery", json!({})),
        DeviceCommand::GetCleanState => jsn("getCleanInfo", json!({})),
        DeviceCommand::GetChargeState => jsn("getChargeState", json!({})),
        DeviceCommand::GetFanSpeed => jsn("getSpeed", json!({})),
        DeviceCommand::GetWaterLevel => jsn("getWaterInfo", json!({})),
        DeviceCommand::GetPosition => jsn("getPos", json!(["devicePos", "chargePos"])),
        DeviceCommand::GetChargerPosition => jsn("getPos", json!(["chargePos"])),
        DeviceCommand::GetLifeSpan { components } => {
            let codes: Vec<&str> = components
                .iter()
                .map(|c| dict.component_to_wire(*c, ProtocolFlavor::Json))
                .collect();
            jsn("getLifeSpan", json!(codes))
        }
        DeviceCommand::GetNetInfo => jsn("getNetInfo", json!({})),
        DeviceCommand::GetSleepStatus => jsn("getSleep", json!({})),
        DeviceCommand::GetFirmwareVersion => jsn("getVersion", json!({})),
        DeviceCommand::GetMaps => jsn("getCachedMapInfo", json!({})),
        DeviceCommand::GetSpotAreas { map_id } => {
            jsn("getMapSet", json!({"mid": map_id, "type": "ar"}))
        }
        DeviceCommand::GetSpotAreaInfo { map_id, area_id } => jsn(
            "getMapSubSet",
            json!({"mid": map_id, "mssid": area_id, "type": "ar"}),
        ),
        DeviceCommand::GetVirtualBoundaries { map_id, kind } => jsn(
            "getMapSet",
            json!({"mid": map_id, "type": boundary_wire(*kind)}),
        ),
        DeviceCommand::GetMapImage { map_id, image_type } => {
            jsn("getMapInfo", json!({"mid": map_id, "type": image_type}))
        }
        DeviceCommand::GetMapTrace => {
            jsn("getMapTrace", json!({"traceStart": 0, "pointCount": 200}))
        }
        DeviceCommand::GetSchedules => jsn("getSched", json!({})),
        DeviceCommand::GetCleanSum => jsn("getTotalStats", json!({})),
        // The JSON family answers clean logs from the log service; the
        // session intercepts this before shaping. Kept total for safety.
        DeviceCommand::GetCleanLogs { count } => jsn("GetCleanLogs", json!({"count": count})),
    }
}

fn lifespan_xml(components: &[ComponentKind], dict: &Dictionaries) -> AttrBag {
    let mut bag = AttrBag::new("lifespan");
    for component in components {
        bag = bag.child(
            AttrBag::new("component")
                .attr("type", dict.component_to_wire(*component, ProtocolFlavor::Xml)),
        );
    }
    bag
}

/// JSON wire tables store numeric codes as strings; requests carry them as
/// numbers.
fn numeric_wire(wire: Option<&str>) -> i64 {
    wire.and_then(|w| w.parse::<i64>().ok()).unwrap_or(0)
}
