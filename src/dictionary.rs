//! Bidirectional lookup tables between wire enums and canonical values.
//!
//! The two model families use different wire codes for the same semantic
//! values (clean modes, fan speeds, water levels, component types), and the
//! device reports numeric error codes that need translation. All tables live
//! in one immutable [`Dictionaries`] value, built once at startup and passed
//! by reference into the catalog and decoder.

use crate::types::{ComponentKind, ProtocolFlavor};

/// Wire codes meaning "no error"; never surfaced as an error event
pub const NO_ERROR_CODES: &[&str] = &["0", "100"];

/// One three-column table row: canonical value, XML wire code, JSON wire code
struct WireRow {
    canonical: &'static str,
    xml: &'static str,
    json: &'static str,
}

// Clean modes. The legacy family capitalizes region cleans and calls edge
// cleaning "border".
const CLEAN_MODES: &[WireRow] = &[
    WireRow { canonical: "auto", xml: "auto", json: "auto" },
    WireRow { canonical: "edge", xml: "border", json: "edge" },
    WireRow { canonical: "spot", xml: "spot", json: "spot" },
    WireRow { canonical: "spotArea", xml: "SpotArea", json: "spotArea" },
    WireRow { canonical: "customArea", xml: "CustomArea", json: "customArea" },
    WireRow { canonical: "stop", xml: "stop", json: "stop" },
    WireRow { canonical: "pause", xml: "pause", json: "pause" },
];

// Fan speeds. The JSON family uses small integers on the wire.
const FAN_SPEEDS: &[WireRow] = &[
    WireRow { canonical: "standard", xml: "standard", json: "0" },
    WireRow { canonical: "strong", xml: "strong", json: "1" },
    WireRow { canonical: "max", xml: "max", json: "2" },
];

// Water levels, likewise numeric on the JSON wire.
const WATER_LEVELS: &[WireRow] = &[
    WireRow { canonical: "low", xml: "low", json: "1" },
    WireRow { canonical: "medium", xml: "medium", json: "2" },
    WireRow { canonical: "high", xml: "high", json: "3" },
    WireRow { canonical: "ultrahigh", xml: "ultrahigh", json: "4" },
];

// Component wire codes per flavor
const COMPONENTS: &[(ComponentKind, &str, &str)] = &[
    (ComponentKind::Filter, "DustCaseHeap", "heap"),
    (ComponentKind::SideBrush, "SideBrush", "sideBrush"),
    (ComponentKind::MainBrush, "Brush", "brush"),
    (ComponentKind::UnitCare, "UnitCare", "unitCare"),
    (ComponentKind::RoundMop, "RoundMop", "roundMop"),
];

// Device error codes. "0" and "100" both mean no error and are filtered
// before this table is consulted.
const ERROR_CODES: &[(&str, &str)] = &[
    ("3", "Request oversized"),
    ("7", "Log upload failed"),
    ("101", "Battery low"),
    ("102", "Host hang, reboot needed"),
    ("103", "Wheel abnormal"),
    ("104", "Down sensor abnormal"),
    ("105", "Stuck"),
    ("106", "Side brush exhausted"),
    ("107", "Main brush exhausted"),
    ("110", "No dust box"),
    ("111", "Self test failed"),
    ("112", "LDS malfunction"),
    ("113", "Charging error"),
    ("201", "Camera error"),
    ("404", "Device offline"),
];

/// Immutable lookup tables, built once and injected
pub struct Dictionaries;

impl Dictionaries {
    /// Built-in table set
    pub fn builtin() -> Self {
        Dictionaries
    }

    /// Canonical clean mode for a wire value of either flavor
    pub fn clean_mode_from_wire(&self, wire: &str) -> Option<&'static str> {
        canonical_from_wire(CLEAN_MODES, wire)
    }

    /// Wire clean mode for a canonical value
    pub fn clean_mode_to_wire(
        &self,
        canonical: &str,
        flavor: ProtocolFlavor,
    ) -> Option<&'static str> {
        wire_from_canonical(CLEAN_MODES, canonical, flavor)
    }

    /// Canonical fan speed for a wire value of either flavor
    pub fn fan_speed_from_wire(&self, wire: &str) -> Option<&'static str> {
        canonical_from_wire(FAN_SPEEDS, wire)
    }

    /// Wire fan speed for a canonical value
    pub fn fan_speed_to_wire(
        &self,
        canonical: &str,
        flavor: ProtocolFlavor,
    ) -> Option<&'static str> {
        wire_from_canonical(FAN_SPEEDS, canonical, flavor)
    }

    /// Canonical water level for a wire value of either flavor
    pub fn water_level_from_wire(&self, wire: &str) -> Option<&'static str> {
        canonical_from_wire(WATER_LEVELS, wire)
    }

    /// Wire water level for a canonical value
    pub fn water_level_to_wire(
        &self,
        canonical: &str,
        flavor: ProtocolFlavor,
    ) -> Option<&'static str> {
        wire_from_canonical(WATER_LEVELS, canonical, flavor)
    }

    /// Component kind for a wire code of either flavor
    pub fn component_from_wire(&self, wire: &str) -> Option<ComponentKind> {
        COMPONENTS
            .iter()
            .find(|(_, xml, json)| wire.eq_ignore_ascii_case(xml) || wire.eq_ignore_ascii_case(json))
            .map(|(kind, _, _)| *kind)
    }

    /// Wire code for a component kind
    pub fn component_to_wire(&self, kind: ComponentKind, flavor: ProtocolFlavor) -> &'static str {
        let (_, xml, json) = COMPONENTS
            .iter()
            .find(|(k, _, _)| *k == kind)
            .unwrap_or(&COMPONENTS[0]);
        match flavor {
            ProtocolFlavor::Xml => xml,
            ProtocolFlavor::Json => json,
        }
    }

    /// Whether a wire error code means "no error"
    pub fn is_no_error(&self, code: &str) -> bool {
        NO_ERROR_CODES.contains(&code)
    }

    /// Human-readable description for a device error code. Unknown codes get
    /// a placeholder, never a failure.
    pub fn error_description(&self, code: &str) -> String {
        ERROR_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, d)| (*d).to_string())
            .unwrap_or_else(|| format!("unknown error code {}", code))
    }
}

fn canonical_from_wire(table: &'static [WireRow], wire: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|row| wire.eq_ignore_ascii_case(row.xml) || wire.eq_ignore_ascii_case(row.json))
        .map(|row| row.canonical)
}

fn wire_from_canonical(
    table: &'static [WireRow],
    canonical: &str,
    flavor: ProtocolFlavor,
) -> Option<&'static str> {
    table
        .iter()
        .find(|row| canonical.eq_ignore_ascii_case(row.canonical))
        .map(|row| match flavor {
            ProtocolFlavor::Xml => row.xml,
            ProtocolFlavor::Json => row.json,
        })
}
