//! Position handlers: device fix and charger dock, with change suppression
//! and derived state.
//!
//! The device reports positions at high rate, mostly unchanged. An update is
//! applied only when at least one field differs from the cached value; only
//! then are spot-area membership and charger distance recomputed and a
//! [`SessionEvent::Position`] re-emitted. Repeated fixes just clear the
//! change flag.

use super::Decoder;
use crate::events::SessionEvent;
use crate::map::geometry;
use crate::payload::Payload;
use crate::types::{ChargerPosition, DevicePosition, PositionUpdate};

impl Decoder<'_> {
    /// Device position; JSON responses may carry the charger position in the
    /// same payload.
    pub(super) fn on_position(&mut self, payload: &Payload) {
        let device = parse_device_position(payload);
        let charger = parse_charger_position(payload);
        if device.is_none() && charger.is_none() {
            log::warn!("Position payload without usable coordinates, skipping");
            return;
        }
        if let Some(pos) = device {
            self.apply_device_position(pos);
        }
        if let Some(charger) = charger {
            self.apply_charger_position(charger);
        }
    }

    /// Charger dock position
    pub(super) fn on_charger_position(&mut self, payload: &Payload) {
        match parse_charger_position(payload)
            .or_else(|| parse_xy(payload).map(|(x, y, a)| ChargerPosition { x, y, angle: a }))
        {
            Some(charger) => self.apply_charger_position(charger),
            None => log::warn!("Charger position payload without coordinates, skipping"),
        }
    }

    fn apply_device_position(&mut self, pos: DevicePosition) {
        if self.state.position == Some(pos) {
            self.state.position_changed = false;
            log::trace!("Repeated position fix, suppressing");
            return;
        }

        self.state.position = Some(pos);
        self.state.position_changed = true;

        let spot_area_id = self
            .maps
            .active_map_id()
            .and_then(|map_id| self.maps.spot_area_containing(&map_id, pos.x, pos.y));
        self.state.current_spot_area = spot_area_id.clone();

        let distance_to_charger = self
            .state
            .charger_position
            .map(|c| geometry::distance(pos.x, pos.y, c.x, c.y));
        self.state.distance_to_charger = distance_to_charger;

        self.state.touch();
        self.emit(SessionEvent::Position(PositionUpdate {
            position: pos,
            changed: true,
            spot_area_id,
            distance_to_charger,
        }));
    }

    fn apply_charger_position(&mut self, charger: ChargerPosition) {
        if self.state.charger_position == Some(charger) {
            log::trace!("Repeated charger position, suppressing");
            return;
        }
        self.state.charger_position = Some(charger);
        if let Some(pos) = self.state.position {
            self.state.distance_to_charger =
                Some(geometry::distance(pos.x, pos.y, charger.x, charger.y));
        }
        self.state.touch();
        self.emit(SessionEvent::ChargerPosition(charger));
    }
}

fn parse_device_position(payload: &Payload) -> Option<DevicePosition> {
    let source = payload
        .sub("deebotPos")
        .or_else(|| payload.sub("devicePos"))
        .or_else(|| payload.sub("pos"))
        .unwrap_or_else(|| payload.clone());
    let (x, y, angle) = parse_xy(&source)?;
    Some(DevicePosition {
        x,
        y,
        angle,
        invalid: source.bool_of(&["invalid"]).unwrap_or(false),
    })
}

fn parse_charger_position(payload: &Payload) -> Option<ChargerPosition> {
    // `chargePos` arrives as an object or a one-element list
    let source = payload
        .sub("chargePos")
        .or_else(|| payload.sub_list("chargePos").into_iter().next())?;
    let (x, y, angle) = parse_xy(&source)?;
    Some(ChargerPosition { x, y, angle })
}

/// Coordinates in either shape: explicit `x`/`y` fields, or the legacy
/// packed `p="x,y"` attribute.
fn parse_xy(payload: &Payload) -> Option<(f64, f64, f64)> {
    let angle = payload.f64_of(&["a", "angle"]).unwrap_or(0.0);
    if let (Some(x), Some(y)) = (payload.f64_of(&["x"]), payload.f64_of(&["y"])) {
        return Some((x, y, angle));
    }
    let packed = payload.str_of(&["p"])?;
    let mut parts = packed.split(',').map(|v| v.trim().parse::<f64>());
    match (parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y))) => Some((x, y, angle)),
        _ => None,
    }
}
