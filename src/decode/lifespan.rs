//! Component life-span decoding.
//!
//! The same logical event arrives in four numeric shapes depending on model
//! and firmware, tried in priority order:
//!
//! 1. `{left, total}` - remaining/full capacity, percent = left/total*100
//! 2. `{val, total}`  - same arithmetic, older field names
//! 3. `{val}`         - already a percentage
//! 4. `{left}`        - already a percentage
//!
//! Results are clamped to [0, 100] and rounded to 2 decimal places. A
//! component entry that matches no shape is logged and skipped without
//! failing the remaining entries.

use super::Decoder;
use crate::events::SessionEvent;
use crate::payload::Payload;

impl Decoder<'_> {
    /// Life-span report: a list of per-component entries, a single entry, or
    /// a legacy element with the component in its attributes.
    pub(super) fn on_life_span(&mut self, payload: &Payload) {
        let entries = {
            let mut list = payload.sub_list("components");
            if list.is_empty() {
                list = payload.sub_list("component");
            }
            if list.is_empty() {
                // Single-entry payloads carry the fields directly
                list = vec![payload.clone()];
            }
            list
        };

        for entry in entries {
            self.decode_life_span_entry(&entry);
        }
    }

    fn decode_life_span_entry(&mut self, entry: &Payload) {
        let Some(wire) = entry.str_of(&["type"]) else {
            log::warn!("Life-span entry without component type, skipping");
            return;
        };
        let Some(component) = self.dict.component_from_wire(&wire) else {
            log::warn!("Unknown life-span component '{}', skipping", wire);
            return;
        };
        let Some(percent) = life_span_percent(entry) else {
            log::warn!(
                "Life-span entry for {} matches no known shape, skipping",
                component.label()
            );
            return;
        };

        self.state.life_spans.insert(component, percent);
        self.state.touch();
        self.emit(SessionEvent::LifeSpan { component, percent });
    }
}

/// Apply the shape priority order and return the percentage
fn life_span_percent(entry: &Payload) -> Option<f64> {
    let left = entry.f64_of(&["left"]);
    let val = entry.f64_of(&["val"]);
    let total = entry.f64_of(&["total"]).filter(|t| *t > 0.0);

    let percent = match (left, val, total) {
        (Some(left), _, Some(total)) => left / total * 100.0,
        (_, Some(val), Some(total)) => val / total * 100.0,
        (_, Some(val), None) => val,
        (Some(left), _, None) => left,
        _ => return None,
    };
    Some(round2(percent.clamp(0.0, 100.0)))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
