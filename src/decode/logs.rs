//! Clean-log and schedule decoding.

use super::Decoder;
use crate::events::SessionEvent;
use crate::payload::Payload;
use crate::types::{format_duration, CleanLogEntry, Recurrence, ScheduleEntry};

impl Decoder<'_> {
    /// Clean-log records, from the log service (JSON family) or the wire
    /// (legacy family). Entries are first-write-wins by log id; the "last
    /// clean" summary follows the newest timestamp.
    pub(super) fn on_clean_logs(&mut self, payload: &Payload) {
        let entries = log_entries(payload);
        if entries.is_empty() {
            log::warn!("Clean-log payload without any decodable entries");
            return;
        }
        for entry in entries {
            self.state.insert_clean_log(entry);
        }

        let mut all: Vec<CleanLogEntry> = self.state.clean_logs.values().cloned().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.emit(SessionEvent::CleanLog(all));
        if let Some(last) = self.state.last_clean.clone() {
            self.emit(SessionEvent::LastCleanLogs(last));
        }
    }

    /// Timer/schedule list
    pub(super) fn on_schedules(&mut self, payload: &Payload) {
        let mut sources = payload.sub_list("sched");
        if sources.is_empty() {
            sources = payload.sub_list("s");
        }
        if sources.is_empty() {
            if let Payload::Json(serde_json::Value::Array(items)) = payload {
                sources = items.iter().map(|v| Payload::json(v.clone())).collect();
            }
        }

        let mut schedules = Vec::new();
        for source in &sources {
            match decode_schedule(source, self) {
                Some(entry) => schedules.push(entry),
                None => log::warn!("Schedule entry missing required fields, skipping"),
            }
        }

        self.state.schedules = schedules.clone();
        self.state.touch();
        self.emit(SessionEvent::Schedules(schedules));
    }
}

fn log_entries(payload: &Payload) -> Vec<CleanLogEntry> {
    let mut sources = payload.sub_list("logs");
    if sources.is_empty() {
        sources = payload.sub_list("log");
    }
    if sources.is_empty() {
        sources = payload.sub_list("CleanSt");
    }
    if sources.is_empty() {
        if let Payload::Json(serde_json::Value::Array(items)) = payload {
            sources = items.iter().map(|v| Payload::json(v.clone())).collect();
        }
    }

    let mut entries = Vec::new();
    for source in &sources {
        match decode_log_entry(source) {
            Some(entry) => entries.push(entry),
            None => log::warn!("Clean-log entry missing required fields, skipping"),
        }
    }
    entries
}

fn decode_log_entry(source: &Payload) -> Option<CleanLogEntry> {
    let timestamp = source.i64_of(&["ts", "timestamp", "s"])?;
    // Legacy entries have no id; the start timestamp doubles as one
    let id = source
        .str_of(&["id", "cleanId", "sid"])
        .unwrap_or_else(|| timestamp.to_string());
    let duration_seconds = source.i64_of(&["last", "duration", "l"]).unwrap_or(0);
    Some(CleanLogEntry {
        id,
        timestamp,
        square_meters: source.f64_of(&["area", "a"]).unwrap_or(0.0).max(0.0) as u64,
        duration_seconds,
        duration_text: format_duration(duration_seconds),
        clean_type: source
            .str_of(&["type", "t"])
            .unwrap_or_else(|| "auto".to_string()),
        stop_reason: source
            .str_of(&["stopReason", "f"])
            .unwrap_or_else(|| "finished".to_string()),
        image_url: source.str_of(&["imageUrl", "thumbnail"]),
    })
}

fn decode_schedule(source: &Payload, decoder: &Decoder<'_>) -> Option<ScheduleEntry> {
    let id = source.str_of(&["sid", "n", "id"])?;
    let hour = source.i64_of(&["hour", "h"])?.clamp(0, 23) as u8;
    let minute = source.i64_of(&["minute", "m"])?.clamp(0, 59) as u8;
    let enabled = source.bool_of(&["enable", "o"]).unwrap_or(false);
    let recurrence = source
        .str_of(&["repeat", "f"])
        .map(|mask| parse_recurrence(&mask))
        .unwrap_or(Recurrence::Once);

    // The clean command lives in a content object (JSON) or a child
    // element (legacy)
    let content = source
        .sub("content")
        .or_else(|| source.sub("clean"))
        .unwrap_or_else(|| source.clone());
    let wire_type = content.str_of(&["type"]).unwrap_or_else(|| "auto".to_string());
    let clean_type = decoder
        .dict
        .clean_mode_from_wire(&wire_type)
        .map(str::to_string)
        .unwrap_or(wire_type);
    let areas = content.str_of(&["value", "p"]).filter(|v| !v.is_empty());

    Some(ScheduleEntry {
        id,
        enabled,
        recurrence,
        hour,
        minute,
        clean_type,
        areas,
        map_id: source.str_of(&["mid"]),
    })
}

/// A 7-character 0/1 mask, one bit per weekday starting at Sunday. An empty
/// or all-zero mask means a one-shot timer.
fn parse_recurrence(mask: &str) -> Recurrence {
    let mut bits = 0u8;
    for (i, c) in mask.chars().take(7).enumerate() {
        if c == '1' {
            bits |= 1 << i;
        }
    }
    if bits == 0 {
        Recurrence::Once
    } else {
        Recurrence::Weekly(bits)
    }
}
