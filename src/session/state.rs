//! Versioned device-state snapshot.
//!
//! One [`DeviceState`] per session, mutated only by the decoder handlers.
//! Every applied change bumps the revision counter so listeners that poll
//! the snapshot can tell whether anything moved between reads.

use crate::types::{
    ChargeStatus, ChargerPosition, CleanLogEntry, CleanReport, CleanSum, ComponentKind,
    DeviceError, DevicePosition, LastCleanSummary, NetworkInfo, ScheduleEntry, WaterInfo,
};
use std::collections::{BTreeMap, HashMap};

/// In-memory state of one connected device
#[derive(Debug, Default)]
pub struct DeviceState {
    /// Bumped on every applied change
    pub revision: u64,

    pub battery_level: Option<f64>,
    pub battery_low: Option<bool>,
    pub charge_status: Option<ChargeStatus>,
    pub clean_report: Option<CleanReport>,
    pub fan_speed: Option<String>,
    pub water_info: WaterInfo,
    pub last_error: Option<DeviceError>,
    pub sleeping: Option<bool>,
    pub network: NetworkInfo,
    pub firmware_version: Option<String>,

    pub position: Option<DevicePosition>,
    /// Change flag of the most recent position update
    pub position_changed: bool,
    /// Spot area the device currently stands in
    pub current_spot_area: Option<String>,
    pub distance_to_charger: Option<f64>,
    pub charger_position: Option<ChargerPosition>,

    /// Remaining life percent per component
    pub life_spans: HashMap<ComponentKind, f64>,

    pub clean_sum: Option<CleanSum>,
    /// Clean logs keyed by provider log id, first-write-wins
    pub clean_logs: BTreeMap<String, CleanLogEntry>,
    /// Summary of the newest log by timestamp
    pub last_clean: Option<LastCleanSummary>,

    pub schedules: Vec<ScheduleEntry>,
}

impl DeviceState {
    /// Fresh state for a new connection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a handler applied a change
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    /// Clear everything for a reconnect, keeping nothing from the old link
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Insert a clean-log entry. Existing ids are never overwritten; the
    /// "last clean" summary follows the newest timestamp either way.
    /// Returns whether the entry was newly inserted.
    pub fn insert_clean_log(&mut self, entry: CleanLogEntry) -> bool {
        let newer = self
            .last_clean
            .as_ref()
            .map(|last| entry.timestamp > last.timestamp)
            .unwrap_or(true);
        if newer {
            self.last_clean = Some(LastCleanSummary {
                timestamp: entry.timestamp,
                square_meters: entry.square_meters,
                duration_seconds: entry.duration_seconds,
                image_url: entry.image_url.clone(),
            });
        }

        if self.clean_logs.contains_key(&entry.id) {
            log::trace!("Clean log {} already stored, keeping original", entry.id);
            return false;
        }
        self.clean_logs.insert(entry.id.clone(), entry);
        self.touch();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::format_duration;

    fn log(id: &str, ts: i64) -> CleanLogEntry {
        CleanLogEntry {
            id: id.to_string(),
            timestamp: ts,
            square_meters: 12,
            duration_seconds: 600,
            duration_text: format_duration(600),
            clean_type: "auto".to_string(),
            stop_reason: "finished".to_string(),
            image_url: None,
        }
    }

    #[test]
    fn test_clean_log_first_write_wins() {
        let mut state = DeviceState::new();
        assert!(state.insert_clean_log(log("a", 100)));

        let mut replay = log("a", 100);
        replay.square_meters = 99;
        assert!(!state.insert_clean_log(replay));
        assert_eq!(state.clean_logs["a"].square_meters, 12);
    }

    #[test]
    fn test_last_clean_follows_newest_timestamp() {
        let mut state = DeviceState::new();
        state.insert_clean_log(log("a", 100));
        state.insert_clean_log(log("b", 300));
        state.insert_clean_log(log("c", 200));
        assert_eq!(state.last_clean.as_ref().unwrap().timestamp, 300);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = DeviceState::new();
        state.battery_level = Some(80.0);
        state.insert_clean_log(log("a", 100));
        state.reset();
        assert!(state.battery_level.is_none());
        assert!(state.clean_logs.is_empty());
        assert_eq!(state.revision, 0);
    }
}
