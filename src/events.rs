//! Emitted session events and the subscriber fan-out bus.
//!
//! Every decoded payload that changes state re-emits as one canonical
//! [`SessionEvent`] carrying the derived value. Listeners subscribe through
//! an unbounded channel; slow or dropped subscribers never block the session.

use crate::map::{MapSummary, RenderedMap, SpotArea, VirtualBoundary};
use crate::types::{
    ChargeStatus, ChargerPosition, CleanLogEntry, CleanReport, CleanSum, ComponentKind,
    DeviceError, LastCleanSummary, NetworkInfo, PositionUpdate, ScheduleEntry, WaterInfo,
};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Canonical event emitted to external listeners
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BatteryInfo {
        /// Charge level in percent
        level: f64,
        low: Option<bool>,
    },
    CleanReport(CleanReport),
    ChargeState(ChargeStatus),
    FanSpeed(String),
    WaterLevel(WaterInfo),
    Position(PositionUpdate),
    ChargerPosition(ChargerPosition),
    LifeSpan {
        component: ComponentKind,
        /// Remaining life in percent, 2 decimal places
        percent: f64,
    },
    Error(DeviceError),
    NetworkInfo(NetworkInfo),
    SleepStatus(bool),
    FirmwareVersion(String),
    CurrentMap {
        map_id: String,
        name: Option<String>,
    },
    Maps(Vec<MapSummary>),
    MapSpotAreas {
        map_id: String,
        areas: Vec<SpotArea>,
    },
    MapSpotAreaInfo {
        map_id: String,
        area: SpotArea,
    },
    MapVirtualBoundaries {
        map_id: String,
        boundaries: Vec<VirtualBoundary>,
    },
    MapImage(RenderedMap),
    MapLiveImage(RenderedMap),
    MapTrace {
        /// Trace points in map millimeter coordinates
        points: Vec<(f64, f64)>,
    },
    CleanSum(CleanSum),
    CleanLog(Vec<CleanLogEntry>),
    LastCleanLogs(LastCleanSummary),
    Schedules(Vec<ScheduleEntry>),
}

/// Fan-out bus from the session to its subscribers
#[derive(Debug, Default)]
pub struct EventBus {
    senders: Vec<Sender<SessionEvent>>,
}

impl EventBus {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscriber
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.senders.push(tx);
        rx
    }

    /// Deliver one event to every live subscriber, pruning dropped receivers
    pub fn emit(&mut self, event: SessionEvent) {
        log::trace!("Emitting {:?}", event);
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.senders.len()
    }
}
