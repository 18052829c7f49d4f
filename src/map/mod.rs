//! Map registry and reassembly engine.
//!
//! Holds everything the device reports about its maps: the map list, spot
//! areas with their decompressed boundary polygons, virtual boundaries (with
//! the wall/mop two-payload join), chunked full-map image transfers, and the
//! live low-resolution map stream.

pub mod geometry;
pub mod pieces;
pub mod render;

pub use pieces::{
    decode_compressed, AssemblyState, LiveMapSeed, LiveMapStore, MapImageStore, PiecePayload,
};
pub use render::RenderedMap;

use crate::error::Result;
use crate::types::{ChargerPosition, DevicePosition};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Map metadata as reported by the device
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapSummary {
    /// Model-assigned map id (numeric-valued string)
    pub id: String,
    pub name: Option<String>,
    pub index: Option<u32>,
    pub in_use: bool,
    pub built: bool,
}

/// Per-area clean settings carried by the spot-area info payload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AreaCleanSettings {
    pub pass_count: Option<u32>,
    pub fan_speed: Option<String>,
    pub water_level: Option<String>,
}

/// Decompressed spot-area details. An area is usable for membership tests
/// only once this exists, i.e. once its boundary list has been parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpotAreaInfo {
    /// Polygon vertices in map millimeter coordinates
    pub boundary: Vec<(f64, f64)>,
    pub clean_settings: Option<AreaCleanSettings>,
    /// Manual ordering index, when the user has sorted areas
    pub order: Option<u32>,
}

/// One named/indexed polygonal cleaning region of a map
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpotArea {
    pub id: String,
    /// Room subtype code reported by the device ("3" = living room etc.)
    pub subtype: Option<String>,
    pub name: Option<String>,
    pub info: Option<SpotAreaInfo>,
}

/// Virtual boundary type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundaryKind {
    /// No-entry line/polygon
    Wall,
    /// No-wet-mopping line/polygon
    MopRestriction,
}

impl BoundaryKind {
    /// Wire code used by the map-set payloads
    pub fn from_wire(wire: &str) -> Option<Self> {
        match wire {
            "vw" => Some(BoundaryKind::Wall),
            "mw" => Some(BoundaryKind::MopRestriction),
            _ => None,
        }
    }
}

/// One user-defined no-go / no-mop barrier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualBoundary {
    pub id: String,
    pub kind: BoundaryKind,
    /// Line or polygon vertices in map millimeter coordinates
    pub points: Vec<(f64, f64)>,
}

/// Two-slot join record for the wall/mop boundary payload pair.
///
/// Wall-type and mop-restriction-type boundary lists arrive as independent
/// payloads for the same map. Either alone stays buffered; both together
/// produce exactly one consolidated emission, after which the slots reset.
#[derive(Debug, Default)]
pub struct BoundaryJoin {
    wall: Option<Vec<VirtualBoundary>>,
    mop: Option<Vec<VirtualBoundary>>,
}

impl BoundaryJoin {
    /// Fill one slot
    pub fn store(&mut self, kind: BoundaryKind, boundaries: Vec<VirtualBoundary>) {
        match kind {
            BoundaryKind::Wall => self.wall = Some(boundaries),
            BoundaryKind::MopRestriction => self.mop = Some(boundaries),
        }
    }

    /// Completion predicate: both payloads received
    pub fn is_complete(&self) -> bool {
        self.wall.is_some() && self.mop.is_some()
    }

    /// Union of both slots, resetting the record for the next refresh cycle
    pub fn take(&mut self) -> Vec<VirtualBoundary> {
        let mut all = self.wall.take().unwrap_or_default();
        all.extend(self.mop.take().unwrap_or_default());
        all
    }
}

#[derive(Debug, Default)]
struct MapRecord {
    summary: MapSummary,
    spot_areas: BTreeMap<String, SpotArea>,
    boundaries: Vec<VirtualBoundary>,
}

/// The per-session map state machine
#[derive(Debug, Default)]
pub struct MapEngine {
    maps: HashMap<String, MapRecord>,
    images: MapImageStore,
    live: LiveMapStore,
    joins: HashMap<String, BoundaryJoin>,
}

impl MapEngine {
    /// Replace the map list, keeping spot areas and boundaries for map ids
    /// that persist across the refresh.
    pub fn replace_maps(&mut self, summaries: Vec<MapSummary>) {
        let mut next: HashMap<String, MapRecord> = HashMap::new();
        for summary in summaries {
            let mut record = self.maps.remove(&summary.id).unwrap_or_default();
            record.summary = summary;
            next.insert(record.summary.id.clone(), record);
        }
        self.maps = next;
    }

    /// All known maps
    pub fn maps(&self) -> Vec<MapSummary> {
        let mut all: Vec<MapSummary> = self.maps.values().map(|r| r.summary.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// The map currently in use, if any
    pub fn active_map_id(&self) -> Option<String> {
        self.maps
            .values()
            .find(|r| r.summary.in_use)
            .map(|r| r.summary.id.clone())
    }

    /// Mark one map as the in-use map, creating it if unseen
    pub fn set_current_map(&mut self, map_id: &str, name: Option<String>) {
        for record in self.maps.values_mut() {
            record.summary.in_use = record.summary.id == map_id;
        }
        let record = self.maps.entry(map_id.to_string()).or_default();
        record.summary.id = map_id.to_string();
        record.summary.in_use = true;
        if name.is_some() {
            record.summary.name = name;
        }
    }

    /// Replace a map's spot-area list, preserving decompressed info for
    /// area ids that persist.
    pub fn set_spot_areas(&mut self, map_id: &str, areas: Vec<SpotArea>) {
        let record = self.ensure_map(map_id);
        let mut previous = std::mem::take(&mut record.spot_areas);
        for mut area in areas {
            if area.info.is_none() {
                if let Some(old) = previous.remove(&area.id) {
                    area.info = old.info;
                }
            }
            record.spot_areas.insert(area.id.clone(), area);
        }
    }

    /// Attach decompressed info to one spot area
    pub fn set_spot_area_info(&mut self, map_id: &str, area: SpotArea) {
        let record = self.ensure_map(map_id);
        record.spot_areas.insert(area.id.clone(), area);
    }

    /// Spot areas of a map, in id order
    pub fn spot_areas(&self, map_id: &str) -> Vec<SpotArea> {
        self.maps
            .get(map_id)
            .map(|r| r.spot_areas.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Spot area containing a map-frame position, resolved by
    /// point-in-polygon over areas whose boundary has been decompressed.
    pub fn spot_area_containing(&self, map_id: &str, x: f64, y: f64) -> Option<String> {
        let record = self.maps.get(map_id)?;
        for area in record.spot_areas.values() {
            if let Some(info) = &area.info {
                if geometry::point_in_polygon(x, y, &info.boundary) {
                    return Some(area.id.clone());
                }
            }
        }
        None
    }

    /// Feed one boundary-list payload into the two-slot join. Returns the
    /// consolidated union exactly when the second slot fills.
    pub fn store_boundaries(
        &mut self,
        map_id: &str,
        kind: BoundaryKind,
        boundaries: Vec<VirtualBoundary>,
    ) -> Option<Vec<VirtualBoundary>> {
        let join = self.joins.entry(map_id.to_string()).or_default();
        join.store(kind, boundaries);
        if !join.is_complete() {
            log::debug!(
                "Map {}: buffering {:?} boundaries, waiting for the paired payload",
                map_id,
                kind
            );
            return None;
        }
        let consolidated = join.take();
        self.ensure_map(map_id).boundaries = consolidated.clone();
        Some(consolidated)
    }

    /// Last consolidated boundary set for a map
    pub fn boundaries(&self, map_id: &str) -> Vec<VirtualBoundary> {
        self.maps
            .get(map_id)
            .map(|r| r.boundaries.clone())
            .unwrap_or_default()
    }

    /// Apply one full-map image piece
    pub fn ingest_piece(&mut self, piece: &PiecePayload) -> AssemblyState {
        self.images.ingest(piece)
    }

    /// Render a complete full-map image
    pub fn render_image(
        &self,
        map_id: &str,
        image_type: &str,
        device: Option<DevicePosition>,
        charger: Option<ChargerPosition>,
    ) -> Result<RenderedMap> {
        let assembly = self.images.get(map_id, image_type).ok_or_else(|| {
            crate::error::Error::MapImageIncomplete {
                stored: 0,
                expected: 0,
            }
        })?;
        render::render_assembly(assembly, device, charger)
    }

    /// Apply a live-map major payload
    pub fn ingest_live_major(&mut self, seed: &LiveMapSeed) {
        self.live.ingest_major(seed);
    }

    /// Apply a live-map minor payload
    pub fn ingest_live_minor(&mut self, map_id: &str, index: u32, data: Vec<u8>) {
        self.live.ingest_minor(map_id, index, data);
    }

    /// Render the live map for a map id; fails with a geometry error when no
    /// major payload has established the canvas for that map.
    pub fn render_live(
        &self,
        map_id: &str,
        device: Option<DevicePosition>,
        charger: Option<ChargerPosition>,
    ) -> Result<RenderedMap> {
        let live = self.live.require(map_id)?;
        render::render_live(live, device, charger)
    }

    /// The map id of the current live image, if any
    pub fn live_map_id(&self) -> Option<String> {
        self.live.current().map(|l| l.map_id.clone())
    }

    /// Drop all buffered transfer state (reconnect/teardown)
    pub fn clear_transfers(&mut self) {
        self.images.clear();
        self.live.clear();
        self.joins.clear();
    }

    fn ensure_map(&mut self, map_id: &str) -> &mut MapRecord {
        let record = self.maps.entry(map_id.to_string()).or_default();
        if record.summary.id.is_empty() {
            record.summary.id = map_id.to_string();
        }
        record
    }
}
