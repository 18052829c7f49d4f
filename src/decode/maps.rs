//! Map-related handlers: map list, spot-area and boundary sets, full-map
//! image pieces, the live map stream, and position traces.
//!
//! These handlers mostly translate wire payloads into [`MapEngine`] calls;
//! the engine owns the buffering rules (piece accumulation, the wall/mop
//! boundary join, live-map geometry).

use super::Decoder;
use crate::events::SessionEvent;
use crate::map::{
    decode_compressed, AreaCleanSettings, AssemblyState, BoundaryKind, LiveMapSeed, MapSummary,
    PiecePayload, SpotArea, SpotAreaInfo, VirtualBoundary,
};
use crate::payload::Payload;

/// Default pixel coverage when a piece payload omits it (50mm per pixel)
const DEFAULT_PIXEL_SIZE_MM: u32 = 50;

impl Decoder<'_> {
    /// Map list with metadata
    pub(super) fn on_maps(&mut self, payload: &Payload) {
        let mut sources = payload.sub_list("info");
        if sources.is_empty() {
            sources = payload.sub_list("m");
        }
        if sources.is_empty() {
            log::warn!("Map list payload without entries, skipping");
            return;
        }

        let mut summaries = Vec::new();
        for source in &sources {
            let Some(id) = source.str_of(&["mid", "i"]) else {
                log::warn!("Map entry without id, skipping");
                continue;
            };
            summaries.push(MapSummary {
                id,
                name: source.str_of(&["name", "n"]),
                index: source.i64_of(&["index"]).map(|i| i.max(0) as u32),
                in_use: source.bool_of(&["using", "u"]).unwrap_or(false),
                built: source.bool_of(&["built", "b"]).unwrap_or(true),
            });
        }
        self.maps.replace_maps(summaries);
        self.state.touch();
        self.emit(SessionEvent::Maps(self.maps.maps()));
        if let Some(current) = self.maps.maps().into_iter().find(|m| m.in_use) {
            self.emit(SessionEvent::CurrentMap {
                map_id: current.id,
                name: current.name,
            });
        }
    }

    /// Map set: the spot-area list, or one of the two virtual-boundary lists
    pub(super) fn on_map_set(&mut self, payload: &Payload) {
        let Some(map_id) = payload.str_of(&["mid"]) else {
            log::warn!("Map set payload without map id, skipping");
            return;
        };
        let set_type = payload.str_of(&["type", "tp"]).unwrap_or_default();

        match set_type.as_str() {
            "ar" | "sa" => self.decode_spot_area_set(&map_id, payload),
            wire => match BoundaryKind::from_wire(wire) {
                Some(kind) => self.decode_boundary_set(&map_id, kind, payload),
                None => log::warn!("Unknown map set type '{}', skipping", wire),
            },
        }
    }

    fn decode_spot_area_set(&mut self, map_id: &str, payload: &Payload) {
        let mut areas = Vec::new();
        for subset in subsets_of(payload) {
            let Some(id) = subset.str_of(&["mssid", "pid", "id"]) else {
                log::warn!("Spot-area subset without id, skipping");
                continue;
            };
            areas.push(SpotArea {
                id,
                subtype: subset.str_of(&["subtype", "subType"]),
                name: subset.str_of(&["name"]),
                info: None,
            });
        }
        self.maps.set_spot_areas(map_id, areas);
        self.state.touch();
        self.emit(SessionEvent::MapSpotAreas {
            map_id: map_id.to_string(),
            areas: self.maps.spot_areas(map_id),
        });
    }

    fn decode_boundary_set(&mut self, map_id: &str, kind: BoundaryKind, payload: &Payload) {
        let mut boundaries = Vec::new();
        for subset in subsets_of(payload) {
            let Some(id) = subset.str_of(&["mssid", "vid", "id"]) else {
                log::warn!("Boundary subset without id, skipping");
                continue;
            };
            let points = subset
                .str_of(&["value", "p", "points"])
                .map(|raw| parse_points(&raw))
                .unwrap_or_default();
            if points.is_empty() {
                log::warn!("Boundary {} without points, skipping", id);
                continue;
            }
            boundaries.push(VirtualBoundary { id, kind, points });
        }

        // The engine buffers until both the wall and mop payloads arrived
        if let Some(consolidated) = self.maps.store_boundaries(map_id, kind, boundaries) {
            self.state.touch();
            self.emit(SessionEvent::MapVirtualBoundaries {
                map_id: map_id.to_string(),
                boundaries: consolidated,
            });
        }
    }

    /// Spot-area detail: decompressed boundary polygon plus clean settings
    pub(super) fn on_map_subset(&mut self, payload: &Payload) {
        let (Some(map_id), Some(area_id)) = (
            payload.str_of(&["mid"]),
            payload.str_of(&["mssid", "pid", "id"]),
        ) else {
            log::warn!("Map subset payload without ids, skipping");
            return;
        };
        let Some(raw) = payload.str_of(&["value", "points"]) else {
            log::warn!("Map subset {} without boundary data, skipping", area_id);
            return;
        };

        // Boundary data is normally deflated; some firmware sends it plain
        let boundary = match decode_compressed(&raw) {
            Ok(bytes) => parse_points(&String::from_utf8_lossy(&bytes)),
            Err(_) => parse_points(&raw),
        };
        if boundary.is_empty() {
            log::warn!(
                "Map subset {} boundary did not parse, area stays unusable",
                area_id
            );
            return;
        }

        let area = SpotArea {
            id: area_id.clone(),
            subtype: payload.str_of(&["subtype", "subType"]),
            name: payload.str_of(&["name"]),
            info: Some(SpotAreaInfo {
                boundary,
                clean_settings: payload
                    .str_of(&["cleanset"])
                    .map(|raw| self.parse_cleanset(&raw)),
                order: payload.i64_of(&["index", "order"]).map(|i| i.max(0) as u32),
            }),
        };
        self.maps.set_spot_area_info(&map_id, area.clone());
        self.state.touch();
        self.emit(SessionEvent::MapSpotAreaInfo { map_id, area });
    }

    /// Per-area clean settings: `passes,fanCode,waterCode` in the JSON wire
    /// codes. Codes that miss the tables are dropped field-wise.
    fn parse_cleanset(&self, raw: &str) -> AreaCleanSettings {
        let mut parts = raw.split(',').map(str::trim);
        AreaCleanSettings {
            pass_count: parts.next().and_then(|v| v.parse::<u32>().ok()),
            fan_speed: parts
                .next()
                .and_then(|v| self.dict.fan_speed_from_wire(v))
                .map(str::to_string),
            water_level: parts
                .next()
                .and_then(|v| self.dict.water_level_from_wire(v))
                .map(str::to_string),
        }
    }

    /// One full-map image piece
    pub(super) fn on_map_piece(&mut self, payload: &Payload) {
        let Some(map_id) = payload.str_of(&["mid"]) else {
            log::warn!("Map piece payload without map id, skipping");
            return;
        };
        let Some(value) = payload.str_of(&["value", "pieceValue"]) else {
            log::warn!("Map piece payload without data, skipping");
            return;
        };
        let data = match decode_compressed(&value) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Map {} piece failed to decompress: {}", map_id, e);
                return;
            }
        };

        let total_width = payload.f64_of(&["totalWidth", "w"]).unwrap_or(0.0) as u32;
        let total_height = payload.f64_of(&["totalHeight", "h"]).unwrap_or(0.0) as u32;
        if total_width == 0 || total_height == 0 {
            log::warn!("Map {} piece without canvas dimensions, skipping", map_id);
            return;
        }
        let piece = PiecePayload {
            image_type: payload
                .str_of(&["type", "tp"])
                .unwrap_or_else(|| "outline".to_string()),
            map_id: map_id.clone(),
            total_width,
            total_height,
            pixel_size_mm: payload
                .f64_of(&["pixel", "pixelSize"])
                .map(|p| p.max(1.0) as u32)
                .unwrap_or(DEFAULT_PIXEL_SIZE_MM),
            expected_pieces: payload.f64_of(&["totalCount", "count"]).unwrap_or(1.0) as u32,
            index: payload.f64_of(&["index", "i"]).unwrap_or(0.0) as u32,
            start_x: payload.f64_of(&["startX"]).unwrap_or(0.0) as u32,
            start_y: payload.f64_of(&["startY"]).unwrap_or(0.0) as u32,
            width: payload.f64_of(&["width"]).unwrap_or(total_width as f64) as u32,
            height: payload.f64_of(&["height"]).unwrap_or(total_height as f64) as u32,
            declared_crc: payload.f64_of(&["crc"]).map(|c| c as u32),
            data,
        };

        let state = self.maps.ingest_piece(&piece);
        log::debug!(
            "Map {} image '{}' piece {}: {:?}",
            map_id,
            piece.image_type,
            piece.index,
            state
        );
        if state == AssemblyState::Complete {
            match self.maps.render_image(
                &map_id,
                &piece.image_type,
                self.state.position,
                self.state.charger_position,
            ) {
                Ok(rendered) => {
                    self.state.touch();
                    self.emit(SessionEvent::MapImage(rendered));
                }
                Err(e) => log::warn!("Map {} render failed: {}", map_id, e),
            }
        }
    }

    /// Live map "major": canvas geometry and per-piece checksum seeds
    pub(super) fn on_major_map(&mut self, payload: &Payload) {
        let Some(map_id) = payload.str_of(&["mid"]) else {
            log::warn!("Major map payload without map id, skipping");
            return;
        };
        let Some(value) = payload.str_of(&["value"]) else {
            log::warn!("Major map payload without checksum list, skipping");
            return;
        };
        let crcs: Vec<u32> = value
            .split(',')
            .filter_map(|v| v.trim().parse::<u32>().ok())
            .collect();
        if crcs.is_empty() {
            log::warn!("Major map checksum list did not parse, skipping");
            return;
        }

        let piece_width = payload.f64_of(&["pieceWidth"]).unwrap_or(100.0) as u32;
        let piece_height = payload.f64_of(&["pieceHeight"]).unwrap_or(100.0) as u32;
        // Square piece grid unless the payload says otherwise
        let columns = (crcs.len() as f64).sqrt().round().max(1.0) as u32;
        let seed = LiveMapSeed {
            map_id,
            total_width: payload
                .f64_of(&["totalWidth"])
                .map(|w| w as u32)
                .unwrap_or(piece_width * columns),
            total_height: payload
                .f64_of(&["totalHeight"])
                .map(|h| h as u32)
                .unwrap_or(piece_height * columns),
            pixel_size_mm: payload
                .f64_of(&["pixel", "pixelSize"])
                .map(|p| p.max(1.0) as u32)
                .unwrap_or(DEFAULT_PIXEL_SIZE_MM),
            piece_width,
            piece_height,
            crcs,
        };
        self.maps.ingest_live_major(&seed);
        self.state.touch();
    }

    /// Live map "minor": one indexed piece patch
    pub(super) fn on_minor_map(&mut self, payload: &Payload) {
        let Some(map_id) = payload.str_of(&["mid"]) else {
            log::warn!("Minor map payload without map id, skipping");
            return;
        };
        let Some(index) = payload.i64_of(&["pieceIndex", "index"]) else {
            log::warn!("Minor map payload without piece index, skipping");
            return;
        };
        let Some(value) = payload.str_of(&["pieceValue", "value"]) else {
            log::warn!("Minor map payload without piece data, skipping");
            return;
        };
        let data = match decode_compressed(&value) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Minor map piece failed to decompress: {}", e);
                return;
            }
        };

        self.maps
            .ingest_live_minor(&map_id, index.max(0) as u32, data);
        self.state.touch();

        if self.live_render_on_patch {
            match self.maps.render_live(
                &map_id,
                self.state.position,
                self.state.charger_position,
            ) {
                Ok(rendered) => self.emit(SessionEvent::MapLiveImage(rendered)),
                // No geometry yet: stays buffered, render callers see the error
                Err(e) => log::debug!("Live map render skipped: {}", e),
            }
        }
    }

    /// Position trace: deflated `x,y;x,y;...` point list
    pub(super) fn on_map_trace(&mut self, payload: &Payload) {
        let Some(value) = payload.str_of(&["data", "trace", "value"]) else {
            log::warn!("Map trace payload without data, skipping");
            return;
        };
        let points = match decode_compressed(&value) {
            Ok(bytes) => parse_points(&String::from_utf8_lossy(&bytes)),
            Err(_) => parse_points(&value),
        };
        if points.is_empty() {
            log::warn!("Map trace did not parse, skipping");
            return;
        }
        self.emit(SessionEvent::MapTrace { points });
    }
}

fn subsets_of(payload: &Payload) -> Vec<Payload> {
    let mut subsets = payload.sub_list("subsets");
    if subsets.is_empty() {
        subsets = payload.sub_list("m");
    }
    subsets
}

/// Point list in either wire spelling: `x1,y1;x2,y2;...` or a flat
/// (optionally bracketed) `x1,y1,x2,y2,...`.
fn parse_points(raw: &str) -> Vec<(f64, f64)> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.contains(';') {
        trimmed
            .split(';')
            .filter_map(|pair| {
                let mut parts = pair.split(',').map(|v| v.trim().parse::<f64>());
                match (parts.next(), parts.next()) {
                    (Some(Ok(x)), Some(Ok(y))) => Some((x, y)),
                    _ => None,
                }
            })
            .collect()
    } else {
        let values: Vec<f64> = trimmed
            .split(',')
            .filter_map(|v| v.trim().parse::<f64>().ok())
            .collect();
        values.chunks_exact(2).map(|c| (c[0], c[1])).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::parse_points;
    use crate::decode::testutil::Harness;
    use crate::events::SessionEvent;
    use crate::map::pieces::encode_compressed;
    use crate::payload::Payload;
    use serde_json::json;

    #[test]
    fn test_parse_points_both_spellings() {
        assert_eq!(
            parse_points("100,200;300,400"),
            vec![(100.0, 200.0), (300.0, 400.0)]
        );
        assert_eq!(
            parse_points("[-3900,-2133,-3900,600]"),
            vec![(-3900.0, -2133.0), (-3900.0, 600.0)]
        );
        assert!(parse_points("").is_empty());
        assert!(parse_points("a,b;c").is_empty());
    }

    #[test]
    fn test_maps_list_emits_current_map() {
        let mut harness = Harness::new();
        let out = harness.dispatch(
            "CachedMapInfo",
            Payload::json(json!({"info": [
                {"mid": "199", "name": "ground floor", "index": 0, "using": 1, "built": 1},
                {"mid": "200", "name": "upstairs", "index": 1, "using": 0, "built": 1}
            ]})),
        );
        assert_eq!(harness.maps.active_map_id(), Some("199".to_string()));
        assert!(out
            .events
            .iter()
            .any(|e| matches!(e, SessionEvent::CurrentMap { map_id, .. } if map_id == "199")));
        assert!(out
            .events
            .iter()
            .any(|e| matches!(e, SessionEvent::Maps(maps) if maps.len() == 2)));
    }

    #[test]
    fn test_spot_area_set() {
        let mut harness = Harness::new();
        let out = harness.dispatch(
            "MapSet",
            Payload::json(json!({
                "type": "ar", "mid": "199",
                "subsets": [{"mssid": "0", "subtype": "3"}, {"mssid": "1"}]
            })),
        );
        assert_eq!(harness.maps.spot_areas("199").len(), 2);
        assert!(matches!(
            out.events.first(),
            Some(SessionEvent::MapSpotAreas { areas, .. }) if areas.len() == 2
        ));
    }

    #[test]
    fn test_boundary_join_emits_once() {
        let mut harness = Harness::new();
        let walls = Payload::json(json!({
            "type": "vw", "mid": "199",
            "subsets": [{"mssid": "0", "value": "[-1000,0,1000,0]"}]
        }));
        let out = harness.dispatch("MapSet", walls);
        assert!(out.events.is_empty());

        let mops = Payload::json(json!({
            "type": "mw", "mid": "199",
            "subsets": [{"mssid": "1", "value": "0,-1000;0,1000"}]
        }));
        let out = harness.dispatch("MapSet", mops);
        let Some(SessionEvent::MapVirtualBoundaries { boundaries, .. }) = out.events.first()
        else {
            panic!("expected consolidated boundaries");
        };
        assert_eq!(boundaries.len(), 2);
    }

    #[test]
    fn test_map_subset_decompresses_boundary() {
        let mut harness = Harness::new();
        let value = encode_compressed(b"0,0;2000,0;2000,2000;0,2000");
        let out = harness.dispatch(
            "MapSubSet",
            Payload::json(json!({
                "mid": "199", "mssid": "4", "name": "kitchen",
                "value": value, "index": 2, "cleanset": "2,1,3"
            })),
        );
        let Some(SessionEvent::MapSpotAreaInfo { area, .. }) = out.events.first() else {
            panic!("expected spot area info event");
        };
        let info = area.info.as_ref().unwrap();
        assert_eq!(info.boundary.len(), 4);
        assert_eq!(info.order, Some(2));
        let settings = info.clean_settings.as_ref().unwrap();
        assert_eq!(settings.pass_count, Some(2));
        assert_eq!(settings.fan_speed.as_deref(), Some("strong"));
        assert_eq!(settings.water_level.as_deref(), Some("high"));
        // Membership works immediately
        assert_eq!(
            harness.maps.spot_area_containing("199", 1000.0, 1000.0),
            Some("4".to_string())
        );
    }

    #[test]
    fn test_map_subset_with_bad_data_stays_unusable() {
        let mut harness = Harness::new();
        let out = harness.dispatch(
            "MapSubSet",
            Payload::json(json!({"mid": "199", "mssid": "4", "value": "@@@@"})),
        );
        assert!(out.events.is_empty());
        assert_eq!(harness.maps.spot_area_containing("199", 0.0, 0.0), None);
    }

    #[test]
    fn test_map_piece_completion_renders_image() {
        let mut harness = Harness::new();
        let piece = |index: u32| {
            json!({
                "mid": "199", "type": "outline",
                "totalWidth": 4, "totalHeight": 4, "pixel": 50,
                "totalCount": 2, "index": index,
                "startX": 0, "startY": index * 2, "width": 4, "height": 2,
                "value": encode_compressed(&[0x01; 8])
            })
        };
        let out = harness.dispatch("MapInfo", Payload::json(piece(0)));
        assert!(out.events.is_empty());
        let out = harness.dispatch("MapInfo", Payload::json(piece(1)));
        assert!(matches!(
            out.events.first(),
            Some(SessionEvent::MapImage(rendered)) if rendered.map_id == "199"
        ));
    }

    #[test]
    fn test_live_map_flow() {
        let mut harness = Harness::new();
        harness.live_render_on_patch = true;

        // Minor before major: buffered silently, no render
        let minor = json!({
            "mid": "199", "pieceIndex": 0,
            "pieceValue": encode_compressed(&[0x01; 4])
        });
        let out = harness.dispatch("MinorMap", Payload::json(minor.clone()));
        assert!(out.events.is_empty());

        let crcs = "0,0,0,0";
        harness.dispatch(
            "MajorMap",
            Payload::json(json!({
                "mid": "199", "pieceWidth": 2, "pieceHeight": 2,
                "pixel": 50, "value": crcs
            })),
        );
        let out = harness.dispatch("MinorMap", Payload::json(minor));
        assert!(matches!(
            out.events.first(),
            Some(SessionEvent::MapLiveImage(rendered)) if rendered.map_id == "199"
        ));
    }

    #[test]
    fn test_map_trace_decode() {
        let mut harness = Harness::new();
        let out = harness.dispatch(
            "MapTrace",
            Payload::json(json!({
                "traceStart": 0,
                "data": encode_compressed(b"10,20;30,40;50,60")
            })),
        );
        let Some(SessionEvent::MapTrace { points }) = out.events.first() else {
            panic!("expected trace event");
        };
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], (50.0, 60.0));
    }
}
