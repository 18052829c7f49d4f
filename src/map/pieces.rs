//! Chunked map-image reassembly.
//!
//! Two transfer protocols share this module:
//!
//! - **Full map images** arrive as an unordered stream of rectangular pieces
//!   per (map id, image type) key. Each piece carries its offset, dimensions,
//!   a checksum, and zlib-compressed pixel data. Pieces may be resent at any
//!   time; a resend with an unchanged checksum is a no-op, a changed checksum
//!   replaces the stored piece. The assembly is renderable only once every
//!   expected piece is present.
//! - **Live map stream**: one low-resolution image per active map, seeded by
//!   a "major" payload that fixes the canvas geometry and per-piece checksum
//!   seeds, then patched piece-by-piece by "minor" payloads.
//!
//! Checksums are CRC32 over the decompressed pixel bytes. A declared checksum
//! that disagrees with the computed one is logged and the computed value is
//! kept; transfers never fail fatally here, they just keep buffering.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::read::ZlibDecoder;
use std::collections::HashMap;
use std::io::Read;

/// Reassembly progress for one (map id, image type) key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// No piece received yet
    Empty,
    /// At least one piece stored, expected count not yet satisfied
    Accumulating,
    /// All expected pieces present
    Complete,
}

/// One decoded map piece as delivered by the wire
#[derive(Debug, Clone)]
pub struct PiecePayload {
    pub map_id: String,
    pub image_type: String,
    pub total_width: u32,
    pub total_height: u32,
    /// Millimeters covered by one pixel
    pub pixel_size_mm: u32,
    pub expected_pieces: u32,
    pub index: u32,
    pub start_x: u32,
    pub start_y: u32,
    pub width: u32,
    pub height: u32,
    /// Checksum declared by the device, if any
    pub declared_crc: Option<u32>,
    /// Decompressed pixel bytes, one byte per pixel
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredPiece {
    pub start_x: u32,
    pub start_y: u32,
    pub width: u32,
    pub height: u32,
    pub crc: u32,
    pub data: Vec<u8>,
}

/// Accumulator for one full map image
#[derive(Debug)]
pub struct MapImageAssembly {
    pub map_id: String,
    pub image_type: String,
    pub total_width: u32,
    pub total_height: u32,
    pub pixel_size_mm: u32,
    /// Pinned from the first accepted piece; later contradictions are logged
    /// but do not rewrite the expectation
    expected_pieces: u32,
    pieces: HashMap<u32, StoredPiece>,
    state: AssemblyState,
}

impl MapImageAssembly {
    fn new(first: &PiecePayload) -> Self {
        Self {
            map_id: first.map_id.clone(),
            image_type: first.image_type.clone(),
            total_width: first.total_width,
            total_height: first.total_height,
            pixel_size_mm: first.pixel_size_mm.max(1),
            expected_pieces: first.expected_pieces.max(1),
            pieces: HashMap::new(),
            state: AssemblyState::Empty,
        }
    }

    /// Current reassembly state
    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Pieces stored so far
    pub fn stored(&self) -> usize {
        self.pieces.len()
    }

    /// Pieces needed for a complete raster
    pub fn expected(&self) -> usize {
        self.expected_pieces as usize
    }

    pub(crate) fn piece_iter(&self) -> impl Iterator<Item = &StoredPiece> {
        self.pieces.values()
    }

    /// Store one piece. Idempotent on checksum match, replacement on
    /// mismatch; returns the state after the piece was applied.
    pub fn ingest(&mut self, piece: &PiecePayload) -> AssemblyState {
        let computed = crc32fast::hash(&piece.data);
        if let Some(declared) = piece.declared_crc {
            if declared != computed {
                log::warn!(
                    "Map {} piece {}: declared crc {:08x} != computed {:08x}, keeping computed",
                    self.map_id,
                    piece.index,
                    declared,
                    computed
                );
            }
        }
        if piece.expected_pieces.max(1) != self.expected_pieces {
            log::debug!(
                "Map {} piece {} declares {} expected pieces, keeping pinned {}",
                self.map_id,
                piece.index,
                piece.expected_pieces,
                self.expected_pieces
            );
        }

        match self.pieces.get(&piece.index) {
            Some(stored) if stored.crc == computed => {
                log::trace!("Map {} piece {} resent unchanged", self.map_id, piece.index);
            }
            previous => {
                if previous.is_some() {
                    log::debug!(
                        "Map {} piece {} replaced with new checksum {:08x}",
                        self.map_id,
                        piece.index,
                        computed
                    );
                }
                self.pieces.insert(
                    piece.index,
                    StoredPiece {
                        start_x: piece.start_x,
                        start_y: piece.start_y,
                        width: piece.width,
                        height: piece.height,
                        crc: computed,
                        data: piece.data.clone(),
                    },
                );
            }
        }

        self.state = if self.pieces.len() >= self.expected_pieces as usize {
            AssemblyState::Complete
        } else {
            AssemblyState::Accumulating
        };
        self.state
    }
}

/// Key for the full-map assembly table
pub type MapImageKey = (String, String);

/// Table of full-map assemblies, one per (map id, image type)
#[derive(Debug, Default)]
pub struct MapImageStore {
    assemblies: HashMap<MapImageKey, MapImageAssembly>,
}

impl MapImageStore {
    /// Apply one piece, creating the assembly on first contact
    pub fn ingest(&mut self, piece: &PiecePayload) -> AssemblyState {
        let key = (piece.map_id.clone(), piece.image_type.clone());
        let assembly = self
            .assemblies
            .entry(key)
            .or_insert_with(|| MapImageAssembly::new(piece));
        assembly.ingest(piece)
    }

    /// Assembly lookup
    pub fn get(&self, map_id: &str, image_type: &str) -> Option<&MapImageAssembly> {
        self.assemblies
            .get(&(map_id.to_string(), image_type.to_string()))
    }

    /// Drop all buffered transfers
    pub fn clear(&mut self) {
        self.assemblies.clear();
    }
}

/// Canvas geometry and checksum seeds from a "major" live-map payload
#[derive(Debug, Clone)]
pub struct LiveMapSeed {
    pub map_id: String,
    pub total_width: u32,
    pub total_height: u32,
    pub pixel_size_mm: u32,
    pub piece_width: u32,
    pub piece_height: u32,
    /// One checksum seed per piece, row-major
    pub crcs: Vec<u32>,
}

/// The continuously-updating low-resolution map image, one per active map
#[derive(Debug)]
pub struct LiveMapImage {
    pub map_id: String,
    pub total_width: u32,
    pub total_height: u32,
    pub pixel_size_mm: u32,
    pub piece_width: u32,
    pub piece_height: u32,
    seeds: Vec<u32>,
    pieces: HashMap<u32, Vec<u8>>,
}

impl LiveMapImage {
    fn new(seed: &LiveMapSeed) -> Self {
        Self {
            map_id: seed.map_id.clone(),
            total_width: seed.total_width,
            total_height: seed.total_height,
            pixel_size_mm: seed.pixel_size_mm.max(1),
            piece_width: seed.piece_width.max(1),
            piece_height: seed.piece_height.max(1),
            seeds: seed.crcs.clone(),
            pieces: HashMap::new(),
        }
    }

    /// Pieces per canvas row
    pub fn pieces_per_row(&self) -> u32 {
        (self.total_width / self.piece_width).max(1)
    }

    /// Number of pieces the canvas is divided into
    pub fn piece_count(&self) -> usize {
        self.seeds.len()
    }

    /// Patched pieces so far
    pub fn patched(&self) -> usize {
        self.pieces.len()
    }

    pub(crate) fn piece_data(&self, index: u32) -> Option<&[u8]> {
        self.pieces.get(&index).map(|d| d.as_slice())
    }

    /// Re-seed checksums from a fresh major payload for the same map.
    /// Patched piece data survives only where its checksum still matches.
    fn reseed(&mut self, seed: &LiveMapSeed) {
        self.total_width = seed.total_width;
        self.total_height = seed.total_height;
        self.pixel_size_mm = seed.pixel_size_mm.max(1);
        self.piece_width = seed.piece_width.max(1);
        self.piece_height = seed.piece_height.max(1);
        self.pieces.retain(|index, data| {
            seed.crcs
                .get(*index as usize)
                .map(|&crc| crc == crc32fast::hash(data))
                .unwrap_or(false)
        });
        self.seeds = seed.crcs.clone();
    }

    /// Patch one indexed piece
    fn patch(&mut self, index: u32, data: Vec<u8>) {
        if index as usize >= self.seeds.len() {
            log::warn!(
                "Live map {}: minor piece index {} out of range ({} pieces)",
                self.map_id,
                index,
                self.seeds.len()
            );
            return;
        }
        let crc = crc32fast::hash(&data);
        self.seeds[index as usize] = crc;
        self.pieces.insert(index, data);
    }
}

/// Holder for the single live map image
#[derive(Debug, Default)]
pub struct LiveMapStore {
    live: Option<LiveMapImage>,
}

impl LiveMapStore {
    /// Apply a major payload: establishes geometry, replacing any prior live
    /// image when the map id differs.
    pub fn ingest_major(&mut self, seed: &LiveMapSeed) {
        let same_map = self
            .live
            .as_ref()
            .map(|live| live.map_id == seed.map_id)
            .unwrap_or(false);
        if same_map {
            if let Some(live) = self.live.as_mut() {
                live.reseed(seed);
            }
            return;
        }
        if let Some(old) = &self.live {
            log::info!(
                "Live map switching from map {} to map {}",
                old.map_id,
                seed.map_id
            );
        }
        self.live = Some(LiveMapImage::new(seed));
    }

    /// Apply a minor payload. Skipped with a log when no geometry has been
    /// established for this map id; rendering is where that becomes a
    /// caller-visible error.
    pub fn ingest_minor(&mut self, map_id: &str, index: u32, data: Vec<u8>) {
        match self.live.as_mut() {
            Some(live) if live.map_id == map_id => live.patch(index, data),
            _ => log::debug!(
                "Live map minor piece for map {} before major payload, skipping",
                map_id
            ),
        }
    }

    /// The current live image, if geometry is established
    pub fn current(&self) -> Option<&LiveMapImage> {
        self.live.as_ref()
    }

    /// Live image for a specific map id, or a geometry error
    pub fn require(&self, map_id: &str) -> Result<&LiveMapImage> {
        match &self.live {
            Some(live) if live.map_id == map_id => Ok(live),
            _ => Err(Error::MapGeometryUnknown(map_id.to_string())),
        }
    }

    /// Drop the live image
    pub fn clear(&mut self) {
        self.live = None;
    }
}

/// Decode a binary wire field: base64, then zlib inflate
pub fn decode_compressed(value: &str) -> Result<Vec<u8>> {
    let compressed = BASE64
        .decode(value.trim())
        .map_err(|e| Error::Inflate(format!("base64: {}", e)))?;
    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut data = Vec::new();
    decoder
        .read_to_end(&mut data)
        .map_err(|e| Error::Inflate(format!("zlib: {}", e)))?;
    Ok(data)
}

/// Inverse of [`decode_compressed`], for tests that fabricate wire payloads
#[cfg(test)]
pub(crate) fn encode_compressed(data: &[u8]) -> String {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    BASE64.encode(encoder.finish().unwrap())
}
