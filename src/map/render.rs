//! Raster rendering of reassembled map images.
//!
//! Pixel bytes from the wire are an indexed color type (0 = unexplored,
//! 1 = floor, 2 = wall, 3 = carpet). Rendering composes the stored pieces
//! onto an RGBA canvas in the map's coordinate frame, overlays device and
//! charger markers at their last-known positions, and returns the canvas
//! PNG-encoded as base64. Rendering is a pure function of its inputs and may
//! be invoked repeatedly.

use crate::error::{Error, Result};
use crate::map::pieces::{AssemblyState, LiveMapImage, MapImageAssembly};
use crate::types::{ChargerPosition, DevicePosition};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{Rgba, RgbaImage};

/// Marker edge length in pixels
const MARKER_SIZE: u32 = 5;

const COLOR_FLOOR: Rgba<u8> = Rgba([136, 196, 252, 255]);
const COLOR_WALL: Rgba<u8> = Rgba([37, 76, 122, 255]);
const COLOR_CARPET: Rgba<u8> = Rgba([182, 170, 220, 255]);
const COLOR_DEVICE: Rgba<u8> = Rgba([235, 64, 52, 255]);
const COLOR_CHARGER: Rgba<u8> = Rgba([64, 192, 96, 255]);

/// A finished raster, ready for listeners
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RenderedMap {
    pub map_id: String,
    pub image_type: String,
    pub width: u32,
    pub height: u32,
    /// PNG bytes, base64-encoded
    pub base64_png: String,
}

/// Render a complete full-map assembly
pub fn render_assembly(
    assembly: &MapImageAssembly,
    device: Option<DevicePosition>,
    charger: Option<ChargerPosition>,
) -> Result<RenderedMap> {
    if assembly.state() != AssemblyState::Complete {
        return Err(Error::MapImageIncomplete {
            stored: assembly.stored(),
            expected: assembly.expected(),
        });
    }

    let mut canvas = RgbaImage::new(assembly.total_width, assembly.total_height);
    for piece in assembly.piece_iter() {
        blit(
            &mut canvas,
            &piece.data,
            piece.start_x,
            piece.start_y,
            piece.width,
            piece.height,
        );
    }
    overlay_markers(&mut canvas, assembly.pixel_size_mm, device, charger);

    Ok(RenderedMap {
        map_id: assembly.map_id.clone(),
        image_type: assembly.image_type.clone(),
        width: assembly.total_width,
        height: assembly.total_height,
        base64_png: encode_png(&canvas)?,
    })
}

/// Render the live low-resolution map. Unpatched pieces stay transparent.
pub fn render_live(
    live: &LiveMapImage,
    device: Option<DevicePosition>,
    charger: Option<ChargerPosition>,
) -> Result<RenderedMap> {
    let mut canvas = RgbaImage::new(live.total_width, live.total_height);
    let per_row = live.pieces_per_row();
    for index in 0..live.piece_count() as u32 {
        let Some(data) = live.piece_data(index) else {
            continue;
        };
        let start_x = (index % per_row) * live.piece_width;
        let start_y = (index / per_row) * live.piece_height;
        blit(
            &mut canvas,
            data,
            start_x,
            start_y,
            live.piece_width,
            live.piece_height,
        );
    }
    overlay_markers(&mut canvas, live.pixel_size_mm, device, charger);

    Ok(RenderedMap {
        map_id: live.map_id.clone(),
        image_type: "live".to_string(),
        width: live.total_width,
        height: live.total_height,
        base64_png: encode_png(&canvas)?,
    })
}

/// Copy one piece's indexed pixels onto the canvas
fn blit(canvas: &mut RgbaImage, data: &[u8], start_x: u32, start_y: u32, width: u32, height: u32) {
    for row in 0..height {
        for col in 0..width {
            let Some(&value) = data.get((row * width + col) as usize) else {
                return; // short piece payload, rest stays transparent
            };
            let x = start_x + col;
            let y = start_y + row;
            if x < canvas.width() && y < canvas.height() {
                if let Some(color) = pixel_color(value) {
                    canvas.put_pixel(x, y, color);
                }
            }
        }
    }
}

/// Indexed pixel type to RGBA; unknown types stay transparent
fn pixel_color(value: u8) -> Option<Rgba<u8>> {
    match value {
        0x00 => None,
        0x01 => Some(COLOR_FLOOR),
        0x02 => Some(COLOR_WALL),
        0x03 => Some(COLOR_CARPET),
        other => {
            log::trace!("Unknown map pixel type 0x{:02x}", other);
            None
        }
    }
}

fn overlay_markers(
    canvas: &mut RgbaImage,
    pixel_size_mm: u32,
    device: Option<DevicePosition>,
    charger: Option<ChargerPosition>,
) {
    if let Some(pos) = charger {
        draw_marker(canvas, pixel_size_mm, pos.x, pos.y, COLOR_CHARGER);
    }
    // Device drawn last so it stays visible when parked on the dock
    if let Some(pos) = device {
        draw_marker(canvas, pixel_size_mm, pos.x, pos.y, COLOR_DEVICE);
    }
}

/// Draw a filled square marker centered on a map-frame position
fn draw_marker(canvas: &mut RgbaImage, pixel_size_mm: u32, x_mm: f64, y_mm: f64, color: Rgba<u8>) {
    let Some((cx, cy)) = to_pixel(canvas.width(), canvas.height(), pixel_size_mm, x_mm, y_mm)
    else {
        log::debug!("Marker at ({:.0}, {:.0}) mm falls outside the canvas", x_mm, y_mm);
        return;
    };
    let half = (MARKER_SIZE / 2) as i64;
    for dy in -half..=half {
        for dx in -half..=half {
            let x = cx as i64 + dx;
            let y = cy as i64 + dy;
            if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Map-frame millimeters to canvas pixels. The map origin sits at the canvas
/// center; map y grows up while image rows grow down.
fn to_pixel(
    width: u32,
    height: u32,
    pixel_size_mm: u32,
    x_mm: f64,
    y_mm: f64,
) -> Option<(u32, u32)> {
    let px = (x_mm / pixel_size_mm as f64) + (width as f64 / 2.0);
    let py = (height as f64 / 2.0) - (y_mm / pixel_size_mm as f64);
    if px < 0.0 || py < 0.0 || px >= width as f64 || py >= height as f64 {
        return None;
    }
    Some((px as u32, py as u32))
}

fn encode_png(canvas: &RgbaImage) -> Result<String> {
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(canvas.clone())
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| Error::ImageEncoding(e.to_string()))?;
    Ok(BASE64.encode(&png))
}
