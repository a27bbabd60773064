//! Indexed (4-bit) bitmap codec for the search/light/height map family
//! (§4.4.2).
//!
//! The on-disk format is a minimal BMP variant: 14-byte file header,
//! 40-byte info header, a 16-entry BGRA palette, then bottom-up,
//! row-padded-to-4-bytes pixel data packed two nibbles per byte (high
//! nibble first).

use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use pie4k_types::{PieError, PieResult};

use crate::{reset_dir, Codec};

const FILE_HEADER_LEN: usize = 14;
const INFO_HEADER_LEN: usize = 40;
const PALETTE_LEN: usize = 16 * 4;
const HEADERS_LEN: usize = FILE_HEADER_LEN + INFO_HEADER_LEN + PALETTE_LEN;

/// A "blocked"/impassable sentinel nibble value used by the search-map
/// variant's optional dilation refinement.
pub const SEARCH_MAP_BLOCKED: u8 = 0x0F;

/// Which optional upscale refinement to apply on top of plain
/// nearest-neighbor (§4.4.2). Both are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Refinement {
    #[default]
    None,
    /// Dilate the passable mask (every value but [`SEARCH_MAP_BLOCKED`]) by
    /// one 8-connected step, filling newly-opened cells with `fill`.
    LanePreservingDilation { fill: u8 },
    /// Each destination cell takes the minimum value over a
    /// `(2*radius+1)^2` neighborhood of its source cell.
    ConservativeSampling { radius: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedBitmap {
    pub width: u32,
    pub height: u32,
    /// Row-major, top-down, one byte per pixel holding the 4-bit index in
    /// its low nibble (the in-memory representation; only the on-disk
    /// encoding packs two nibbles per byte and stores bottom-up).
    pub pixels: Vec<u8>,
}

impl IndexedBitmap {
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn decode(bytes: &[u8]) -> PieResult<IndexedBitmap> {
        if bytes.len() < HEADERS_LEN {
            return Err(PieError::DecodeError("bitmap shorter than its headers".into()));
        }
        if &bytes[0..2] != b"BM" {
            return Err(PieError::DecodeError("missing BM signature".into()));
        }

        let mut info = &bytes[FILE_HEADER_LEN..FILE_HEADER_LEN + INFO_HEADER_LEN];
        let _header_size = info.read_u32::<LittleEndian>()?;
        let width = info.read_i32::<LittleEndian>()? as u32;
        let height_raw = info.read_i32::<LittleEndian>()?;
        let height = height_raw.unsigned_abs();
        let _planes = info.read_u16::<LittleEndian>()?;
        let bit_count = info.read_u16::<LittleEndian>()?;
        if bit_count != 4 {
            return Err(PieError::DecodeError(format!("expected 4-bit indexed bitmap, found {bit_count}-bit")));
        }

        let row_bytes = row_stride(width);
        let pixel_data = &bytes[HEADERS_LEN..];
        let mut pixels = vec![0u8; (width * height) as usize];
        for y in 0..height {
            let src_row = &pixel_data[(y as usize) * row_bytes..(y as usize + 1) * row_bytes];
            // Bottom-up on disk: disk row 0 is the last logical row.
            let dst_y = height - 1 - y;
            for x in 0..width {
                let byte = src_row[(x / 2) as usize];
                let nibble = if x % 2 == 0 { byte >> 4 } else { byte & 0x0F };
                pixels[(dst_y * width + x) as usize] = nibble;
            }
        }

        Ok(IndexedBitmap { width, height, pixels })
    }

    pub fn encode(&self) -> PieResult<Vec<u8>> {
        let row_bytes = row_stride(self.width);
        let pixel_data_len = row_bytes * self.height as usize;
        let file_len = HEADERS_LEN + pixel_data_len;

        let mut out = Vec::with_capacity(file_len);
        out.extend_from_slice(b"BM");
        out.write_u32::<LittleEndian>(file_len as u32)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(HEADERS_LEN as u32)?;

        out.write_u32::<LittleEndian>(INFO_HEADER_LEN as u32)?;
        out.write_i32::<LittleEndian>(self.width as i32)?;
        out.write_i32::<LittleEndian>(self.height as i32)?;
        out.write_u16::<LittleEndian>(1)?;
        out.write_u16::<LittleEndian>(4)?;
        out.write_u32::<LittleEndian>(0)?; // BI_RGB, no compression
        out.write_u32::<LittleEndian>(pixel_data_len as u32)?;
        out.write_i32::<LittleEndian>(0)?;
        out.write_i32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(16)?;
        out.write_u32::<LittleEndian>(0)?;

        for i in 0u32..16 {
            let v = (i * 17) as u8;
            out.push(v); // B
            out.push(v); // G
            out.push(v); // R
            out.push(255); // A/reserved
        }

        for y in 0..self.height {
            let src_y = self.height - 1 - y; // bottom-up on disk
            let mut row = vec![0u8; row_bytes];
            for x in 0..self.width {
                let nibble = self.get(x, src_y) & 0x0F;
                let idx = (x / 2) as usize;
                if x % 2 == 0 {
                    row[idx] |= nibble << 4;
                } else {
                    row[idx] |= nibble;
                }
            }
            out.extend_from_slice(&row);
        }

        Ok(out)
    }

    /// Nearest-neighbor upscale by integer factor `k`, with an optional
    /// refinement pass applied afterward (§4.4.2, P2/I6).
    pub fn upscale(&self, factor: u32, refinement: Refinement) -> IndexedBitmap {
        let factor = factor.max(1);
        let dst_w = self.width * factor;
        let dst_h = self.height * factor;
        let mut pixels = vec![0u8; (dst_w * dst_h) as usize];
        for y in 0..dst_h {
            for x in 0..dst_w {
                let src = self.get(x / factor, y / factor);
                pixels[(y * dst_w + x) as usize] = src;
            }
        }
        let mut upscaled = IndexedBitmap { width: dst_w, height: dst_h, pixels };
        match refinement {
            Refinement::None => {}
            Refinement::LanePreservingDilation { fill } => upscaled.dilate_passable(fill),
            Refinement::ConservativeSampling { radius } => {
                upscaled = self.conservative_sample(factor, radius);
            }
        }
        upscaled
    }

    fn dilate_passable(&mut self, fill: u8) {
        let passable = |v: u8| v != SEARCH_MAP_BLOCKED;
        let original = self.pixels.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y * self.width + x) as usize;
                if passable(original[idx]) {
                    continue;
                }
                let mut open_neighbor = false;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
                            continue;
                        }
                        if passable(original[(ny as u32 * self.width + nx as u32) as usize]) {
                            open_neighbor = true;
                        }
                    }
                }
                if open_neighbor {
                    self.pixels[idx] = fill;
                }
            }
        }
    }

    fn conservative_sample(&self, factor: u32, radius: u32) -> IndexedBitmap {
        let dst_w = self.width * factor;
        let dst_h = self.height * factor;
        let mut pixels = vec![0u8; (dst_w * dst_h) as usize];
        let r = radius as i64;
        for y in 0..dst_h {
            for x in 0..dst_w {
                let sx = (x / factor) as i64;
                let sy = (y / factor) as i64;
                let mut min_val = u8::MAX;
                for dy in -r..=r {
                    for dx in -r..=r {
                        let nx = sx + dx;
                        let ny = sy + dy;
                        if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
                            continue;
                        }
                        min_val = min_val.min(self.get(nx as u32, ny as u32));
                    }
                }
                pixels[(y * dst_w + x) as usize] = min_val;
            }
        }
        IndexedBitmap { width: dst_w, height: dst_h, pixels }
    }
}

fn row_stride(width: u32) -> usize {
    let nibble_bytes = width.div_ceil(2) as usize;
    nibble_bytes.div_ceil(4) * 4
}

pub struct BitmapCodec {
    name: String,
    refinement: Refinement,
}

impl BitmapCodec {
    pub fn new(name: impl Into<String>) -> BitmapCodec {
        BitmapCodec { name: name.into(), refinement: Refinement::None }
    }

    pub fn with_refinement(name: impl Into<String>, refinement: Refinement) -> BitmapCodec {
        BitmapCodec { name: name.into(), refinement }
    }

    fn is_search_map(&self) -> bool {
        self.name.to_ascii_uppercase().contains("SR")
    }
}

const RAW_FILE: &str = "bitmap.bin";

impl Codec for BitmapCodec {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &'static str {
        "bmp"
    }

    fn extract(&self, source: &[u8], work_root: &Path) -> PieResult<()> {
        // Validated round-trip through the in-memory form, then the raw
        // bytes are kept verbatim as the editable intermediate: there is no
        // human-friendlier representation for a 4-bit index grid than the
        // grid itself, so "extract" here mainly exists to fail fast on a
        // malformed source file.
        let _ = IndexedBitmap::decode(source)?;
        let dir = self.extracted_dir(work_root);
        reset_dir(&dir)?;
        std::fs::write(dir.join(RAW_FILE), source).map_err(|e| PieError::io(dir.display().to_string(), e))
    }

    fn upscale(&self, work_root: &Path, factor: u32) -> PieResult<()> {
        let raw = std::fs::read(self.extracted_dir(work_root).join(RAW_FILE))
            .map_err(|e| PieError::io("extracted bitmap".into(), e))?;
        let bitmap = IndexedBitmap::decode(&raw)?;
        let refinement = if self.is_search_map() { self.refinement } else { Refinement::None };
        let upscaled = bitmap.upscale(factor, refinement);

        let dir = self.upscaled_dir(work_root);
        reset_dir(&dir)?;
        let encoded = upscaled.encode()?;
        std::fs::write(dir.join(RAW_FILE), encoded).map_err(|e| PieError::io(dir.display().to_string(), e))
    }

    fn assemble(&self, work_root: &Path) -> PieResult<Vec<u8>> {
        std::fs::read(self.upscaled_dir(work_root).join(RAW_FILE))
            .map_err(|e| PieError::io("upscaled bitmap".into(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard() -> IndexedBitmap {
        // 2x2: top row A,B ; bottom row C,D (top-down in memory).
        IndexedBitmap { width: 2, height: 2, pixels: vec![0xA, 0xB, 0xC, 0xD] }
    }

    #[test]
    fn round_trips_identically_through_encode_decode() {
        let bitmap = checkerboard();
        let bytes = bitmap.encode().unwrap();
        let decoded = IndexedBitmap::decode(&bytes).unwrap();
        assert_eq!(decoded, bitmap);
    }

    #[test]
    fn encode_writes_grayscale_palette_and_bottom_up_padded_rows() {
        let bytes = checkerboard().encode().unwrap();
        let palette = &bytes[FILE_HEADER_LEN + INFO_HEADER_LEN..FILE_HEADER_LEN + INFO_HEADER_LEN + PALETTE_LEN];
        assert_eq!(&palette[0..4], &[0, 0, 0, 255]);
        assert_eq!(&palette[4..8], &[17, 17, 17, 255]);

        let row_bytes = row_stride(2);
        assert_eq!(row_bytes, 4);
        let pixel_data = &bytes[HEADERS_LEN..];
        // Bottom-up: row0 on disk is the logical bottom row C,D.
        assert_eq!(pixel_data[0], 0xCD);
        assert_eq!(pixel_data[row_bytes], 0xAB);
    }

    #[test]
    fn s1_scenario_upscale_by_two_produces_four_quadrant_blocks() {
        let bitmap = checkerboard();
        let upscaled = bitmap.upscale(2, Refinement::None);
        assert_eq!((upscaled.width, upscaled.height), (4, 4));
        assert_eq!(upscaled.get(0, 0), 0xA);
        assert_eq!(upscaled.get(1, 0), 0xA);
        assert_eq!(upscaled.get(2, 0), 0xB);
        assert_eq!(upscaled.get(3, 0), 0xB);
        assert_eq!(upscaled.get(0, 2), 0xC);
        assert_eq!(upscaled.get(2, 3), 0xD);
    }

    #[test]
    fn upscale_factor_one_is_identity() {
        let bitmap = checkerboard();
        assert_eq!(bitmap.upscale(1, Refinement::None), bitmap);
    }

    #[test]
    fn dilation_opens_neighbors_of_blocked_cells() {
        let bitmap = IndexedBitmap {
            width: 3,
            height: 1,
            pixels: vec![0x1, SEARCH_MAP_BLOCKED, 0x1],
        };
        let dilated = bitmap.upscale(1, Refinement::LanePreservingDilation { fill: 0x2 });
        assert_eq!(dilated.get(1, 0), 0x2);
    }

    #[test]
    fn conservative_sampling_takes_the_minimum_neighbor() {
        let bitmap = IndexedBitmap { width: 2, height: 1, pixels: vec![5, 1] };
        let sampled = bitmap.upscale(1, Refinement::ConservativeSampling { radius: 1 });
        assert_eq!(sampled.get(0, 0), 1);
        assert_eq!(sampled.get(1, 0), 1);
    }
}
