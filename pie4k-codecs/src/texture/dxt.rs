//! Hand-rolled DXT1/DXT5 block compression (§4.4.3).
//!
//! Deliberately not delegated to a general-purpose BC encoder: §4.4.3
//! pins an exact deterministic bounding-box algorithm (no clustering/PCA
//! fit) so re-mastered textures byte-match across runs, which rules out
//! the ISPC-based encoders the wider ecosystem reaches for.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DxtFormat {
    Dxt1,
    Dxt5,
}

/// Tightly packed ARGB8 image (A, R, G, B byte order per texel), top-down
/// row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Image {
    pub fn argb_at(&self, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let i = ((y * self.width + x) * 4) as usize;
        (self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3])
    }

    /// Pad with fully-transparent-black texels up to the next power of two
    /// on each axis independently (§4.4.3 "Encoding").
    pub fn pad_to_power_of_two(&self) -> Image {
        let dst_w = self.width.next_power_of_two().max(1);
        let dst_h = self.height.next_power_of_two().max(1);
        if dst_w == self.width && dst_h == self.height {
            return self.clone();
        }
        let mut pixels = vec![0u8; (dst_w * dst_h * 4) as usize];
        for y in 0..self.height {
            let src_row = &self.pixels[(y * self.width * 4) as usize..((y + 1) * self.width * 4) as usize];
            let dst_start = (y * dst_w * 4) as usize;
            pixels[dst_start..dst_start + src_row.len()].copy_from_slice(src_row);
        }
        Image { width: dst_w, height: dst_h, pixels }
    }

    /// AUTO format selection (§4.4.3): DXT5 iff some pixel has alpha
    /// strictly between 0x20 and 0xE0.
    pub fn choose_format(&self) -> DxtFormat {
        let needs_ramp = self.pixels.chunks_exact(4).any(|p| {
            let a = p[0];
            a > 0x20 && a < 0xE0
        });
        if needs_ramp {
            DxtFormat::Dxt5
        } else {
            DxtFormat::Dxt1
        }
    }
}

pub fn encode(image: &Image, format: DxtFormat) -> Vec<u8> {
    let padded = image.pad_to_power_of_two();
    let blocks_x = padded.width / 4;
    let blocks_y = padded.height / 4;
    let mut out = Vec::new();
    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let texels = gather_block(&padded, bx * 4, by * 4);
            match format {
                DxtFormat::Dxt1 => out.extend_from_slice(&encode_color_block(&texels)),
                DxtFormat::Dxt5 => {
                    out.extend_from_slice(&encode_alpha_block(&texels));
                    out.extend_from_slice(&encode_color_block(&texels));
                }
            }
        }
    }
    out
}

pub fn decode(bytes: &[u8], format: DxtFormat, width: u32, height: u32) -> Image {
    let blocks_x = width.div_ceil(4);
    let blocks_y = height.div_ceil(4);
    let block_len = match format {
        DxtFormat::Dxt1 => 8,
        DxtFormat::Dxt5 => 16,
    };
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    let mut offset = 0;
    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let block = &bytes[offset..offset + block_len];
            offset += block_len;
            let texels = match format {
                DxtFormat::Dxt1 => decode_color_block(block),
                DxtFormat::Dxt5 => {
                    let alpha = decode_alpha_block(&block[0..8]);
                    let rgb = decode_color_block(&block[8..16]);
                    let mut merged = [(0u8, 0u8, 0u8, 0u8); 16];
                    for i in 0..16 {
                        merged[i] = (alpha[i], rgb[i].1, rgb[i].2, rgb[i].3);
                    }
                    merged
                }
            };
            for ty in 0..4u32 {
                for tx in 0..4u32 {
                    let x = bx * 4 + tx;
                    let y = by * 4 + ty;
                    if x >= width || y >= height {
                        continue;
                    }
                    let (a, r, g, b) = texels[(ty * 4 + tx) as usize];
                    let i = ((y * width + x) * 4) as usize;
                    pixels[i] = a;
                    pixels[i + 1] = r;
                    pixels[i + 2] = g;
                    pixels[i + 3] = b;
                }
            }
        }
    }
    Image { width, height, pixels }
}

fn gather_block(image: &Image, x0: u32, y0: u32) -> [(u8, u8, u8, u8); 16] {
    let mut texels = [(0u8, 0u8, 0u8, 0u8); 16];
    for ty in 0..4u32 {
        for tx in 0..4u32 {
            let x = (x0 + tx).min(image.width - 1);
            let y = (y0 + ty).min(image.height - 1);
            texels[(ty * 4 + tx) as usize] = image.argb_at(x, y);
        }
    }
    texels
}

fn to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = (r as u16) >> 3;
    let g6 = (g as u16) >> 2;
    let b5 = (b as u16) >> 3;
    (r5 << 11) | (g6 << 5) | b5
}

fn from_rgb565(v: u16) -> (u8, u8, u8) {
    let r5 = (v >> 11) & 0x1F;
    let g6 = (v >> 5) & 0x3F;
    let b5 = v & 0x1F;
    let r = ((r5 << 3) | (r5 >> 2)) as u8;
    let g = ((g6 << 2) | (g6 >> 4)) as u8;
    let b = ((b5 << 3) | (b5 >> 2)) as u8;
    (r, g, b)
}

fn dist2(a: (u8, u8, u8), b: (u8, u8, u8)) -> i32 {
    let dr = a.0 as i32 - b.0 as i32;
    let dg = a.1 as i32 - b.1 as i32;
    let db = a.2 as i32 - b.2 as i32;
    dr * dr + dg * dg + db * db
}

fn nearest_index(rgb: (u8, u8, u8), palette: &[(u8, u8, u8); 4]) -> u8 {
    let mut best = 0u8;
    let mut best_dist = i32::MAX;
    for (i, p) in palette.iter().enumerate() {
        let d = dist2(rgb, *p);
        if d < best_dist {
            best_dist = d;
            best = i as u8;
        }
    }
    best
}

fn lerp(a: u8, b: u8, num: u32, den: u32) -> u8 {
    ((a as u32 * (den - num) + b as u32 * num) / den) as u8
}

/// Simple bounding-box endpoint selection + nearest-index color block,
/// shared by DXT1 and DXT5's color section (§4.4.3).
fn encode_color_block(texels: &[(u8, u8, u8, u8); 16]) -> [u8; 8] {
    let (mut max_r, mut max_g, mut max_b) = (0u8, 0u8, 0u8);
    let (mut min_r, mut min_g, mut min_b) = (255u8, 255u8, 255u8);
    for &(_, r, g, b) in texels {
        max_r = max_r.max(r);
        max_g = max_g.max(g);
        max_b = max_b.max(b);
        min_r = min_r.min(r);
        min_g = min_g.min(g);
        min_b = min_b.min(b);
    }
    let color0 = to_rgb565(max_r, max_g, max_b);
    let color1 = to_rgb565(min_r, min_g, min_b);

    let c0 = from_rgb565(color0);
    let c1 = from_rgb565(color1);
    let palette = [
        c0,
        c1,
        (lerp(c1.0, c0.0, 1, 3), lerp(c1.1, c0.1, 1, 3), lerp(c1.2, c0.2, 1, 3)),
        (lerp(c1.0, c0.0, 2, 3), lerp(c1.1, c0.1, 2, 3), lerp(c1.2, c0.2, 2, 3)),
    ];

    let mut indices: u32 = 0;
    for (i, &(_, r, g, b)) in texels.iter().enumerate() {
        let idx = nearest_index((r, g, b), &palette);
        indices |= (idx as u32) << (i * 2);
    }

    let mut out = [0u8; 8];
    out[0..2].copy_from_slice(&color0.to_le_bytes());
    out[2..4].copy_from_slice(&color1.to_le_bytes());
    out[4..8].copy_from_slice(&indices.to_le_bytes());
    out
}

fn decode_color_block(block: &[u8]) -> [(u8, u8, u8, u8); 16] {
    let color0 = u16::from_le_bytes([block[0], block[1]]);
    let color1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let c0 = from_rgb565(color0);
    let c1 = from_rgb565(color1);
    let palette: [(u8, u8, u8, u8); 4] = if color0 <= color1 {
        (
            (c0.0, c0.1, c0.2, 255),
            (c1.0, c1.1, c1.2, 255),
            (
                ((c0.0 as u16 + c1.0 as u16) / 2) as u8,
                ((c0.1 as u16 + c1.1 as u16) / 2) as u8,
                ((c0.2 as u16 + c1.2 as u16) / 2) as u8,
                255,
            ),
            (0, 0, 0, 0),
        )
        .into()
    } else {
        [
            (c0.0, c0.1, c0.2, 255),
            (c1.0, c1.1, c1.2, 255),
            (lerp(c1.0, c0.0, 1, 3), lerp(c1.1, c0.1, 1, 3), lerp(c1.2, c0.2, 1, 3), 255),
            (lerp(c1.0, c0.0, 2, 3), lerp(c1.1, c0.1, 2, 3), lerp(c1.2, c0.2, 2, 3), 255),
        ]
    };

    let mut texels = [(0u8, 0u8, 0u8, 0u8); 16];
    for (i, texel) in texels.iter_mut().enumerate() {
        let idx = (indices >> (i * 2)) & 0b11;
        *texel = palette[idx as usize];
    }
    texels
}

fn encode_alpha_block(texels: &[(u8, u8, u8, u8); 16]) -> [u8; 8] {
    let max_a = texels.iter().map(|t| t.0).max().unwrap_or(0);
    let min_a = texels.iter().map(|t| t.0).min().unwrap_or(0);

    let mut indices: u64 = 0;
    if max_a > min_a {
        let ramp: [u8; 8] = [
            max_a,
            min_a,
            lerp(min_a, max_a, 6, 7),
            lerp(min_a, max_a, 5, 7),
            lerp(min_a, max_a, 4, 7),
            lerp(min_a, max_a, 3, 7),
            lerp(min_a, max_a, 2, 7),
            lerp(min_a, max_a, 1, 7),
        ];
        for (i, t) in texels.iter().enumerate() {
            let idx = ramp
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| (t.0 as i32 - **v as i32).abs())
                .map(|(i, _)| i)
                .unwrap_or(0);
            indices |= (idx as u64) << (i * 3);
        }
    }
    // max_a == min_a: every texel is index 0, a direct copy of the (equal)
    // endpoints; indices stay zero.

    let mut out = [0u8; 8];
    out[0] = max_a;
    out[1] = min_a;
    let idx_bytes = indices.to_le_bytes();
    out[2..8].copy_from_slice(&idx_bytes[0..6]);
    out
}

fn decode_alpha_block(block: &[u8]) -> [u8; 16] {
    let a0 = block[0];
    let a1 = block[1];
    let mut idx_bytes = [0u8; 8];
    idx_bytes[0..6].copy_from_slice(&block[2..8]);
    let indices = u64::from_le_bytes(idx_bytes);

    let ramp: [u8; 8] = if a0 > a1 {
        [a0, a1, lerp(a1, a0, 6, 7), lerp(a1, a0, 5, 7), lerp(a1, a0, 4, 7), lerp(a1, a0, 3, 7), lerp(a1, a0, 2, 7), lerp(a1, a0, 1, 7)]
    } else {
        [a0, a1, lerp(a1, a0, 4, 5), lerp(a1, a0, 3, 5), lerp(a1, a0, 2, 5), lerp(a1, a0, 1, 5), 0, 255]
    };

    let mut out = [0u8; 16];
    for (i, slot) in out.iter_mut().enumerate() {
        let idx = ((indices >> (i * 3)) & 0b111) as usize;
        *slot = ramp[idx];
    }
    out
}
