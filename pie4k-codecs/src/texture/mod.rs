//! Texture page codec (PVRZ family, §4.4.3).
//!
//! On disk a page is a 4-byte little-endian uncompressed-length prefix
//! followed by a zlib stream; decompressing that stream yields a 52-byte
//! PVR header followed by DXT1/DXT5 block data. The codec's intermediate
//! form is an ordinary PNG, so the external GPU upscale service (out of
//! scope per §1) only ever has to know how to turn one PNG into another.

pub mod dxt;
pub mod pvr;

use std::io::{Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pie4k_types::{PieError, PieResult};

use crate::{reset_dir, Codec};
use dxt::{DxtFormat, Image};
use pvr::{PixelFormat, PvrHeader};

const PAGE_FILE: &str = "page.png";

/// Which format to bake the page's DXT payload into; `Auto` defers to
/// [`Image::choose_format`] at encode time (§4.4.3 "AUTO format selection").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFormat {
    Dxt1,
    Dxt5,
    #[default]
    Auto,
}

/// A single decoded texture page: dimensions, chosen block format, and the
/// raw DXT block payload (§3 "Texture page").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexturePage {
    pub width: u32,
    pub height: u32,
    pub format: DxtFormat,
    pub blocks: Vec<u8>,
}

impl TexturePage {
    /// Invert the on-disk wrap: strip the length prefix, inflate, parse the
    /// PVR header, and keep the DXT payload alongside it.
    pub fn decode(bytes: &[u8]) -> PieResult<TexturePage> {
        let payload = unwrap(bytes)?;
        if payload.len() < pvr::PVR_HEADER_LEN {
            return Err(PieError::DecodeError("texture page shorter than its PVR header".into()));
        }
        let header = PvrHeader::read(&payload[..pvr::PVR_HEADER_LEN])?;
        let format = match header.pixel_format {
            PixelFormat::Dxt1 => DxtFormat::Dxt1,
            PixelFormat::Dxt5 => DxtFormat::Dxt5,
        };
        let blocks = payload[pvr::PVR_HEADER_LEN..].to_vec();
        Ok(TexturePage { width: header.width, height: header.height, format, blocks })
    }

    /// Compose the 52-byte header plus block payload, then wrap (§4.4.3
    /// "Wrap").
    pub fn encode(&self) -> PieResult<Vec<u8>> {
        let pixel_format = match self.format {
            DxtFormat::Dxt1 => PixelFormat::Dxt1,
            DxtFormat::Dxt5 => PixelFormat::Dxt5,
        };
        let header = PvrHeader { pixel_format, width: self.width, height: self.height };
        let mut payload = Vec::with_capacity(pvr::PVR_HEADER_LEN + self.blocks.len());
        header.write(&mut payload)?;
        payload.extend_from_slice(&self.blocks);
        Ok(wrap(&payload))
    }

    pub fn to_image(&self) -> Image {
        dxt::decode(&self.blocks, self.format, self.width, self.height)
    }

    pub fn from_image(image: &Image, format: TextureFormat) -> TexturePage {
        let padded = image.pad_to_power_of_two();
        let chosen = match format {
            TextureFormat::Dxt1 => DxtFormat::Dxt1,
            TextureFormat::Dxt5 => DxtFormat::Dxt5,
            TextureFormat::Auto => padded.choose_format(),
        };
        let blocks = dxt::encode(&padded, chosen);
        TexturePage { width: padded.width, height: padded.height, format: chosen, blocks }
    }
}

/// Prepend the 4-byte plain length, deflate at the default level.
pub fn wrap(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // In-memory writer; only a short-circuiting allocator failure could
    // make this fail, which `Vec`-backed `Write` impls never do.
    encoder.write_all(payload).expect("zlib encode into a Vec cannot fail");
    out.extend(encoder.finish().expect("zlib finish into a Vec cannot fail"));
    out
}

/// Invert [`wrap`]: read the length prefix (informational only; the zlib
/// stream is self-terminating), inflate the rest.
pub fn unwrap(bytes: &[u8]) -> PieResult<Vec<u8>> {
    if bytes.len() < 4 {
        return Err(PieError::DecodeError("texture page shorter than its length prefix".into()));
    }
    let mut decoder = ZlibDecoder::new(&bytes[4..]);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| PieError::DecodeError(format!("failed to inflate texture page: {e}")))?;
    Ok(out)
}

/// One placed sub-image within a composed page (§4.4.3 "Atlas composition").
pub struct AtlasEntry {
    pub image: Image,
    pub x: u32,
    pub y: u32,
}

/// Compose `entries` into a single page. The single-input case places the
/// image at (0,0) and uses its own dimensions as the page dimensions;
/// otherwise the page spans the bounding box of every placed sub-image.
pub fn compose_atlas(entries: &[AtlasEntry]) -> Image {
    if let [only] = entries {
        if only.x == 0 && only.y == 0 {
            return only.image.clone();
        }
    }

    let width = entries.iter().map(|e| e.x + e.image.width).max().unwrap_or(0);
    let height = entries.iter().map(|e| e.y + e.image.height).max().unwrap_or(0);
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    for entry in entries {
        for sy in 0..entry.image.height {
            let dy = entry.y + sy;
            let src_start = ((sy * entry.image.width) * 4) as usize;
            let src_end = src_start + (entry.image.width * 4) as usize;
            let dst_start = ((dy * width + entry.x) * 4) as usize;
            let dst_end = dst_start + (entry.image.width * 4) as usize;
            pixels[dst_start..dst_end].copy_from_slice(&entry.image.pixels[src_start..src_end]);
        }
    }
    Image { width, height, pixels }
}

/// The "upscale a PNG to a PNG" service boundary (§1, §4.13's ambient
/// upscale-service Non-goal): out of scope is the GPU-backed super-resolution
/// model itself, not the trait it plugs into. The default implementation is
/// a deterministic nearest-neighbor resize so the pipeline is runnable and
/// testable without a real model wired in.
pub trait ImageUpscaler: Send + Sync {
    fn upscale_png(&self, png_bytes: &[u8], factor: u32) -> PieResult<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NearestNeighborUpscaler;

impl ImageUpscaler for NearestNeighborUpscaler {
    fn upscale_png(&self, png_bytes: &[u8], factor: u32) -> PieResult<Vec<u8>> {
        let decoded = image::load_from_memory(png_bytes)
            .map_err(|e| PieError::DecodeError(format!("failed to decode intermediate PNG: {e}")))?;
        let factor = factor.max(1);
        let (w, h) = (decoded.width() * factor, decoded.height() * factor);
        let resized = decoded.resize_exact(w, h, image::imageops::FilterType::Nearest);
        let mut out = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| PieError::EncodeError(format!("failed to re-encode upscaled PNG: {e}")))?;
        Ok(out)
    }
}

pub fn image_to_png(image: &Image) -> PieResult<Vec<u8>> {
    let mut rgba = vec![0u8; (image.width * image.height * 4) as usize];
    for (i, px) in image.pixels.chunks_exact(4).enumerate() {
        let (a, r, g, b) = (px[0], px[1], px[2], px[3]);
        rgba[i * 4] = r;
        rgba[i * 4 + 1] = g;
        rgba[i * 4 + 2] = b;
        rgba[i * 4 + 3] = a;
    }
    let buf = image::RgbaImage::from_raw(image.width, image.height, rgba)
        .ok_or_else(|| PieError::EncodeError("texture dimensions do not match pixel buffer".into()))?;
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(buf)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| PieError::EncodeError(format!("failed to encode intermediate PNG: {e}")))?;
    Ok(out)
}

pub fn png_to_image(bytes: &[u8]) -> PieResult<Image> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PieError::DecodeError(format!("failed to decode intermediate PNG: {e}")))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    for (i, px) in decoded.pixels().enumerate() {
        pixels[i * 4] = px.0[3];
        pixels[i * 4 + 1] = px.0[0];
        pixels[i * 4 + 2] = px.0[1];
        pixels[i * 4 + 3] = px.0[2];
    }
    Ok(Image { width, height, pixels })
}

pub struct TextureCodec {
    name: String,
    format: TextureFormat,
    upscaler: Box<dyn ImageUpscaler>,
}

impl TextureCodec {
    pub fn new(name: impl Into<String>) -> TextureCodec {
        TextureCodec {
            name: name.into(),
            format: TextureFormat::Auto,
            upscaler: Box::new(NearestNeighborUpscaler),
        }
    }

    pub fn with_upscaler(
        name: impl Into<String>,
        format: TextureFormat,
        upscaler: Box<dyn ImageUpscaler>,
    ) -> TextureCodec {
        TextureCodec { name: name.into(), format, upscaler }
    }

    /// Load this resource's already-upscaled intermediate PNG as an
    /// [`Image`], for callers (the orchestrator's PVRZ assemble path) that
    /// place several resources' images onto one shared page via
    /// [`compose_atlas`] before the final encode (§4.4.3 "Atlas
    /// composition").
    pub fn load_upscaled_image(&self, work_root: &Path) -> PieResult<Image> {
        let png = std::fs::read(self.upscaled_dir(work_root).join(PAGE_FILE))
            .map_err(|e| PieError::io("upscaled page".into(), e))?;
        png_to_image(&png)
    }
}

impl Codec for TextureCodec {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &'static str {
        "pvrz"
    }

    fn extract(&self, source: &[u8], work_root: &Path) -> PieResult<()> {
        let page = TexturePage::decode(source)?;
        let image = page.to_image();
        let png = image_to_png(&image)?;

        let dir = self.extracted_dir(work_root);
        reset_dir(&dir)?;
        std::fs::write(dir.join(PAGE_FILE), png).map_err(|e| PieError::io(dir.display().to_string(), e))
    }

    fn upscale(&self, work_root: &Path, factor: u32) -> PieResult<()> {
        let png = std::fs::read(self.extracted_dir(work_root).join(PAGE_FILE))
            .map_err(|e| PieError::io("extracted page".into(), e))?;
        let upscaled_png = self.upscaler.upscale_png(&png, factor)?;

        let dir = self.upscaled_dir(work_root);
        reset_dir(&dir)?;
        std::fs::write(dir.join(PAGE_FILE), upscaled_png).map_err(|e| PieError::io(dir.display().to_string(), e))
    }

    fn assemble(&self, work_root: &Path) -> PieResult<Vec<u8>> {
        let image = self.load_upscaled_image(work_root)?;
        // Single-resource assemble is the one-entry case of atlas
        // composition (§4.4.3): the image is placed at (0,0) and the page
        // takes its dimensions as-is. Multi-resource pages are composed by
        // the orchestrator via `compose_atlas` directly, ahead of this call.
        let composed = compose_atlas(&[AtlasEntry { image, x: 0, y: 0 }]);
        let page = TexturePage::from_image(&composed, self.format);
        page.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, argb: (u8, u8, u8, u8)) -> Image {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..(width * height) {
            pixels.extend_from_slice(&[argb.0, argb.1, argb.2, argb.3]);
        }
        Image { width, height, pixels }
    }

    #[test]
    fn wrap_unwrap_round_trips() {
        let payload = b"some pvr header and block bytes".to_vec();
        let wrapped = wrap(&payload);
        let prefix = u32::from_le_bytes(wrapped[0..4].try_into().unwrap());
        assert_eq!(prefix as usize, payload.len());
        assert_eq!(unwrap(&wrapped).unwrap(), payload);
    }

    #[test]
    fn page_encode_decode_round_trips_dimensions_and_format() {
        let image = solid(8, 8, (255, 10, 20, 30));
        let page = TexturePage::from_image(&image, TextureFormat::Dxt1);
        let bytes = page.encode().unwrap();
        let decoded = TexturePage::decode(&bytes).unwrap();
        assert_eq!(decoded.width, 8);
        assert_eq!(decoded.height, 8);
        assert_eq!(decoded.format, DxtFormat::Dxt1);
    }

    #[test]
    fn single_atlas_entry_at_origin_uses_its_own_dimensions() {
        let image = solid(4, 4, (255, 1, 2, 3));
        let composed = compose_atlas(&[AtlasEntry { image: image.clone(), x: 0, y: 0 }]);
        assert_eq!((composed.width, composed.height), (4, 4));
        assert_eq!(composed.pixels, image.pixels);
    }

    #[test]
    fn atlas_composes_multiple_entries_into_bounding_box() {
        let a = solid(2, 2, (255, 10, 0, 0));
        let b = solid(2, 2, (255, 0, 10, 0));
        let composed = compose_atlas(&[
            AtlasEntry { image: a, x: 0, y: 0 },
            AtlasEntry { image: b, x: 2, y: 0 },
        ]);
        assert_eq!((composed.width, composed.height), (4, 2));
        assert_eq!(composed.argb_at(0, 0), (255, 10, 0, 0));
        assert_eq!(composed.argb_at(2, 0), (255, 0, 10, 0));
    }

    #[test]
    fn second_decode_after_encode_is_stable() {
        // T1: decode(encode(decode(p))) == decode(p).
        let image = solid(4, 4, (255, 120, 80, 40));
        let page = TexturePage::from_image(&image, TextureFormat::Dxt1);
        let once = page.to_image();
        let re_encoded = TexturePage::from_image(&once, TextureFormat::Dxt1);
        let twice = re_encoded.to_image();
        assert_eq!(once, twice);
    }

    #[test]
    fn extract_upscale_assemble_round_trip_preserves_dimensions() {
        let tmp = tempfile::tempdir().unwrap();
        let codec = TextureCodec::new("AJANTISG");
        let image = solid(4, 4, (255, 200, 10, 10));
        let page = TexturePage::from_image(&image, TextureFormat::Dxt1);
        let source = page.encode().unwrap();

        codec.extract(&source, tmp.path()).unwrap();
        codec.upscale(tmp.path(), 2).unwrap();
        let assembled = codec.assemble(tmp.path()).unwrap();

        let decoded = TexturePage::decode(&assembled).unwrap();
        assert_eq!((decoded.width, decoded.height), (8, 8));
    }
}
