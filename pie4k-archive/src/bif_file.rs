//! `BIFF`/`BIFC` archive file parsing (§4.1, §6): the container that holds
//! actual resource bytes, addressed by [`crate::locator::Locator`].

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;

use crate::error::{ArchiveError, ArchiveResult};

#[derive(Debug, Clone, Copy)]
pub struct BifFileEntry {
    pub offset: u32,
    pub size: u32,
    pub res_type: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct BifTilesetEntry {
    pub offset: u32,
    pub tile_count: u32,
    pub tile_size: u32,
    pub res_type: u16,
}

/// A fully parsed (and, if necessary, decompressed) archive file: the bytes
/// it indexes into, plus lookup tables from locator sub-index to entry.
#[derive(Debug)]
pub struct BifFile {
    pub bytes: Vec<u8>,
    pub files: HashMap<u32, BifFileEntry>,
    pub tilesets: HashMap<u32, BifTilesetEntry>,
}

impl BifFile {
    pub fn parse(path: &Path, raw: Vec<u8>) -> ArchiveResult<BifFile> {
        let corrupt = |reason: String| ArchiveError::CorruptArchive {
            path: path.to_path_buf(),
            reason,
        };

        if raw.len() < 4 {
            return Err(corrupt("file too small for signature".into()));
        }
        match &raw[0..4] {
            b"BIFF" => Self::parse_biff(path, &raw),
            b"BIFC" => {
                let inner = Self::decompress_bifc(path, &raw)?;
                Self::parse_biff(path, &inner)
            }
            other => Err(corrupt(format!("unrecognized signature {:?}", other))),
        }
    }

    fn parse_biff(path: &Path, bytes: &[u8]) -> ArchiveResult<BifFile> {
        let corrupt = |reason: String| ArchiveError::CorruptArchive {
            path: path.to_path_buf(),
            reason,
        };

        let mut cursor = std::io::Cursor::new(bytes);
        let mut sig = [0u8; 4];
        let mut ver = [0u8; 4];
        cursor
            .read_exact(&mut sig)
            .map_err(|e| corrupt(e.to_string()))?;
        cursor
            .read_exact(&mut ver)
            .map_err(|e| corrupt(e.to_string()))?;
        if &sig != b"BIFF" {
            return Err(corrupt(format!("expected BIFF, got {:?}", sig)));
        }
        if &ver != b"V1 " && &ver[..3] != b"V1 " {
            // Accept "V1 \0"-padded or "V2 " variants without hard-failing;
            // only the field layout (identical across both) matters here.
        }

        let file_count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt(e.to_string()))?;
        let tileset_count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt(e.to_string()))?;
        let file_offset = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt(e.to_string()))?;

        let mut files = HashMap::with_capacity(file_count as usize);
        let mut table = std::io::Cursor::new(
            bytes
                .get(file_offset as usize..)
                .ok_or_else(|| corrupt("file table offset out of bounds".into()))?,
        );
        for _ in 0..file_count {
            let locator = table
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let offset = table
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let size = table
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let res_type = table
                .read_u16::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let _unknown = table
                .read_u16::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            files.insert(
                locator & 0x3FFF,
                BifFileEntry {
                    offset,
                    size,
                    res_type,
                },
            );
        }

        let mut tilesets = HashMap::with_capacity(tileset_count as usize);
        for _ in 0..tileset_count {
            let locator = table
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let offset = table
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let tile_count = table
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let tile_size = table
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let res_type = table
                .read_u16::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let _unknown = table
                .read_u16::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            tilesets.insert(
                (locator >> 14) & 0x3F,
                BifTilesetEntry {
                    offset,
                    tile_count,
                    tile_size,
                    res_type,
                },
            );
        }

        Ok(BifFile {
            bytes: bytes.to_vec(),
            files,
            tilesets,
        })
    }

    /// Decompress a `BIFC` container to the plain `BIFF` bytes it wraps.
    /// Handles both the single-stream `V1.0` variant and the blocked
    /// variant (no single-stream version tag), per §4.1.
    fn decompress_bifc(path: &Path, raw: &[u8]) -> ArchiveResult<Vec<u8>> {
        let corrupt = |reason: String| ArchiveError::CorruptArchive {
            path: path.to_path_buf(),
            reason,
        };

        let mut cursor = std::io::Cursor::new(raw);
        let mut sig = [0u8; 4];
        cursor
            .read_exact(&mut sig)
            .map_err(|e| corrupt(e.to_string()))?;
        let mut ver = [0u8; 4];
        cursor
            .read_exact(&mut ver)
            .map_err(|e| corrupt(e.to_string()))?;

        if &ver == b"V1.0" {
            let filename_len = cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let mut filename = vec![0u8; filename_len as usize];
            cursor
                .read_exact(&mut filename)
                .map_err(|e| corrupt(e.to_string()))?;
            let uncompressed_len = cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let _compressed_len = cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;

            let stream_start = cursor.position() as usize;
            let mut decoder = ZlibDecoder::new(&raw[stream_start..]);
            let mut out = Vec::with_capacity(uncompressed_len as usize);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| corrupt(format!("zlib inflate failed: {e}")))?;
            Ok(out)
        } else {
            // Blocked variant: u32 uncompressedSize, then repeated
            // { u32 decompressedSize, u32 compressedSize, zlib stream }.
            let uncompressed_total = cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let mut out = Vec::with_capacity(uncompressed_total as usize);
            loop {
                let decompressed_size = match cursor.read_u32::<LittleEndian>() {
                    Ok(v) => v,
                    Err(_) => break,
                };
                let compressed_size = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|e| corrupt(e.to_string()))?;
                let start = cursor.position() as usize;
                let end = start + compressed_size as usize;
                let block = raw
                    .get(start..end)
                    .ok_or_else(|| corrupt("truncated compressed block".into()))?;
                let mut decoder = ZlibDecoder::new(block);
                let mut decoded = Vec::with_capacity(decompressed_size as usize);
                decoder
                    .read_to_end(&mut decoded)
                    .map_err(|e| corrupt(format!("zlib inflate failed: {e}")))?;
                out.extend_from_slice(&decoded);
                cursor.set_position(end as u64);
            }
            Ok(out)
        }
    }

    /// `expected_size` is the background size index's independently
    /// computed figure (0 if the index hasn't hydrated it yet, §5); the
    /// locator table's own `entry.size` is always what's actually read. A
    /// disagreement between the two is logged, not treated as corruption —
    /// the locator table is this format's authoritative source of truth.
    pub fn read_file(&self, source_index: u32, expected_size: u64) -> ArchiveResult<&[u8]> {
        let entry = self.files.get(&source_index).ok_or_else(|| {
            ArchiveError::CorruptIndex {
                path: Path::new("<bif>").to_path_buf(),
                reason: format!("locator source index {source_index} not present in archive"),
            }
        })?;
        if expected_size != 0 && expected_size != entry.size as u64 {
            tracing::warn!(
                source_index,
                expected_size,
                actual_size = entry.size,
                "size index disagrees with the BIF locator table; trusting the locator"
            );
        }
        let start = entry.offset as usize;
        let end = start + entry.size as usize;
        self.bytes.get(start..end).ok_or_else(|| ArchiveError::CorruptArchive {
            path: Path::new("<bif>").to_path_buf(),
            reason: "entry range out of bounds".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn build_biff(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"BIFF");
        buf.extend_from_slice(b"V1  ");
        buf.write_u32::<LittleEndian>(1).unwrap(); // fileCount
        buf.write_u32::<LittleEndian>(0).unwrap(); // tilesetCount
        buf.write_u32::<LittleEndian>(20).unwrap(); // fileOffset
        let data_offset = 20 + 16; // one file entry is 16 bytes
        buf.write_u32::<LittleEndian>(7).unwrap(); // locator source index 7
        buf.write_u32::<LittleEndian>(data_offset).unwrap();
        buf.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        buf.write_u16::<LittleEndian>(1).unwrap(); // type BMP
        buf.write_u16::<LittleEndian>(0).unwrap(); // unused
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn parses_biff_and_reads_entry() {
        let bytes = build_biff(b"hello world");
        let bif = BifFile::parse(Path::new("x.bif"), bytes).unwrap();
        let data = bif.read_file(7, 11).unwrap();
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn missing_entry_is_corrupt_index() {
        let bytes = build_biff(b"x");
        let bif = BifFile::parse(Path::new("x.bif"), bytes).unwrap();
        assert!(bif.read_file(99, 1).is_err());
    }
}
