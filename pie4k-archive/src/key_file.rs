//! `KEY` index file parsing (§6): header, BIF table, resource table.

use std::io::Read;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{ArchiveError, ArchiveResult};
use crate::locator::Locator;

const KEY_SIGNATURE: &[u8; 4] = b"KEY ";
const KEY_VERSION: &[u8; 4] = b"V1  ";

/// One entry of the KEY file's BIF table: where an archive file lives and
/// how big it is, before it has ever been opened.
#[derive(Debug, Clone)]
pub struct BifTableEntry {
    pub file_size: u32,
    pub filename: String,
    pub flags: u16,
}

/// One entry of the KEY file's resource table: a `(name, type)` pair and the
/// locator that resolves it to a BIF + within-archive slot.
#[derive(Debug, Clone)]
pub struct KeyResourceEntry {
    pub name: String,
    pub res_type: u16,
    pub locator: Locator,
}

#[derive(Debug, Clone)]
pub struct KeyFile {
    pub bifs: Vec<BifTableEntry>,
    pub resources: Vec<KeyResourceEntry>,
}

impl KeyFile {
    pub fn parse(path: &Path, bytes: &[u8]) -> ArchiveResult<KeyFile> {
        let corrupt = |reason: String| ArchiveError::CorruptIndex {
            path: path.to_path_buf(),
            reason,
        };

        let mut cursor = std::io::Cursor::new(bytes);
        let mut sig = [0u8; 4];
        let mut ver = [0u8; 4];
        cursor
            .read_exact(&mut sig)
            .map_err(|e| corrupt(format!("truncated header: {e}")))?;
        cursor
            .read_exact(&mut ver)
            .map_err(|e| corrupt(format!("truncated header: {e}")))?;
        if &sig != KEY_SIGNATURE {
            return Err(corrupt(format!("bad signature {:?}", sig)));
        }
        if &ver != KEY_VERSION {
            return Err(corrupt(format!("unsupported version {:?}", ver)));
        }

        let bif_count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt(e.to_string()))?;
        let key_count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt(e.to_string()))?;
        let bif_offset = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt(e.to_string()))?;
        let key_offset = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt(e.to_string()))?;

        let bifs = Self::parse_bif_table(bytes, bif_offset as usize, bif_count as usize, &corrupt)?;
        let resources =
            Self::parse_resource_table(bytes, key_offset as usize, key_count as usize, &corrupt)?;

        Ok(KeyFile { bifs, resources })
    }

    fn parse_bif_table(
        bytes: &[u8],
        offset: usize,
        count: usize,
        corrupt: &dyn Fn(String) -> ArchiveError,
    ) -> ArchiveResult<Vec<BifTableEntry>> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = std::io::Cursor::new(
            bytes
                .get(offset..)
                .ok_or_else(|| corrupt("bif table offset out of bounds".into()))?,
        );
        for _ in 0..count {
            let file_size = cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let filename_offset = cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let filename_length = cursor
                .read_u16::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let flags = cursor
                .read_u16::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;

            let start = filename_offset as usize;
            let end = start + filename_length as usize;
            let raw = bytes
                .get(start..end)
                .ok_or_else(|| corrupt("bif filename out of bounds".into()))?;
            let filename = String::from_utf8_lossy(raw)
                .trim_end_matches('\0')
                .replace('\\', "/");

            out.push(BifTableEntry {
                file_size,
                filename,
                flags,
            });
        }
        Ok(out)
    }

    fn parse_resource_table(
        bytes: &[u8],
        offset: usize,
        count: usize,
        corrupt: &dyn Fn(String) -> ArchiveError,
    ) -> ArchiveResult<Vec<KeyResourceEntry>> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = std::io::Cursor::new(
            bytes
                .get(offset..)
                .ok_or_else(|| corrupt("resource table offset out of bounds".into()))?,
        );
        for _ in 0..count {
            let mut name_buf = [0u8; 8];
            cursor
                .read_exact(&mut name_buf)
                .map_err(|e| corrupt(e.to_string()))?;
            let name = String::from_utf8_lossy(&name_buf)
                .trim_end_matches('\0')
                .trim()
                .to_ascii_uppercase();
            let res_type = cursor
                .read_u16::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;
            let locator_raw = cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| corrupt(e.to_string()))?;

            out.push(KeyResourceEntry {
                name,
                res_type,
                locator: Locator::from_raw(locator_raw),
            });
        }
        Ok(out)
    }
}

/// Resolve a BIF table entry's recorded filename to an actual path on disk,
/// trying case-insensitive directory walks and a handful of common directory
/// variations before giving up. The original engine's path handling is
/// famously inconsistent about case and `data/`-prefix conventions across
/// platforms; this mirrors that tolerance rather than requiring an exact
/// byte match.
pub fn resolve_bif_path(game_path: &Path, recorded: &str) -> Option<PathBuf> {
    let direct = game_path.join(recorded);
    if direct.is_file() {
        return Some(direct);
    }

    let recorded_path = Path::new(recorded);
    let file_name = recorded_path.file_name()?;

    let candidates = [
        game_path.to_path_buf(),
        game_path.join("data"),
        game_path.join("Data"),
        game_path.join("cache"),
    ];
    for base in &candidates {
        if let Some(found) = case_insensitive_find(base, recorded_path) {
            return Some(found);
        }
    }

    // Last resort: search one level for a file matching just the basename.
    if let Ok(entries) = std::fs::read_dir(game_path) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Some(found) = case_insensitive_find(&path, Path::new(file_name)) {
                    return Some(found);
                }
            }
        }
    }

    None
}

/// Walk `base` joining `relative` component-by-component, matching each
/// component case-insensitively against the directory's actual entries.
fn case_insensitive_find(base: &Path, relative: &Path) -> Option<PathBuf> {
    let mut current = base.to_path_buf();
    for component in relative.components() {
        let wanted = component.as_os_str().to_string_lossy().to_ascii_lowercase();
        let entries = std::fs::read_dir(&current).ok()?;
        let mut matched = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().to_ascii_lowercase() == wanted {
                matched = Some(entry.path());
                break;
            }
        }
        current = matched?;
    }
    if current.is_file() {
        Some(current)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn build_key_bytes(bif_name: &str, res_name: &str, res_type: u16, locator: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(KEY_SIGNATURE);
        buf.extend_from_slice(KEY_VERSION);
        buf.write_u32::<LittleEndian>(1).unwrap(); // bifCount
        buf.write_u32::<LittleEndian>(1).unwrap(); // keyCount
        buf.write_u32::<LittleEndian>(24).unwrap(); // bifOffset (right after header)
        let bif_entry_size = 12;
        let filename_offset = 24 + bif_entry_size;
        let name_bytes = bif_name.as_bytes();
        buf.write_u32::<LittleEndian>((filename_offset + name_bytes.len() as u32 + 1)).unwrap(); // keyOffset (temp, fixed below)
        // bif table
        buf.write_u32::<LittleEndian>(12345).unwrap(); // fileSize
        buf.write_u32::<LittleEndian>(filename_offset).unwrap();
        buf.write_u16::<LittleEndian>((name_bytes.len() + 1) as u16).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap(); // flags
        buf.write_all(name_bytes).unwrap();
        buf.write_u8(0).unwrap(); // nul terminator
        let key_offset = buf.len() as u32;
        // patch keyOffset field (bytes 20..24)
        buf[20..24].copy_from_slice(&key_offset.to_le_bytes());
        // resource table
        let mut name_buf = [0u8; 8];
        let rn = res_name.as_bytes();
        name_buf[..rn.len()].copy_from_slice(rn);
        buf.extend_from_slice(&name_buf);
        buf.write_u16::<LittleEndian>(res_type).unwrap();
        buf.write_u32::<LittleEndian>(locator).unwrap();
        buf
    }

    #[test]
    fn parses_header_bif_and_resource_tables() {
        let bytes = build_key_bytes("data/foo.bif", "myres", 1, 0x0000_0007);
        let key = KeyFile::parse(Path::new("test.key"), &bytes).unwrap();
        assert_eq!(key.bifs.len(), 1);
        assert_eq!(key.bifs[0].filename, "data/foo.bif");
        assert_eq!(key.bifs[0].file_size, 12345);
        assert_eq!(key.resources.len(), 1);
        assert_eq!(key.resources[0].name, "MYRES");
        assert_eq!(key.resources[0].res_type, 1);
        assert_eq!(key.resources[0].locator.source_index(), 7);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = build_key_bytes("a.bif", "R", 1, 0);
        bytes[0] = b'X';
        assert!(KeyFile::parse(Path::new("x.key"), &bytes).is_err());
    }
}
