//! The archive reader (C1): opens a KEY index, lazily opens/caches the BIF
//! archives it references, and serves byte-exact reads by `(name, type)`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

use crate::bif_file::BifFile;
use crate::error::{ArchiveError, ArchiveResult};
use crate::key_file::{resolve_bif_path, KeyFile};

pub struct ArchiveReader {
    key: KeyFile,
    bif_paths: Vec<Option<PathBuf>>,
    cache: Mutex<HashMap<u32, Arc<BifFile>>>,
    size_index: Mutex<HashMap<(String, u16), u64>>,
    size_ready: Mutex<bool>,
    size_ready_cv: Condvar,
}

impl ArchiveReader {
    /// Parse `index_path`'s KEY header/tables and resolve each BIF entry to
    /// an on-disk path, per §4.1. Archive *files* are not opened yet.
    pub fn open(index_path: &Path, game_path: &Path) -> ArchiveResult<ArchiveReader> {
        let raw = std::fs::read(index_path).map_err(|e| ArchiveError::Io {
            path: index_path.to_path_buf(),
            source: e,
        })?;
        let key = KeyFile::parse(index_path, &raw)?;
        let bif_paths = key
            .bifs
            .iter()
            .map(|entry| resolve_bif_path(game_path, &entry.filename))
            .collect();

        Ok(ArchiveReader {
            key,
            bif_paths,
            cache: Mutex::new(HashMap::new()),
            size_index: Mutex::new(HashMap::new()),
            size_ready: Mutex::new(false),
            size_ready_cv: Condvar::new(),
        })
    }

    pub fn has_resource(&self, name: &str, res_type: u16) -> bool {
        self.key
            .resources
            .iter()
            .any(|r| r.res_type == res_type && r.name == name)
    }

    pub fn list_names_by_type(&self, res_type: u16) -> Vec<String> {
        self.key
            .resources
            .iter()
            .filter(|r| r.res_type == res_type)
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn read(&self, name: &str, res_type: u16) -> ArchiveResult<Vec<u8>> {
        let entry = self
            .key
            .resources
            .iter()
            .find(|r| r.res_type == res_type && r.name == name)
            .ok_or_else(|| ArchiveError::CorruptIndex {
                path: PathBuf::from("<key>"),
                reason: format!("resource {name}.{res_type} not present"),
            })?;

        let bif_index = entry.locator.bif_index();
        let bif = self.get_or_open(bif_index)?;
        let size = self
            .size_index
            .lock()
            .expect("size index lock poisoned")
            .get(&(name.to_string(), res_type))
            .copied();
        let source_index = entry.locator.source_index();
        let bytes = bif.read_file(source_index, size.unwrap_or(0))?;
        Ok(bytes.to_vec())
    }

    fn get_or_open(&self, bif_index: u32) -> ArchiveResult<Arc<BifFile>> {
        {
            let cache = self.cache.lock().expect("archive cache lock poisoned");
            if let Some(existing) = cache.get(&bif_index) {
                return Ok(Arc::clone(existing));
            }
        }

        let path = self
            .bif_paths
            .get(bif_index as usize)
            .and_then(|p| p.clone())
            .ok_or_else(|| {
                ArchiveError::ArchiveMissing(PathBuf::from(format!("<bif index {bif_index}>")))
            })?;
        let raw = std::fs::read(&path).map_err(|e| ArchiveError::Io {
            path: path.clone(),
            source: e,
        })?;
        let parsed = Arc::new(BifFile::parse(&path, raw)?);

        let mut cache = self.cache.lock().expect("archive cache lock poisoned");
        let entry = cache.entry(bif_index).or_insert_with(|| Arc::clone(&parsed));
        Ok(Arc::clone(entry))
    }

    /// One-shot enumeration of every `(name, type) -> size` pair across all
    /// archives, so size queries never need to touch archive bodies again.
    /// Meant to run once, off the hot lookup path, typically in a
    /// background task spawned right after `open`.
    pub fn build_size_index(&self) -> ArchiveResult<()> {
        let mut by_bif: HashMap<u32, Vec<(&str, u16, u32)>> = HashMap::new();
        for r in &self.key.resources {
            by_bif
                .entry(r.locator.bif_index())
                .or_default()
                .push((r.name.as_str(), r.res_type, r.locator.source_index()));
        }

        let mut sizes = HashMap::new();
        for (bif_index, entries) in by_bif {
            let bif = match self.get_or_open(bif_index) {
                Ok(b) => b,
                Err(_) => continue, // missing archive: sizes stay 0, per §7 ArchiveMissing-on-access
            };
            for (name, res_type, source_index) in entries {
                if let Some(file_entry) = bif.files.get(&source_index) {
                    sizes.insert((name.to_string(), res_type), file_entry.size as u64);
                }
            }
        }

        *self.size_index.lock().expect("size index lock poisoned") = sizes;
        *self.size_ready.lock().expect("size ready lock poisoned") = true;
        self.size_ready_cv.notify_all();
        Ok(())
    }

    pub fn wait_until_size_index_ready(&self) {
        let guard = self.size_ready.lock().expect("size ready lock poisoned");
        let _unused = self
            .size_ready_cv
            .wait_while(guard, |ready| !*ready)
            .expect("size ready lock poisoned");
    }

    pub fn is_size_index_ready(&self) -> bool {
        *self.size_ready.lock().expect("size ready lock poisoned")
    }

    /// The raw `(bif_index, locator)` pair backing `(name, type)`, used by
    /// the tracker to build a fingerprint's archive-identity fields.
    pub fn locator_of(&self, name: &str, res_type: u16) -> Option<(u32, u32)> {
        self.key
            .resources
            .iter()
            .find(|r| r.res_type == res_type && r.name == name)
            .map(|r| (r.locator.bif_index(), r.locator.raw()))
    }

    pub fn size_of(&self, name: &str, res_type: u16) -> Option<u64> {
        self.size_index
            .lock()
            .expect("size index lock poisoned")
            .get(&(name.to_string(), res_type))
            .copied()
    }
}
