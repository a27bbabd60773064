//! The resource coordinator (C3): priority-merges the archive reader (C1)
//! and the three loose-file trees (C2) into uniform `(name, type)` lookups.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pie4k_archive::ArchiveReader;
use pie4k_types::{LooseFileEntry, PieError, PieResult, ResourceData, ResourceType};

use crate::loose;

/// Which layer a lookup resolved against, in priority order (I1): override
/// beats unhardcoded-game beats unhardcoded-shared beats archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Override,
    UnhardcodedGame,
    UnhardcodedShared,
    Archive,
}

const PRIORITY: [Layer; 4] = [
    Layer::Override,
    Layer::UnhardcodedGame,
    Layer::UnhardcodedShared,
    Layer::Archive,
];

pub struct ResourceCoordinator {
    archive: Option<Arc<ArchiveReader>>,
    trees: HashMap<Layer, HashMap<(String, u16), LooseFileEntry>>,
}

impl ResourceCoordinator {
    pub fn new(
        archive: Option<Arc<ArchiveReader>>,
        override_path: &Path,
        unhardcoded_game_path: &Path,
        unhardcoded_shared_path: &Path,
        known_bad: &HashSet<String>,
    ) -> ResourceCoordinator {
        let mut trees = HashMap::new();
        trees.insert(Layer::Override, loose::index_tree(override_path, known_bad));
        trees.insert(
            Layer::UnhardcodedGame,
            loose::index_tree(unhardcoded_game_path, known_bad),
        );
        trees.insert(
            Layer::UnhardcodedShared,
            loose::index_tree(unhardcoded_shared_path, known_bad),
        );

        ResourceCoordinator { archive, trees }
    }

    /// Probe layers in priority order (I1); first hit wins.
    pub fn has_resource(&self, name: &str, res_type: ResourceType) -> bool {
        let key = (name.to_ascii_uppercase(), res_type.code());
        for layer in PRIORITY {
            match layer {
                Layer::Archive => {
                    if let Some(archive) = &self.archive {
                        if archive.has_resource(&key.0, key.1) {
                            return true;
                        }
                    }
                }
                other => {
                    if self.trees[&other].contains_key(&key) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Same ordering as [`Self::has_resource`]; loose-file hits read the
    /// file fully, archive hits go through C1.
    pub fn get_resource_data(&self, name: &str, res_type: ResourceType) -> PieResult<ResourceData> {
        let key = (name.to_ascii_uppercase(), res_type.code());

        for layer in PRIORITY {
            match layer {
                Layer::Archive => {
                    if let Some(archive) = &self.archive {
                        if archive.has_resource(&key.0, key.1) {
                            let bytes = archive.read(&key.0, key.1)?;
                            return Ok(ResourceData {
                                bytes,
                                filename: format!("{}.{}", key.0, res_type.extension()),
                            });
                        }
                    }
                }
                other => {
                    if let Some(entry) = self.trees[&other].get(&key) {
                        let bytes = std::fs::read(&entry.full_path)
                            .map_err(|e| PieError::io(entry.full_path.display().to_string(), e))?;
                        return Ok(ResourceData {
                            bytes,
                            filename: entry.original_filename.clone(),
                        });
                    }
                }
            }
        }

        Ok(ResourceData::empty())
    }

    /// Union of archive-provided names plus each loose tree filtered to
    /// `res_type`'s extension; de-duplicated, case-normalized. Blocks until
    /// the archive reader's size index has finished building (§5).
    pub fn list_resources_by_type(&self, res_type: ResourceType) -> Vec<String> {
        let mut names: HashSet<String> = HashSet::new();

        if let Some(archive) = &self.archive {
            archive.wait_until_size_index_ready();
            for name in archive.list_names_by_type(res_type.code()) {
                names.insert(name);
            }
        }

        for layer in [Layer::Override, Layer::UnhardcodedGame, Layer::UnhardcodedShared] {
            for (name, code) in self.trees[&layer].keys() {
                if *code == res_type.code() {
                    names.insert(name.clone());
                }
            }
        }

        let mut out: Vec<String> = names.into_iter().collect();
        out.sort();
        out
    }

    /// Loose trees' cached size; else the archive's precomputed size index;
    /// else 0.
    pub fn get_resource_size(&self, name: &str, res_type: ResourceType) -> u64 {
        let key = (name.to_ascii_uppercase(), res_type.code());

        for layer in [Layer::Override, Layer::UnhardcodedGame, Layer::UnhardcodedShared] {
            if let Some(entry) = self.trees[&layer].get(&key) {
                return entry.file_size;
            }
        }

        self.archive
            .as_ref()
            .and_then(|a| a.size_of(&key.0, key.1))
            .unwrap_or(0)
    }

    /// The on-disk path of a loose-file hit, if any (used by the tracker to
    /// build fingerprints from `source_path`/`mtime`). Archive-backed
    /// resources have no single source path; callers fall back to the
    /// index file's path in that case.
    pub fn source_path(&self, name: &str, res_type: ResourceType) -> Option<PathBuf> {
        let key = (name.to_ascii_uppercase(), res_type.code());
        for layer in [Layer::Override, Layer::UnhardcodedGame, Layer::UnhardcodedShared] {
            if let Some(entry) = self.trees[&layer].get(&key) {
                return Some(entry.full_path.clone());
            }
        }
        None
    }

    /// `(bif_index, raw locator)` for an archive-backed hit, used by the
    /// tracker to build a fingerprint's archive-identity fields. `None` for
    /// loose-file hits or resources the archive doesn't carry at all.
    pub fn archive_locator(&self, name: &str, res_type: ResourceType) -> Option<(u32, u32)> {
        let key = name.to_ascii_uppercase();
        self.archive.as_ref().and_then(|a| a.locator_of(&key, res_type.code()))
    }
}
