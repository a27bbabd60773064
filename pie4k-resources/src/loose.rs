//! Loose-file indexers (C2): `override/`, `unhardcoded/<gameType>/`, and
//! `unhardcoded/shared/` trees, each flattened into `(name, type) -> entry`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use pie4k_types::{LooseFileEntry, ResourceType};

/// Enumerate every file directly under `root` (non-recursive, matching the
/// original engine's flat override-directory convention) whose extension
/// maps to a known [`ResourceType`], skipping names in `known_bad`.
pub fn index_tree(root: &Path, known_bad: &HashSet<String>) -> HashMap<(String, u16), LooseFileEntry> {
    let mut out = HashMap::new();
    let entries = match std::fs::read_dir(root) {
        Ok(e) => e,
        Err(_) => return out,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(res_type) = ResourceType::from_extension(ext) else {
            continue; // unknown extensions silently ignored, per C2
        };

        let name = stem.to_ascii_uppercase();
        if known_bad.contains(&name) {
            continue;
        }

        let file_size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let original_filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        out.insert(
            (name, res_type.code()),
            LooseFileEntry {
                full_path: path,
                file_size,
                original_filename,
            },
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_known_extensions_and_skips_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("foo.bmp"), b"x").unwrap();
        std::fs::write(tmp.path().join("bar.xyz"), b"x").unwrap();

        let index = index_tree(tmp.path(), &HashSet::new());
        assert_eq!(index.len(), 1);
        assert!(index.contains_key(&("FOO".to_string(), ResourceType::Bmp.code())));
    }

    #[test]
    fn skips_known_bad_resources() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bad.bmp"), b"x").unwrap();
        let mut bad = HashSet::new();
        bad.insert("BAD".to_string());

        let index = index_tree(tmp.path(), &bad);
        assert!(index.is_empty());
    }

    #[test]
    fn missing_directory_yields_empty_index() {
        let index = index_tree(Path::new("/does/not/exist"), &HashSet::new());
        assert!(index.is_empty());
    }
}
