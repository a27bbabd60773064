//! Configuration data model (C12). Loading/parsing lives in the CLI crate;
//! this struct is the shape every subsystem reads from.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

fn default_upscale_factor() -> u32 {
    1
}

fn default_logging() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub game_type: String,
    pub game_path: PathBuf,
    #[serde(default)]
    pub gemrb_path: Option<PathBuf>,
    #[serde(default = "default_upscale_factor")]
    pub upscale_factor: u32,
    #[serde(default = "default_logging")]
    pub logging: bool,
    #[serde(default)]
    pub known_bad_resources: BTreeSet<String>,
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
}

impl Config {
    /// `<game_path>/override`, derived rather than stored so it can never
    /// drift out of sync with `game_path`.
    pub fn game_override_path(&self) -> PathBuf {
        self.game_path.join("override")
    }

    pub fn unhardcoded_game_path(&self) -> PathBuf {
        Path::new("unhardcoded").join(&self.game_type)
    }

    pub fn unhardcoded_shared_path(&self) -> PathBuf {
        Path::new("unhardcoded").join("shared")
    }

    pub fn output_root(&self) -> PathBuf {
        Path::new("output").join(&self.game_type)
    }

    pub fn tracker_dir(&self) -> PathBuf {
        self.output_root().join(".pie4k")
    }

    pub fn final_override_path(&self, cwd: &Path) -> PathBuf {
        cwd.join(format!("{}-overrideX{}", self.game_type, self.upscale_factor))
    }

    /// A stable hash of the fields that influence codec output, used as the
    /// `config_hash` component of a [`crate::Fingerprint`]. Does not include
    /// `upscale_factor` — callers decide per-phase whether to fold that in,
    /// per the base spec's "excluded for extract, included otherwise" rule.
    /// Hashed with `xxh3` rather than `std`'s `DefaultHasher`, since a
    /// fingerprint is persisted to the ledger and compared across process
    /// runs — `DefaultHasher`'s algorithm is explicitly unspecified by std.
    pub fn base_config_hash(&self) -> u64 {
        // known_bad_resources is a BTreeSet, so iteration order is stable.
        let known_bad: Vec<&str> = self.known_bad_resources.iter().map(String::as_str).collect();
        let material = format!("{}\0{}\0{}", self.game_type, self.game_path.display(), known_bad.join(","));
        xxhash_rust::xxh3::xxh3_64(material.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_override_path_from_game_path() {
        let cfg = Config {
            game_type: "bg2".into(),
            game_path: PathBuf::from("/games/bg2"),
            gemrb_path: None,
            upscale_factor: 2,
            logging: true,
            known_bad_resources: BTreeSet::new(),
            rules_path: None,
        };
        assert_eq!(cfg.game_override_path(), PathBuf::from("/games/bg2/override"));
        assert_eq!(
            cfg.final_override_path(Path::new("/cwd")),
            PathBuf::from("/cwd/bg2-overrideX2")
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let toml = r#"
            game_type = "bg2"
            game_path = "/games/bg2"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.upscale_factor, 1);
        assert!(cfg.logging);
        assert!(cfg.known_bad_resources.is_empty());
    }
}
