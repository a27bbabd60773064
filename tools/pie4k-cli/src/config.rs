//! Configuration loader (C12, §4.12): a `toml`-backed config file
//! deserialized with `serde`, merged with CLI overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pie4k_types::{Config, PieError};

const DEFAULT_CONFIG_FILE: &str = "pie4k.toml";

/// Load `path` (or `pie4k.toml` in the current directory if `path` is
/// `None`), deserialize it against [`Config`], and fold in any
/// CLI-supplied overrides. A missing required field or unreadable file is
/// a startup-aborting [`PieError::ConfigError`] (§7 "Application-level
/// errors... abort startup").
pub fn load(path: Option<&Path>, upscale_factor_override: Option<u32>) -> Result<Config> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading configuration file {}", path.display()))
        .map_err(|e| anyhow::Error::new(PieError::ConfigError(e.to_string())))?;

    let mut config: Config = toml::from_str(&raw)
        .with_context(|| format!("parsing configuration file {}", path.display()))
        .map_err(|e| anyhow::Error::new(PieError::ConfigError(e.to_string())))?;

    if let Some(factor) = upscale_factor_override {
        config.upscale_factor = factor;
    }

    if config.upscale_factor == 0 {
        anyhow::bail!(PieError::ConfigError("upscale_factor must be >= 1".to_string()));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_config_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pie4k.toml");
        std::fs::write(&path, "game_type = \"bg2\"\ngame_path = \"/games/bg2\"\n").unwrap();

        let config = load(Some(&path), None).unwrap();
        assert_eq!(config.game_type, "bg2");
        assert_eq!(config.upscale_factor, 1);
    }

    #[test]
    fn cli_override_takes_precedence_over_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pie4k.toml");
        std::fs::write(&path, "game_type = \"bg2\"\ngame_path = \"/games/bg2\"\nupscale_factor = 2\n").unwrap();

        let config = load(Some(&path), Some(4)).unwrap();
        assert_eq!(config.upscale_factor, 4);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = load(Some(&tmp.path().join("nope.toml")), None);
        assert!(result.is_err());
    }

    #[test]
    fn missing_required_field_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pie4k.toml");
        std::fs::write(&path, "game_type = \"bg2\"\n").unwrap();
        assert!(load(Some(&path), None).is_err());
    }
}
