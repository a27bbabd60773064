//! Builds a [`Fingerprint`] for a `(phase, resource)` pair from the
//! coordinator and configuration, per §3's "Fingerprint" data model entry.

use std::path::Path;
use std::time::SystemTime;

use pie4k_resources::ResourceCoordinator;
use pie4k_types::{Config, Fingerprint, ResourceType};

use crate::Phase;

/// Version tag for the codec/upscale logic itself; bump whenever a codec's
/// output for identical inputs would change, so stale ledger entries from
/// an older build are correctly treated as stale.
pub const OP_VERSION: u32 = 1;

/// Extract's `configHash` excludes `upscaleFactor` (it doesn't affect the
/// decoded intermediate); upscale and assemble fold the factor in, per
/// §4.7 step 6.
fn config_hash(config: &Config, phase: Phase, factor: u32) -> u64 {
    let base = config.base_config_hash();
    match phase {
        Phase::Extract => base,
        Phase::Upscale | Phase::Assemble => xxhash_rust::xxh3::xxh3_64(format!("{base}\0{factor}").as_bytes()),
    }
}

fn mtime_of(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| t.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0))
        .unwrap_or(0)
}

/// `bifIndex`/`keyLocator` come from the archive layer when the resource
/// resolves there; loose-file hits leave them at 0 since there is no
/// locator to report, and rely on `sourcePath`/`mtime`/`overrideSize`
/// instead to detect changes (documented simplification, see DESIGN.md).
pub fn build(
    config: &Config,
    coordinator: &ResourceCoordinator,
    name: &str,
    res_type: ResourceType,
    phase: Phase,
    factor: u32,
) -> Fingerprint {
    let (bif_index, key_locator) = coordinator.archive_locator(name, res_type).unwrap_or((0, 0));
    let size = coordinator.get_resource_size(name, res_type);
    let source_path = coordinator.source_path(name, res_type);

    let mtime = source_path.as_deref().map(mtime_of).unwrap_or(0);
    let override_size =
        if source_path.as_deref().is_some_and(|p| p.starts_with(config.game_override_path())) {
            size
        } else {
            0
        };
    let source_path = source_path.map(|p| p.display().to_string()).unwrap_or_default();

    Fingerprint {
        config_hash: config_hash(config, phase, factor),
        op_version: OP_VERSION,
        bif_index,
        key_locator,
        size,
        source_path,
        mtime,
        override_size,
    }
}
