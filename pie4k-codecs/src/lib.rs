//! Format codecs (C4): bit-exact encode/decode for the asset families the
//! pipeline exercises, per §4.4.

pub mod bitmap;
pub mod passthrough;
pub mod script;
pub mod texture;

use std::path::{Path, PathBuf};

use pie4k_types::PieResult;

/// The uniform shape every codec exposes (§4.4): construct with a resource
/// name, `extract` the source bytes into an editable intermediate,
/// `upscale` that intermediate in place, then `assemble` a byte-accurate
/// output file from the upscaled intermediate.
pub trait Codec {
    /// The resource name this codec instance was built for (used to derive
    /// its working subdirectory names).
    fn resource_name(&self) -> &str;

    /// A short, lowercase family tag (`"bcs"`, `"bmp"`, `"pvrz"`) used to
    /// build working directory names distinct from other families sharing
    /// the same resource name.
    fn family(&self) -> &'static str;

    fn extracted_dir(&self, work_root: &Path) -> PathBuf {
        work_root.join(format!("{}-{}-extracted", self.resource_name(), self.family()))
    }

    fn upscaled_dir(&self, work_root: &Path) -> PathBuf {
        work_root.join(format!("{}-{}-upscaled", self.resource_name(), self.family()))
    }

    fn assembled_dir(&self, work_root: &Path) -> PathBuf {
        work_root.join(format!("{}-{}-assembled", self.resource_name(), self.family()))
    }

    /// Decode `source` into the family's editable intermediate and write it
    /// under this codec's extracted directory (recreated fresh each call).
    fn extract(&self, source: &[u8], work_root: &Path) -> PieResult<()>;

    /// Read the extracted intermediate, scale coordinate/pixel data by
    /// `factor`, and write the result under the upscaled directory
    /// (recreated fresh each call).
    fn upscale(&self, work_root: &Path, factor: u32) -> PieResult<()>;

    /// Read the upscaled intermediate and re-encode it to the original
    /// binary format, returning the bytes the orchestrator should persist
    /// under the assembled directory.
    fn assemble(&self, work_root: &Path) -> PieResult<Vec<u8>>;
}

/// Remove `dir` if present and recreate it empty. Every codec phase starts
/// from a clean working directory, per §4.4's "cleans them when
/// re-invoked".
pub(crate) fn reset_dir(dir: &Path) -> PieResult<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)
            .map_err(|e| pie4k_types::PieError::io(dir.display().to_string(), e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| pie4k_types::PieError::io(dir.display().to_string(), e))?;
    Ok(())
}
