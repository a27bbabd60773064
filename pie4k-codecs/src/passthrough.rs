//! Byte-copy passthrough codec for asset families with no editable
//! intermediate (§1 Non-goals: "lossless round-trip of every asset family
//! (some families are acknowledged as byte-copy passthroughs)"). Every
//! phase is a straight copy so these types can flow through the same
//! extract/upscale/assemble pipeline shape as the real codecs without the
//! orchestrator needing a special case.

use std::path::Path;

use pie4k_types::PieError;
use pie4k_types::PieResult;

use crate::{reset_dir, Codec};

const RAW_FILE: &str = "raw.bin";

pub struct PassthroughCodec {
    name: String,
    family: &'static str,
}

impl PassthroughCodec {
    pub fn new(name: impl Into<String>, family: &'static str) -> PassthroughCodec {
        PassthroughCodec { name: name.into(), family }
    }
}

impl Codec for PassthroughCodec {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &'static str {
        self.family
    }

    fn extract(&self, source: &[u8], work_root: &Path) -> PieResult<()> {
        let dir = self.extracted_dir(work_root);
        reset_dir(&dir)?;
        std::fs::write(dir.join(RAW_FILE), source).map_err(|e| PieError::io(dir.display().to_string(), e))
    }

    fn upscale(&self, work_root: &Path, _factor: u32) -> PieResult<()> {
        let bytes = std::fs::read(self.extracted_dir(work_root).join(RAW_FILE))
            .map_err(|e| PieError::io("extracted passthrough asset".into(), e))?;
        let dir = self.upscaled_dir(work_root);
        reset_dir(&dir)?;
        std::fs::write(dir.join(RAW_FILE), bytes).map_err(|e| PieError::io(dir.display().to_string(), e))
    }

    fn assemble(&self, work_root: &Path) -> PieResult<Vec<u8>> {
        std::fs::read(self.upscaled_dir(work_root).join(RAW_FILE))
            .map_err(|e| PieError::io("upscaled passthrough asset".into(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_bytes_unchanged_through_every_phase() {
        let tmp = tempfile::tempdir().unwrap();
        let codec = PassthroughCodec::new("FOO", "wav");
        codec.extract(b"original bytes", tmp.path()).unwrap();
        codec.upscale(tmp.path(), 4).unwrap();
        let assembled = codec.assemble(tmp.path()).unwrap();
        assert_eq!(assembled, b"original bytes");
    }
}
