//! Script (BCS/BS) codec (§4.4.1).

mod ast;
mod decompile;
mod ids;
mod parse_tokens;
mod tokens;
mod write_tokens;

pub use ast::{Action, Block, ObjectSelector, Response, Script, Trigger};
pub use ids::IdsTables;

use std::path::{Path, PathBuf};

use crate::{reset_dir, Codec};
use pie4k_types::{PieError, PieResult};

const DECOMPILED_FILE: &str = "script.txt";

pub struct ScriptCodec {
    name: String,
    ids: IdsTables,
}

impl ScriptCodec {
    pub fn new(name: impl Into<String>, ids_root: Option<PathBuf>) -> ScriptCodec {
        ScriptCodec {
            name: name.into(),
            ids: IdsTables::new(ids_root),
        }
    }
}

impl Codec for ScriptCodec {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> &'static str {
        "bcs"
    }

    fn extract(&self, source: &[u8], work_root: &Path) -> PieResult<()> {
        let text = std::str::from_utf8(source)
            .map_err(|e| PieError::DecodeError(format!("script is not valid ASCII/UTF-8: {e}")))?;
        let script = parse_tokens::parse_script(text)?;
        let decompiled = decompile::decompile_script(&script, &self.ids);

        let dir = self.extracted_dir(work_root);
        reset_dir(&dir)?;
        write_text(&dir.join(DECOMPILED_FILE), &decompiled)
    }

    fn upscale(&self, work_root: &Path, factor: u32) -> PieResult<()> {
        let extracted = read_text(&self.extracted_dir(work_root).join(DECOMPILED_FILE))?;
        let upscaled = decompile::rewrite_coordinates(&extracted, factor as i64);

        let dir = self.upscaled_dir(work_root);
        reset_dir(&dir)?;
        write_text(&dir.join(DECOMPILED_FILE), &upscaled)
    }

    fn assemble(&self, work_root: &Path) -> PieResult<Vec<u8>> {
        let text = read_text(&self.upscaled_dir(work_root).join(DECOMPILED_FILE))?;
        let script = decompile::recompile_script(&text, &self.ids)?;
        Ok(write_tokens::write_script(&script).into_bytes())
    }
}

fn write_text(path: &Path, contents: &str) -> PieResult<()> {
    std::fs::write(path, contents).map_err(|e| PieError::io(path.display().to_string(), e))
}

fn read_text(path: &Path) -> PieResult<String> {
    std::fs::read_to_string(path).map_err(|e| PieError::io(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_upscale_assemble_round_trip_scales_point_opcode() {
        let tmp = tempfile::tempdir().unwrap();
        let codec = ScriptCodec::new("AR0001", None);

        let source = parse_tokens::parse_script(
            r#"SC CR CO RS RE 100 AC 49 0 30 123 45 0 "" "" OB OB OB AC RE RS CR SC"#,
        )
        .unwrap();
        let source_bytes = write_tokens::write_script(&source).into_bytes();

        codec.extract(&source_bytes, tmp.path()).unwrap();
        codec.upscale(tmp.path(), 4).unwrap();
        let assembled = codec.assemble(tmp.path()).unwrap();

        let assembled_text = String::from_utf8(assembled).unwrap();
        let reparsed = parse_tokens::parse_script(&assembled_text).unwrap();
        let action = &reparsed.blocks[0].responses[0].actions[0];
        assert_eq!(action.opcode, 49);
        assert_eq!(action.params[2], 492);
        assert_eq!(action.params[3], 180);
        assert_eq!(action.params[1], 30);
    }
}
