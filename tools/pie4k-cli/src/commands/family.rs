//! Per-family passthrough commands (§6, §4.11): `bmp extract|upscale|
//! assemble NAME`, mirroring each codec's original plugin `registerCommands`
//! surface. One `FamilyArgs` struct is reused for every family; the
//! resource type is supplied by the caller rather than parsed, since each
//! subcommand is already family-specific.

use anyhow::Result;
use clap::{Args, Subcommand};
use pie4k_pipeline::PipelineOrchestrator;
use pie4k_types::ResourceType;

#[derive(Args)]
pub struct FamilyArgs {
    #[command(subcommand)]
    pub command: FamilyCommand,
}

#[derive(Subcommand)]
pub enum FamilyCommand {
    /// Extract one resource by name
    Extract { name: String },
    /// Upscale one already-extracted resource by name
    Upscale { name: String },
    /// Assemble one already-upscaled resource by name
    Assemble { name: String },
}

/// Runs one resource through one phase directly, bypassing the rules
/// engine and tracker skip logic — a passthrough is explicit per-resource
/// intent, not a batch decision.
pub fn execute(args: FamilyArgs, res_type: ResourceType, orchestrator: &PipelineOrchestrator) -> Result<bool> {
    let ok = match args.command {
        FamilyCommand::Extract { name } => orchestrator.extract_one(&name, res_type)?,
        FamilyCommand::Upscale { name } => orchestrator.upscale_one(&name, res_type)?,
        FamilyCommand::Assemble { name } => orchestrator.assemble_one(&name, res_type)?,
    };
    Ok(ok)
}
