//! `pie4k batch ...` (§6): the extract/upscale/assemble/complete family of
//! whole-catalog and per-type operations.

use anyhow::Result;
use clap::{Args, Subcommand};
use pie4k_pipeline::PipelineOrchestrator;

use super::ResourceTypeArg;

#[derive(Args)]
pub struct BatchArgs {
    #[command(subcommand)]
    pub command: BatchCommand,
}

#[derive(Subcommand)]
pub enum BatchCommand {
    /// Extract every managed resource type
    ExtractAll,
    /// Upscale every managed resource type's extracted intermediate
    UpscaleAll,
    /// Assemble every managed resource type's upscaled intermediate
    AssembleAll,
    /// Run extract, upscale, assemble and transfer for every managed type
    Complete,
    /// Extract one resource type
    ExtractType { resource_type: ResourceTypeArg },
    /// Upscale one resource type
    UpscaleType { resource_type: ResourceTypeArg },
    /// Assemble one resource type
    AssembleType { resource_type: ResourceTypeArg },
    /// Run extract, upscale, assemble and transfer for one resource type
    CompleteType { resource_type: ResourceTypeArg },
}

pub fn execute(args: BatchArgs, orchestrator: &PipelineOrchestrator) -> Result<bool> {
    let ok = match args.command {
        BatchCommand::ExtractAll => orchestrator.extract_all()?,
        BatchCommand::UpscaleAll => orchestrator.upscale_all()?,
        BatchCommand::AssembleAll => orchestrator.assemble_all()?,
        BatchCommand::Complete => {
            let cwd = std::env::current_dir()?;
            orchestrator.complete_all(&cwd)?
        }
        BatchCommand::ExtractType { resource_type } => orchestrator.extract_type(resource_type.0)?,
        BatchCommand::UpscaleType { resource_type } => orchestrator.upscale_type(resource_type.0)?,
        BatchCommand::AssembleType { resource_type } => orchestrator.assemble_type(resource_type.0)?,
        BatchCommand::CompleteType { resource_type } => orchestrator.complete_type(resource_type.0)?,
    };
    Ok(ok)
}
