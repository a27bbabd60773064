//! `pie4k sync override` (§6, §4.7 "Sync").

use anyhow::Result;
use clap::{Args, Subcommand};
use pie4k_pipeline::PipelineOrchestrator;

#[derive(Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommand,
}

#[derive(Subcommand)]
pub enum SyncCommand {
    /// Copy the game's override directory into the target override
    Override,
}

pub fn execute(args: SyncArgs, orchestrator: &PipelineOrchestrator, target_override: &std::path::Path) -> Result<bool> {
    match args.command {
        SyncCommand::Override => {
            orchestrator.sync_override(target_override)?;
            Ok(true)
        }
    }
}
