//! `pie4k transfer ...` (§6, §4.7 "Transfer").

use anyhow::Result;
use clap::{Args, Subcommand};
use pie4k_pipeline::PipelineOrchestrator;

use super::ResourceTypeArg;

#[derive(Args)]
pub struct TransferArgs {
    #[command(subcommand)]
    pub command: TransferCommand,
}

#[derive(Subcommand)]
pub enum TransferCommand {
    /// Transfer every managed resource type's assembled output
    All,
    /// Transfer one resource type's assembled output
    Type { resource_type: ResourceTypeArg },
}

pub fn execute(args: TransferArgs, orchestrator: &PipelineOrchestrator) -> Result<bool> {
    let report = match args.command {
        TransferCommand::All => {
            let cwd = std::env::current_dir()?;
            orchestrator.transfer_all(&cwd)?
        }
        TransferCommand::Type { resource_type } => orchestrator.transfer_type(resource_type.0)?,
    };
    tracing::info!(copied = report.copied, overwritten = report.overwritten, errors = report.errors, "transfer complete");
    Ok(report.is_success())
}
