//! pie4k - asset re-mastering pipeline for the IE family of legacy
//! game-engine archives.
//!
//! Split into this library and a thin `main.rs` binary entry point the
//! same way `tools/nether-export` separates `nether_export` from its
//! binary, so the orchestrator-wiring path is reusable by the crate's own
//! integration tests without going through logging init or
//! `std::process::exit`.
//!
//! # Commands
//!
//! - `pie4k batch extract-all|upscale-all|assemble-all|complete`
//! - `pie4k batch extract-type|upscale-type|assemble-type|complete-type <TYPE>`
//! - `pie4k transfer all|type <TYPE>`
//! - `pie4k sync override`
//! - `pie4k bmp|bcs|pvrz extract|upscale|assemble <NAME>`

pub mod commands;
pub mod config;
pub mod logging;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pie4k_archive::ArchiveReader;
use pie4k_pipeline::PipelineOrchestrator;
use pie4k_resources::ResourceCoordinator;
use pie4k_rules::RuleSet;
use pie4k_stats::Statistics;
use pie4k_tracker::OperationsTracker;
use pie4k_types::{Config, GlobalContext, ResourceType, FORCE_KEY, OPERATIONS_TRACKER_PROVIDER};

use commands::batch::BatchArgs;
use commands::family::FamilyArgs;
use commands::sync::SyncArgs;
use commands::transfer::TransferArgs;

const ARCHIVE_INDEX_FILE: &str = "chitin.key";

#[derive(Parser)]
#[command(name = "pie4k")]
#[command(about = "Asset re-mastering pipeline for legacy IE-family game archives")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (default: pie4k.toml)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Bypass the tracker's idempotent-skip logic and phase markers
    #[arg(long)]
    pub force: bool,

    /// Raise the log level (stackable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Batch extract/upscale/assemble operations
    Batch(BatchArgs),
    /// Copy assembled output into the final override directory
    Transfer(TransferArgs),
    /// Copy the game's override directory into the target override
    Sync(SyncArgs),
    /// Indexed-bitmap passthrough commands
    Bmp(FamilyArgs),
    /// Script passthrough commands
    Bcs(FamilyArgs),
    /// Texture-page passthrough commands
    Pvrz(FamilyArgs),
}

/// Wires a loaded [`Config`] into a ready-to-drive [`PipelineOrchestrator`]:
/// opens the archive index if present, indexes the loose-file trees, loads
/// rules, and opens the operations tracker. Split out of [`run`] so the
/// crate's own integration tests can drive a real orchestrator against a
/// fixture tree without going through `main`'s logging init or exit code.
pub fn build_orchestrator(config: Config, force: bool) -> Result<PipelineOrchestrator> {
    let global = Arc::new(GlobalContext::new());
    let mut force_values = HashMap::new();
    force_values.insert(FORCE_KEY.to_string(), force.to_string());
    global.register(OPERATIONS_TRACKER_PROVIDER, force_values);

    let index_path = config.game_path.join(ARCHIVE_INDEX_FILE);
    let archive = if index_path.is_file() {
        let reader = Arc::new(ArchiveReader::open(&index_path, &config.game_path)?);
        let background = Arc::clone(&reader);
        std::thread::spawn(move || {
            if let Err(e) = background.build_size_index() {
                tracing::error!(error = %e, "failed to build archive size index");
            }
        });
        Some(reader)
    } else {
        tracing::warn!(path = %index_path.display(), "no archive index found, running loose-file-only");
        None
    };

    let known_bad: HashSet<String> = config.known_bad_resources.iter().cloned().collect();
    let coordinator = Arc::new(ResourceCoordinator::new(
        archive,
        &config.game_override_path(),
        &config.unhardcoded_game_path(),
        &config.unhardcoded_shared_path(),
        &known_bad,
    ));

    let rules = RuleSet::load(config.rules_path.as_deref(), &std::env::current_dir()?)?;
    let tracker = Arc::new(OperationsTracker::open(&config.tracker_dir(), Arc::clone(&global))?);
    let stats = Arc::new(Statistics::new());

    Ok(PipelineOrchestrator::new(config, coordinator, rules, tracker, stats))
}

pub fn run(cli: Cli) -> Result<bool> {
    let config = config::load(cli.config.as_deref(), None)?;
    logging::init(config.logging, cli.verbose);

    let orchestrator = build_orchestrator(config, cli.force)?;

    match cli.command {
        Commands::Batch(args) => commands::batch::execute(args, &orchestrator),
        Commands::Transfer(args) => commands::transfer::execute(args, &orchestrator),
        Commands::Sync(args) => {
            let target_override = std::env::current_dir()?;
            commands::sync::execute(args, &orchestrator, &target_override)
        }
        Commands::Bmp(args) => commands::family::execute(args, ResourceType::Bmp, &orchestrator),
        Commands::Bcs(args) => commands::family::execute(args, ResourceType::Bcs, &orchestrator),
        Commands::Pvrz(args) => commands::family::execute(args, ResourceType::Pvrz, &orchestrator),
    }
}
