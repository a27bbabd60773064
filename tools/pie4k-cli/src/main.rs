//! Thin binary entry point; see `lib.rs` for the command surface and
//! orchestrator wiring.

use clap::Parser;
use pie4k_cli::Cli;

fn main() {
    let cli = Cli::parse();
    let ok = pie4k_cli::run(cli).unwrap_or_else(|e| {
        tracing::error!(error = %e, "pie4k failed");
        false
    });
    // §6 "Exit code 0 iff the invoked operation returned success."
    std::process::exit(if ok { 0 } else { 1 });
}
