//! Logging init (C13, §4.13): `tracing-subscriber`, `EnvFilter`-driven,
//! mirroring `tools/nether-export`'s entry-point idiom.

/// `default_level` is `INFO` normally and `DEBUG` when the config's
/// `logging` flag or `-v`/`--verbose` requests verbose output.
pub fn init(config_logging: bool, verbose: u8) {
    let default_level = if config_logging || verbose > 0 {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()))
        .init();
}
