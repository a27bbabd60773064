//! CLI subcommand argument structs and their execution bodies (C11, §6).

pub mod batch;
pub mod family;
pub mod sync;
pub mod transfer;

use std::str::FromStr;

use pie4k_types::ResourceType;

/// A `ResourceType` parsed from its extension (`BMP`, `BCS`, `PVRZ`, ...),
/// case-insensitive, for use as a `clap` value.
#[derive(Debug, Clone, Copy)]
pub struct ResourceTypeArg(pub ResourceType);

impl FromStr for ResourceTypeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<ResourceTypeArg, String> {
        ResourceType::from_extension(s)
            .map(ResourceTypeArg)
            .ok_or_else(|| format!("unrecognized resource type: {s}"))
    }
}
