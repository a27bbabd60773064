//! Shared data model and error types for the pie4k asset re-mastering
//! pipeline: resource identity (C1-C3's common currency), fingerprints (C6),
//! configuration (C12), the global context (C10), and the error taxonomy
//! (§7) every other crate in the workspace builds on.

pub mod config;
pub mod context;
pub mod error;
pub mod fingerprint;
pub mod resource;

pub use config::Config;
pub use context::{GlobalContext, FORCE_KEY, OPERATIONS_TRACKER_PROVIDER};
pub use error::{PieError, PieResult};
pub use fingerprint::Fingerprint;
pub use resource::{IndexEntry, LooseFileEntry, ResourceData, ResourceName, ResourceType};
