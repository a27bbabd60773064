//! Pipeline orchestrator (C9) and operations monitor (C8): the per-phase
//! batch driver wiring the resource coordinator, format codecs, rules
//! engine, operations tracker, and statistics into `extractAll`/
//! `upscaleAll`/`assembleAll` and friends, per §4.7-§4.8.

pub mod fingerprint;
pub mod monitor;
pub mod numbering;
pub mod orchestrator;

pub use monitor::{OperationsMonitor, ResourceAccess, ResourceDomain, TaskRequirements};
pub use numbering::{PageFamily, PageNumberingService};
pub use orchestrator::{PipelineOrchestrator, TransferReport};

/// The three ordered phases a resource passes through (§3, §4.7); `Phase`
/// also doubles as the rules-engine operation name via [`Phase::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Upscale,
    Assemble,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Extract => "extract",
            Phase::Upscale => "upscale",
            Phase::Assemble => "assemble",
        }
    }
}
