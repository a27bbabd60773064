//! Archive-local error taxonomy (§7). Kept separate from [`pie4k_types::PieError`]
//! so the two `CorruptIndex`/`CorruptArchive` variants the base spec calls out
//! can carry archive-specific context (the offending path, the locator), then
//! flatten into the shared taxonomy at the coordinator boundary.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive missing: {0}")]
    ArchiveMissing(PathBuf),

    #[error("corrupt index at {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("corrupt archive at {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

impl From<ArchiveError> for pie4k_types::PieError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::ArchiveMissing(path) => {
                pie4k_types::PieError::NotFound(format!("archive missing: {}", path.display()))
            }
            ArchiveError::CorruptIndex { path, reason } => {
                pie4k_types::PieError::CorruptIndex(format!("{}: {reason}", path.display()))
            }
            ArchiveError::CorruptArchive { path, reason } => {
                pie4k_types::PieError::CorruptArchive(format!("{}: {reason}", path.display()))
            }
            ArchiveError::Io { path, source } => {
                pie4k_types::PieError::io(path.display().to_string(), source)
            }
        }
    }
}
