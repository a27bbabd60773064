//! The shared error taxonomy from §7. Subsystem crates
//! either use this directly or wrap it behind their own `thiserror` enum with
//! `#[error(transparent)]`/`#[from]` where they have extra variants of their
//! own (the archive reader's `CorruptIndex` vs `CorruptArchive` split, for
//! instance, stays local to `pie4k-archive`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PieError {
    #[error("service used before initialization: {0}")]
    NotInitialized(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("failed to decode asset: {0}")]
    DecodeError(String),

    #[error("failed to encode asset: {0}")]
    EncodeError(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules: {0}")]
    RulesParseError(String),

    #[error("failed to write ledger: {0}")]
    LedgerWriteError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl PieError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> PieError {
        PieError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Lets codec decode/encode routines use `?` directly on `byteorder`'s
/// `Read`/`Write` calls over in-memory buffers, where there's no
/// meaningful path to attach.
impl From<std::io::Error> for PieError {
    fn from(source: std::io::Error) -> PieError {
        PieError::Io {
            path: String::new(),
            source,
        }
    }
}

pub type PieResult<T> = Result<T, PieError>;
