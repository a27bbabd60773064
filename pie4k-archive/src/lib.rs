//! The archive reader (C1): KEY index parsing, BIF/BIFC archive parsing, and
//! byte-exact `(name, type)` reads, per §4.1 and §6.

pub mod bif_file;
pub mod error;
pub mod key_file;
pub mod locator;
pub mod reader;

pub use error::{ArchiveError, ArchiveResult};
pub use locator::Locator;
pub use reader::ArchiveReader;
