//! Fingerprints (C6): the tuple of inputs that determines whether a previous
//! operation on a resource remains valid.

use serde::{Deserialize, Serialize};

/// All fields must match for two fingerprints to compare equal; this is a
/// plain derived `PartialEq`, deliberately field-by-field rather than a
/// hash comparison, so a mismatch can be attributed to a specific field
/// during debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub config_hash: u64,
    pub op_version: u32,
    pub bif_index: u32,
    pub key_locator: u32,
    pub size: u64,
    pub source_path: String,
    pub mtime: i64,
    pub override_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Fingerprint {
        Fingerprint {
            config_hash: 1,
            op_version: 1,
            bif_index: 0,
            key_locator: 0,
            size: 100,
            source_path: "a".into(),
            mtime: 0,
            override_size: 0,
        }
    }

    #[test]
    fn equal_fingerprints_compare_equal() {
        assert_eq!(sample(), sample());
    }

    #[test]
    fn differing_mtime_breaks_equality() {
        let mut other = sample();
        other.mtime = 1;
        assert_ne!(sample(), other);
    }
}
