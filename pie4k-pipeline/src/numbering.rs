//! Texture page numbering (C9, §4.4.3/Q3): deterministic page identifiers
//! derived from the originating resource name and type, via two independent
//! monotonic counters.
//!
//! Grounded on `PluginManager::generatePVRZName`/`generatePVRZNameInternal`
//! (`plugins/PluginManager.cpp:1397-1450` in `original_source/`), which
//! dispatches on the *source* asset's class ID (TIS vs. BAM/MOS) rather than
//! on the resource's own name:
//! - TIS pages draw from `areaPVRZCounter_` and derive their name as
//!   `{first_char}{substr(2,4)}{page:02}` with no extension when the source
//!   name is at least 6 characters (e.g. `AR0011` -> `A001100`), or
//!   `{name}{page:02}` otherwise. No uppercasing is applied.
//! - BAM/MOS pages draw from a shared `mosPVRZCounter_` and are always named
//!   `MOS{page:04}` with no extension, ignoring the source resource name
//!   entirely.
//! - Every other resource type falls through to a generic fallback that
//!   was never assigned a counter in the original (`pageNumber` stays `0`)
//!   and names the page `{name}_{page}.PVRZ`.
//!
//! Callers must not assume a uniform naming convention or a counter across
//! families: only TIS and BAM/MOS pages advance a counter, and only the
//! fallback branch carries an explicit extension.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFamily {
    /// Pages generated from a TIS (tileset) source resource.
    Tis,
    /// Pages generated from a BAM or MOS source resource.
    BamMos,
    /// Any other source resource type; not exercised by a real counter.
    Fallback,
}

pub struct PageNumberingService {
    area_pvrz_counter: AtomicU32,
    mos_pvrz_counter: AtomicU32,
}

impl Default for PageNumberingService {
    fn default() -> PageNumberingService {
        PageNumberingService::new()
    }
}

impl PageNumberingService {
    pub fn new() -> PageNumberingService {
        PageNumberingService { area_pvrz_counter: AtomicU32::new(0), mos_pvrz_counter: AtomicU32::new(0) }
    }

    /// Derive the next page name for `family` from `source_resource_name`,
    /// mirroring `generatePVRZName`/`generatePVRZNameInternal` exactly.
    pub fn next_page_name(&self, family: PageFamily, source_resource_name: &str) -> String {
        match family {
            PageFamily::Tis => {
                let page = self.area_pvrz_counter.fetch_add(1, Ordering::SeqCst);
                if source_resource_name.len() >= 6 {
                    let first_char = source_resource_name.chars().next().unwrap();
                    let area_code = &source_resource_name[2..6];
                    format!("{first_char}{area_code}{page:02}")
                } else {
                    format!("{source_resource_name}{page:02}")
                }
            }
            PageFamily::BamMos => {
                let page = self.mos_pvrz_counter.fetch_add(1, Ordering::SeqCst);
                format!("MOS{page:04}")
            }
            PageFamily::Fallback => {
                // The original never advances a counter for this branch;
                // `pageNumber` is left at its default of 0.
                format!("{source_resource_name}_0.PVRZ")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tis_pages_use_first_char_plus_area_code_with_no_extension() {
        let service = PageNumberingService::new();
        let name = service.next_page_name(PageFamily::Tis, "AR0110");
        assert_eq!(name, "A011000");
    }

    #[test]
    fn tis_pages_fall_back_to_the_whole_name_when_shorter_than_six_chars() {
        let service = PageNumberingService::new();
        let name = service.next_page_name(PageFamily::Tis, "AR01");
        assert_eq!(name, "AR0100");
    }

    #[test]
    fn bam_mos_pages_ignore_the_source_name_entirely() {
        let service = PageNumberingService::new();
        let name = service.next_page_name(PageFamily::BamMos, "whatever-name");
        assert_eq!(name, "MOS0000");
    }

    #[test]
    fn fallback_pages_carry_a_pvrz_extension_and_never_advance_a_counter() {
        let service = PageNumberingService::new();
        let first = service.next_page_name(PageFamily::Fallback, "FOO");
        let second = service.next_page_name(PageFamily::Fallback, "FOO");
        assert_eq!(first, "FOO_0.PVRZ");
        assert_eq!(second, "FOO_0.PVRZ");
    }

    #[test]
    fn counters_are_independent_per_family() {
        let service = PageNumberingService::new();
        assert_eq!(service.next_page_name(PageFamily::Tis, "AR0110"), "A011000");
        assert_eq!(service.next_page_name(PageFamily::BamMos, "AR0110"), "MOS0000");
        assert_eq!(service.next_page_name(PageFamily::Tis, "AR0110"), "A011001");
        assert_eq!(service.next_page_name(PageFamily::BamMos, "AR0110"), "MOS0001");
    }
}
