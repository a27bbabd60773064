//! Statistics (C7): per-process counters and a human-readable summary
//! (§4.9).

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use pie4k_types::{PieError, PieResult};
use serde::Serialize;

/// Every 100 processed items, a progress line is emitted via
/// `tracing::info!` (§4.9).
const PROGRESS_STRIDE: u64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessStats {
    pub process_name: String,
    pub resource_type: String,
    pub total: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_counts: BTreeMap<String, u64>,
    pub errors: Vec<String>,
}

impl ProcessStats {
    fn new(process_name: &str, resource_type: &str, total: u64) -> ProcessStats {
        ProcessStats {
            process_name: process_name.to_string(),
            resource_type: resource_type.to_string(),
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            start_time: Utc::now(),
            end_time: None,
            error_counts: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

/// Keyed by `(process_name, resource_type)`, so multiple phase/type
/// combinations can run statistics concurrently without clobbering each
/// other (§4.9's per-process counters).
pub struct Statistics {
    processes: Mutex<BTreeMap<(String, String), ProcessStats>>,
}

impl Default for Statistics {
    fn default() -> Statistics {
        Statistics::new()
    }
}

impl Statistics {
    pub fn new() -> Statistics {
        Statistics { processes: Mutex::new(BTreeMap::new()) }
    }

    pub fn start_process(&self, process_name: &str, resource_type: &str, total: u64) {
        let mut processes = self.processes.lock().expect("statistics lock poisoned");
        processes.insert((process_name.to_string(), resource_type.to_string()), ProcessStats::new(process_name, resource_type, total));
    }

    /// Increments `processed`, and `successful` or `failed`. Emits a
    /// progress line every [`PROGRESS_STRIDE`] processed items.
    pub fn increment_processed(&self, process_name: &str, resource_type: &str, success: bool) {
        let mut processes = self.processes.lock().expect("statistics lock poisoned");
        if let Some(stats) = processes.get_mut(&(process_name.to_string(), resource_type.to_string())) {
            stats.processed += 1;
            if success {
                stats.successful += 1;
            } else {
                stats.failed += 1;
            }
            if stats.processed % PROGRESS_STRIDE == 0 {
                tracing::info!(
                    process = process_name,
                    resource_type,
                    processed = stats.processed,
                    total = stats.total,
                    "progress"
                );
            }
        }
    }

    pub fn record_error(&self, process_name: &str, resource_type: &str, error: &str) {
        let mut processes = self.processes.lock().expect("statistics lock poisoned");
        if let Some(stats) = processes.get_mut(&(process_name.to_string(), resource_type.to_string())) {
            *stats.error_counts.entry(error.to_string()).or_insert(0) += 1;
            stats.errors.push(error.to_string());
        }
    }

    pub fn end_process(&self, process_name: &str, resource_type: &str) {
        let mut processes = self.processes.lock().expect("statistics lock poisoned");
        if let Some(stats) = processes.get_mut(&(process_name.to_string(), resource_type.to_string())) {
            stats.end_time = Some(Utc::now());
        }
    }

    pub fn snapshot(&self, process_name: &str, resource_type: &str) -> Option<ProcessStats> {
        self.processes
            .lock()
            .expect("statistics lock poisoned")
            .get(&(process_name.to_string(), resource_type.to_string()))
            .cloned()
    }

    /// Groups by process, listing top error strings alphabetically
    /// (§4.9 "Summary groups by process and lists top error strings
    /// alphabetically").
    pub fn generate_summary(&self) -> String {
        let processes = self.processes.lock().expect("statistics lock poisoned");
        let mut out = String::new();
        for ((process_name, resource_type), stats) in processes.iter() {
            out.push_str(&format!(
                "{process_name} [{resource_type}]: {}/{} processed, {} ok, {} failed\n",
                stats.processed, stats.total, stats.successful, stats.failed
            ));
            let mut error_strings: Vec<&String> = stats.error_counts.keys().collect();
            error_strings.sort();
            for error in error_strings {
                out.push_str(&format!("  {} x{}\n", error, stats.error_counts[error]));
            }
        }
        out
    }

    pub fn save_summary_to_file(&self, path: &std::path::Path) -> PieResult<()> {
        std::fs::write(path, self.generate_summary()).map_err(|e| PieError::io(path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_successes_and_failures_independently() {
        let stats = Statistics::new();
        stats.start_process("extract", "BMP", 2);
        stats.increment_processed("extract", "BMP", true);
        stats.increment_processed("extract", "BMP", false);
        stats.record_error("extract", "BMP", "decode failed");

        let snapshot = stats.snapshot("extract", "BMP").unwrap();
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.successful, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.error_counts["decode failed"], 1);
    }

    #[test]
    fn summary_lists_errors_alphabetically() {
        let stats = Statistics::new();
        stats.start_process("extract", "BMP", 2);
        stats.record_error("extract", "BMP", "zeta error");
        stats.record_error("extract", "BMP", "alpha error");

        let summary = stats.generate_summary();
        let alpha_pos = summary.find("alpha error").unwrap();
        let zeta_pos = summary.find("zeta error").unwrap();
        assert!(alpha_pos < zeta_pos);
    }

    #[test]
    fn distinct_process_type_pairs_do_not_clobber_each_other() {
        let stats = Statistics::new();
        stats.start_process("extract", "BMP", 1);
        stats.start_process("extract", "PVRZ", 1);
        stats.increment_processed("extract", "BMP", true);

        assert_eq!(stats.snapshot("extract", "BMP").unwrap().processed, 1);
        assert_eq!(stats.snapshot("extract", "PVRZ").unwrap().processed, 0);
    }
}
