//! Per-worker and aggregate throughput figures

use serde::{Deserialize, Serialize};

/// Speeds measured by one worker thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub thread_id: usize,
    pub write_speed_mb_per_s: f64,
    pub read_speed_mb_per_s: f64,
    /// Value folded by the read probe; only kept so the reads stay observable
    pub checksum: u64,
    /// The worker never got a buffer and contributes zero to both totals
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allocation_failed: bool,
}

impl WorkerResult {
    /// Zero-valued result for a worker that could not obtain its buffer
    pub fn failed(thread_id: usize) -> Self {
        Self {
            thread_id,
            write_speed_mb_per_s: 0.0,
            read_speed_mb_per_s: 0.0,
            checksum: 0,
            allocation_failed: true,
        }
    }
}

/// Summed throughput across all workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub total_write_speed_mb_per_s: f64,
    pub total_read_speed_mb_per_s: f64,
}

impl AggregateResult {
    /// Sum (not average) both speed fields. Failed workers count as zero.
    pub fn from_workers(results: &[WorkerResult]) -> Self {
        results.iter().fold(Self::default(), |acc, r| Self {
            total_write_speed_mb_per_s: acc.total_write_speed_mb_per_s + r.write_speed_mb_per_s,
            total_read_speed_mb_per_s: acc.total_read_speed_mb_per_s + r.read_speed_mb_per_s,
        })
    }
}
