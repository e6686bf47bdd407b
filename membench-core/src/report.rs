//! RAM benchmark report
//!
//! Rendered as plain text by default, or as JSON for machine consumption.

use std::fmt::Write as _;

use serde::Serialize;

use crate::types::{AggregateResult, BenchmarkConfig, WorkerResult};

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Everything a RAM run produced
#[derive(Debug, Clone, Serialize)]
pub struct RamReport {
    pub timestamp: String,
    pub version: String,
    pub system_info: SystemInfo,
    pub config: BenchmarkConfig,
    pub workers: Vec<WorkerResult>,
    pub aggregate: AggregateResult,
}

impl RamReport {
    pub fn new(config: BenchmarkConfig, workers: Vec<WorkerResult>, aggregate: AggregateResult) -> Self {
        Self {
            timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            system_info: SystemInfo::current(),
            config,
            workers,
            aggregate,
        }
    }

    /// Per-worker lines (when `verbose`) followed by the aggregate block
    pub fn render_text(&self, verbose: bool) -> String {
        let mut out = String::new();
        if verbose {
            for w in &self.workers {
                if w.allocation_failed {
                    let _ = writeln!(out, "Thread {}: allocation failed", w.thread_id);
                } else {
                    let _ = writeln!(
                        out,
                        "Thread {}: Write {:.2} MB/s, Read {:.2} MB/s",
                        w.thread_id, w.write_speed_mb_per_s, w.read_speed_mb_per_s
                    );
                }
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "=== Aggregate Results ===");
        let _ = writeln!(out, "Total Write Speed: {:.2} MB/s", self.aggregate.total_write_speed_mb_per_s);
        let _ = writeln!(out, "Total Read Speed:  {:.2} MB/s", self.aggregate.total_read_speed_mb_per_s);
        out
    }
}

/// The line printed before any worker starts
pub fn run_banner(config: &BenchmarkConfig) -> String {
    format!(
        "Running with {} thread(s), {} MB buffer per thread, {} iteration(s)",
        config.thread_count(),
        config.buffer_size_bytes() >> 20,
        config.iteration_count()
    )
}
