//! membench Core Library
//!
//! This crate provides the benchmarks behind the `membench` CLI:
//! - Parallel RAM write/read throughput with per-worker aligned buffers
//! - File I/O and memory-mapped file throughput sweeps
//! - RAM disk creation and teardown (macOS)
//! - Settings file and report types

pub mod buffer;
pub mod probe;
pub mod ramdisk;
pub mod report;
pub mod runner;
pub mod sweep;
pub mod types;

// Re-export commonly used types
pub use buffer::{AlignedBuffer, AllocationError, BufferAllocator, SystemAllocator, CACHE_LINE};
pub use probe::{read_probe, throughput_mib_per_sec, write_probe};
pub use ramdisk::{CommandOutput, CommandRunner, RamDisk, RamDiskError, SystemRunner};
pub use report::{run_banner, RamReport, SystemInfo};
pub use runner::{run_benchmark, run_benchmark_with, run_worker};
pub use sweep::{
    FileIoOptions, FileIoResult, FileIoSweep, MmapOptions, MmapResult, MmapSweep, SweepError,
};
pub use types::{
    AggregateResult, BenchmarkConfig, ByteSize, ConfigError, FileIoSettings, MmapSettings,
    RamDiskSettings, RamSettings, ReadStrategy, Settings, WorkerResult,
};
