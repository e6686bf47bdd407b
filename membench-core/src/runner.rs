//! Parallel RAM throughput run
//!
//! One scoped thread per worker. Workers share nothing but the read-only
//! config and allocator; each hands its [`WorkerResult`] back through its
//! join handle, and the join is the only synchronisation point.

use std::thread;

use crate::buffer::{BufferAllocator, SystemAllocator};
use crate::probe::{read_probe, throughput_mib_per_sec, write_probe};
use crate::report::RamReport;
use crate::types::{AggregateResult, BenchmarkConfig, WorkerResult};

/// Fill value used to fault pages in before the timed write pass
const PRETOUCH_BYTE: u8 = 0xAA;

/// Allocate, write, then read one buffer and report its speeds
pub fn run_worker<A>(thread_id: usize, config: &BenchmarkConfig, allocator: &A) -> WorkerResult
where
    A: BufferAllocator + ?Sized,
{
    let mut buffer = match allocator.allocate(thread_id, config.buffer_size_bytes()) {
        Ok(buffer) => buffer,
        Err(e) => {
            tracing::error!("Thread {}: memory allocation failed: {}", thread_id, e);
            return WorkerResult::failed(thread_id);
        }
    };

    buffer.fill(PRETOUCH_BYTE);

    let write_elapsed = write_probe(&mut buffer, config.iteration_count());
    let (read_elapsed, checksum) = read_probe(&buffer, config.iteration_count(), config.read_strategy());

    tracing::debug!(
        thread_id,
        ?write_elapsed,
        ?read_elapsed,
        checksum,
        "worker finished"
    );

    let bytes = config.bytes_per_phase();
    WorkerResult {
        thread_id,
        write_speed_mb_per_s: throughput_mib_per_sec(bytes, write_elapsed),
        read_speed_mb_per_s: throughput_mib_per_sec(bytes, read_elapsed),
        checksum,
        allocation_failed: false,
    }
}

/// Run the benchmark with buffers from the global allocator
pub fn run_benchmark(config: &BenchmarkConfig) -> RamReport {
    run_benchmark_with(config, &SystemAllocator)
}

/// Run the benchmark with buffers from `allocator`
pub fn run_benchmark_with<A>(config: &BenchmarkConfig, allocator: &A) -> RamReport
where
    A: BufferAllocator + ?Sized,
{
    tracing::info!(
        threads = config.thread_count(),
        buffer_size = config.buffer_size_bytes(),
        iterations = config.iteration_count(),
        strategy = %config.read_strategy(),
        "Starting RAM benchmark"
    );

    let mut workers: Vec<WorkerResult> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.thread_count())
            .map(|thread_id| {
                let spawned = thread::Builder::new()
                    .name(format!("membench-worker-{}", thread_id))
                    .spawn_scoped(scope, move || run_worker(thread_id, config, allocator));
                (thread_id, spawned)
            })
            .collect();

        handles
            .into_iter()
            .map(|(thread_id, spawned)| match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    tracing::error!("Thread {}: worker panicked", thread_id);
                    WorkerResult::failed(thread_id)
                }),
                Err(e) => {
                    tracing::error!("Thread {}: failed to spawn worker: {}", thread_id, e);
                    WorkerResult::failed(thread_id)
                }
            })
            .collect()
    });

    workers.sort_by_key(|w| w.thread_id);
    let aggregate = AggregateResult::from_workers(&workers);

    RamReport::new(config.clone(), workers, aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{AlignedBuffer, AllocationError};
    use crate::types::{ByteSize, ReadStrategy};

    /// Refuses buffers for the listed threads
    struct FailingAllocator {
        failing: Vec<usize>,
    }

    impl BufferAllocator for FailingAllocator {
        fn allocate(&self, thread_id: usize, size: usize) -> Result<AlignedBuffer, AllocationError> {
            if self.failing.contains(&thread_id) {
                Err(AllocationError::OutOfMemory { size })
            } else {
                AlignedBuffer::zeroed(size)
            }
        }
    }

    fn config(threads: usize, size: ByteSize, iterations: u32) -> BenchmarkConfig {
        BenchmarkConfig::new(threads, size, iterations, ReadStrategy::Words).unwrap()
    }

    #[test]
    fn test_worker_reports_positive_speeds() {
        let config = config(1, ByteSize::kib(64), 2);
        let result = run_worker(0, &config, &SystemAllocator);
        assert!(!result.allocation_failed);
        assert!(result.write_speed_mb_per_s > 0.0);
        assert!(result.read_speed_mb_per_s > 0.0);
    }

    #[test]
    fn test_worker_allocation_failure_is_zero() {
        let config = config(1, ByteSize::kib(4), 1);
        let allocator = FailingAllocator { failing: vec![0] };
        assert_eq!(run_worker(0, &config, &allocator), WorkerResult::failed(0));
    }

    #[test]
    fn test_two_workers_one_mib() {
        let config = config(2, ByteSize::mib(1), 1);
        let report = run_benchmark(&config);

        assert_eq!(report.workers.len(), 2);
        for (i, worker) in report.workers.iter().enumerate() {
            assert_eq!(worker.thread_id, i);
            assert!(worker.write_speed_mb_per_s > 0.0);
            assert!(worker.read_speed_mb_per_s > 0.0);
        }

        let write_sum: f64 = report.workers.iter().map(|w| w.write_speed_mb_per_s).sum();
        let read_sum: f64 = report.workers.iter().map(|w| w.read_speed_mb_per_s).sum();
        assert_eq!(report.aggregate.total_write_speed_mb_per_s, write_sum);
        assert_eq!(report.aggregate.total_read_speed_mb_per_s, read_sum);
    }

    #[test]
    fn test_single_thread_aggregate_matches_worker() {
        let config = config(1, ByteSize::kib(256), 1);
        let report = run_benchmark(&config);
        let worker = &report.workers[0];
        assert_eq!(report.aggregate.total_write_speed_mb_per_s, worker.write_speed_mb_per_s);
        assert_eq!(report.aggregate.total_read_speed_mb_per_s, worker.read_speed_mb_per_s);
    }

    #[test]
    fn test_partial_failure_keeps_healthy_workers() {
        let config = config(3, ByteSize::kib(128), 1);
        let allocator = FailingAllocator { failing: vec![1] };
        let report = run_benchmark_with(&config, &allocator);

        assert_eq!(report.workers.len(), 3);
        assert_eq!(report.workers[1], WorkerResult::failed(1));
        assert!(report.workers[0].write_speed_mb_per_s > 0.0);
        assert!(report.workers[2].read_speed_mb_per_s > 0.0);

        let expected_write = report.workers[0].write_speed_mb_per_s + 0.0 + report.workers[2].write_speed_mb_per_s;
        let expected_read = report.workers[0].read_speed_mb_per_s + 0.0 + report.workers[2].read_speed_mb_per_s;
        assert_eq!(report.aggregate.total_write_speed_mb_per_s, expected_write);
        assert_eq!(report.aggregate.total_read_speed_mb_per_s, expected_read);
    }

    #[test]
    fn test_all_workers_failing_still_reports() {
        let config = config(2, ByteSize::kib(4), 1);
        let allocator = FailingAllocator { failing: vec![0, 1] };
        let report = run_benchmark_with(&config, &allocator);
        assert_eq!(report.workers.len(), 2);
        assert_eq!(report.aggregate, AggregateResult::default());
    }

    #[test]
    fn test_every_strategy_runs() {
        for strategy in [ReadStrategy::Words, ReadStrategy::Bytes, ReadStrategy::Wide] {
            let config = BenchmarkConfig::new(2, ByteSize::new(1000), 3, strategy).unwrap();
            let report = run_benchmark(&config);
            assert!(report.aggregate.total_read_speed_mb_per_s > 0.0, "{strategy}");
        }
    }
}
