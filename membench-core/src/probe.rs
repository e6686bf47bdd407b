//! Timed write and read passes over a worker buffer

use std::hint::black_box;
use std::time::{Duration, Instant};

use crate::buffer::AlignedBuffer;
use crate::types::{ReadStrategy, MIB};

/// Shortest elapsed time used in throughput math, so a pass that finishes
/// below timer resolution still reports a finite speed
const MIN_ELAPSED_SECS: f64 = 1e-9;

/// MiB per second for `bytes` moved in `elapsed`
pub fn throughput_mib_per_sec(bytes: f64, elapsed: Duration) -> f64 {
    bytes / MIB as f64 / elapsed.as_secs_f64().max(MIN_ELAPSED_SECS)
}

/// Write `offset mod 256` into every byte, in ascending order, `iterations` times.
///
/// Returns the time spent in the loop only.
pub fn write_probe(buffer: &mut AlignedBuffer, iterations: u32) -> Duration {
    let start = Instant::now();
    for _ in 0..iterations {
        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = offset as u8;
        }
        // Stop the passes from being merged into one
        black_box(buffer.as_ptr());
    }
    start.elapsed()
}

/// Read the whole buffer `iterations` times with the given strategy.
///
/// Returns the loop time and the folded value of the last pass.
pub fn read_probe(buffer: &AlignedBuffer, iterations: u32, strategy: ReadStrategy) -> (Duration, u64) {
    let pass: fn(&AlignedBuffer) -> u64 = match strategy {
        ReadStrategy::Words => xor_words,
        ReadStrategy::Bytes => sum_bytes,
        ReadStrategy::Wide => xor_lanes,
    };

    let mut checksum = 0;
    let start = Instant::now();
    for _ in 0..iterations {
        checksum = black_box(pass(black_box(buffer)));
    }
    (start.elapsed(), checksum)
}

/// Eight word loads per cache line folded into a single accumulator
fn xor_words(buffer: &AlignedBuffer) -> u64 {
    let (lines, tail) = buffer.lines();
    let mut acc = 0u64;
    for line in lines {
        acc ^= line[0] ^ line[1] ^ line[2] ^ line[3] ^ line[4] ^ line[5] ^ line[6] ^ line[7];
    }
    fold_tail(acc, tail)
}

fn sum_bytes(buffer: &AlignedBuffer) -> u64 {
    buffer.iter().fold(0u64, |acc, &b| acc.wrapping_add(b as u64))
}

/// One independent accumulator per word position, combined after the pass
fn xor_lanes(buffer: &AlignedBuffer) -> u64 {
    let (lines, tail) = buffer.lines();
    let mut lanes = [0u64; 8];
    for line in lines {
        for (lane, word) in lanes.iter_mut().zip(line) {
            *lane ^= word;
        }
    }
    fold_tail(lanes.iter().fold(0, |acc, lane| acc ^ lane), tail)
}

fn fold_tail(acc: u64, tail: &[u8]) -> u64 {
    tail.iter().fold(acc, |acc, &b| acc ^ b as u64)
}
