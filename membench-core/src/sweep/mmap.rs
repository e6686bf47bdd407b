//! Memory-mapped file throughput with `msync`
//!
//! The write pass copies a 1 MiB pattern into a shared read-write mapping,
//! flushing each chunk as soon as it is written. The read pass remaps the
//! file read-only and sums every byte.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::time::Instant;

use memmap2::{Mmap, MmapMut};
use serde::Serialize;

use super::{set_no_cache, total_bytes, ScratchFile, SweepError};
use crate::probe::throughput_mib_per_sec;
use crate::types::MIB;

/// Bytes copied and flushed per step of the write pass
pub const CHUNK_SIZE: usize = MIB as usize;

#[derive(Debug, Clone)]
pub struct MmapOptions {
    pub path: PathBuf,
    /// MS_SYNC when true, MS_ASYNC when false
    pub sync: bool,
    pub no_cache: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MmapResult {
    pub size_mb: u64,
    pub write_speed_mb_per_s: f64,
    pub read_speed_mb_per_s: f64,
    pub checksum: u64,
}

impl fmt::Display for MmapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Size: {} MB", self.size_mb)?;
        writeln!(f, "Write+msync: {:.2} MB/s", self.write_speed_mb_per_s)?;
        writeln!(f, "Read       : {:.2} MB/s", self.read_speed_mb_per_s)?;
        write!(f, "Checksum   : {}", self.checksum)
    }
}

fn chunk_pattern() -> Vec<u8> {
    (0..CHUNK_SIZE).map(|i| i as u8).collect()
}

/// Run the write and read passes for one size; the file is deleted afterwards.
pub fn measure_mmap(options: &MmapOptions, size_mb: u64) -> Result<MmapResult, SweepError> {
    let scratch = ScratchFile::new(options.path.clone());
    let path = scratch.path();
    let total = total_bytes(size_mb)?;
    let chunks = (total / CHUNK_SIZE as u64) as usize;
    let pattern = chunk_pattern();

    // Write + msync
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(SweepError::io("open for write", path))?;
    set_no_cache(&file, options.no_cache).map_err(SweepError::io("fcntl F_NOCACHE", path))?;
    file.set_len(total).map_err(SweepError::io("ftruncate", path))?;

    // SAFETY: the file was just created by us and nothing else maps or
    // resizes it while the mapping is alive.
    let mut map = unsafe { MmapMut::map_mut(&file) }.map_err(SweepError::io("mmap", path))?;

    let start = Instant::now();
    for i in 0..chunks {
        let offset = i * CHUNK_SIZE;
        map[offset..offset + CHUNK_SIZE].copy_from_slice(&pattern);
        let flushed = if options.sync {
            map.flush_range(offset, CHUNK_SIZE)
        } else {
            map.flush_async_range(offset, CHUNK_SIZE)
        };
        if let Err(e) = flushed {
            tracing::warn!("msync of chunk {} in {} failed: {}", i, path.display(), e);
        }
    }
    let write_elapsed = start.elapsed();
    drop(map);
    drop(file);

    // Read
    let file = File::open(path).map_err(SweepError::io("open for read", path))?;
    set_no_cache(&file, options.no_cache).map_err(SweepError::io("fcntl F_NOCACHE", path))?;

    // SAFETY: as above, the file is private to this function.
    let map = unsafe { Mmap::map(&file) }.map_err(SweepError::io("mmap", path))?;

    let start = Instant::now();
    let checksum = map.iter().fold(0u64, |acc, &b| acc.wrapping_add(b as u64));
    let checksum = std::hint::black_box(checksum);
    let read_elapsed = start.elapsed();

    Ok(MmapResult {
        size_mb,
        write_speed_mb_per_s: throughput_mib_per_sec(total as f64, write_elapsed),
        read_speed_mb_per_s: throughput_mib_per_sec(total as f64, read_elapsed),
        checksum,
    })
}

/// Runs [`measure_mmap`] for each size in turn
pub struct MmapSweep {
    options: MmapOptions,
    sizes: std::vec::IntoIter<u64>,
}

impl MmapSweep {
    pub fn new(options: MmapOptions, sizes_mb: Vec<u64>) -> Self {
        Self {
            options,
            sizes: sizes_mb.into_iter(),
        }
    }
}

impl Iterator for MmapSweep {
    type Item = (u64, Result<MmapResult, SweepError>);

    fn next(&mut self) -> Option<Self::Item> {
        let size_mb = self.sizes.next()?;
        tracing::info!("mmap: {} MB via {}", size_mb, self.options.path.display());
        Some((size_mb, measure_mmap(&self.options, size_mb)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Byte sum of one chunk of the pattern: 4096 repetitions of 0..=255
    const CHUNK_SUM: u64 = 4096 * 32640;

    fn options(dir: &TempDir, sync: bool) -> MmapOptions {
        MmapOptions {
            path: dir.path().join("map.bin"),
            sync,
            no_cache: true,
        }
    }

    #[test]
    fn test_sync_round() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir, true);
        let result = measure_mmap(&opts, 2).unwrap();
        assert_eq!(result.checksum, 2 * CHUNK_SUM);
        assert!(result.write_speed_mb_per_s > 0.0);
        assert!(result.read_speed_mb_per_s > 0.0);
        assert!(!opts.path.exists());
    }

    #[test]
    fn test_async_round() {
        let dir = TempDir::new().unwrap();
        let result = measure_mmap(&options(&dir, false), 1).unwrap();
        assert_eq!(result.checksum, CHUNK_SUM);
    }

    #[test]
    fn test_zero_size() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(measure_mmap(&options(&dir, true), 0), Err(SweepError::EmptySize)));
    }

    #[test]
    fn test_oversized_size_is_rejected_before_mapping() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir, false);
        let err = measure_mmap(&opts, u64::MAX).unwrap_err();
        assert!(matches!(err, SweepError::TooLarge(u64::MAX)));
        assert!(!opts.path.exists());
    }

    #[test]
    fn test_sweep_yields_every_size() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir, true);
        let path = opts.path.clone();
        let sizes: Vec<u64> = MmapSweep::new(opts, vec![1, 0, 2])
            .map(|(size, outcome)| {
                if size == 0 {
                    assert!(outcome.is_err());
                } else {
                    assert_eq!(outcome.unwrap().checksum, size * CHUNK_SUM);
                }
                size
            })
            .collect();
        assert_eq!(sizes, vec![1, 0, 2]);
        assert!(!path.exists());
    }

    #[test]
    fn test_display() {
        let result = MmapResult {
            size_mb: 100,
            write_speed_mb_per_s: 10.0,
            read_speed_mb_per_s: 20.5,
            checksum: 7,
        };
        assert_eq!(
            result.to_string(),
            "Size: 100 MB\nWrite+msync: 10.00 MB/s\nRead       : 20.50 MB/s\nChecksum   : 7"
        );
    }
}
