//! Sequential `write`/`read` throughput on a scratch file

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use super::{set_no_cache, total_bytes, ScratchFile, SweepError};
use crate::probe::throughput_mib_per_sec;
use crate::types::{ByteSize, ConfigError};

#[derive(Debug, Clone)]
pub struct FileIoOptions {
    pub path: PathBuf,
    block_size: usize,
    pub no_cache: bool,
}

impl FileIoOptions {
    pub fn new(path: PathBuf, block_size: ByteSize, no_cache: bool) -> Result<Self, ConfigError> {
        if block_size.bytes() == 0 {
            return Err(ConfigError::Zero("block size"));
        }
        Ok(Self {
            path,
            block_size: block_size.to_usize()?,
            no_cache,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileIoResult {
    pub size_mb: u64,
    pub write_speed_mb_per_s: f64,
    pub read_speed_mb_per_s: f64,
}

impl fmt::Display for FileIoResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Size: {} MB | Write: {:.2} MB/s | Read: {:.2} MB/s",
            self.size_mb, self.write_speed_mb_per_s, self.read_speed_mb_per_s
        )
    }
}

/// Write then read back `size_mb` MiB in `block_size` chunks.
///
/// The write pass ends with `fsync`, which is included in the timing.
pub fn measure_file_io(options: &FileIoOptions, size_mb: u64) -> Result<FileIoResult, SweepError> {
    let path = options.path.as_path();
    let total = total_bytes(size_mb)?;
    let mut block = vec![b'A'; options.block_size];

    // Write
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(SweepError::io("open for write", path))?;
    set_no_cache(&file, options.no_cache).map_err(SweepError::io("fcntl F_NOCACHE", path))?;

    let start = Instant::now();
    let mut remaining = total;
    while remaining > 0 {
        let n = remaining.min(block.len() as u64) as usize;
        file.write_all(&block[..n]).map_err(SweepError::io("write", path))?;
        remaining -= n as u64;
    }
    file.sync_all().map_err(SweepError::io("fsync", path))?;
    let write_elapsed = start.elapsed();
    drop(file);

    // Read
    let mut file = File::open(path).map_err(SweepError::io("open for read", path))?;
    set_no_cache(&file, options.no_cache).map_err(SweepError::io("fcntl F_NOCACHE", path))?;

    let start = Instant::now();
    let mut remaining = total;
    while remaining > 0 {
        let n = remaining.min(block.len() as u64) as usize;
        file.read_exact(&mut block[..n]).map_err(SweepError::io("read", path))?;
        remaining -= n as u64;
    }
    let read_elapsed = start.elapsed();
    std::hint::black_box(&block);

    Ok(FileIoResult {
        size_mb,
        write_speed_mb_per_s: throughput_mib_per_sec(total as f64, write_elapsed),
        read_speed_mb_per_s: throughput_mib_per_sec(total as f64, read_elapsed),
    })
}

/// Runs [`measure_file_io`] for each size in turn, reusing one scratch file
/// that is removed when the sweep is dropped.
pub struct FileIoSweep {
    options: FileIoOptions,
    sizes: std::vec::IntoIter<u64>,
    _scratch: ScratchFile,
}

impl FileIoSweep {
    pub fn new(options: FileIoOptions, sizes_mb: Vec<u64>) -> Self {
        let scratch = ScratchFile::new(options.path.clone());
        Self {
            options,
            sizes: sizes_mb.into_iter(),
            _scratch: scratch,
        }
    }
}

impl Iterator for FileIoSweep {
    type Item = (u64, Result<FileIoResult, SweepError>);

    fn next(&mut self) -> Option<Self::Item> {
        let size_mb = self.sizes.next()?;
        tracing::info!("File I/O: {} MB via {}", size_mb, self.options.path.display());
        Some((size_mb, measure_file_io(&self.options, size_mb)))
    }
}
