//! Storage throughput sweeps
//!
//! Each sweep runs one benchmark over a list of sizes and yields one result
//! per size, so callers can print as they go. A failure at one size does not
//! stop the sweep.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::MIB;

pub mod file_io;
pub mod mmap;

pub use file_io::{FileIoOptions, FileIoResult, FileIoSweep};
pub use mmap::{MmapOptions, MmapResult, MmapSweep};

/// Errors from one step of a sweep
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("{step} {}: {source}", .path.display())]
    Io {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("size must be at least 1 MB")]
    EmptySize,

    #[error("size of {0} MB does not fit in 64 bits of bytes")]
    TooLarge(u64),
}

/// Byte count of a `size_mb` MiB run
pub(crate) fn total_bytes(size_mb: u64) -> Result<u64, SweepError> {
    if size_mb == 0 {
        return Err(SweepError::EmptySize);
    }
    size_mb.checked_mul(MIB).ok_or(SweepError::TooLarge(size_mb))
}

impl SweepError {
    pub(crate) fn io<'a>(step: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| SweepError::Io {
            step,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Turn the OS page cache on or off for `file` (`F_NOCACHE`)
#[cfg(target_os = "macos")]
pub fn set_no_cache(file: &File, enabled: bool) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: fcntl on a descriptor owned by `file`, which outlives the call.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, libc::c_int::from(enabled)) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// `F_NOCACHE` only exists on macOS; elsewhere the page cache stays on
#[cfg(not(target_os = "macos"))]
pub fn set_no_cache(_file: &File, enabled: bool) -> io::Result<()> {
    if enabled {
        tracing::debug!("F_NOCACHE is not available on this platform; page cache stays enabled");
    }
    Ok(())
}

/// Deletes the file at `path` when dropped
#[derive(Debug)]
pub(crate) struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}
