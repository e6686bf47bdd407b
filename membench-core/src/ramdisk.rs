//! RAM disk lifecycle (macOS)
//!
//! Creates a RAM-backed block device with `hdiutil`, formats and mounts it
//! with `diskutil`, and ejects it again. External commands go through
//! [`CommandRunner`] so the sequencing can be exercised without a Mac.

use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::types::{RamDiskSettings, MIB};

/// Sector size `hdiutil` counts `ram://` devices in
const SECTOR_SIZE: u64 = 512;

const MOUNT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const MOUNT_POLL_ATTEMPTS: u32 = 10;

const CHECK_FILE_NAME: &str = "tempfile.txt";
const CHECK_CONTENT: &str = "Hello from RAM!";

#[derive(Debug, thiserror::Error)]
pub enum RamDiskError {
    #[error("Failed to create RAM disk device: {0}")]
    CreateFailed(String),

    #[error("Failed to mount RAM disk: {0}")]
    MountFailed(String),

    #[error("RAM disk not found at {}", .0.display())]
    NotMounted(PathBuf),

    #[error("Error ejecting RAM disk: {0}")]
    EjectFailed(String),

    #[error("RAM disk still exists at {}", .0.display())]
    StillMounted(PathBuf),

    #[error("Error accessing {}: {source}", .path.display())]
    FileCheck {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Captured result of an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput>;
}

/// Spawns real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Pick the `/dev/disk…` path out of `hdiutil attach` output
pub fn parse_device(stdout: &str) -> Option<String> {
    stdout
        .split_whitespace()
        .find(|token| token.starts_with("/dev/disk"))
        .map(str::to_string)
}

/// Describe a failed command by its stderr, falling back to stdout
fn failure_text(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        output.stdout.trim().to_string()
    } else {
        stderr.to_string()
    }
}

pub struct RamDisk<R = SystemRunner> {
    settings: RamDiskSettings,
    runner: R,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl RamDisk<SystemRunner> {
    pub fn new(settings: RamDiskSettings) -> Self {
        Self::with_runner(settings, SystemRunner)
    }
}

impl<R: CommandRunner> RamDisk<R> {
    pub fn with_runner(settings: RamDiskSettings, runner: R) -> Self {
        Self {
            settings,
            runner,
            poll_interval: MOUNT_POLL_INTERVAL,
            poll_attempts: MOUNT_POLL_ATTEMPTS,
        }
    }

    /// Override how often and how long `create` waits for the volume
    pub fn with_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    pub fn mount_path(&self) -> PathBuf {
        self.settings.mount_path()
    }

    pub fn is_mounted(&self) -> bool {
        self.mount_path().exists()
    }

    /// Attach, format and mount the RAM disk. Returns the device path.
    pub fn create(&self) -> Result<String, RamDiskError> {
        let blocks = self
            .settings
            .size_mb
            .checked_mul(MIB)
            .map(|bytes| bytes / SECTOR_SIZE)
            .ok_or_else(|| {
                RamDiskError::CreateFailed(format!("size of {} MB is too large", self.settings.size_mb))
            })?;
        let url = format!("ram://{}", blocks);

        tracing::info!("Creating {} MB RAM disk", self.settings.size_mb);
        let attach = self
            .runner
            .run("hdiutil", &["attach", "-nomount", url.as_str()])
            .map_err(|e| RamDiskError::CreateFailed(e.to_string()))?;
        if !attach.success {
            return Err(RamDiskError::CreateFailed(failure_text(&attach)));
        }
        let device = parse_device(&attach.stdout).ok_or_else(|| {
            RamDiskError::CreateFailed(format!("no device in hdiutil output {:?}", attach.stdout.trim()))
        })?;
        tracing::debug!("Created RAM disk device: {}", device);

        tracing::info!("Mounting {} as {}", device, self.settings.volume_name);
        let erase = self
            .runner
            .run("diskutil", &["erasevolume", "HFS+", self.settings.volume_name.as_str(), device.as_str()])
            .map_err(|e| RamDiskError::MountFailed(e.to_string()))?;
        if !erase.success {
            return Err(RamDiskError::MountFailed(failure_text(&erase)));
        }

        let mount_path = self.mount_path();
        for _ in 0..self.poll_attempts {
            if self.is_mounted() {
                break;
            }
            std::thread::sleep(self.poll_interval);
        }
        if !self.is_mounted() {
            return Err(RamDiskError::NotMounted(mount_path));
        }

        tracing::info!("RAM disk mounted at {}", mount_path.display());
        Ok(device)
    }

    /// Unmount and detach the RAM disk
    pub fn eject(&self) -> Result<(), RamDiskError> {
        let mount_path = self.mount_path();
        let mount_arg = mount_path.to_string_lossy();

        tracing::info!("Ejecting RAM disk at {}", mount_path.display());
        let eject = self
            .runner
            .run("diskutil", &["eject", mount_arg.as_ref()])
            .map_err(|e| RamDiskError::EjectFailed(e.to_string()))?;
        if !eject.success {
            return Err(RamDiskError::EjectFailed(failure_text(&eject)));
        }

        if self.is_mounted() {
            return Err(RamDiskError::StillMounted(mount_path));
        }
        tracing::info!("RAM disk removed");
        Ok(())
    }

    /// Create the disk, write and read back a small file, then eject.
    ///
    /// With `local_dir`, skips the RAM disk and uses that directory instead,
    /// deleting the file afterwards. Returns the line read back.
    pub fn check(&self, local_dir: Option<&Path>) -> Result<String, RamDiskError> {
        match local_dir {
            Some(dir) => {
                let path = dir.join(CHECK_FILE_NAME);
                let line = write_and_read_back(&path)?;
                std::fs::remove_file(&path).map_err(|source| RamDiskError::FileCheck {
                    path: path.clone(),
                    source,
                })?;
                Ok(line)
            }
            None => {
                self.create()?;
                let checked = write_and_read_back(&self.mount_path().join(CHECK_FILE_NAME));
                // Eject even when the file check failed; the check error wins.
                let ejected = self.eject();
                let line = checked?;
                ejected?;
                Ok(line)
            }
        }
    }
}

/// Write a marker line to `path` and read the first line back
pub fn write_and_read_back(path: &Path) -> Result<String, RamDiskError> {
    let file_error = |source| RamDiskError::FileCheck {
        path: path.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::create(path).map_err(file_error)?;
    writeln!(file, "{}", CHECK_CONTENT).map_err(file_error)?;
    drop(file);

    let mut line = String::new();
    let file = std::fs::File::open(path).map_err(file_error)?;
    BufReader::new(file).read_line(&mut line).map_err(file_error)?;
    Ok(line.trim_end().to_string())
}
