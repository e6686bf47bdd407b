//! membench settings file
//!
//! Defines the optional `membench.toml` format. Every key has a default, so
//! an empty file (or no file at all) yields the built-in behaviour.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{BenchmarkConfig, ByteSize, ConfigError, ReadStrategy};

/// File name looked up in the working directory
pub const SETTINGS_FILE_NAME: &str = "membench.toml";

/// Top-level settings (membench.toml)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub ram: RamSettings,

    #[serde(default)]
    pub file_io: FileIoSettings,

    #[serde(default)]
    pub mmap: MmapSettings,

    #[serde(default)]
    pub ramdisk: RamDiskSettings,
}

/// Defaults for `membench ram`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RamSettings {
    #[serde(default = "default_threads")]
    pub threads: usize,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: ByteSize,

    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default)]
    pub read_strategy: ReadStrategy,
}

fn default_threads() -> usize {
    BenchmarkConfig::DEFAULT_THREADS
}

fn default_buffer_size() -> ByteSize {
    BenchmarkConfig::DEFAULT_BUFFER_SIZE
}

fn default_iterations() -> u32 {
    BenchmarkConfig::DEFAULT_ITERATIONS
}

impl Default for RamSettings {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            buffer_size: default_buffer_size(),
            iterations: default_iterations(),
            read_strategy: ReadStrategy::default(),
        }
    }
}

/// Defaults for `membench file-io`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIoSettings {
    /// Scratch file written and read back for every size
    #[serde(default = "default_file_io_path")]
    pub path: PathBuf,

    /// Sizes to sweep, in MiB
    #[serde(default = "default_file_io_sizes")]
    pub sizes_mb: Vec<u64>,

    /// Size of each `read`/`write` call
    #[serde(default = "default_block_size")]
    pub block_size: ByteSize,
}

fn default_file_io_path() -> PathBuf {
    std::env::temp_dir().join("ssd_benchmark_test.dat")
}

fn default_file_io_sizes() -> Vec<u64> {
    vec![100, 512, 1024, 2048, 4096, 8192, 12288]
}

fn default_block_size() -> ByteSize {
    ByteSize::mib(1)
}

impl Default for FileIoSettings {
    fn default() -> Self {
        Self {
            path: default_file_io_path(),
            sizes_mb: default_file_io_sizes(),
            block_size: default_block_size(),
        }
    }
}

/// Defaults for `membench mmap`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmapSettings {
    #[serde(default = "default_mmap_path")]
    pub path: PathBuf,

    /// Sizes to sweep, in MiB
    #[serde(default = "default_mmap_sizes")]
    pub sizes_mb: Vec<u64>,

    /// `msync` each chunk with MS_SYNC (true) or MS_ASYNC (false)
    #[serde(default = "default_true")]
    pub sync: bool,

    /// Bypass the unified buffer cache (macOS `F_NOCACHE`)
    #[serde(default = "default_true")]
    pub no_cache: bool,
}

fn default_mmap_path() -> PathBuf {
    PathBuf::from("test_mmap_file.bin")
}

fn default_mmap_sizes() -> Vec<u64> {
    vec![100, 512, 1024, 2048, 4096, 8192]
}

fn default_true() -> bool {
    true
}

impl Default for MmapSettings {
    fn default() -> Self {
        Self {
            path: default_mmap_path(),
            sizes_mb: default_mmap_sizes(),
            sync: true,
            no_cache: true,
        }
    }
}

/// Defaults for `membench ramdisk`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RamDiskSettings {
    #[serde(default = "default_ramdisk_size")]
    pub size_mb: u64,

    #[serde(default = "default_volume_name")]
    pub volume_name: String,

    /// Directory the OS mounts volumes under
    #[serde(default = "default_volumes_root")]
    pub volumes_root: PathBuf,
}

fn default_ramdisk_size() -> u64 {
    2047
}

fn default_volume_name() -> String {
    "RAMDisk".to_string()
}

fn default_volumes_root() -> PathBuf {
    PathBuf::from("/Volumes")
}

impl Default for RamDiskSettings {
    fn default() -> Self {
        Self {
            size_mb: default_ramdisk_size(),
            volume_name: default_volume_name(),
            volumes_root: default_volumes_root(),
        }
    }
}

impl RamDiskSettings {
    /// Where the volume appears once mounted
    pub fn mount_path(&self) -> PathBuf {
        self.volumes_root.join(&self.volume_name)
    }
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read settings from an explicit path
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load settings from `explicit` if given, otherwise from the first of
    /// `./membench.toml` and `<config dir>/membench/config.toml` that exists.
    /// Falls back to defaults when no file is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match find_settings_file(Path::new(".")) {
            Some(path) => {
                tracing::debug!("Loading settings from {}", path.display());
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Find a settings file, checking `dir` before the user config directory
pub fn find_settings_file(dir: &Path) -> Option<PathBuf> {
    let local = dir.join(SETTINGS_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    let user = dirs::config_dir()?.join("membench").join("config.toml");
    user.exists().then_some(user)
}
