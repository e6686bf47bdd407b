//! RAM benchmark configuration

use serde::{Deserialize, Serialize};

use super::ByteSize;

/// Errors raised while turning user input into a runnable configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid buffer size format: {0:?} (expected N, NK, NM or NG)")]
    InvalidSize(String),

    #[error("Size does not fit in memory on this platform: {0}")]
    SizeOverflow(String),

    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Settings file not found: {0}")]
    NotFound(String),
}

/// How the read probe walks the buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStrategy {
    /// 64-byte strides, eight `u64` loads folded into one XOR accumulator
    #[default]
    Words,

    /// Byte-by-byte wrapping sum
    Bytes,

    /// Eight independent `u64` XOR lanes per cache line
    Wide,
}

impl std::fmt::Display for ReadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadStrategy::Words => write!(f, "words"),
            ReadStrategy::Bytes => write!(f, "bytes"),
            ReadStrategy::Wide => write!(f, "wide"),
        }
    }
}

/// Parameters of one RAM throughput run
///
/// Built once through [`BenchmarkConfig::new`] and then shared read-only
/// with every worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchmarkConfig {
    thread_count: usize,
    buffer_size_bytes: usize,
    iteration_count: u32,
    read_strategy: ReadStrategy,
}

impl BenchmarkConfig {
    pub const DEFAULT_THREADS: usize = 1;
    pub const DEFAULT_BUFFER_SIZE: ByteSize = ByteSize::gib(1);
    pub const DEFAULT_ITERATIONS: u32 = 10;

    /// Validate and build a configuration.
    ///
    /// Buffers smaller than one cache line are accepted; the read probe
    /// handles the tail bytes without striding past the end.
    pub fn new(
        thread_count: usize,
        buffer_size: ByteSize,
        iteration_count: u32,
        read_strategy: ReadStrategy,
    ) -> Result<Self, ConfigError> {
        if thread_count == 0 {
            return Err(ConfigError::Zero("thread count"));
        }
        if buffer_size.bytes() == 0 {
            return Err(ConfigError::Zero("buffer size"));
        }
        if iteration_count == 0 {
            return Err(ConfigError::Zero("iteration count"));
        }

        Ok(Self {
            thread_count,
            buffer_size_bytes: buffer_size.to_usize()?,
            iteration_count,
            read_strategy,
        })
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn buffer_size_bytes(&self) -> usize {
        self.buffer_size_bytes
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn read_strategy(&self) -> ReadStrategy {
        self.read_strategy
    }

    /// Bytes touched by one probe phase across all iterations
    pub fn bytes_per_phase(&self) -> f64 {
        self.buffer_size_bytes as f64 * self.iteration_count as f64
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            thread_count: Self::DEFAULT_THREADS,
            buffer_size_bytes: Self::DEFAULT_BUFFER_SIZE.bytes() as usize,
            iteration_count: Self::DEFAULT_ITERATIONS,
            read_strategy: ReadStrategy::default(),
        }
    }
}
