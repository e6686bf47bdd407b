//! Byte sizes with K/M/G suffixes
//!
//! Accepts the same notation on the command line (`-b=512M`) and in
//! `membench.toml` (`buffer_size = "512M"` or `buffer_size = 536870912`).

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ConfigError;

pub const KIB: u64 = 1 << 10;
pub const MIB: u64 = 1 << 20;
pub const GIB: u64 = 1 << 30;

/// A byte count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawByteSize", into = "u64")]
pub struct ByteSize(u64);

impl ByteSize {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn kib(n: u64) -> Self {
        Self(n * KIB)
    }

    pub const fn mib(n: u64) -> Self {
        Self(n * MIB)
    }

    pub const fn gib(n: u64) -> Self {
        Self(n * GIB)
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Whole mebibytes, rounded down
    pub const fn whole_mib(self) -> u64 {
        self.0 >> 20
    }

    /// Convert to `usize`, failing on targets where the value does not fit
    pub fn to_usize(self) -> Result<usize, ConfigError> {
        usize::try_from(self.0).map_err(|_| ConfigError::SizeOverflow(self.to_string()))
    }
}

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^([0-9]+)([KMG]?)$").unwrap())
}

impl FromStr for ByteSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let caps = size_pattern()
            .captures(text)
            .ok_or_else(|| ConfigError::InvalidSize(s.to_string()))?;

        let base: u64 = caps[1]
            .parse()
            .map_err(|_| ConfigError::SizeOverflow(s.to_string()))?;

        let multiplier = match caps[2].to_ascii_uppercase().as_str() {
            "K" => KIB,
            "M" => MIB,
            "G" => GIB,
            _ => 1,
        };

        base.checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ConfigError::SizeOverflow(s.to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes != 0 && bytes % GIB == 0 {
            write!(f, "{}G", bytes / GIB)
        } else if bytes != 0 && bytes % MIB == 0 {
            write!(f, "{}M", bytes / MIB)
        } else if bytes != 0 && bytes % KIB == 0 {
            write!(f, "{}K", bytes / KIB)
        } else {
            write!(f, "{}", bytes)
        }
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> Self {
        size.0
    }
}

/// Settings-file representation: either a bare integer or suffixed text
#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
    Bytes(u64),
    Text(String),
}

impl TryFrom<RawByteSize> for ByteSize {
    type Error = ConfigError;

    fn try_from(raw: RawByteSize) -> Result<Self, Self::Error> {
        match raw {
            RawByteSize::Bytes(n) => Ok(ByteSize(n)),
            RawByteSize::Text(s) => s.parse(),
        }
    }
}
