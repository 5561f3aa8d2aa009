//! Chunk-size policy.
//!
//! A [`Mode`] fixes how many bytes are read per step and the largest file
//! it is meant for. Larger files get smaller chunks so that the decoded
//! text of one chunk stays cheap next to everything else held in memory.

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Hard ceiling across all modes
pub const MAX_FILE_SIZE: u64 = 1024 * MIB;

/// Size ceiling and read granularity of one mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    pub max_file_size: u64,
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Fast,
    Stream,
    Chunk,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Fast, Mode::Stream, Mode::Chunk];

    pub const fn config(self) -> ModeConfig {
        match self {
            Mode::Fast => ModeConfig {
                max_file_size: 100 * MIB,
                chunk_size: MIB,
            },
            Mode::Stream => ModeConfig {
                max_file_size: 500 * MIB,
                chunk_size: 512 * KIB,
            },
            Mode::Chunk => ModeConfig {
                max_file_size: MAX_FILE_SIZE,
                chunk_size: 256 * KIB,
            },
        }
    }

    pub const fn chunk_size(self) -> u64 {
        self.config().chunk_size
    }

    pub const fn max_file_size(self) -> u64 {
        self.config().max_file_size
    }

    /// Pick the mode for a file of `file_size` bytes.
    ///
    /// Fails with [`SearchError::FileTooLarge`] above [`MAX_FILE_SIZE`].
    pub fn recommended(file_size: u64) -> Result<Mode> {
        check_file_size(file_size)?;
        let mode = Mode::ALL
            .into_iter()
            .find(|m| file_size <= m.max_file_size())
            .unwrap_or(Mode::Chunk);
        Ok(mode)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Stream => "stream",
            Mode::Chunk => "chunk",
        }
    }

    /// Label shown next to the loaded file
    pub fn label(self) -> &'static str {
        match self {
            Mode::Fast => "⚡ Быстрый",
            Mode::Stream => "🔄 Потоковый",
            Mode::Chunk => "🧩 По частям",
        }
    }
}

/// Reject files over the hard ceiling before any work starts
pub fn check_file_size(file_size: u64) -> Result<()> {
    if file_size > MAX_FILE_SIZE {
        return Err(SearchError::FileTooLarge {
            size: file_size,
            limit: MAX_FILE_SIZE,
        });
    }
    Ok(())
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Mode::Fast),
            "stream" => Ok(Mode::Stream),
            "chunk" => Ok(Mode::Chunk),
            other => Err(format!(
                "unknown mode '{}' (expected fast, stream or chunk)",
                other
            )),
        }
    }
}
