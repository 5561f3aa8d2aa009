//! Error types shared by the indexer, searcher and session.
//!
//! Every variant is recoverable: after any of them the session is still
//! usable and the caller decides whether to retry.

use crate::index::mode::Mode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// File exceeds the hard ceiling; raised before any chunk is read
    #[error("file is too large: {size} bytes (maximum is {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    /// Cancel flag observed at a chunk boundary or yield point
    #[error("operation cancelled")]
    Cancelled,

    /// Memory probe crossed the configured threshold while indexing
    #[error("memory usage at {percent}% exceeds the {threshold}% threshold while indexing in {mode} mode")]
    OutOfMemory {
        percent: u8,
        threshold: u8,
        mode: Mode,
    },

    #[error("no file loaded")]
    NoFileLoaded,

    #[error("search term is empty")]
    EmptySearchTerm,

    #[error("failed to read bytes {start}..{end}: {source}")]
    Io {
        start: u64,
        end: u64,
        #[source]
        source: std::io::Error,
    },
}

impl SearchError {
    pub(crate) fn io(start: u64, end: u64, source: std::io::Error) -> Self {
        SearchError::Io { start, end, source }
    }

    /// Whether the error came from the user pressing cancel
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}
