//! Substring search over an indexed file.
//!
//! - [`matcher`] - case-insensitive matching with byte offsets into the original line
//! - [`executor`] - the [`Searcher`], which re-reads chunks on demand

pub mod executor;
pub mod matcher;

pub use executor::{
    DEFAULT_CHUNK_CACHE_CAPACITY, DEFAULT_MAX_RESULTS, DEFAULT_YIELD_EVERY, SearchOutcome,
    SearchResult, SearchStatus, Searcher,
};
pub use matcher::Matcher;
