//! # slicegrep - line search over one large text file
//!
//! slicegrep searches the lines of a single text file for a substring
//! without ever holding the whole file in memory. The file is read in
//! fixed-size byte windows ("chunks"); the index stores only where each
//! line lives, and every search re-reads the chunks it needs.
//!
//! ## Architecture
//!
//! - [`index`] - Chunk-size modes and the line index builder
//! - [`query`] - Case-insensitive matching and the searcher
//! - [`session`] - The single active file: load, search, clear
//! - [`source`] - Byte-range access to local files or in-memory data
//! - [`output`] - Terminal, clipboard, export and JSON rendering
//! - [`utils`] - Config, cancellation, memory probes, progress
//!
//! ## Quick Start
//!
//! ```no_run
//! use slicegrep::session::Session;
//! use slicegrep::source::LocalFile;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut session = Session::default();
//! let file = LocalFile::open("server.log").await?;
//! session.load(file).await?;
//!
//! let outcome = session.search("timeout").await?;
//! for result in &outcome.results {
//!     println!("{}: {}", result.line_number, result.content);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Empty files
//!
//! An empty file loads as a valid, zero-line index, and searching it
//! returns an empty, complete outcome. `NoFileLoaded` is reserved for a
//! session without a file or whose last index build failed.
//!
//! ## Known limitation
//!
//! Chunks are plain byte windows. A line longer than the remaining space
//! of a chunk is split at the boundary and indexed as two lines, which
//! shifts the line numbers that follow it.

pub mod error;
pub mod index;
pub mod output;
pub mod query;
pub mod session;
pub mod source;
pub mod utils;

pub use error::{Result, SearchError};
