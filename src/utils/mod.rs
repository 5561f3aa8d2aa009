//! Utility functions and data structures.
//!
//! ## Modules
//!
//! - [`app_data`] - Configuration file location and loading
//! - [`cancel`] - Shared cancel flag observed at yield points
//! - [`format`] - Human-readable sizes
//! - [`memory`] - Memory-pressure probes sampled while indexing
//! - [`progress`] - Terminal progress bar for index builds

pub mod app_data;
pub mod cancel;
pub mod format;
pub mod memory;
pub mod progress;

pub use app_data::*;
pub use cancel::*;
pub use format::*;
pub use memory::*;
pub use progress::*;
