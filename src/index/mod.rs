pub mod build;
pub mod chunk;
pub mod mode;
pub mod types;

pub use build::IndexBuilder;
pub use chunk::ChunkGeometry;
pub use mode::{MAX_FILE_SIZE, Mode, ModeConfig};
pub use types::*;
