use crate::index::chunk::ChunkGeometry;
use crate::index::mode::Mode;
use serde::Serialize;

/// Coordinates of one line: where to re-read it from, not its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    /// 1-based, increases by one per entry
    pub line_number: u64,
    pub chunk_index: u32,
    /// Byte offset of the owning chunk's first byte
    pub chunk_start_byte: u64,
    /// Position within the chunk's split fragments
    pub line_index_in_chunk: u32,
}

/// Ordered line index of one file.
///
/// Remembers the chunk size it was built with so lookups keep working
/// after the session switches to another mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    entries: Vec<IndexEntry>,
    mode: Mode,
    geometry: ChunkGeometry,
}

impl LineIndex {
    pub(crate) fn new(entries: Vec<IndexEntry>, mode: Mode, geometry: ChunkGeometry) -> Self {
        Self {
            entries,
            mode,
            geometry,
        }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn total_lines(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mode in effect when the index was built
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn geometry(&self) -> ChunkGeometry {
        self.geometry
    }

    pub fn chunk_count(&self) -> u64 {
        self.geometry.chunk_count()
    }

    /// Entry for a 1-based line number
    pub fn line(&self, line_number: u64) -> Option<&IndexEntry> {
        let idx = line_number.checked_sub(1)?;
        self.entries.get(usize::try_from(idx).ok()?)
    }
}

/// Indexing progress after one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexProgress {
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub processed_bytes: u64,
    pub total_bytes: u64,
    pub lines_indexed: u64,
}

impl IndexProgress {
    /// Whole percent of bytes processed, at most 100
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let pct = self.processed_bytes.saturating_mul(100) / self.total_bytes;
        pct.min(100) as u8
    }
}
