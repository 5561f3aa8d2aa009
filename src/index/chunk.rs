//! Chunk geometry, decoding and line splitting.
//!
//! The indexer and the searcher must split a chunk into exactly the same
//! fragments, otherwise a stored `line_index_in_chunk` points at the wrong
//! line. Both go through [`read_chunk`] and [`split_lines`].

use crate::error::{Result, SearchError};
use crate::source::FileSource;
use memchr::{memchr_iter, memrchr};
use std::ops::Range;

const UTF8_BOM: &str = "\u{feff}";

/// Fixed-size byte windows over a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    pub chunk_size: u64,
    pub file_size: u64,
}

impl ChunkGeometry {
    pub fn new(chunk_size: u64, file_size: u64) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            file_size,
        }
    }

    /// `ceil(file_size / chunk_size)`; zero for an empty file
    pub fn chunk_count(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size)
    }

    /// Byte range of chunk `index`, clamped to the end of the file
    pub fn range(&self, index: u64) -> Range<u64> {
        let start = (index * self.chunk_size).min(self.file_size);
        let end = (start + self.chunk_size).min(self.file_size);
        start..end
    }
}

/// Decode chunk bytes as UTF-8.
///
/// Malformed sequences become U+FFFD and a leading byte-order mark is
/// dropped, the same way a platform text decoder treats each slice.
pub fn decode_chunk(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_owned(),
        None => text.into_owned(),
    }
}

/// Read and decode chunk `index`
pub async fn read_chunk<S: FileSource + ?Sized>(
    source: &S,
    geometry: ChunkGeometry,
    index: u64,
) -> Result<String> {
    let range = geometry.range(index);
    let bytes = source
        .read_range(range.start, range.end)
        .await
        .map_err(|e| SearchError::io(range.start, range.end, e))?;
    Ok(decode_chunk(&bytes))
}

/// Split decoded chunk text on `\n`.
///
/// The empty fragment after a final `\n` is not a line and is left out.
/// A trailing `\r` stays on the fragment; see [`strip_cr`].
pub fn split_lines(text: &str) -> Vec<&str> {
    line_ranges(text).into_iter().map(|r| &text[r]).collect()
}

/// Byte ranges of the fragments [`split_lines`] returns
pub fn line_ranges(text: &str) -> Vec<Range<usize>> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    let mut ranges = Vec::new();
    let mut start = 0;
    for pos in memchr_iter(b'\n', body.as_bytes()) {
        ranges.push(start..pos);
        start = pos + 1;
    }
    ranges.push(start..body.len());
    ranges
}

/// Number of fragments [`split_lines`] would return, without allocating
pub fn count_lines(text: &str) -> usize {
    let bytes = text.as_bytes();
    let newlines = memchr_iter(b'\n', bytes).count();
    match memrchr(b'\n', bytes) {
        Some(last) if last + 1 == bytes.len() => newlines,
        _ => newlines + 1,
    }
}

/// Line content without the carriage return of a CRLF ending
pub fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}
