use crate::error::{Result, SearchError};
use crate::index::chunk::{ChunkGeometry, count_lines, read_chunk};
use crate::index::mode::{Mode, check_file_size};
use crate::index::types::{IndexEntry, IndexProgress, LineIndex};
use crate::source::FileSource;
use crate::utils::{CancelFlag, MemoryProbe, NoMemoryProbe};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sample the memory probe every this many chunks
pub const DEFAULT_MEMORY_CHECK_INTERVAL: u64 = 10;

/// Abort indexing when memory use exceeds this share of the limit
pub const DEFAULT_MEMORY_THRESHOLD_PERCENT: u8 = 85;

static NO_MEMORY_PROBE: NoMemoryProbe = NoMemoryProbe;

type ProgressFn<'a> = Box<dyn FnMut(&IndexProgress) + Send + 'a>;

/// Builds a [`LineIndex`] by walking a file in fixed-size chunks.
///
/// Only one decoded chunk is alive at a time. Between chunks the builder
/// yields to the scheduler, then checks the cancel flag before reading
/// the next one.
///
/// ```no_run
/// # async fn demo() -> slicegrep::error::Result<()> {
/// use slicegrep::index::{IndexBuilder, Mode};
/// use slicegrep::source::MemorySource;
///
/// let source = MemorySource::new("notes.txt", "one\ntwo\n");
/// let index = IndexBuilder::new(Mode::Fast).build(&source).await?;
/// assert_eq!(index.total_lines(), 2);
/// # Ok(())
/// # }
/// ```
pub struct IndexBuilder<'a> {
    mode: Mode,
    chunk_size: u64,
    cancel: CancelFlag,
    memory: &'a dyn MemoryProbe,
    memory_check_interval: u64,
    memory_threshold_percent: u8,
    on_progress: Option<ProgressFn<'a>>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            chunk_size: mode.chunk_size(),
            cancel: CancelFlag::new(),
            memory: &NO_MEMORY_PROBE,
            memory_check_interval: DEFAULT_MEMORY_CHECK_INTERVAL,
            memory_threshold_percent: DEFAULT_MEMORY_THRESHOLD_PERCENT,
            on_progress: None,
        }
    }

    /// Override the mode's chunk size (small chunks make boundary
    /// behaviour observable on small inputs)
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn memory_probe(mut self, probe: &'a dyn MemoryProbe) -> Self {
        self.memory = probe;
        self
    }

    pub fn memory_check_interval(mut self, chunks: u64) -> Self {
        self.memory_check_interval = chunks.max(1);
        self
    }

    pub fn memory_threshold(mut self, percent: u8) -> Self {
        self.memory_threshold_percent = percent;
        self
    }

    pub fn on_progress(mut self, f: impl FnMut(&IndexProgress) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Index every line of `source`.
    ///
    /// On `Cancelled`, `OutOfMemory` or `Io` the partial index is dropped.
    pub async fn build<S: FileSource + ?Sized>(mut self, source: &S) -> Result<LineIndex> {
        let file_size = source.size();
        check_file_size(file_size)?;

        let geometry = ChunkGeometry::new(self.chunk_size, file_size);
        let total_chunks = geometry.chunk_count();
        let started = Instant::now();

        info!(
            file = source.name(),
            size = file_size,
            mode = %self.mode,
            chunk_size = geometry.chunk_size,
            chunks = total_chunks,
            "building line index"
        );

        let mut entries: Vec<IndexEntry> = Vec::new();
        let mut line_number: u64 = 1;

        for chunk_index in 0..total_chunks {
            if self.cancel.is_cancelled() {
                debug!(chunk_index, "index build cancelled");
                return Err(SearchError::Cancelled);
            }

            let range = geometry.range(chunk_index);
            let text = read_chunk(source, geometry, chunk_index).await?;
            let fragments = count_lines(&text);

            entries.reserve(fragments);
            for line_index in 0..fragments {
                entries.push(IndexEntry {
                    line_number,
                    chunk_index: chunk_index as u32,
                    chunk_start_byte: range.start,
                    line_index_in_chunk: line_index as u32,
                });
                line_number += 1;
            }
            drop(text);

            if let Some(report) = self.on_progress.as_mut() {
                report(&IndexProgress {
                    chunk_index,
                    total_chunks,
                    processed_bytes: range.end,
                    total_bytes: file_size,
                    lines_indexed: line_number - 1,
                });
            }

            tokio::task::yield_now().await;

            if chunk_index % self.memory_check_interval == 0 {
                self.check_memory(chunk_index)?;
            }
        }

        // A cancel raised during the last yield still counts
        if self.cancel.is_cancelled() {
            debug!("index build cancelled after last chunk");
            return Err(SearchError::Cancelled);
        }

        info!(
            lines = entries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "line index ready"
        );

        Ok(LineIndex::new(entries, self.mode, geometry))
    }

    fn check_memory(&self, chunk_index: u64) -> Result<()> {
        let Some(usage) = self.memory.sample() else {
            return Ok(());
        };

        let percent = usage.percent();
        debug!(chunk_index, percent, used = usage.used_bytes, "memory sample");

        if percent > self.memory_threshold_percent {
            warn!(
                percent,
                threshold = self.memory_threshold_percent,
                "memory pressure, abandoning index build"
            );
            return Err(SearchError::OutOfMemory {
                percent,
                threshold: self.memory_threshold_percent,
                mode: self.mode,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::utils::{FixedMemoryProbe, MemoryUsage};
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn numbered_lines(n: usize) -> String {
        (1..=n).map(|i| format!("line {}\n", i)).collect()
    }

    #[tokio::test]
    async fn test_index_counts_newline_terminated_lines() {
        let source = MemorySource::new("a.txt", numbered_lines(50));
        let index = IndexBuilder::new(Mode::Fast).build(&source).await.unwrap();

        assert_eq!(index.total_lines(), 50);
        let numbers: Vec<u64> = index.entries().iter().map(|e| e.line_number).collect();
        assert_eq!(numbers, (1..=50).collect::<Vec<_>>());
        assert!(index.entries().iter().all(|e| e.chunk_index == 0));
    }

    #[tokio::test]
    async fn test_missing_final_newline_still_counts_last_line() {
        let source = MemorySource::new("a.txt", "one\ntwo\nthree");
        let index = IndexBuilder::new(Mode::Fast).build(&source).await.unwrap();
        assert_eq!(index.total_lines(), 3);
    }

    #[tokio::test]
    async fn test_empty_file_has_no_entries() {
        let source = MemorySource::new("empty.txt", "");
        let index = IndexBuilder::new(Mode::Fast).build(&source).await.unwrap();
        assert!(index.is_empty());
        assert_eq!(index.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_chunk_coordinates_across_chunks() {
        // Every line is 4 bytes, chunks of 8 hold exactly two lines
        let source = MemorySource::new("a.txt", "aaa\nbbb\nccc\nddd\neee\n");
        let index = IndexBuilder::new(Mode::Chunk)
            .chunk_size(8)
            .build(&source)
            .await
            .unwrap();

        assert_eq!(index.total_lines(), 5);
        let coords: Vec<(u32, u64, u32)> = index
            .entries()
            .iter()
            .map(|e| (e.chunk_index, e.chunk_start_byte, e.line_index_in_chunk))
            .collect();
        assert_eq!(
            coords,
            vec![(0, 0, 0), (0, 0, 1), (1, 8, 0), (1, 8, 1), (2, 16, 0)]
        );
        assert_eq!(index.mode(), Mode::Chunk);
        assert_eq!(index.geometry().chunk_size, 8);
    }

    #[tokio::test]
    async fn test_file_of_exactly_one_chunk_has_no_trailing_entry() {
        let mut content = "x".repeat(15);
        content.push('\n');
        let source = MemorySource::new("a.txt", content);
        let index = IndexBuilder::new(Mode::Fast)
            .chunk_size(16)
            .build(&source)
            .await
            .unwrap();
        assert_eq!(index.chunk_count(), 1);
        assert_eq!(index.total_lines(), 1);
    }

    #[tokio::test]
    async fn test_line_straddling_boundary_becomes_two_fragments() {
        // "abcdef" crosses the 4-byte boundary and is indexed twice
        let source = MemorySource::new("a.txt", "abcdef\nxy\n");
        let index = IndexBuilder::new(Mode::Fast)
            .chunk_size(4)
            .build(&source)
            .await
            .unwrap();
        // chunks: "abcd" | "ef\nx" | "y\n"
        assert_eq!(index.total_lines(), 4);
    }

    #[tokio::test]
    async fn test_cancel_before_first_chunk() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let source = MemorySource::new("a.txt", numbered_lines(10));
        let err = IndexBuilder::new(Mode::Fast)
            .cancel_flag(cancel)
            .build(&source)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_from_progress_callback_stops_at_next_chunk() {
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_cb = seen.clone();

        let source = MemorySource::new("a.txt", numbered_lines(100));
        let result = IndexBuilder::new(Mode::Fast)
            .chunk_size(32)
            .cancel_flag(cancel)
            .on_progress(move |p| {
                seen_in_cb.lock().unwrap().push(p.chunk_index);
                if p.chunk_index == 2 {
                    trigger.cancel();
                }
            })
            .build(&source)
            .await;

        assert!(matches!(result, Err(SearchError::Cancelled)));
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_memory_pressure_aborts() {
        let probe = FixedMemoryProbe(MemoryUsage {
            used_bytes: 90,
            limit_bytes: 100,
        });
        let source = MemorySource::new("a.txt", numbered_lines(10));
        let err = IndexBuilder::new(Mode::Stream)
            .memory_probe(&probe)
            .build(&source)
            .await
            .unwrap_err();

        match err {
            SearchError::OutOfMemory {
                percent,
                threshold,
                mode,
            } => {
                assert_eq!(percent, 90);
                assert_eq!(threshold, 85);
                assert_eq!(mode, Mode::Stream);
            }
            other => panic!("expected OutOfMemory, got {:?}", other),
        }
    }

    /// Counts samples; reports pressure from sample `high_from` on
    struct CountingProbe {
        samples: AtomicUsize,
        high_from: usize,
    }

    impl CountingProbe {
        fn new(high_from: usize) -> Self {
            Self {
                samples: AtomicUsize::new(0),
                high_from,
            }
        }

        fn samples(&self) -> usize {
            self.samples.load(Ordering::Relaxed)
        }
    }

    impl MemoryProbe for CountingProbe {
        fn sample(&self) -> Option<MemoryUsage> {
            let n = self.samples.fetch_add(1, Ordering::Relaxed);
            let used_bytes = if n >= self.high_from { 95 } else { 10 };
            Some(MemoryUsage {
                used_bytes,
                limit_bytes: 100,
            })
        }
    }

    /// 25 chunks of two 4-byte lines each
    fn twenty_five_chunks() -> MemorySource {
        MemorySource::new("a.txt", "abc\n".repeat(50))
    }

    #[tokio::test]
    async fn test_memory_sampled_every_ten_chunks() {
        let probe = CountingProbe::new(usize::MAX);
        let index = IndexBuilder::new(Mode::Fast)
            .chunk_size(8)
            .memory_probe(&probe)
            .build(&twenty_five_chunks())
            .await
            .unwrap();
        assert_eq!(index.chunk_count(), 25);
        // chunks 0, 10 and 20
        assert_eq!(probe.samples(), 3);

        let probe = CountingProbe::new(usize::MAX);
        IndexBuilder::new(Mode::Fast)
            .chunk_size(8)
            .memory_probe(&probe)
            .memory_check_interval(5)
            .build(&twenty_five_chunks())
            .await
            .unwrap();
        assert_eq!(probe.samples(), 5);
    }

    #[tokio::test]
    async fn test_memory_pressure_mid_build_discards_index() {
        let probe = CountingProbe::new(1);
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let chunks_in_cb = chunks.clone();

        let result = IndexBuilder::new(Mode::Fast)
            .chunk_size(8)
            .memory_probe(&probe)
            .on_progress(move |p| chunks_in_cb.lock().unwrap().push(p.chunk_index))
            .build(&twenty_five_chunks())
            .await;

        assert!(matches!(result, Err(SearchError::OutOfMemory { percent: 95, .. })));
        assert_eq!(probe.samples(), 2);
        // Stopped at the second check, after chunk 10
        assert_eq!(chunks.lock().unwrap().last(), Some(&10));
    }

    /// Raises the cancel flag while serving its second read
    struct CancelOnSecondRead {
        inner: MemorySource,
        cancel: CancelFlag,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl FileSource for CancelOnSecondRead {
        fn size(&self) -> u64 {
            self.inner.size()
        }

        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
            if self.reads.fetch_add(1, Ordering::Relaxed) == 1 {
                self.cancel.cancel();
            }
            self.inner.read_range(start, end).await
        }
    }

    #[tokio::test]
    async fn test_cancel_during_read_discards_index() {
        let cancel = CancelFlag::new();
        let source = CancelOnSecondRead {
            inner: twenty_five_chunks(),
            cancel: cancel.clone(),
            reads: AtomicUsize::new(0),
        };

        let result = IndexBuilder::new(Mode::Fast)
            .chunk_size(8)
            .cancel_flag(cancel)
            .build(&source)
            .await;

        assert!(matches!(result, Err(SearchError::Cancelled)));
        assert_eq!(source.reads.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_memory_below_threshold_passes() {
        let probe = FixedMemoryProbe(MemoryUsage {
            used_bytes: 85,
            limit_bytes: 100,
        });
        let source = MemorySource::new("a.txt", numbered_lines(10));
        let index = IndexBuilder::new(Mode::Fast)
            .chunk_size(8)
            .memory_probe(&probe)
            .build(&source)
            .await
            .unwrap();
        assert_eq!(index.total_lines(), 10);
    }

    #[tokio::test]
    async fn test_progress_reaches_full_size() {
        let last = Arc::new(Mutex::new(None));
        let last_in_cb = last.clone();
        let source = MemorySource::new("a.txt", numbered_lines(20));
        let size = source.size();

        IndexBuilder::new(Mode::Fast)
            .chunk_size(50)
            .on_progress(move |p| *last_in_cb.lock().unwrap() = Some(*p))
            .build(&source)
            .await
            .unwrap();

        let last = last.lock().unwrap().unwrap();
        assert_eq!(last.processed_bytes, size);
        assert_eq!(last.percent(), 100);
        assert_eq!(last.chunk_index + 1, last.total_chunks);
    }
}
