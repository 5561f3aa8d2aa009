use crate::error::{Result, SearchError};
use crate::index::chunk::{line_ranges, read_chunk, strip_cr};
use crate::index::types::LineIndex;
use crate::query::matcher::Matcher;
use crate::source::FileSource;
use crate::utils::CancelFlag;
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Results kept before the search stops early
pub const DEFAULT_MAX_RESULTS: usize = 1000;

/// Yield to the scheduler each time this many results have accumulated
pub const DEFAULT_YIELD_EVERY: usize = 100;

/// Decoded chunks kept alive during one search
pub const DEFAULT_CHUNK_CACHE_CAPACITY: usize = 4;

/// One matching line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub line_number: u64,
    pub content: String,
    pub search_term: String,
    /// Byte offsets of each match start in `content`, ascending
    pub positions: Vec<usize>,
    pub chunk_index: u32,
    pub line_index_in_chunk: u32,
}

impl SearchResult {
    /// Byte ranges of the matches in `content`
    pub fn match_ranges(&self) -> Vec<Range<usize>> {
        Matcher::new(&self.search_term).find_all(&self.content)
    }

    pub fn match_count(&self) -> usize {
        self.positions.len()
    }
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Complete,
    /// Stopped at the result cap with lines left unexamined
    Truncated,
    /// Cancel flag observed; results hold what was found so far
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub status: SearchStatus,
    pub lines_scanned: u64,
    pub chunks_read: u64,
    pub elapsed: Duration,
}

impl SearchOutcome {
    pub fn is_truncated(&self) -> bool {
        self.status == SearchStatus::Truncated
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == SearchStatus::Cancelled
    }
}

/// Decoded chunk text plus the byte ranges of its fragments
struct CachedChunk {
    text: String,
    lines: Vec<Range<usize>>,
}

impl CachedChunk {
    fn new(text: String) -> Self {
        let lines = line_ranges(&text);
        Self { text, lines }
    }

    fn line(&self, index: u32) -> Option<&str> {
        let range = self.lines.get(index as usize)?;
        self.text.get(range.clone())
    }
}

/// Re-derives each indexed line from the file and tests it against a term.
///
/// Chunks are re-read on demand through a cache that lives only as long as
/// one [`Searcher::search`] call, so nothing read from the file outlives
/// the search.
pub struct Searcher {
    max_results: usize,
    yield_every: usize,
    cache_capacity: NonZeroUsize,
    cancel: CancelFlag,
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Searcher {
    pub fn new() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            yield_every: DEFAULT_YIELD_EVERY,
            cache_capacity: NonZeroUsize::new(DEFAULT_CHUNK_CACHE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            cancel: CancelFlag::new(),
        }
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max.max(1);
        self
    }

    pub fn yield_every(mut self, results: usize) -> Self {
        self.yield_every = results.max(1);
        self
    }

    pub fn cache_capacity(mut self, chunks: usize) -> Self {
        self.cache_capacity = NonZeroUsize::new(chunks).unwrap_or(NonZeroUsize::MIN);
        self
    }

    pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Find every indexed line containing `term`, ignoring case.
    ///
    /// Results come back in ascending line order.
    pub async fn search<S: FileSource + ?Sized>(
        &self,
        source: &S,
        index: &LineIndex,
        term: &str,
    ) -> Result<SearchOutcome> {
        let term = term.trim();
        if term.is_empty() {
            return Err(SearchError::EmptySearchTerm);
        }

        let geometry = index.geometry();
        if geometry.file_size != source.size() {
            warn!(
                indexed = geometry.file_size,
                current = source.size(),
                "file size changed since indexing"
            );
        }

        let started = Instant::now();
        let matcher = Matcher::new(term);
        let mut cache: LruCache<u32, CachedChunk> = LruCache::new(self.cache_capacity);
        let mut results: Vec<SearchResult> = Vec::new();
        let mut status = SearchStatus::Complete;
        let mut lines_scanned: u64 = 0;
        let mut chunks_read: u64 = 0;

        debug!(term, lines = index.total_lines(), "searching");

        let entries = index.entries();
        for (pos, entry) in entries.iter().enumerate() {
            if !cache.contains(&entry.chunk_index) {
                if self.cancel.is_cancelled() {
                    status = SearchStatus::Cancelled;
                    break;
                }
                let text = read_chunk(source, geometry, entry.chunk_index as u64).await?;
                cache.put(entry.chunk_index, CachedChunk::new(text));
                chunks_read += 1;
            }

            lines_scanned += 1;
            let Some(line) = cache
                .get(&entry.chunk_index)
                .and_then(|chunk| chunk.line(entry.line_index_in_chunk))
            else {
                continue;
            };

            let content = strip_cr(line);
            let ranges = matcher.find_all(content);
            if ranges.is_empty() {
                continue;
            }

            results.push(SearchResult {
                line_number: entry.line_number,
                content: content.to_owned(),
                search_term: term.to_owned(),
                positions: ranges.into_iter().map(|r| r.start).collect(),
                chunk_index: entry.chunk_index,
                line_index_in_chunk: entry.line_index_in_chunk,
            });

            if results.len() >= self.max_results {
                if pos + 1 < entries.len() {
                    status = SearchStatus::Truncated;
                }
                break;
            }

            if results.len() % self.yield_every == 0 {
                tokio::task::yield_now().await;
                if self.cancel.is_cancelled() {
                    status = SearchStatus::Cancelled;
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        info!(
            term,
            matches = results.len(),
            lines_scanned,
            chunks_read,
            status = ?status,
            elapsed_ms = elapsed.as_millis() as u64,
            "search finished"
        );

        Ok(SearchOutcome {
            results,
            status,
            lines_scanned,
            chunks_read,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexBuilder, Mode};
    use crate::source::MemorySource;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn indexed(content: &str, chunk_size: u64) -> (MemorySource, LineIndex) {
        let source = MemorySource::new("test.txt", content);
        let index = IndexBuilder::new(Mode::Fast)
            .chunk_size(chunk_size)
            .build(&source)
            .await
            .unwrap();
        (source, index)
    }

    #[tokio::test]
    async fn test_apple_scenario() {
        let (source, index) = indexed("apple\nApple pie\nBanana\napple tart\n", 1024).await;
        let outcome = Searcher::new().search(&source, &index, "apple").await.unwrap();

        assert_eq!(outcome.status, SearchStatus::Complete);
        let found: Vec<(u64, Vec<usize>)> = outcome
            .results
            .iter()
            .map(|r| (r.line_number, r.positions.clone()))
            .collect();
        assert_eq!(found, vec![(1, vec![0]), (2, vec![0]), (4, vec![0])]);
        assert_eq!(outcome.results[1].content, "Apple pie");
        assert_eq!(outcome.results[2].search_term, "apple");
    }

    #[tokio::test]
    async fn test_multiple_positions_per_line() {
        let (source, index) = indexed("foo bar FOO baz foo\nnothing\n", 1024).await;
        let outcome = Searcher::new().search(&source, &index, "foo").await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].positions, vec![0, 8, 16]);
        assert_eq!(outcome.results[0].match_ranges(), vec![0..3, 8..11, 16..19]);
    }

    #[tokio::test]
    async fn test_results_follow_chunk_coordinates() {
        let content = "alpha\nbeta\ngamma\ndelta\nepsilon\nzeta\n";
        let (source, index) = indexed(content, 12).await;
        let outcome = Searcher::new().search(&source, &index, "ta").await.unwrap();

        let lines: Vec<&str> = outcome.results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(lines, vec!["beta", "delta", "zeta"]);
        assert!(outcome.chunks_read >= 2);
    }

    #[tokio::test]
    async fn test_empty_term_rejected() {
        let (source, index) = indexed("a\n", 1024).await;
        let err = Searcher::new().search(&source, &index, "   ").await.unwrap_err();
        assert!(matches!(err, SearchError::EmptySearchTerm));
    }

    #[tokio::test]
    async fn test_term_is_trimmed() {
        let (source, index) = indexed("needle\n", 1024).await;
        let outcome = Searcher::new().search(&source, &index, "  needle ").await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].search_term, "needle");
    }

    #[tokio::test]
    async fn test_crlf_not_in_content() {
        let (source, index) = indexed("one\r\ntwo\r\n", 1024).await;
        let outcome = Searcher::new().search(&source, &index, "two").await.unwrap();
        assert_eq!(outcome.results[0].content, "two");
    }

    #[tokio::test]
    async fn test_cap_truncates() {
        let content = "hit\n".repeat(1500);
        let (source, index) = indexed(&content, 256).await;
        let outcome = Searcher::new().search(&source, &index, "HIT").await.unwrap();

        assert_eq!(outcome.results.len(), 1000);
        assert!(outcome.is_truncated());
        assert_eq!(outcome.results.last().unwrap().line_number, 1000);
    }

    #[tokio::test]
    async fn test_exactly_cap_matches_is_complete() {
        let content = "hit\n".repeat(5);
        let (source, index) = indexed(&content, 1024).await;
        let outcome = Searcher::new()
            .max_results(5)
            .search(&source, &index, "hit")
            .await
            .unwrap();
        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.status, SearchStatus::Complete);
    }

    #[tokio::test]
    async fn test_cancel_before_search_returns_nothing() {
        let content = "hit\n".repeat(50);
        let (source, index) = indexed(&content, 64).await;
        let cancel = CancelFlag::new();
        cancel.cancel();

        let outcome = Searcher::new()
            .cancel_flag(cancel)
            .search(&source, &index, "hit")
            .await
            .unwrap();
        assert!(outcome.is_cancelled());
        assert!(outcome.results.is_empty());
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
    async fn test_cancel_mid_search_keeps_partial_results() {
        // 7-byte lines, ten per 70-byte chunk, five chunks
        let content: String = (0..50).map(|i| format!("hit {:02}\n", i)).collect();
        let (inner, index) = indexed(&content, 70).await;
        assert_eq!(index.chunk_count(), 5);

        let cancel = CancelFlag::new();
        let source = CancelOnSecondRead {
            inner,
            cancel: cancel.clone(),
            reads: AtomicUsize::new(0),
        };
        let outcome = Searcher::new()
            .cancel_flag(cancel)
            .search(&source, &index, "hit")
            .await
            .unwrap();

        // The in-flight second read completes, the third chunk is never loaded
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.chunks_read, 2);
        assert_eq!(outcome.results.len(), 20);
        assert_eq!(outcome.results.last().unwrap().line_number, 20);
    }

    #[tokio::test]
    async fn test_yields_every_hundred_results() {
        let content = "hit\n".repeat(250);
        let (source, index) = indexed(&content, 1024 * 1024).await;
        assert_eq!(index.chunk_count(), 1);

        // Runs only once the search yields to the scheduler
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        tokio::spawn(async move { trigger.cancel() });

        let outcome = Searcher::new()
            .cancel_flag(cancel)
            .search(&source, &index, "hit")
            .await
            .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.results.len(), DEFAULT_YIELD_EVERY);
    }

    #[tokio::test]
    async fn test_small_cache_still_reads_each_chunk_once() {
        let content: String = (0..200).map(|i| format!("row {:03}\n", i)).collect();
        let (source, index) = indexed(&content, 32).await;
        let outcome = Searcher::new()
            .cache_capacity(1)
            .search(&source, &index, "row")
            .await
            .unwrap();
        assert_eq!(outcome.chunks_read, index.chunk_count());
        assert_eq!(outcome.results.len(), index.entries().len());
    }

    #[tokio::test]
    async fn test_search_uses_index_geometry() {
        let (source, index) = indexed("aaa\nbbb\nccc\n", 4).await;
        let outcome = Searcher::new().search(&source, &index, "ccc").await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].line_number, 3);
        assert_eq!(outcome.results[0].chunk_index, 2);
    }
}
