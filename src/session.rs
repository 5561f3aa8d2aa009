//! The single active file session.
//!
//! A [`Session`] owns the loaded file, its line index, the selected mode
//! and the last search. Loading a new file tears the previous one down;
//! [`Session::clear`] does the same without loading anything.
//!
//! A failed build (`OutOfMemory`, `Cancelled`, `Io`) drops only the index.
//! The file stays, so `set_mode` followed by `reindex` retries it.

use crate::error::{Result, SearchError};
use crate::index::mode::check_file_size;
use crate::index::{IndexBuilder, IndexProgress, LineIndex, Mode};
use crate::query::{SearchOutcome, SearchResult, Searcher};
use crate::source::FileSource;
use crate::utils::{AppConfig, CancelFlag, MemoryProbe, NoMemoryProbe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Tunables the session passes to the indexer and searcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Used instead of the size-based recommendation when set
    pub default_mode: Option<Mode>,
    pub max_results: usize,
    pub yield_every: usize,
    pub chunk_cache_capacity: usize,
    pub memory_check_interval: u64,
    pub memory_threshold_percent: u8,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_mode: config.default_mode,
            max_results: config.max_results,
            yield_every: config.yield_every,
            chunk_cache_capacity: config.chunk_cache_capacity,
            memory_check_interval: config.memory_check_interval,
            memory_threshold_percent: config.memory_threshold_percent,
        }
    }
}

/// Whether an index build or search is running. Clones share state, so a
/// progress callback or another task can observe it mid-operation.
#[derive(Debug, Clone, Default)]
pub struct ProcessingState(Arc<AtomicBool>);

impl ProcessingState {
    pub fn is_processing(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self, running: bool) {
        self.0.store(running, Ordering::Relaxed);
    }
}

pub struct Session<S: FileSource> {
    file: Option<S>,
    index: Option<LineIndex>,
    mode: Mode,
    cancel: CancelFlag,
    processing: ProcessingState,
    settings: SessionSettings,
    memory: Box<dyn MemoryProbe>,
    last_search: Option<SearchOutcome>,
}

impl<S: FileSource> Default for Session<S> {
    fn default() -> Self {
        Self::new(SessionSettings::default(), Box::new(NoMemoryProbe))
    }
}

impl<S: FileSource> Session<S> {
    pub fn new(settings: SessionSettings, memory: Box<dyn MemoryProbe>) -> Self {
        Self {
            file: None,
            index: None,
            mode: settings.default_mode.unwrap_or_default(),
            cancel: CancelFlag::new(),
            processing: ProcessingState::default(),
            settings,
            memory,
            last_search: None,
        }
    }

    /// Handle for requesting cancellation from outside the running task
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle for observing [`Session::is_processing`] while a build or
    /// search holds the session
    pub fn processing_handle(&self) -> ProcessingState {
        self.processing.clone()
    }

    /// Replace the current file with `file` and index it.
    ///
    /// The mode is the configured default or, failing that, the
    /// recommendation for the file's size. A file over the size ceiling is
    /// rejected and the session left empty; a failed build keeps the file
    /// so it can be re-indexed in another mode.
    pub async fn load(&mut self, file: S) -> Result<&LineIndex> {
        self.load_with_progress(file, |_| {}).await
    }

    pub async fn load_with_progress(
        &mut self,
        file: S,
        on_progress: impl FnMut(&IndexProgress) + Send,
    ) -> Result<&LineIndex> {
        self.clear();
        self.cancel.reset();

        check_file_size(file.size())?;
        let recommended = Mode::recommended(file.size())?;
        self.mode = self.settings.default_mode.unwrap_or(recommended);

        if file.size() > Mode::Fast.max_file_size() {
            warn!(
                file = file.name(),
                size = file.size(),
                "large file, indexing may take a while"
            );
        }

        self.file = Some(file);
        self.build_index(on_progress).await
    }

    /// Re-index the loaded file with the currently selected mode
    pub async fn reindex(&mut self) -> Result<&LineIndex> {
        self.reindex_with_progress(|_| {}).await
    }

    pub async fn reindex_with_progress(
        &mut self,
        on_progress: impl FnMut(&IndexProgress) + Send,
    ) -> Result<&LineIndex> {
        if self.file.is_none() {
            return Err(SearchError::NoFileLoaded);
        }
        self.index = None;
        self.last_search = None;
        self.cancel.reset();
        self.build_index(on_progress).await
    }

    async fn build_index(
        &mut self,
        on_progress: impl FnMut(&IndexProgress) + Send,
    ) -> Result<&LineIndex> {
        let Some(file) = self.file.as_ref() else {
            return Err(SearchError::NoFileLoaded);
        };

        self.processing.set(true);
        let built = IndexBuilder::new(self.mode)
            .cancel_flag(self.cancel.clone())
            .memory_probe(self.memory.as_ref())
            .memory_check_interval(self.settings.memory_check_interval)
            .memory_threshold(self.settings.memory_threshold_percent)
            .on_progress(on_progress)
            .build(file)
            .await;
        self.processing.set(false);

        match built {
            Ok(index) => Ok(self.index.insert(index)),
            Err(e) => {
                info!(
                    error = %e,
                    mode = %self.mode,
                    "index build failed, file kept for reindex"
                );
                self.index = None;
                Err(e)
            }
        }
    }

    /// Select the chunk-size policy for the next index build.
    ///
    /// This does not re-index: the current index keeps the geometry it
    /// was built with until [`Session::reindex`] or a new load.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            debug!(from = %self.mode, to = %mode, "mode changed, existing index kept");
        }
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Size-based recommendation for the loaded file
    pub fn recommended_mode(&self) -> Option<Mode> {
        let file = self.file.as_ref()?;
        Mode::recommended(file.size()).ok()
    }

    /// Search the loaded file; the outcome replaces the previous one.
    ///
    /// `EmptySearchTerm` and `NoFileLoaded` leave the session untouched.
    /// A loaded file with no lines yields an empty `Complete` outcome.
    pub async fn search(&mut self, term: &str) -> Result<&SearchOutcome> {
        if term.trim().is_empty() {
            return Err(SearchError::EmptySearchTerm);
        }
        let (Some(file), Some(index)) = (self.file.as_ref(), self.index.as_ref()) else {
            return Err(SearchError::NoFileLoaded);
        };

        self.cancel.reset();
        self.processing.set(true);
        let outcome = Searcher::new()
            .max_results(self.settings.max_results)
            .yield_every(self.settings.yield_every)
            .cache_capacity(self.settings.chunk_cache_capacity)
            .cancel_flag(self.cancel.clone())
            .search(file, index, term)
            .await;
        self.processing.set(false);

        Ok(self.last_search.insert(outcome?))
    }

    /// Results of the last search, empty after [`Session::clear_results`]
    pub fn results(&self) -> &[SearchResult] {
        self.last_search
            .as_ref()
            .map(|o| o.results.as_slice())
            .unwrap_or(&[])
    }

    pub fn last_search(&self) -> Option<&SearchOutcome> {
        self.last_search.as_ref()
    }

    pub fn clear_results(&mut self) {
        self.last_search = None;
    }

    /// Release the file, the index and the last results
    pub fn clear(&mut self) {
        self.file = None;
        self.index = None;
        self.last_search = None;
        self.processing.set(false);
    }

    pub fn file(&self) -> Option<&S> {
        self.file.as_ref()
    }

    pub fn index(&self) -> Option<&LineIndex> {
        self.index.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.file.is_some() && self.index.is_some()
    }

    /// True while an index build or search is running
    pub fn is_processing(&self) -> bool {
        self.processing.is_processing()
    }
}
