//! Terminal progress for index builds; a no-op when the `progress` feature is disabled

use crate::index::IndexProgress;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

/// Byte-based progress bar fed from [`IndexProgress`] events
pub struct IndexProgressBar {
    #[cfg(feature = "progress")]
    bar: Option<ProgressBar>,
}

impl IndexProgressBar {
    /// `visible = false` gives a silent bar (for `--quiet` and JSON output)
    #[cfg(feature = "progress")]
    pub fn new(total_bytes: u64, visible: bool) -> Self {
        if !visible {
            return Self { bar: None };
        }

        let bar = ProgressBar::new(total_bytes);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░  "));
        }
        bar.set_message("Создание индекса файла...");
        Self { bar: Some(bar) }
    }

    #[cfg(not(feature = "progress"))]
    pub fn new(_total_bytes: u64, _visible: bool) -> Self {
        Self {}
    }

    #[cfg(feature = "progress")]
    pub fn update(&self, progress: &IndexProgress) {
        if let Some(bar) = &self.bar {
            bar.set_position(progress.processed_bytes);
            bar.set_message(format!("{} строк", progress.lines_indexed));
        }
    }

    #[cfg(not(feature = "progress"))]
    pub fn update(&self, _progress: &IndexProgress) {}

    pub fn finish(&self) {
        #[cfg(feature = "progress")]
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
