//! Case-insensitive substring matching.
//!
//! Both the term and the line are lowercased before comparison. Lowercasing
//! can change the byte length of a character, so match offsets found in
//! the folded line are mapped back to byte offsets of the original line.

use memchr::memmem::Finder;
use std::ops::Range;

pub struct Matcher {
    folded_term: String,
    finder: Finder<'static>,
}

impl Matcher {
    /// `term` must be non-empty; callers trim and validate it first
    pub fn new(term: &str) -> Self {
        let folded_term = fold_case(term);
        let finder = Finder::new(folded_term.as_bytes()).into_owned();
        Self {
            folded_term,
            finder,
        }
    }

    pub fn folded_term(&self) -> &str {
        &self.folded_term
    }

    pub fn is_match(&self, line: &str) -> bool {
        if line.is_ascii() {
            let lowered = line.to_ascii_lowercase();
            return self.finder.find(lowered.as_bytes()).is_some();
        }
        self.finder.find(fold_case(line).as_bytes()).is_some()
    }

    /// Byte ranges of every non-overlapping match in `line`, left to right
    pub fn find_all(&self, line: &str) -> Vec<Range<usize>> {
        if self.folded_term.is_empty() || line.is_empty() {
            return Vec::new();
        }

        if line.is_ascii() {
            let lowered = line.to_ascii_lowercase();
            let len = self.folded_term.len();
            return self
                .finder
                .find_iter(lowered.as_bytes())
                .map(|start| start..start + len)
                .collect();
        }

        let folded = FoldedLine::new(line);
        let len = self.folded_term.len();
        self.finder
            .find_iter(folded.text.as_bytes())
            .map(|start| folded.original_range(start, start + len))
            .collect()
    }

    /// Start offsets of every match
    pub fn positions(&self, line: &str) -> Vec<usize> {
        self.find_all(line).into_iter().map(|r| r.start).collect()
    }
}

/// Per-character lowercasing, so the term and the line fold the same way
/// (`str::to_lowercase` treats a word-final sigma differently)
fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Lowercased line with a byte map back to the original
struct FoldedLine {
    text: String,
    /// For each folded byte, the start of the original char it came from
    orig_start: Vec<usize>,
    /// For each folded byte, the end of the original char it came from
    orig_end: Vec<usize>,
}

impl FoldedLine {
    fn new(line: &str) -> Self {
        let mut text = String::with_capacity(line.len());
        let mut orig_start = Vec::with_capacity(line.len());
        let mut orig_end = Vec::with_capacity(line.len());

        for (idx, ch) in line.char_indices() {
            let end = idx + ch.len_utf8();
            for lower in ch.to_lowercase() {
                text.push(lower);
                for _ in 0..lower.len_utf8() {
                    orig_start.push(idx);
                    orig_end.push(end);
                }
            }
        }

        Self {
            text,
            orig_start,
            orig_end,
        }
    }

    fn original_range(&self, start: usize, end: usize) -> Range<usize> {
        self.orig_start[start]..self.orig_end[end - 1]
    }
}
