//! Paged view over a long text blob with anchor navigation.
//!
//! Lines wrap at `chars_per_line` characters and pages hold `lines_per_page`
//! lines. Anchor matching runs over the source text, so a marker split by a
//! wrap or a page boundary is still found; it is counted on the page where
//! the match starts.

#![allow(missing_docs)]

use std::ops::Range;

use memchr::memmem;

use crate::core::errors::{Result, RuiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Page {
    /// Byte range of the page in the source text.
    span: Range<usize>,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPager {
    lines_per_page: usize,
    chars_per_line: usize,
    source: String,
    pages: Vec<Page>,
    anchors: Vec<String>,
    /// Per page: how many distinct anchors start a match on it.
    anchor_counts: Vec<usize>,
    current: usize,
}

impl LogPager {
    pub fn new(lines_per_page: usize, chars_per_line: usize) -> Self {
        Self {
            lines_per_page: lines_per_page.max(1),
            chars_per_line: chars_per_line.max(1),
            source: String::new(),
            pages: Vec::new(),
            anchors: Vec::new(),
            anchor_counts: Vec::new(),
            current: 0,
        }
    }

    /// Split `text` into pages. The current page is kept, clamped to the new
    /// page count. Text that yields no page is an error and leaves the pager
    /// unchanged.
    pub fn load(&mut self, text: &str) -> Result<usize> {
        let lines = wrap_lines(text, self.chars_per_line);
        if lines.is_empty() {
            return Err(RuiError::LogEmpty {
                details: format!("{} bytes of input", text.len()),
            });
        }

        self.pages = lines
            .chunks(self.lines_per_page)
            .map(|chunk| Page {
                span: chunk[0].span.start..chunk[chunk.len() - 1].span.end,
                text: chunk
                    .iter()
                    .map(|line| &text[line.span.clone()])
                    .collect::<Vec<_>>()
                    .join("\n"),
            })
            .collect();
        text.clone_into(&mut self.source);
        self.current = self.current.min(self.pages.len() - 1);
        self.recount_anchors();
        Ok(self.pages.len())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Content of page `n`, clamped to the last page.
    pub fn page(&self, n: usize) -> &str {
        let last = self.pages.len().saturating_sub(1);
        self.pages.get(n.min(last)).map_or("", |p| p.text.as_str())
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn current_text(&self) -> &str {
        self.page(self.current)
    }

    pub fn set_page(&mut self, n: usize) {
        self.current = n.min(self.pages.len().saturating_sub(1));
    }

    pub fn is_first_page(&self) -> bool {
        self.current == 0
    }

    pub fn is_last_page(&self) -> bool {
        self.current + 1 >= self.pages.len()
    }

    /// Move one page; returns whether the page changed.
    pub fn step(&mut self, dir: Direction) -> bool {
        match dir {
            Direction::Backward if !self.is_first_page() => self.current -= 1,
            Direction::Forward if !self.is_last_page() => self.current += 1,
            _ => return false,
        }
        true
    }

    /// Replace the anchor set and rescan. Returns the total count.
    pub fn set_anchors<S: AsRef<str>>(&mut self, anchors: &[S]) -> usize {
        self.anchors = anchors
            .iter()
            .map(|a| a.as_ref().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        self.recount_anchors();
        self.anchor_total()
    }

    pub fn anchor_count(&self, page: usize) -> usize {
        self.anchor_counts.get(page).copied().unwrap_or(0)
    }

    pub fn anchor_counts(&self) -> &[usize] {
        &self.anchor_counts
    }

    pub fn anchor_total(&self) -> usize {
        self.anchor_counts.iter().sum()
    }

    /// Jump to the nearest page in `dir` that has an anchor. Returns the new
    /// page, or `None` (and stays put) when there is none.
    pub fn jump_anchor(&mut self, dir: Direction) -> Option<usize> {
        let found = match dir {
            Direction::Forward => (self.current + 1..self.pages.len())
                .find(|&p| self.anchor_count(p) > 0),
            Direction::Backward => (0..self.current)
                .rev()
                .find(|&p| self.anchor_count(p) > 0),
        }?;
        self.current = found;
        Some(found)
    }

    fn recount_anchors(&mut self) {
        self.anchor_counts.clear();
        if self.anchors.is_empty() || self.pages.is_empty() {
            return;
        }
        self.anchor_counts.resize(self.pages.len(), 0);
        let haystack = self.source.as_bytes();
        for anchor in &self.anchors {
            let mut last_page = None;
            for pos in memmem::find_iter(haystack, anchor.as_bytes()) {
                let page = self.pages.partition_point(|p| p.span.end <= pos);
                if page < self.pages.len() && last_page != Some(page) {
                    self.anchor_counts[page] += 1;
                    last_page = Some(page);
                }
            }
        }
    }
}

// ──────────────────── line wrapping ────────────────────

#[derive(Debug)]
struct Line {
    /// Byte range of the line content, excluding any newline.
    span: Range<usize>,
}

/// A line ends at a newline (which is consumed) or once it holds
/// `chars_per_line` characters; the next character then starts a new line.
fn wrap_lines(text: &str, chars_per_line: usize) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = 0;
    let mut open = false;
    for (i, ch) in text.char_indices() {
        if ch == '\n' {
            lines.push(Line { span: start..i });
            start = i + 1;
            chars = 0;
            open = false;
            continue;
        }
        if chars == chars_per_line {
            lines.push(Line { span: start..i });
            start = i;
            chars = 0;
        }
        chars += 1;
        open = true;
    }
    if open {
        lines.push(Line {
            span: start..text.len(),
        });
    }
    lines
}
