//! Diagnostics: event report, storage self-test controller, storage health
//! formatting and the memory test engine.

#![allow(missing_docs)]

pub mod health;
pub mod memory;
pub mod report;

use std::fmt;

/// Bounded text sink shared by the diagnostic producers.
///
/// Writes past `capacity` bytes are cut at a character boundary and the
/// buffer remembers that it was truncated; formatting never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    capacity: usize,
    truncated: bool,
}

impl TextBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::new(),
            capacity,
            truncated: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.truncated = false;
    }

    /// Drop everything after byte `len`, used to rewrite a trailing progress line.
    pub fn truncate(&mut self, len: usize) {
        if len < self.text.len() && self.text.is_char_boundary(len) {
            self.text.truncate(len);
            self.truncated = false;
        }
    }

    pub fn push_str(&mut self, s: &str) {
        let room = self.capacity.saturating_sub(self.text.len());
        if s.len() <= room {
            self.text.push_str(s);
            return;
        }
        let mut cut = room;
        while cut > 0 && !s.is_char_boundary(cut) {
            cut -= 1;
        }
        self.text.push_str(&s[..cut]);
        self.truncated = true;
    }
}

impl fmt::Write for TextBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::TextBuffer;
    use std::fmt::Write;

    #[test]
    fn writes_past_capacity_are_truncated() {
        let mut buf = TextBuffer::new(8);
        write!(buf, "Completion: '{}%'", 42).unwrap();
        assert_eq!(buf.as_str(), "Completi");
        assert!(buf.is_truncated());
        buf.push_str("more");
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut buf = TextBuffer::new(4);
        buf.push_str("ab\u{e9}\u{e9}");
        assert_eq!(buf.as_str(), "ab\u{e9}");
    }

    #[test]
    fn truncate_rewinds_to_cursor() {
        let mut buf = TextBuffer::new(64);
        buf.push_str("header\n");
        let cursor = buf.len();
        buf.push_str(" 10% completed\n");
        buf.truncate(cursor);
        buf.push_str(" 20% completed\n");
        assert_eq!(buf.as_str(), "header\n 20% completed\n");
    }
}
