//! Page storage: content split into fixed-size character chunks.

/// Content split into pages of at most `max_page_size` characters.
///
/// Every page but the last is exactly full, so `L` characters always make
/// `ceil(L / max_page_size)` pages and the pages concatenate back to the
/// content. Appending only re-splits the trailing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBuffer {
    max_page_size: usize,
    pages: Vec<String>,
}

impl PageBuffer {
    /// Create an empty buffer. A page size of zero is treated as one.
    pub fn new(max_page_size: usize) -> Self {
        Self {
            max_page_size: max_page_size.max(1),
            pages: Vec::new(),
        }
    }

    /// Create a buffer holding `text`.
    pub fn from_text(text: &str, max_page_size: usize) -> Self {
        let mut buffer = Self::new(max_page_size);
        buffer.push_str(text);
        buffer
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Append raw text.
    pub fn push_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut tail = self.pages.pop().unwrap_or_default();
        let mut used = tail.chars().count();
        for c in text.chars() {
            if used == self.max_page_size {
                self.pages.push(std::mem::take(&mut tail));
                used = 0;
            }
            tail.push(c);
            used += 1;
        }
        self.pages.push(tail);
    }

    /// Append `line` followed by a newline.
    pub fn add_line(&mut self, line: &str) {
        self.push_str(line);
        self.push_str("\n");
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&str> {
        self.pages.get(index).map(String::as_str)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Total characters held.
    pub fn char_count(&self) -> usize {
        match self.pages.split_last() {
            Some((last, full)) => full.len() * self.max_page_size + last.chars().count(),
            None => 0,
        }
    }

    /// The whole content, reassembled.
    pub fn content(&self) -> String {
        self.pages.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_pages() {
        let buffer = PageBuffer::from_text("", 10);
        assert!(buffer.is_empty());
        assert_eq!(buffer.char_count(), 0);
    }

    #[test]
    fn exact_multiple() {
        let buffer = PageBuffer::from_text(&"a".repeat(30), 10);
        assert_eq!(buffer.page_count(), 3);
        assert!(buffer.pages().iter().all(|p| p.len() == 10));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let buffer = PageBuffer::from_text("ééééé", 2);
        assert_eq!(buffer.pages(), &["éé", "éé", "é"]);
    }

    #[test]
    fn appending_fills_the_trailing_page_first() {
        let mut buffer = PageBuffer::from_text("abc", 4);
        buffer.add_line("de");
        assert_eq!(buffer.pages(), &["abcd", "e\n"]);
        assert_eq!(buffer.content(), "abcde\n");
        assert_eq!(buffer.char_count(), 6);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let buffer = PageBuffer::from_text("ab", 0);
        assert_eq!(buffer.max_page_size(), 1);
        assert_eq!(buffer.page_count(), 2);
    }
}
