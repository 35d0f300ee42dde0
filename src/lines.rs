//! Line start index kept in step with the content store

use bytecount::count as bytecount_count;
use memchr::memchr_iter;

/// Byte offsets where each line starts; `starts[0] == 0` always
#[derive(Clone, Debug)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl Default for LineIndex {
    fn default() -> Self {
        Self { starts: vec![0] }
    }
}

impl LineIndex {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut starts = Vec::with_capacity(bytecount_count(bytes, b'\n') + 1);
        starts.push(0);
        starts.extend(memchr_iter(b'\n', bytes).map(|i| i + 1));
        Self { starts }
    }

    /// Always at least one, even for an empty document
    #[inline]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    #[inline]
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.starts.get(line).copied()
    }

    /// Offset of the line's terminator, or `doc_len` for the last line
    pub fn line_end(&self, line: usize, doc_len: usize) -> Option<usize> {
        if line + 1 < self.starts.len() {
            Some(self.starts[line + 1] - 1)
        } else if line < self.starts.len() {
            Some(doc_len)
        } else {
            None
        }
    }

    /// Line containing `offset` (O(log n))
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset) - 1
    }

    /// Record `text` inserted at `offset`; returns lines added
    pub fn on_insert(&mut self, offset: usize, text: &[u8]) -> usize {
        let line = self.line_of(offset);
        for start in &mut self.starts[line + 1..] {
            *start += text.len();
        }
        let added: Vec<usize> = memchr_iter(b'\n', text).map(|i| offset + i + 1).collect();
        let count = added.len();
        if count > 0 {
            self.starts.splice(line + 1..line + 1, added);
        }
        count
    }

    /// Record `removed` deleted from `offset`; returns lines removed
    pub fn on_remove(&mut self, offset: usize, removed: &[u8]) -> usize {
        let line = self.line_of(offset);
        let count = bytecount_count(removed, b'\n');
        self.starts.drain(line + 1..line + 1 + count);
        for start in &mut self.starts[line + 1..] {
            *start -= removed.len();
        }
        count
    }
}
