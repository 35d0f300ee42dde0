//! Gap buffer content store
//!
//! Storage is `[text before gap | gap | text after gap]`. Edits at the gap are
//! O(1) amortized; edits elsewhere first slide the gap, which costs the distance
//! moved. Only logical offsets leave this module.

use crate::error::{DocError, Result};
use crate::finder::{Direction, Finder};
use simdutf8::basic::from_utf8;
use std::ops::Range;

/// Growth factor applied to the whole buffer when the gap runs out
const GAP_GROWTH_FACTOR: usize = 2;

pub struct GapBuffer {
    data: Vec<u8>,
    gap_start: usize,
    gap_end: usize,
}

/// Reversible description of one content mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentEdit {
    Insert { offset: usize, len: usize },
    Remove { offset: usize, text: String },
}

impl ContentEdit {
    /// Apply the inverse to `buf`, returning the edit that reapplies this one
    pub fn revert(&self, buf: &mut GapBuffer) -> Result<Option<ContentEdit>> {
        match self {
            ContentEdit::Insert { offset, len } => buf.remove(*offset, *len),
            ContentEdit::Remove { offset, text } => buf.insert(*offset, text),
        }
    }
}

impl GapBuffer {
    pub fn new(initial_gap: usize) -> Self {
        Self {
            data: vec![0; initial_gap],
            gap_start: 0,
            gap_end: initial_gap,
        }
    }

    pub fn from_str(text: &str, initial_gap: usize) -> Self {
        let mut data = Vec::with_capacity(text.len() + initial_gap);
        data.extend_from_slice(text.as_bytes());
        data.resize(text.len() + initial_gap, 0);
        Self {
            gap_start: text.len(),
            gap_end: data.len(),
            data,
        }
    }

    /// Logical length in bytes (storage minus gap)
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() - self.gap_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn gap_len(&self) -> usize {
        self.gap_end - self.gap_start
    }

    /// Byte at a logical offset
    #[inline]
    fn byte_at(&self, offset: usize) -> u8 {
        if offset < self.gap_start {
            self.data[offset]
        } else {
            self.data[offset + self.gap_len()]
        }
    }

    pub fn is_char_boundary(&self, offset: usize) -> bool {
        if offset == 0 || offset == self.len() {
            return true;
        }
        offset < self.len() && (self.byte_at(offset) & 0b1100_0000) != 0b1000_0000
    }

    /// Validate `[offset, offset + len)` against the current length and char boundaries
    pub fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| DocError::out_of_range(offset, len, self.len()))?;
        if !self.is_char_boundary(offset) {
            return Err(DocError::NotCharBoundary { offset });
        }
        if !self.is_char_boundary(end) {
            return Err(DocError::NotCharBoundary { offset: end });
        }
        Ok(())
    }

    fn move_gap_to(&mut self, pos: usize) {
        if pos < self.gap_start {
            let shift = self.gap_start - pos;
            self.data
                .copy_within(pos..self.gap_start, self.gap_end - shift);
            self.gap_start = pos;
            self.gap_end -= shift;
        } else if pos > self.gap_start {
            let shift = pos - self.gap_start;
            self.data
                .copy_within(self.gap_end..self.gap_end + shift, self.gap_start);
            self.gap_start += shift;
            self.gap_end += shift;
        }
    }

    /// Grow the gap in place; the gap position is preserved
    fn ensure_gap(&mut self, min_size: usize) {
        if self.gap_len() >= min_size {
            return;
        }
        let needed = min_size - self.gap_len();
        let growth = needed.max(self.data.len() * GAP_GROWTH_FACTOR);
        let old_len = self.data.len();
        let tail = old_len - self.gap_end;
        self.data.resize(old_len + growth, 0);
        let dst = self.data.len() - tail;
        if tail > 0 {
            self.data.copy_within(self.gap_end..old_len, dst);
        }
        self.gap_end = dst;
    }

    /// Two contiguous slices covering a logical range, split at the gap
    pub fn slices(&self, range: Range<usize>) -> (&[u8], &[u8]) {
        let Range { start, end } = range;
        let first = if start < self.gap_start {
            &self.data[start..end.min(self.gap_start)]
        } else {
            &[][..]
        };
        let second = if end > self.gap_start {
            let from = start.max(self.gap_start) + self.gap_len();
            &self.data[from..end + self.gap_len()]
        } else {
            &[][..]
        };
        (first, second)
    }

    pub fn read(&self, offset: usize, len: usize) -> Result<String> {
        self.check_range(offset, len)?;
        let (a, b) = self.slices(offset..offset + len);
        let mut out = String::with_capacity(len);
        out.push_str(from_utf8(a).map_err(|_| DocError::InvalidUtf8)?);
        out.push_str(from_utf8(b).map_err(|_| DocError::InvalidUtf8)?);
        Ok(out)
    }

    pub fn text(&self) -> String {
        // content is only ever written from &str at char boundaries
        self.read(0, self.len()).unwrap_or_default()
    }

    pub fn insert(&mut self, offset: usize, text: &str) -> Result<Option<ContentEdit>> {
        self.check_range(offset, 0)?;
        if text.is_empty() {
            return Ok(None);
        }
        self.move_gap_to(offset);
        self.ensure_gap(text.len());
        self.data[self.gap_start..self.gap_start + text.len()].copy_from_slice(text.as_bytes());
        self.gap_start += text.len();
        Ok(Some(ContentEdit::Insert {
            offset,
            len: text.len(),
        }))
    }

    pub fn remove(&mut self, offset: usize, len: usize) -> Result<Option<ContentEdit>> {
        self.check_range(offset, len)?;
        if len == 0 {
            return Ok(None);
        }
        let text = self.read(offset, len)?;
        self.move_gap_to(offset);
        self.gap_end += len;
        Ok(Some(ContentEdit::Remove { offset, text }))
    }

    /// Feed `finder` the range between `start` and `limit`.
    ///
    /// `start < limit` scans `[start, limit)` forward; `start > limit` scans
    /// `[limit, start)` backward and needs a backward finder. Equal bounds
    /// never match.
    pub fn find(&self, finder: &mut dyn Finder, start: usize, limit: usize) -> Result<Option<usize>> {
        if start == limit {
            return Ok(None);
        }
        let wanted = if start < limit {
            Direction::Forward
        } else {
            Direction::Backward
        };
        if finder.direction() != wanted {
            return Err(DocError::FinderDirection { range: wanted });
        }
        finder.reset();
        if wanted == Direction::Forward {
            let (a, b) = self.slices(start..limit);
            if !a.is_empty() {
                if let Some(pos) = finder.scan(start, a) {
                    return Ok(Some(pos));
                }
            }
            if !b.is_empty() {
                return Ok(finder.scan(start + a.len(), b));
            }
            Ok(None)
        } else {
            let (a, b) = self.slices(limit..start);
            if !b.is_empty() {
                if let Some(pos) = finder.scan(limit + a.len(), b) {
                    return Ok(Some(pos));
                }
            }
            if !a.is_empty() {
                return Ok(finder.scan(limit, a));
            }
            Ok(None)
        }
    }
}

impl std::fmt::Debug for GapBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GapBuffer")
            .field("len", &self.len())
            .field("gap", &(self.gap_start..self.gap_end))
            .finish()
    }
}
