//! Mark registry - positions that survive edits
//!
//! Marks live in a slab; a separate key vector keeps them in non-decreasing
//! offset order so every edit binary-searches its first affected mark and only
//! touches marks at or after it.

use crate::error::{DocError, Result};
use slab::Slab;
use smallvec::SmallVec;
use std::ops::Range;

/// What a mark does when text is inserted exactly at its offset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bias {
    /// Move forward past the inserted text
    Forward,
    /// Stay put; the inserted text lands after the mark
    Backward,
}

/// Handle to a live mark. Stale handles are detected by generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MarkHandle {
    key: usize,
    generation: u64,
}

/// Offsets of marks captured before a removal collapsed them
pub type MarkSnapshot = Vec<(MarkHandle, usize)>;

#[derive(Debug)]
struct MarkSlot {
    offset: usize,
    bias: Bias,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct MarkRegistry {
    slots: Slab<MarkSlot>,
    /// Slab keys sorted by offset
    order: Vec<usize>,
    next_generation: u64,
}

impl MarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// First index in `order` whose offset is not less than `offset`
    #[inline]
    fn lower_bound(&self, offset: usize) -> usize {
        self.order
            .partition_point(|&k| self.slots[k].offset < offset)
    }

    /// First index in `order` whose offset is greater than `offset`
    #[inline]
    fn upper_bound(&self, offset: usize) -> usize {
        self.order
            .partition_point(|&k| self.slots[k].offset <= offset)
    }

    fn slot(&self, handle: MarkHandle) -> Result<&MarkSlot> {
        self.slots
            .get(handle.key)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(DocError::InvalidMark)
    }

    pub fn create(&mut self, offset: usize, bias: Bias, doc_len: usize) -> Result<MarkHandle> {
        if offset > doc_len {
            return Err(DocError::out_of_range(offset, 0, doc_len));
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        let key = self.slots.insert(MarkSlot {
            offset,
            bias,
            generation,
        });
        let at = self.upper_bound(offset);
        self.order.insert(at, key);
        Ok(MarkHandle { key, generation })
    }

    pub fn offset_of(&self, handle: MarkHandle) -> Result<usize> {
        self.slot(handle).map(|slot| slot.offset)
    }

    pub fn bias_of(&self, handle: MarkHandle) -> Result<Bias> {
        self.slot(handle).map(|slot| slot.bias)
    }

    pub fn is_valid(&self, handle: MarkHandle) -> bool {
        self.slot(handle).is_ok()
    }

    /// Position of `handle` inside `order`
    fn order_index(&self, handle: MarkHandle, offset: usize) -> usize {
        let lo = self.lower_bound(offset);
        let hi = self.upper_bound(offset);
        lo + self.order[lo..hi]
            .iter()
            .position(|&k| k == handle.key)
            .unwrap_or(hi - lo)
    }

    /// Remove a mark. A second remove of the same handle is `InvalidMark`.
    pub fn remove(&mut self, handle: MarkHandle) -> Result<()> {
        let offset = self.offset_of(handle)?;
        let idx = self.order_index(handle, offset);
        debug_assert!(idx < self.order.len());
        self.order.remove(idx);
        self.slots.remove(handle.key);
        Ok(())
    }

    /// Move a mark to a new offset, keeping its bias
    pub fn set_offset(&mut self, handle: MarkHandle, offset: usize, doc_len: usize) -> Result<()> {
        let old = self.offset_of(handle)?;
        if offset > doc_len {
            return Err(DocError::out_of_range(offset, 0, doc_len));
        }
        let idx = self.order_index(handle, old);
        self.order.remove(idx);
        self.slots[handle.key].offset = offset;
        let at = self.upper_bound(offset);
        self.order.insert(at, handle.key);
        Ok(())
    }

    /// Live marks with offsets in `range`, in offset order
    pub fn marks_in(&self, range: Range<usize>) -> Vec<(MarkHandle, usize)> {
        let lo = self.lower_bound(range.start);
        let hi = self.lower_bound(range.end);
        self.order[lo..hi.max(lo)]
            .iter()
            .map(|&k| {
                let slot = &self.slots[k];
                (
                    MarkHandle {
                        key: k,
                        generation: slot.generation,
                    },
                    slot.offset,
                )
            })
            .collect()
    }

    /// Shift marks for `len` bytes inserted at `offset`
    pub fn on_insert(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let first = self.lower_bound(offset);
        let eq_end = self.upper_bound(offset);

        // Marks sharing the insert offset split by bias: backward ones stay,
        // forward ones jump past the new text. Keep the stayers first.
        if eq_end > first {
            let mut stay: SmallVec<[usize; 8]> = SmallVec::new();
            let mut moved: SmallVec<[usize; 8]> = SmallVec::new();
            for &k in &self.order[first..eq_end] {
                match self.slots[k].bias {
                    Bias::Backward => stay.push(k),
                    Bias::Forward => moved.push(k),
                }
            }
            for &k in &moved {
                self.slots[k].offset += len;
            }
            let group = &mut self.order[first..eq_end];
            group[..stay.len()].copy_from_slice(&stay);
            group[stay.len()..].copy_from_slice(&moved);
        }

        for i in eq_end..self.order.len() {
            let k = self.order[i];
            self.slots[k].offset += len;
        }
        debug_assert!(self.is_ordered(), "marks out of order after insert");
    }

    /// Shift marks for `[offset, offset + len)` removed.
    ///
    /// Returns the original offsets of every mark in `[offset, offset + len]`
    /// so an undo can put them back exactly.
    pub fn on_remove(&mut self, offset: usize, len: usize) -> MarkSnapshot {
        if len == 0 {
            return Vec::new();
        }
        let first = self.lower_bound(offset);
        let inside_end = self.upper_bound(offset + len);
        let mut snapshot = Vec::with_capacity(inside_end - first);
        for i in first..inside_end {
            let k = self.order[i];
            let slot = &mut self.slots[k];
            snapshot.push((
                MarkHandle {
                    key: k,
                    generation: slot.generation,
                },
                slot.offset,
            ));
            slot.offset = offset;
        }
        for i in inside_end..self.order.len() {
            let k = self.order[i];
            self.slots[k].offset -= len;
        }
        debug_assert!(self.is_ordered(), "marks out of order after remove");
        snapshot
    }

    /// Put marks captured by [`on_remove`](Self::on_remove) back after the removed
    /// text was reinserted over `span`. Marks removed since, or moved out of
    /// `span` by their owner, are skipped.
    pub fn restore(&mut self, span: Range<usize>, snapshot: &[(MarkHandle, usize)]) {
        if snapshot.is_empty() {
            return;
        }
        let lo = self.lower_bound(span.start);
        let hi = self.upper_bound(span.end);
        for &(handle, offset) in snapshot {
            debug_assert!(span.start <= offset && offset <= span.end);
            if let Some(slot) = self.slots.get_mut(handle.key).filter(|s| {
                s.generation == handle.generation && span.start <= s.offset && s.offset <= span.end
            }) {
                slot.offset = offset;
            }
        }
        let slots = &self.slots;
        self.order[lo..hi].sort_by_key(|&k| slots[k].offset);
        debug_assert!(self.is_ordered(), "marks out of order after restore");
    }

    fn is_ordered(&self) -> bool {
        self.order
            .windows(2)
            .all(|w| self.slots[w[0]].offset <= self.slots[w[1]].offset)
    }
}
