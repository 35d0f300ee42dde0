//! Mark-pair block chains
//!
//! A chain is an ordered list of non-overlapping `[start, end)` blocks, each
//! held by two marks so the blocks follow edits on their own. Text inserted at
//! either boundary lands outside the block. Chains back guarded regions and
//! draw-layer activation ranges.

use crate::document::{Document, EditGuard};
use crate::error::{DocError, Result};
use crate::marks::{Bias, MarkHandle};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::ops::Range;

#[derive(Clone, Copy, Debug)]
struct Block {
    start: MarkHandle,
    end: MarkHandle,
}

#[derive(Debug, Default)]
pub struct MarkBlockChain {
    blocks: Vec<Block>,
}

impl MarkBlockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn range_of(doc: &Document, block: &Block) -> Result<Range<usize>> {
        Ok(doc.mark_offset(block.start)?..doc.mark_offset(block.end)?)
    }

    /// Current block ranges in order. Blocks emptied by removals are dropped
    /// and their marks released.
    pub fn ranges(&mut self, doc: &Document) -> Result<Vec<Range<usize>>> {
        let mut out = Vec::with_capacity(self.blocks.len());
        let mut failed = None;
        self.blocks.retain(|block| {
            if failed.is_some() {
                return true;
            }
            let step = Self::range_of(doc, block).and_then(|range| {
                if range.is_empty() {
                    Self::release_block(doc, *block).map(|()| false)
                } else {
                    out.push(range);
                    Ok(true)
                }
            });
            step.unwrap_or_else(|e| {
                failed = Some(e);
                true
            })
        });
        match failed {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }

    fn release_block(doc: &Document, block: Block) -> Result<()> {
        doc.remove_mark(block.start)?;
        doc.remove_mark(block.end)
    }

    fn rebuild(&mut self, doc: &Document, ranges: Vec<Range<usize>>) -> Result<()> {
        for block in self.blocks.drain(..) {
            Self::release_block(doc, block)?;
        }
        for range in ranges {
            let start = doc.create_mark(range.start, Bias::Forward)?;
            let end = doc.create_mark(range.end, Bias::Backward)?;
            self.blocks.push(Block { start, end });
        }
        Ok(())
    }

    /// Add a block, merging with any block it overlaps or touches
    pub fn add(&mut self, doc: &Document, range: Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > doc.len() {
            return Err(DocError::out_of_range(range.start, range.end.saturating_sub(range.start), doc.len()));
        }
        if range.is_empty() {
            return Ok(());
        }
        let mut merged = Vec::with_capacity(self.blocks.len() + 1);
        let mut pending = range;
        for existing in self.ranges(doc)? {
            if existing.end < pending.start {
                merged.push(existing);
            } else if pending.end < existing.start {
                merged.push(std::mem::replace(&mut pending, existing));
            } else {
                pending = pending.start.min(existing.start)..pending.end.max(existing.end);
            }
        }
        merged.push(pending);
        self.rebuild(doc, merged)
    }

    /// Cut `range` out of every block, splitting blocks where needed
    pub fn remove(&mut self, doc: &Document, range: Range<usize>) -> Result<()> {
        let mut kept = Vec::with_capacity(self.blocks.len() + 1);
        for existing in self.ranges(doc)? {
            if existing.end <= range.start || existing.start >= range.end {
                kept.push(existing);
                continue;
            }
            if existing.start < range.start {
                kept.push(existing.start..range.start);
            }
            if existing.end > range.end {
                kept.push(range.end..existing.end);
            }
        }
        self.rebuild(doc, kept)
    }

    /// Block containing `offset`, if any
    pub fn block_at(&mut self, doc: &Document, offset: usize) -> Result<Option<Range<usize>>> {
        Ok(self
            .ranges(doc)?
            .into_iter()
            .find(|r| r.start <= offset && offset < r.end))
    }

    /// First block overlapping `range`
    pub fn first_overlap(&mut self, doc: &Document, range: Range<usize>) -> Result<Option<Range<usize>>> {
        Ok(self
            .ranges(doc)?
            .into_iter()
            .find(|r| r.start < range.end && range.start < r.end))
    }

    /// Drop every block and release its marks
    pub fn clear(&mut self, doc: &Document) -> Result<()> {
        self.rebuild(doc, Vec::new())
    }
}

/// Rejects edits that reach inside a protected block
#[derive(Debug, Default)]
pub struct GuardedBlocks {
    chain: Mutex<MarkBlockChain>,
}

impl GuardedBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protect(&self, doc: &Document, range: Range<usize>) -> Result<()> {
        let _write = doc.write_lock()?;
        self.chain.lock().add(doc, range)
    }

    pub fn unprotect(&self, doc: &Document, range: Range<usize>) -> Result<()> {
        let _write = doc.write_lock()?;
        self.chain.lock().remove(doc, range)
    }

    pub fn ranges(&self, doc: &Document) -> Result<Vec<Range<usize>>> {
        let _read = doc.read_lock()?;
        self.chain.lock().ranges(doc)
    }

    pub fn release(&self, doc: &Document) -> Result<()> {
        let _write = doc.write_lock()?;
        self.chain.lock().clear(doc)
    }
}

impl EditGuard for GuardedBlocks {
    fn check_insert(&self, doc: &Document, offset: usize, _text: &str) -> Result<()> {
        let mut chain = self.chain.lock();
        for range in chain.ranges(doc)? {
            if range.start < offset && offset < range.end {
                return Err(DocError::GuardedRegion { offset });
            }
        }
        Ok(())
    }

    fn check_remove(&self, doc: &Document, offset: usize, len: usize) -> Result<()> {
        let mut chain = self.chain.lock();
        match chain.first_overlap(doc, offset..offset + len)? {
            Some(hit) => Err(DocError::GuardedRegion {
                offset: offset.max(hit.start),
            }),
            None => Ok(()),
        }
    }
}

/// Offset ranges where named draw layers are active
#[derive(Debug, Default)]
pub struct LayerActivations {
    layers: AHashMap<String, MarkBlockChain>,
}

impl LayerActivations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, doc: &Document, layer: &str, range: Range<usize>) -> Result<()> {
        self.layers
            .entry(layer.to_string())
            .or_default()
            .add(doc, range)
    }

    pub fn deactivate(&mut self, doc: &Document, layer: &str, range: Range<usize>) -> Result<()> {
        match self.layers.get_mut(layer) {
            Some(chain) => chain.remove(doc, range),
            None => Ok(()),
        }
    }

    pub fn ranges(&mut self, doc: &Document, layer: &str) -> Result<Vec<Range<usize>>> {
        match self.layers.get_mut(layer) {
            Some(chain) => chain.ranges(doc),
            None => Ok(Vec::new()),
        }
    }

    /// Layers active at `offset`, sorted by name
    pub fn active_at(&mut self, doc: &Document, offset: usize) -> Result<Vec<&str>> {
        let mut active = Vec::new();
        for (name, chain) in &mut self.layers {
            if chain.block_at(doc, offset)?.is_some() {
                active.push(name.as_str());
            }
        }
        active.sort_unstable();
        Ok(active)
    }

    /// Next offset after `offset` where some layer starts or stops
    pub fn next_boundary(&mut self, doc: &Document, offset: usize) -> Result<Option<usize>> {
        let mut next: Option<usize> = None;
        for chain in self.layers.values_mut() {
            for range in chain.ranges(doc)? {
                for edge in [range.start, range.end] {
                    if edge > offset {
                        next = Some(next.map_or(edge, |n| n.min(edge)));
                    }
                }
            }
        }
        Ok(next)
    }

    /// Release every layer's marks
    pub fn release(&mut self, doc: &Document) -> Result<()> {
        for chain in self.layers.values_mut() {
            chain.clear(doc)?;
        }
        self.layers.clear();
        Ok(())
    }
}
