//! Edit records, compound edits and the undo/redo stacks
//!
//! Records describe what happened; replaying them goes through an
//! [`EditTarget`] so the store, marks and lines stay in step.

use crate::error::Result;
use crate::marks::{MarkHandle, MarkSnapshot};
use std::collections::VecDeque;

/// Where undo and redo send their inverse operations
pub trait EditTarget {
    /// Reinsert `text` and put the listed marks back on their old offsets
    fn insert(&mut self, offset: usize, text: &str, marks: &[(MarkHandle, usize)]) -> Result<()>;

    /// Remove text, returning the marks it collapsed
    fn remove(&mut self, offset: usize, len: usize) -> Result<MarkSnapshot>;
}

/// One reversible mutation
#[derive(Clone, Debug)]
pub enum EditRecord {
    Insert {
        offset: usize,
        text: String,
        /// Marks inside the text when it was last undone
        marks: MarkSnapshot,
    },
    Remove {
        offset: usize,
        text: String,
        /// Marks collapsed by the removal
        marks: MarkSnapshot,
    },
    Compound(CompoundEdit),
}

impl EditRecord {
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        EditRecord::Insert {
            offset,
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn remove(offset: usize, text: impl Into<String>, marks: MarkSnapshot) -> Self {
        EditRecord::Remove {
            offset,
            text: text.into(),
            marks,
        }
    }

    pub fn undo(&mut self, target: &mut dyn EditTarget) -> Result<()> {
        match self {
            EditRecord::Insert {
                offset,
                text,
                marks,
            } => {
                *marks = target.remove(*offset, text.len())?;
                Ok(())
            }
            EditRecord::Remove {
                offset,
                text,
                marks,
            } => target.insert(*offset, text, marks),
            EditRecord::Compound(compound) => compound.undo(target),
        }
    }

    pub fn redo(&mut self, target: &mut dyn EditTarget) -> Result<()> {
        match self {
            EditRecord::Insert {
                offset,
                text,
                marks,
            } => target.insert(*offset, text, marks),
            EditRecord::Remove {
                offset,
                text,
                marks,
            } => {
                *marks = target.remove(*offset, text.len())?;
                Ok(())
            }
            EditRecord::Compound(compound) => compound.redo(target),
        }
    }
}

/// Edits of one atomic section, undone and redone as a unit
#[derive(Clone, Debug, Default)]
pub struct CompoundEdit {
    edits: Vec<EditRecord>,
}

impl CompoundEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EditRecord) {
        self.edits.push(record);
    }

    pub fn edits(&self) -> &[EditRecord] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Leaf records, nested compounds flattened
    pub fn leaf_count(&self) -> usize {
        self.edits
            .iter()
            .map(|e| match e {
                EditRecord::Compound(c) => c.leaf_count(),
                _ => 1,
            })
            .sum()
    }

    /// Undo children last to first
    pub fn undo(&mut self, target: &mut dyn EditTarget) -> Result<()> {
        for edit in self.edits.iter_mut().rev() {
            edit.undo(target)?;
        }
        Ok(())
    }

    /// Redo children first to last
    pub fn redo(&mut self, target: &mut dyn EditTarget) -> Result<()> {
        for edit in self.edits.iter_mut() {
            edit.redo(target)?;
        }
        Ok(())
    }
}

impl From<Vec<EditRecord>> for CompoundEdit {
    fn from(edits: Vec<EditRecord>) -> Self {
        Self { edits }
    }
}

/// Bounded undo/redo stacks
pub struct History<T> {
    undo: VecDeque<T>,
    redo: Vec<T>,
    max_size: usize,
}

impl<T> History<T> {
    pub fn new() -> Self {
        Self::with_max_size(100)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_size,
        }
    }

    /// Record a new item; invalidates redo
    pub fn checkpoint(&mut self, item: T) {
        self.redo.clear();
        self.push_undo(item);
    }

    fn push_undo(&mut self, item: T) {
        self.undo.push_back(item);
        while self.undo.len() > self.max_size {
            self.undo.pop_front();
        }
    }

    pub fn take_undo(&mut self) -> Option<T> {
        self.undo.pop_back()
    }

    pub fn take_redo(&mut self) -> Option<T> {
        self.redo.pop()
    }

    /// Park an item that was just undone
    pub fn push_undone(&mut self, item: T) {
        self.redo.push(item);
    }

    /// Park an item that was just redone
    pub fn push_redone(&mut self, item: T) {
        self.push_undo(item);
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn peek_undo(&self) -> Option<&T> {
        self.undo.back()
    }

    pub fn peek_redo(&self) -> Option<&T> {
        self.redo.last()
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new()
    }
}
