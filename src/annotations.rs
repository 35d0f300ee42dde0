//! Line annotations and bookmarks, both anchored on marks
//!
//! The annotation index groups annotations by line and keeps one of each group
//! active for display. Groups are renumbered from the line counts carried by
//! document events; only the groups on the edited lines are re-derived from
//! their marks.

use crate::document::{Document, DocumentEvent, DocumentListener, EventKind};
use crate::error::{DocError, Result};
use crate::marks::{Bias, MarkHandle};
use ahash::AHashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(u64);

struct Entry<T> {
    mark: MarkHandle,
    payload: T,
}

#[derive(Debug)]
struct LineGroup {
    line: usize,
    ids: SmallVec<[AnnotationId; 2]>,
    active: usize,
}

impl LineGroup {
    fn active_id(&self) -> AnnotationId {
        self.ids[self.active]
    }
}

pub struct AnnotationIndex<T> {
    entries: AHashMap<AnnotationId, Entry<T>>,
    /// Sorted by line, never empty
    groups: Vec<LineGroup>,
    next_id: u64,
}

impl<T> Default for AnnotationIndex<T> {
    fn default() -> Self {
        Self {
            entries: AHashMap::new(),
            groups: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> AnnotationIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn group_index(&self, line: usize) -> Result<usize, usize> {
        self.groups.binary_search_by_key(&line, |g| g.line)
    }

    /// Put `id` into the group for `line`; the newcomer becomes active
    fn attach(&mut self, id: AnnotationId, line: usize) {
        match self.group_index(line) {
            Ok(i) => {
                let group = &mut self.groups[i];
                group.ids.push(id);
                group.active = group.ids.len() - 1;
            }
            Err(i) => self.groups.insert(
                i,
                LineGroup {
                    line,
                    ids: SmallVec::from_elem(id, 1),
                    active: 0,
                },
            ),
        }
    }

    /// Like `attach` but leaves an existing group's active entry alone
    fn attach_quiet(&mut self, id: AnnotationId, line: usize) {
        match self.group_index(line) {
            Ok(i) => self.groups[i].ids.push(id),
            Err(_) => self.attach(id, line),
        }
    }

    /// Annotate the line holding `offset`
    pub fn add(&mut self, doc: &Document, offset: usize, payload: T) -> Result<AnnotationId> {
        let line = doc.line_of(offset)?;
        // forward bias: a newline typed at the line start carries the mark along
        let mark = doc.create_mark(offset, Bias::Forward)?;
        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, Entry { mark, payload });
        self.attach(id, line);
        Ok(id)
    }

    pub fn remove(&mut self, doc: &Document, id: AnnotationId) -> Result<T> {
        let entry = self.entries.remove(&id).ok_or(DocError::InvalidMark)?;
        if let Some(gi) = self.groups.iter().position(|g| g.ids.contains(&id)) {
            let group = &mut self.groups[gi];
            let at = group.ids.iter().position(|x| *x == id).unwrap_or(0);
            group.ids.remove(at);
            if group.ids.is_empty() {
                self.groups.remove(gi);
            } else if group.active > at || group.active >= group.ids.len() {
                group.active -= 1;
            }
        }
        doc.remove_mark(entry.mark)?;
        Ok(entry.payload)
    }

    pub fn get(&self, id: AnnotationId) -> Option<&T> {
        self.entries.get(&id).map(|e| &e.payload)
    }

    pub fn offset(&self, doc: &Document, id: AnnotationId) -> Result<usize> {
        let entry = self.entries.get(&id).ok_or(DocError::InvalidMark)?;
        doc.mark_offset(entry.mark)
    }

    pub fn line_of(&self, id: AnnotationId) -> Option<usize> {
        self.groups
            .iter()
            .find(|g| g.ids.contains(&id))
            .map(|g| g.line)
    }

    /// Active annotation for a line
    pub fn active_for_line(&self, line: usize) -> Option<(AnnotationId, &T)> {
        let group = &self.groups[self.group_index(line).ok()?];
        let id = group.active_id();
        self.entries.get(&id).map(|e| (id, &e.payload))
    }

    /// All annotations on a line, in the order they were attached
    pub fn annotations_on_line(&self, line: usize) -> &[AnnotationId] {
        match self.group_index(line) {
            Ok(i) => &self.groups[i].ids[..],
            Err(_) => &[],
        }
    }

    /// First annotated line at or after `line`
    pub fn next_annotated_line(&self, line: usize) -> Option<usize> {
        let i = self.groups.partition_point(|g| g.line < line);
        self.groups.get(i).map(|g| g.line)
    }

    /// Make the next annotation on the line active
    pub fn cycle_active(&mut self, line: usize) -> Option<AnnotationId> {
        let i = self.group_index(line).ok()?;
        let group = &mut self.groups[i];
        group.active = (group.active + 1) % group.ids.len();
        Some(group.active_id())
    }

    pub fn set_active(&mut self, id: AnnotationId) -> bool {
        for group in &mut self.groups {
            if let Some(at) = group.ids.iter().position(|x| *x == id) {
                group.active = at;
                return true;
            }
        }
        false
    }

    /// Renumber groups after an insert or remove
    pub fn apply_event(&mut self, doc: &Document, event: &DocumentEvent) -> Result<()> {
        let (old_span, added) = match event.kind {
            EventKind::Insert if event.lines_added > 0 => (0, event.lines_added),
            EventKind::Remove if event.lines_removed > 0 => (event.lines_removed, 0),
            _ => return Ok(()),
        };
        let first = event.first_line;
        let lo = self.groups.partition_point(|g| g.line < first);
        let hi = self.groups.partition_point(|g| g.line <= first + old_span);
        let touched: Vec<LineGroup> = self.groups.drain(lo..hi).collect();

        for group in &mut self.groups[lo..] {
            group.line = group.line + added - old_span;
        }

        // Window lines were emptied above, so every group rebuilt here is new.
        // The first touched group to land on a line decides its active entry.
        let mut claimed: SmallVec<[usize; 4]> = SmallVec::new();
        for group in touched {
            let active = group.active_id();
            for id in group.ids {
                let Some(entry) = self.entries.get(&id) else {
                    continue;
                };
                let line = doc.line_of(doc.mark_offset(entry.mark)?)?;
                self.attach_quiet(id, line);
            }
            if let Some(line) = self.line_of(active) {
                if !claimed.contains(&line) {
                    claimed.push(line);
                    self.set_active(active);
                }
            }
        }
        Ok(())
    }

    /// Release every annotation's mark
    pub fn clear(&mut self, doc: &Document) -> Result<()> {
        for (_, entry) in self.entries.drain() {
            doc.remove_mark(entry.mark)?;
        }
        self.groups.clear();
        Ok(())
    }
}

/// Annotation index that follows a document as a listener
pub struct SharedAnnotations<T> {
    inner: Mutex<AnnotationIndex<T>>,
}

impl<T> Default for SharedAnnotations<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(AnnotationIndex::new()),
        }
    }
}

impl<T> SharedAnnotations<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the index with the document read-locked.
    /// `f` must not edit the document; edits notify this index and would deadlock.
    pub fn with<R>(&self, doc: &Document, f: impl FnOnce(&mut AnnotationIndex<T>) -> R) -> Result<R> {
        let _read = doc.read_lock()?;
        Ok(f(&mut self.inner.lock()))
    }
}

impl<T: Send> DocumentListener for SharedAnnotations<T> {
    fn inserted(&self, doc: &Document, event: &DocumentEvent) {
        if let Err(e) = self.inner.lock().apply_event(doc, event) {
            tracing::warn!(error = %e, "annotation renumbering failed");
        }
    }

    fn removed(&self, doc: &Document, event: &DocumentEvent) {
        if let Err(e) = self.inner.lock().apply_event(doc, event) {
            tracing::warn!(error = %e, "annotation renumbering failed");
        }
    }
}

/// Line bookmarks
#[derive(Debug, Default)]
pub struct Bookmarks {
    marks: Vec<MarkHandle>,
}

impl Bookmarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bookmarked lines, ascending, each once
    pub fn lines(&self, doc: &Document) -> Result<Vec<usize>> {
        let mut lines = Vec::with_capacity(self.marks.len());
        for mark in &self.marks {
            lines.push(doc.line_of(doc.mark_offset(*mark)?)?);
        }
        lines.sort_unstable();
        lines.dedup();
        Ok(lines)
    }

    /// Add a bookmark on `line`, or remove every bookmark there.
    /// Returns whether the line is bookmarked afterwards.
    pub fn toggle(&mut self, doc: &Document, line: usize) -> Result<bool> {
        let start = doc
            .line_start(line)
            .ok_or_else(|| DocError::out_of_range(line, 0, doc.line_count()))?;
        let mut removed = false;
        let mut kept = Vec::with_capacity(self.marks.len());
        for mark in self.marks.drain(..) {
            if doc.line_of(doc.mark_offset(mark)?)? == line {
                doc.remove_mark(mark)?;
                removed = true;
            } else {
                kept.push(mark);
            }
        }
        self.marks = kept;
        if removed {
            return Ok(false);
        }
        // forward bias keeps the mark with the line's text when a newline is
        // typed at its start
        self.marks.push(doc.create_mark(start, Bias::Forward)?);
        Ok(true)
    }

    /// Next bookmarked line after `line`, wrapping around
    pub fn next(&self, doc: &Document, line: usize) -> Result<Option<usize>> {
        let lines = self.lines(doc)?;
        Ok(lines.iter().copied().find(|l| *l > line).or(lines.first().copied()))
    }

    /// Previous bookmarked line before `line`, wrapping around
    pub fn previous(&self, doc: &Document, line: usize) -> Result<Option<usize>> {
        let lines = self.lines(doc)?;
        Ok(lines
            .iter()
            .rev()
            .copied()
            .find(|l| *l < line)
            .or(lines.last().copied()))
    }

    pub fn clear(&mut self, doc: &Document) -> Result<()> {
        for mark in self.marks.drain(..) {
            doc.remove_mark(mark)?;
        }
        Ok(())
    }
}
