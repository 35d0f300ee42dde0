//! Document facade
//!
//! Sequences the content store, mark registry, line index and undo log under
//! the document lock, and tells listeners about every committed change.
//!
//! Lock order is always document lock, then the internal state lock, and the
//! state lock is never held while calling out to listeners or guards.

use crate::config::DocConfig;
use crate::error::{DocError, Result};
use crate::finder::Finder;
use crate::gap::{ContentEdit, GapBuffer};
use crate::history::{CompoundEdit, EditRecord, EditTarget, History};
use crate::lines::LineIndex;
use crate::lock::{discipline, DocLock, TxState};
use crate::marks::{Bias, MarkHandle, MarkRegistry, MarkSnapshot};
use arc_swap::ArcSwap;
use crossbeam::queue::SegQueue;
use memchr::memchr;
use parking_lot::RwLock;
use simdutf8::basic::from_utf8;
use std::borrow::Cow;
use std::io::Read;
use std::ops::{ControlFlow, Range};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

// === Events ===

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Insert,
    Remove,
    /// Content unchanged; collaborators asked for the range to be re-examined
    Change,
}

/// Why a mutation happened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOrigin {
    Edit,
    Undo,
    Redo,
    /// Broken atomic section being unwound
    Rollback,
    Load,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentEvent {
    pub kind: EventKind,
    pub offset: usize,
    pub len: usize,
    /// Line holding `offset`
    pub first_line: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub origin: EditOrigin,
    /// Start of `first_line`. Tokenizer resume points before it stay valid.
    pub damage_start: usize,
}

impl DocumentEvent {
    /// Whether a cached tokenizer resume offset is invalidated by this event
    pub fn invalidates(&self, resume_offset: usize) -> bool {
        resume_offset > self.damage_start
    }
}

/// Change observer. All methods run on the writing thread with the write lock
/// held, so the document may be read but other threads are excluded.
pub trait DocumentListener: Send + Sync {
    fn inserted(&self, _doc: &Document, _event: &DocumentEvent) {}
    fn removed(&self, _doc: &Document, _event: &DocumentEvent) {}
    fn changed(&self, _doc: &Document, _event: &DocumentEvent) {}
    /// One per plain edit, or one per outermost atomic section
    fn undoable_edit(&self, _doc: &Document, _edit: &CompoundEdit) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Pre-edit veto hook for protected regions. Runs before anything is mutated.
pub trait EditGuard: Send + Sync {
    fn check_insert(&self, doc: &Document, offset: usize, text: &str) -> Result<()>;
    fn check_remove(&self, doc: &Document, offset: usize, len: usize) -> Result<()>;
}

type ListenerList = Vec<(ListenerId, Arc<dyn DocumentListener>)>;

// === State ===

struct DocState {
    content: GapBuffer,
    marks: MarkRegistry,
    lines: LineIndex,
    history: History<CompoundEdit>,
    /// Records of each open atomic level, outermost first
    atomic: Vec<Vec<EditRecord>>,
    broken: bool,
    modified: bool,
    version: u64,
}

struct Removed {
    event: DocumentEvent,
    text: String,
    marks: MarkSnapshot,
}

impl DocState {
    fn event(
        &self,
        kind: EventKind,
        offset: usize,
        len: usize,
        first_line: usize,
        origin: EditOrigin,
    ) -> DocumentEvent {
        DocumentEvent {
            kind,
            offset,
            len,
            first_line,
            lines_added: 0,
            lines_removed: 0,
            origin,
            damage_start: self.lines.line_start(first_line).unwrap_or(0),
        }
    }

    fn touch(&mut self) {
        self.modified = true;
        self.version += 1;
    }

    fn apply_insert(
        &mut self,
        offset: usize,
        text: &str,
        restore: &[(MarkHandle, usize)],
        origin: EditOrigin,
    ) -> Result<Option<DocumentEvent>> {
        if self.content.insert(offset, text)?.is_none() {
            return Ok(None);
        }
        let len = text.len();
        self.marks.on_insert(offset, len);
        self.marks.restore(offset..offset + len, restore);
        let first_line = self.lines.line_of(offset);
        let added = self.lines.on_insert(offset, text.as_bytes());
        self.touch();
        trace!(offset, len, ?origin, "insert");

        let mut event = self.event(EventKind::Insert, offset, len, first_line, origin);
        event.lines_added = added;
        Ok(Some(event))
    }

    fn apply_remove(&mut self, offset: usize, len: usize, origin: EditOrigin) -> Result<Option<Removed>> {
        let Some(ContentEdit::Remove { text, .. }) = self.content.remove(offset, len)? else {
            return Ok(None);
        };
        let first_line = self.lines.line_of(offset);
        let removed_lines = self.lines.on_remove(offset, text.as_bytes());
        let marks = self.marks.on_remove(offset, len);
        self.touch();
        trace!(offset, len, ?origin, "remove");

        let mut event = self.event(EventKind::Remove, offset, len, first_line, origin);
        event.lines_removed = removed_lines;
        Ok(Some(Removed { event, text, marks }))
    }

    /// File a user edit: into the open atomic level, or straight onto the undo stack
    fn record(&mut self, record: EditRecord) -> Option<CompoundEdit> {
        if let Some(level) = self.atomic.last_mut() {
            level.push(record);
            return None;
        }
        let compound = CompoundEdit::from(vec![record]);
        self.history.checkpoint(compound.clone());
        Some(compound)
    }
}

enum SectionEnd {
    Nested,
    Commit(CompoundEdit),
    Rollback(CompoundEdit),
}

// === Document ===

pub struct Document {
    config: DocConfig,
    lock: DocLock,
    state: RwLock<DocState>,
    listeners: ArcSwap<ListenerList>,
    guard: RwLock<Option<Arc<dyn EditGuard>>>,
    /// Change ranges posted under the write lock, flushed when it is released
    pending_changes: SegQueue<Range<usize>>,
    next_listener: AtomicU64,
}

/// Shared read access; released on drop
pub struct ReadGuard<'a> {
    doc: &'a Document,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        let _ = self.doc.lock.release_read();
    }
}

/// Exclusive write access; released on drop
pub struct WriteGuard<'a> {
    doc: &'a Document,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let _ = self.doc.end_write();
    }
}

/// Atomic section that unwinds itself if never closed (early return or panic)
struct AtomicSection<'a> {
    doc: &'a Document,
    open: bool,
}

impl<'a> AtomicSection<'a> {
    fn enter(doc: &'a Document) -> Result<Self> {
        doc.begin_atomic()?;
        Ok(Self { doc, open: true })
    }

    fn close(mut self) -> Result<()> {
        self.open = false;
        self.doc.end_atomic()
    }
}

impl Drop for AtomicSection<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.doc.break_atomic();
            let _ = self.doc.end_atomic();
        }
    }
}

/// Replays undo log records through the raw mutation path
struct Replayer<'a> {
    doc: &'a Document,
    origin: EditOrigin,
}

impl EditTarget for Replayer<'_> {
    fn insert(&mut self, offset: usize, text: &str, marks: &[(MarkHandle, usize)]) -> Result<()> {
        let event = self
            .doc
            .state
            .write()
            .apply_insert(offset, text, marks, self.origin)?;
        if let Some(event) = event {
            self.doc.fire(&event);
        }
        Ok(())
    }

    fn remove(&mut self, offset: usize, len: usize) -> Result<MarkSnapshot> {
        let removed = self.doc.state.write().apply_remove(offset, len, self.origin)?;
        Ok(match removed {
            Some(removed) => {
                self.doc.fire(&removed.event);
                removed.marks
            }
            None => Vec::new(),
        })
    }
}

/// Canonical terminator is `\n`
fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if memchr(b'\r', text.as_bytes()).is_none() {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::with_config(DocConfig::default())
    }

    pub fn with_config(config: DocConfig) -> Self {
        Self::build(config, "")
    }

    pub fn from_str(text: &str) -> Self {
        Self::build(DocConfig::default(), text)
    }

    pub fn from_str_with_config(text: &str, config: DocConfig) -> Self {
        Self::build(config, text)
    }

    fn build(config: DocConfig, text: &str) -> Self {
        let text = normalize_newlines(text);
        let state = DocState {
            content: GapBuffer::from_str(&text, config.initial_gap.max(1)),
            marks: MarkRegistry::new(),
            lines: LineIndex::from_bytes(text.as_bytes()),
            history: History::with_max_size(config.undo_limit),
            atomic: Vec::new(),
            broken: false,
            modified: false,
            version: 0,
        };
        Self {
            lock: DocLock::new(config.max_readers, config.lock_timeout()),
            config,
            state: RwLock::new(state),
            listeners: ArcSwap::from_pointee(Vec::new()),
            guard: RwLock::new(None),
            pending_changes: SegQueue::new(),
            next_listener: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &DocConfig {
        &self.config
    }

    // === Locking ===

    pub fn read_lock(&self) -> Result<ReadGuard<'_>> {
        self.lock.acquire_read()?;
        Ok(ReadGuard { doc: self })
    }

    pub fn write_lock(&self) -> Result<WriteGuard<'_>> {
        self.begin_write()?;
        Ok(WriteGuard { doc: self })
    }

    pub fn begin_write(&self) -> Result<()> {
        let depth = self.lock.acquire_write()?;
        if depth == 1 {
            debug!("write lock acquired");
        }
        Ok(())
    }

    /// Release one write level. The outermost release flushes pending change
    /// notifications first.
    pub fn end_write(&self) -> Result<()> {
        if self.lock.write_depth() == 1 && self.lock.atomic_depth() == 0 {
            self.flush_changes();
        }
        let depth = self.lock.release_write()?;
        if depth == 0 {
            debug!("write lock released");
        }
        Ok(())
    }

    pub fn begin_atomic(&self) -> Result<()> {
        self.begin_write()?;
        let depth = match self.lock.enter_atomic() {
            Ok(depth) => depth,
            Err(e) => {
                let _ = self.end_write();
                return Err(e);
            }
        };
        let mut state = self.state.write();
        if depth == 1 {
            state.broken = false;
        }
        state.atomic.push(Vec::new());
        debug!(depth, "atomic section entered");
        Ok(())
    }

    /// Close one atomic level. The outermost close delivers the section as one
    /// compound edit, or unwinds it and returns `AtomicBroken` if the section
    /// was broken.
    pub fn end_atomic(&self) -> Result<()> {
        let depth = self.lock.leave_atomic()?;
        let end = {
            let mut state = self.state.write();
            let records = state.atomic.pop().unwrap_or_default();
            if let Some(parent) = state.atomic.last_mut() {
                if !records.is_empty() {
                    parent.push(EditRecord::Compound(records.into()));
                }
                SectionEnd::Nested
            } else if std::mem::take(&mut state.broken) {
                SectionEnd::Rollback(records.into())
            } else if records.is_empty() {
                SectionEnd::Nested
            } else {
                let compound = CompoundEdit::from(records);
                state.history.checkpoint(compound.clone());
                SectionEnd::Commit(compound)
            }
        };
        debug!(depth, "atomic section closed");

        let result = match end {
            SectionEnd::Nested => Ok(()),
            SectionEnd::Commit(compound) => {
                self.fire_undoable(&compound);
                Ok(())
            }
            SectionEnd::Rollback(mut compound) => compound
                .undo(&mut Replayer {
                    doc: self,
                    origin: EditOrigin::Rollback,
                })
                .and(Err(DocError::AtomicBroken)),
        };
        self.end_write()?;
        result
    }

    /// Undo everything done so far in the open atomic section and mark it
    /// broken; later edits in the section are undone when it closes.
    pub fn break_atomic(&self) -> Result<()> {
        if self.lock.atomic_depth() == 0 {
            return Err(discipline("atomic section broken without being open"));
        }
        let mut compound = {
            let mut state = self.state.write();
            state.broken = true;
            let mut compound = CompoundEdit::new();
            for level in state.atomic.iter_mut() {
                for record in level.drain(..) {
                    compound.push(record);
                }
            }
            compound
        };
        warn!(edits = compound.leaf_count(), "atomic section broken, rolling back");
        compound.undo(&mut Replayer {
            doc: self,
            origin: EditOrigin::Rollback,
        })
    }

    /// Run `operation` as one atomic section. Any error it returns rolls back
    /// every edit it made before the error propagates; so does a panic.
    ///
    /// If a nested section broke the whole transaction and `operation` still
    /// returned `Ok`, its edits are gone and the result is `AtomicBroken`.
    pub fn run_atomic<T, E>(&self, operation: impl FnOnce(&Document) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DocError>,
    {
        let section = AtomicSection::enter(self)?;
        let result = operation(self);
        if result.is_err() {
            self.break_atomic()?;
            match section.close() {
                Ok(()) | Err(DocError::AtomicBroken) => {}
                Err(e) => return Err(e.into()),
            }
            return result;
        }
        section.close()?;
        result
    }

    pub fn transaction_state(&self) -> TxState {
        self.lock.state()
    }

    // === Listeners and guard ===

    pub fn add_listener(&self, listener: Arc<dyn DocumentListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.rcu(|current| {
            let mut next = (**current).clone();
            next.push((id, Arc::clone(&listener)));
            next
        });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut found = false;
        self.listeners.rcu(|current| {
            let next: ListenerList = current.iter().filter(|(l, _)| *l != id).cloned().collect();
            found = next.len() != current.len();
            next
        });
        found
    }

    pub fn set_guard(&self, guard: Option<Arc<dyn EditGuard>>) {
        *self.guard.write() = guard;
    }

    fn current_guard(&self) -> Option<Arc<dyn EditGuard>> {
        self.guard.read().clone()
    }

    fn fire(&self, event: &DocumentEvent) {
        let listeners = self.listeners.load_full();
        for (_, listener) in listeners.iter() {
            match event.kind {
                EventKind::Insert => listener.inserted(self, event),
                EventKind::Remove => listener.removed(self, event),
                EventKind::Change => listener.changed(self, event),
            }
        }
    }

    fn fire_undoable(&self, edit: &CompoundEdit) {
        let listeners = self.listeners.load_full();
        for (_, listener) in listeners.iter() {
            listener.undoable_edit(self, edit);
        }
    }

    /// Ask listeners to re-examine a range (e.g. after a highlighting change).
    /// Posts made while the write lock is held are coalesced into one event.
    pub fn mark_changed(&self, offset: usize, len: usize) -> Result<()> {
        let _write = self.write_lock()?;
        self.state.read().content.check_range(offset, len)?;
        self.pending_changes.push(offset..offset + len);
        Ok(())
    }

    fn flush_changes(&self) {
        let mut span: Option<Range<usize>> = None;
        while let Some(range) = self.pending_changes.pop() {
            span = Some(match span {
                Some(s) => s.start.min(range.start)..s.end.max(range.end),
                None => range,
            });
        }
        let Some(span) = span else {
            return;
        };
        let event = {
            let state = self.state.read();
            // earlier edits in this write may have shrunk the document
            let end = span.end.min(state.content.len());
            let start = span.start.min(end);
            let first_line = state.lines.line_of(start);
            state.event(EventKind::Change, start, end - start, first_line, EditOrigin::Edit)
        };
        self.fire(&event);
    }

    // === Mutation ===

    pub fn insert_text(&self, offset: usize, text: &str) -> Result<()> {
        let text = normalize_newlines(text);
        let _write = self.write_lock()?;
        self.state.read().content.check_range(offset, 0)?;
        if text.is_empty() {
            return Ok(());
        }
        if let Some(guard) = self.current_guard() {
            guard.check_insert(self, offset, &text)?;
        }

        let (event, compound) = {
            let mut state = self.state.write();
            let Some(event) = state.apply_insert(offset, &text, &[], EditOrigin::Edit)? else {
                return Ok(());
            };
            let compound = state.record(EditRecord::insert(offset, text.into_owned()));
            (event, compound)
        };
        self.fire(&event);
        if let Some(compound) = compound {
            self.fire_undoable(&compound);
        }
        Ok(())
    }

    pub fn remove_text(&self, offset: usize, len: usize) -> Result<()> {
        let _write = self.write_lock()?;
        self.state.read().content.check_range(offset, len)?;
        if len == 0 {
            return Ok(());
        }
        if let Some(guard) = self.current_guard() {
            guard.check_remove(self, offset, len)?;
        }

        let (event, compound) = {
            let mut state = self.state.write();
            let Some(removed) = state.apply_remove(offset, len, EditOrigin::Edit)? else {
                return Ok(());
            };
            let compound = state.record(EditRecord::remove(offset, removed.text, removed.marks));
            (removed.event, compound)
        };
        self.fire(&event);
        if let Some(compound) = compound {
            self.fire_undoable(&compound);
        }
        Ok(())
    }

    /// Remove then insert as one atomic section
    pub fn replace_text(&self, offset: usize, len: usize, text: &str) -> Result<()> {
        self.run_atomic(|doc| {
            doc.remove_text(offset, len)?;
            doc.insert_text(offset, text)
        })
    }

    /// Append a UTF-8 stream at the end. Not recorded for undo and leaves the
    /// modified flag as it was.
    pub fn load(&self, mut reader: impl Read) -> Result<usize> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = from_utf8(&bytes).map_err(|_| DocError::InvalidUtf8)?;
        let text = normalize_newlines(text);

        let _write = self.write_lock()?;
        let event = {
            let mut state = self.state.write();
            let was_modified = state.modified;
            let end = state.content.len();
            let event = state.apply_insert(end, &text, &[], EditOrigin::Load)?;
            state.modified = was_modified;
            event
        };
        if let Some(event) = &event {
            debug!(len = event.len, "stream loaded");
            self.fire(event);
        }
        Ok(text.len())
    }

    // === Undo ===

    pub fn undo(&self) -> Result<()> {
        self.replay(EditOrigin::Undo)
    }

    pub fn redo(&self) -> Result<()> {
        self.replay(EditOrigin::Redo)
    }

    /// Undo or redo the top compound edit inside its own atomic section
    fn replay(&self, origin: EditOrigin) -> Result<()> {
        let section = AtomicSection::enter(self)?;
        let result = self.replay_top(origin);
        section.close()?;
        result
    }

    fn replay_top(&self, origin: EditOrigin) -> Result<()> {
        let mut compound = {
            let mut state = self.state.write();
            if state.atomic.len() > 1 {
                return Err(discipline("undo inside an open atomic section"));
            }
            match origin {
                EditOrigin::Redo => state.history.take_redo().ok_or(DocError::NothingToRedo)?,
                _ => state.history.take_undo().ok_or(DocError::NothingToUndo)?,
            }
        };
        debug!(?origin, edits = compound.leaf_count(), "replaying compound edit");
        let mut replayer = Replayer { doc: self, origin };
        let result = match origin {
            EditOrigin::Redo => compound.redo(&mut replayer),
            _ => compound.undo(&mut replayer),
        };
        let mut state = self.state.write();
        match origin {
            EditOrigin::Redo => state.history.push_redone(compound),
            _ => state.history.push_undone(compound),
        }
        result
    }

    pub fn can_undo(&self) -> bool {
        self.state.read().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.read().history.can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.state.read().history.undo_depth()
    }

    pub fn discard_undo_history(&self) -> Result<()> {
        let _write = self.write_lock()?;
        self.state.write().history.clear();
        Ok(())
    }

    // === Queries ===
    //
    // Scalar queries read the state directly. Content reads take the read
    // lock; hold `read_lock` across calls that must see one stable version.

    pub fn len(&self) -> usize {
        self.state.read().content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn is_modified(&self) -> bool {
        self.state.read().modified
    }

    pub fn set_modified(&self, modified: bool) {
        self.state.write().modified = modified;
    }

    pub fn read(&self, offset: usize, len: usize) -> Result<String> {
        let _read = self.read_lock()?;
        self.state.read().content.read(offset, len)
    }

    pub fn text(&self) -> Result<String> {
        let _read = self.read_lock()?;
        Ok(self.state.read().content.text())
    }

    pub fn line_count(&self) -> usize {
        self.state.read().lines.line_count()
    }

    pub fn line_of(&self, offset: usize) -> Result<usize> {
        let _read = self.read_lock()?;
        let state = self.state.read();
        state.content.check_range(offset, 0)?;
        Ok(state.lines.line_of(offset))
    }

    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.state.read().lines.line_start(line)
    }

    /// Offset of the line terminator, or the document length on the last line
    pub fn line_end(&self, line: usize) -> Option<usize> {
        let state = self.state.read();
        state.lines.line_end(line, state.content.len())
    }

    /// Line text without its terminator
    pub fn line_text(&self, line: usize) -> Result<Option<String>> {
        let _read = self.read_lock()?;
        let state = self.state.read();
        let (Some(start), Some(end)) = (
            state.lines.line_start(line),
            state.lines.line_end(line, state.content.len()),
        ) else {
            return Ok(None);
        };
        state.content.read(start, end - start).map(Some)
    }

    /// Search between `start` and `limit`; `start > limit` searches backward.
    /// The finder's direction must match, else `FinderDirection`.
    pub fn find(&self, finder: &mut dyn Finder, start: usize, limit: usize) -> Result<Option<usize>> {
        let _read = self.read_lock()?;
        let state = self.state.read();
        let (lo, hi) = (start.min(limit), start.max(limit));
        state.content.check_range(lo, hi - lo)?;
        state.content.find(finder, start, limit)
    }

    /// Hand `processor` successive line-aligned slices of `range`, starting at
    /// `batch_lines` lines and doubling each time. Stops early on `Break`.
    pub fn process_batched<F>(&self, range: Range<usize>, mut processor: F) -> Result<ControlFlow<()>>
    where
        F: FnMut(&Document, Range<usize>) -> ControlFlow<()>,
    {
        {
            let state = self.state.read();
            let len = range.end.checked_sub(range.start).unwrap_or(usize::MAX);
            state.content.check_range(range.start, len)?;
        }
        let mut batch = self.config.batch_lines.max(1);
        let mut pos = range.start;
        while pos < range.end {
            let end = {
                let state = self.state.read();
                let limit = range.end.min(state.content.len());
                let line = state.lines.line_of(pos.min(state.content.len()));
                state
                    .lines
                    .line_start(line.saturating_add(batch))
                    .map_or(limit, |next| next.min(limit))
            };
            if end <= pos {
                break;
            }
            trace!(start = pos, end, batch, "batch");
            if processor(self, pos..end).is_break() {
                return Ok(ControlFlow::Break(()));
            }
            pos = end;
            batch = batch.saturating_mul(2);
        }
        Ok(ControlFlow::Continue(()))
    }

    // === Marks ===

    pub fn create_mark(&self, offset: usize, bias: Bias) -> Result<MarkHandle> {
        let _read = self.read_lock()?;
        let mut state = self.state.write();
        state.content.check_range(offset, 0)?;
        let len = state.content.len();
        state.marks.create(offset, bias, len)
    }

    pub fn mark_offset(&self, mark: MarkHandle) -> Result<usize> {
        self.state.read().marks.offset_of(mark)
    }

    pub fn mark_bias(&self, mark: MarkHandle) -> Result<Bias> {
        self.state.read().marks.bias_of(mark)
    }

    pub fn is_mark_valid(&self, mark: MarkHandle) -> bool {
        self.state.read().marks.is_valid(mark)
    }

    pub fn set_mark_offset(&self, mark: MarkHandle, offset: usize) -> Result<()> {
        let _read = self.read_lock()?;
        let mut state = self.state.write();
        state.content.check_range(offset, 0)?;
        let len = state.content.len();
        state.marks.set_offset(mark, offset, len)
    }

    /// Removing twice is `InvalidMark`
    pub fn remove_mark(&self, mark: MarkHandle) -> Result<()> {
        let _read = self.read_lock()?;
        self.state.write().marks.remove(mark)
    }

    /// Marks with offsets in `range`, in offset order
    pub fn marks_in(&self, range: Range<usize>) -> Vec<(MarkHandle, usize)> {
        self.state.read().marks.marks_in(range)
    }

    pub fn mark_count(&self) -> usize {
        self.state.read().marks.len()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Document")
            .field("len", &state.content.len())
            .field("lines", &state.lines.line_count())
            .field("marks", &state.marks.len())
            .field("version", &state.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newlines_are_normalized() {
        let doc = Document::from_str("a\r\nb\rc");
        assert_eq!(doc.text().unwrap(), "a\nb\nc");
        doc.insert_text(1, "\r\n").unwrap();
        assert_eq!(doc.text().unwrap(), "a\n\nb\nc");
        assert_eq!(doc.line_count(), 4);
    }

    #[test]
    fn end_without_begin_is_discipline_error() {
        let doc = Document::new();
        assert!(matches!(doc.end_write(), Err(DocError::LockDiscipline(_))));
        assert!(matches!(doc.end_atomic(), Err(DocError::LockDiscipline(_))));
        assert!(matches!(doc.break_atomic(), Err(DocError::LockDiscipline(_))));
    }

    #[test]
    fn damage_start_is_line_start() {
        let event = DocumentEvent {
            kind: EventKind::Insert,
            offset: 12,
            len: 1,
            first_line: 2,
            lines_added: 0,
            lines_removed: 0,
            origin: EditOrigin::Edit,
            damage_start: 10,
        };
        assert!(!event.invalidates(10));
        assert!(event.invalidates(11));
    }
}
