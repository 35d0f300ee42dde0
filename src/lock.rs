//! Reader/writer lock with reentrant writers and atomic depth
//!
//! Ownership is per thread. The write owner may nest writes, atomic sections
//! and reads; other threads block until the outermost write is released.

use crate::error::{DocError, Result};
use ahash::AHashMap;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::error;

/// Transaction state as seen from outside
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxState {
    Idle,
    WriteActive(usize),
    /// Atomic depth; the write lock is held underneath
    AtomicActive(usize),
}

#[derive(Default)]
struct LockState {
    owner: Option<ThreadId>,
    write_depth: usize,
    atomic_depth: usize,
    /// Read holds per thread
    readers: AHashMap<ThreadId, usize>,
    waiting_writers: usize,
}

impl LockState {
    fn owned_by(&self, me: ThreadId) -> bool {
        self.owner == Some(me)
    }
}

pub struct DocLock {
    state: Mutex<LockState>,
    cond: Condvar,
    max_readers: usize,
    timeout: Option<Duration>,
}

pub(crate) fn discipline(what: &'static str) -> DocError {
    error!(what, "document lock discipline violated");
    DocError::LockDiscipline(what)
}

impl DocLock {
    pub fn new(max_readers: usize, timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            cond: Condvar::new(),
            max_readers: max_readers.max(1),
            timeout,
        }
    }

    fn wait(&self, guard: &mut MutexGuard<'_, LockState>, deadline: Option<Instant>) -> Result<()> {
        match deadline {
            Some(deadline) => {
                if self.cond.wait_until(guard, deadline).timed_out() {
                    return Err(DocError::LockTimeout);
                }
                Ok(())
            }
            None => {
                self.cond.wait(guard);
                Ok(())
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|t| Instant::now() + t)
    }

    pub fn acquire_read(&self) -> Result<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let reentrant = state.owned_by(me) || state.readers.contains_key(&me);
        if !reentrant {
            let deadline = self.deadline();
            while state.owner.is_some()
                || state.waiting_writers > 0
                || state.readers.len() >= self.max_readers
            {
                self.wait(&mut state, deadline)?;
            }
        }
        *state.readers.entry(me).or_insert(0) += 1;
        Ok(())
    }

    pub fn release_read(&self) -> Result<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let Some(count) = state.readers.get_mut(&me) else {
            return Err(discipline("read lock released without being held"));
        };
        *count -= 1;
        if *count == 0 {
            state.readers.remove(&me);
            drop(state);
            self.cond.notify_all();
        }
        Ok(())
    }

    /// Returns the write depth after acquiring
    pub fn acquire_write(&self) -> Result<usize> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owned_by(me) {
            state.write_depth += 1;
            return Ok(state.write_depth);
        }
        if state.readers.contains_key(&me) {
            return Err(discipline("write lock requested while holding a read lock"));
        }
        let deadline = self.deadline();
        state.waiting_writers += 1;
        while state.owner.is_some() || !state.readers.is_empty() {
            if let Err(e) = self.wait(&mut state, deadline) {
                state.waiting_writers -= 1;
                drop(state);
                self.cond.notify_all();
                return Err(e);
            }
        }
        state.waiting_writers -= 1;
        state.owner = Some(me);
        state.write_depth = 1;
        Ok(1)
    }

    /// Returns the write depth left after releasing
    pub fn release_write(&self) -> Result<usize> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if !state.owned_by(me) {
            return Err(discipline("write lock released by a thread that does not hold it"));
        }
        if state.write_depth <= state.atomic_depth {
            return Err(discipline("write lock released inside an open atomic section"));
        }
        state.write_depth -= 1;
        let depth = state.write_depth;
        if depth == 0 {
            state.owner = None;
            drop(state);
            self.cond.notify_all();
        }
        Ok(depth)
    }

    /// Caller must already hold the write lock
    pub fn enter_atomic(&self) -> Result<usize> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if !state.owned_by(me) {
            return Err(discipline("atomic section entered without the write lock"));
        }
        state.atomic_depth += 1;
        Ok(state.atomic_depth)
    }

    /// Returns the atomic depth left; the write lock is still held
    pub fn leave_atomic(&self) -> Result<usize> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if !state.owned_by(me) || state.atomic_depth == 0 {
            return Err(discipline("atomic section ended without being open"));
        }
        state.atomic_depth -= 1;
        Ok(state.atomic_depth)
    }

    pub fn is_write_owner(&self) -> bool {
        self.state.lock().owned_by(thread::current().id())
    }

    /// Write depth for the calling thread, 0 if it is not the owner
    pub fn write_depth(&self) -> usize {
        let state = self.state.lock();
        if state.owned_by(thread::current().id()) {
            state.write_depth
        } else {
            0
        }
    }

    /// Atomic depth for the calling thread
    pub fn atomic_depth(&self) -> usize {
        let state = self.state.lock();
        if state.owned_by(thread::current().id()) {
            state.atomic_depth
        } else {
            0
        }
    }

    pub fn state(&self) -> TxState {
        let state = self.state.lock();
        match (state.write_depth, state.atomic_depth) {
            (0, _) => TxState::Idle,
            (w, 0) => TxState::WriteActive(w),
            (_, a) => TxState::AtomicActive(a),
        }
    }

    pub fn reader_count(&self) -> usize {
        self.state.lock().readers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn reentrant_write_and_atomic() {
        let lock = DocLock::new(4, None);
        assert_eq!(lock.acquire_write().unwrap(), 1);
        assert_eq!(lock.acquire_write().unwrap(), 2);
        assert_eq!(lock.enter_atomic().unwrap(), 1);
        assert_eq!(lock.state(), TxState::AtomicActive(1));
        // reads inside a write do not block
        lock.acquire_read().unwrap();
        lock.release_read().unwrap();
        assert!(lock.release_write().is_ok());
        // depth 1 is pinned by the open atomic section
        assert!(matches!(lock.release_write(), Err(DocError::LockDiscipline(_))));
        assert_eq!(lock.leave_atomic().unwrap(), 0);
        assert_eq!(lock.release_write().unwrap(), 0);
        assert_eq!(lock.state(), TxState::Idle);
    }

    #[test]
    fn unbalanced_release_is_discipline_error() {
        let lock = DocLock::new(4, None);
        assert!(matches!(lock.release_write(), Err(DocError::LockDiscipline(_))));
        assert!(matches!(lock.release_read(), Err(DocError::LockDiscipline(_))));
        assert!(matches!(lock.leave_atomic(), Err(DocError::LockDiscipline(_))));
    }

    #[test]
    fn read_to_write_upgrade_refused() {
        let lock = DocLock::new(4, None);
        lock.acquire_read().unwrap();
        assert!(matches!(lock.acquire_write(), Err(DocError::LockDiscipline(_))));
        lock.release_read().unwrap();
    }

    #[test]
    fn other_thread_times_out_while_writer_holds() {
        let lock = Arc::new(DocLock::new(4, Some(Duration::from_millis(20))));
        lock.acquire_write().unwrap();
        let other = Arc::clone(&lock);
        let result = thread::spawn(move || other.acquire_read()).join().unwrap();
        assert!(matches!(result, Err(DocError::LockTimeout)));
        lock.release_write().unwrap();

        let other = Arc::clone(&lock);
        let ok = thread::spawn(move || {
            other.acquire_read()?;
            other.release_read()
        })
        .join()
        .unwrap();
        assert!(ok.is_ok());
    }

    #[test]
    fn reader_limit_blocks_extra_readers() {
        let lock = Arc::new(DocLock::new(1, Some(Duration::from_millis(20))));
        lock.acquire_read().unwrap();
        let other = Arc::clone(&lock);
        let result = thread::spawn(move || other.acquire_read()).join().unwrap();
        assert!(matches!(result, Err(DocError::LockTimeout)));
        lock.release_read().unwrap();
    }
}
