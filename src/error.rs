//! Error taxonomy shared by every document operation

use crate::finder::Direction;
use thiserror::Error;

pub type Result<T, E = DocError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DocError {
    /// Offset or length outside `[0, len]`. Never partially applied.
    #[error("range {offset}+{len} is outside document of length {doc_len}")]
    OutOfRange {
        offset: usize,
        len: usize,
        doc_len: usize,
    },

    #[error("offset {offset} is not on a char boundary")]
    NotCharBoundary { offset: usize },

    /// Mark handle was removed or never belonged to this document
    #[error("mark is no longer valid")]
    InvalidMark,

    /// Edit vetoed by the installed guard; nothing was written
    #[error("offset {offset} is inside a guarded region")]
    GuardedRegion { offset: usize },

    /// Unbalanced begin/end calls. Treat as an assertion failure.
    #[error("lock discipline violated: {0}")]
    LockDiscipline(&'static str),

    /// Outermost atomic section closed after being broken; all of its edits were undone
    #[error("atomic section was broken and rolled back")]
    AtomicBroken,

    /// Finder runs the other way from the search range
    #[error("search range runs {range:?} but the finder does not")]
    FinderDirection { range: Direction },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("timed out waiting for document lock")]
    LockTimeout,

    #[error("stream is not valid UTF-8")]
    InvalidUtf8,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

impl DocError {
    pub(crate) fn out_of_range(offset: usize, len: usize, doc_len: usize) -> Self {
        DocError::OutOfRange {
            offset,
            len,
            doc_len,
        }
    }

    /// True for errors a UI should turn into a beep rather than a report
    pub fn is_user_feedback(&self) -> bool {
        matches!(
            self,
            DocError::GuardedRegion { .. } | DocError::NothingToUndo | DocError::NothingToRedo
        )
    }
}
