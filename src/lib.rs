//! Text document engine: gap-buffer storage, edit-surviving marks,
//! reentrant write/atomic locking and compound undo

pub mod annotations;
pub mod blocks;
pub mod config;
pub mod document;
pub mod error;
pub mod finder;
pub mod gap;
pub mod history;
pub mod lines;
pub mod lock;
pub mod marks;

// Re-export core types
pub use annotations::{AnnotationId, AnnotationIndex, Bookmarks, SharedAnnotations};
pub use blocks::{GuardedBlocks, LayerActivations, MarkBlockChain};
pub use config::DocConfig;
pub use document::{
    Document, DocumentEvent, DocumentListener, EditGuard, EditOrigin, EventKind, ListenerId,
    ReadGuard, WriteGuard,
};
pub use error::{DocError, Result};
pub use finder::{CharFinder, Direction, Finder, NonWhitespaceFinder, StringFinder};
pub use history::{CompoundEdit, EditRecord};
pub use lock::TxState;
pub use marks::{Bias, MarkHandle};
