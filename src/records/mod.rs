//! Entry log and indexes backing the file store.
//!
//! Changes are stored in an append-only log; the key index maps each live
//! identifier to the offset of its latest version.

mod index;
mod log;

pub use index::RecordIndex;
pub use log::{EntryIterator, EntryLog, EntryOp, LogEntry};
