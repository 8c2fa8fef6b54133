//! Storage seam for the registry.
//!
//! A [`RecordBackend`] is a transactional key-value collection of company
//! records keyed by an auto-assigned identifier. Each call is one
//! independent transaction; nothing composes across calls.

mod memory;

pub use memory::MemoryBackend;

use crate::error::Result;
use crate::types::{Company, CompanyId, NewCompany};

/// Durable single-entity CRUD over company records.
pub trait RecordBackend: Send + Sync {
    /// Insert a new record, assigning the next identifier.
    fn insert(&self, company: NewCompany) -> Result<Company>;

    /// Store `company` at its identifier, replacing any existing record.
    fn put(&self, company: &Company) -> Result<()>;

    /// Remove a record. Returns whether it existed.
    fn remove(&self, id: CompanyId) -> Result<bool>;

    /// Point lookup.
    fn get(&self, id: CompanyId) -> Result<Option<Company>>;

    /// All records in identifier order.
    fn scan(&self) -> Result<Vec<Company>>;

    /// Number of live records.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Flush pending writes.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
