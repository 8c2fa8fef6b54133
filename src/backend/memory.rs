//! Non-durable backend.

use super::RecordBackend;
use crate::error::Result;
use crate::types::{Company, CompanyId, NewCompany};
use parking_lot::RwLock;
use std::collections::BTreeMap;

struct Inner {
    records: BTreeMap<CompanyId, Company>,
    next_id: CompanyId,
}

/// Keeps records in memory with the same key-generation rules as the file
/// store: identifiers start at 1 and are never reused.
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: BTreeMap::new(),
                next_id: CompanyId(1),
            }),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordBackend for MemoryBackend {
    fn insert(&self, company: NewCompany) -> Result<Company> {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id = id.next();

        let company = company.with_id(id);
        inner.records.insert(id, company.clone());
        Ok(company)
    }

    fn put(&self, company: &Company) -> Result<()> {
        let mut inner = self.inner.write();
        if company.id >= inner.next_id {
            inner.next_id = company.id.next();
        }
        inner.records.insert(company.id, company.clone());
        Ok(())
    }

    fn remove(&self, id: CompanyId) -> Result<bool> {
        Ok(self.inner.write().records.remove(&id).is_some())
    }

    fn get(&self, id: CompanyId) -> Result<Option<Company>> {
        Ok(self.inner.read().records.get(&id).cloned())
    }

    fn scan(&self) -> Result<Vec<Company>> {
        Ok(self.inner.read().records.values().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.read().records.len())
    }
}
