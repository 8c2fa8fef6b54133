//! Key and secondary indexes over the company log.

use crate::types::CompanyId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Location and indexed fields of one live record.
#[derive(Clone, Debug)]
struct IndexEntry {
    offset: u64,
    company_name: String,
    director_full_name: String,
}

/// In-memory index rebuilt from the log on open.
///
/// The key index is ordered by identifier, which is also insertion order
/// because identifiers are handed out monotonically. The owner guards the
/// whole index with one lock, so a replace is never observed half done.
#[derive(Default)]
pub struct RecordIndex {
    /// Identifier to entry.
    entries: BTreeMap<CompanyId, IndexEntry>,

    /// Company name to identifiers (non-unique).
    by_company_name: HashMap<String, BTreeSet<CompanyId>>,

    /// Director name to identifiers (non-unique).
    by_director: HashMap<String, BTreeSet<CompanyId>>,
}

impl RecordIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `id` at a new offset, replacing any previous version.
    pub fn put(
        &mut self,
        id: CompanyId,
        offset: u64,
        company_name: &str,
        director_full_name: &str,
    ) {
        self.remove(id);

        self.entries.insert(
            id,
            IndexEntry {
                offset,
                company_name: company_name.to_string(),
                director_full_name: director_full_name.to_string(),
            },
        );

        self.by_company_name
            .entry(company_name.to_string())
            .or_default()
            .insert(id);

        self.by_director
            .entry(director_full_name.to_string())
            .or_default()
            .insert(id);
    }

    /// Move a live record to a new offset. Returns whether it was present.
    pub fn relocate(&mut self, id: CompanyId, offset: u64) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.offset = offset;
                true
            }
            None => false,
        }
    }

    /// Drop `id`. Returns whether it was present.
    pub fn remove(&mut self, id: CompanyId) -> bool {
        let Some(old) = self.entries.remove(&id) else {
            return false;
        };

        unlink(&mut self.by_company_name, &old.company_name, id);
        unlink(&mut self.by_director, &old.director_full_name, id);
        true
    }

    /// Get the log offset of a live record.
    pub fn get_offset(&self, id: CompanyId) -> Option<u64> {
        self.entries.get(&id).map(|e| e.offset)
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: CompanyId) -> bool {
        self.entries.contains_key(&id)
    }

    /// All live (id, offset) pairs in identifier order.
    pub fn offsets(&self) -> Vec<(CompanyId, u64)> {
        self.entries.iter().map(|(id, e)| (*id, e.offset)).collect()
    }

    /// Identifiers of companies with exactly this name.
    pub fn get_by_company_name(&self, name: &str) -> Vec<CompanyId> {
        self.by_company_name
            .get(name)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Identifiers of companies with exactly this director.
    pub fn get_by_director(&self, name: &str) -> Vec<CompanyId> {
        self.by_director
            .get(name)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Get count of live records.
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

fn unlink(index: &mut HashMap<String, BTreeSet<CompanyId>>, key: &str, id: CompanyId) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}
