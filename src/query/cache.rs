//! In-memory snapshot of the whole collection.

use super::page::{Page, PageRequest};
use crate::error::Result;
use crate::types::Company;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// A full copy of the collection at one point in time.
#[derive(Clone, Debug)]
pub struct Snapshot {
    generation: u64,
    records: Arc<Vec<Company>>,
}

impl Snapshot {
    pub fn new(generation: u64, records: Vec<Company>) -> Self {
        Self {
            generation,
            records: Arc::new(records),
        }
    }

    /// Increases with every load; later snapshots have higher generations.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn records(&self) -> &[Company] {
        &self.records
    }

    /// Shared handle to the records, for handing to subscribers.
    pub fn shared(&self) -> Arc<Vec<Company>> {
        Arc::clone(&self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct CacheState {
    snapshot: Option<Snapshot>,
    generation: u64,
}

/// Holds at most one snapshot.
///
/// The lock is held for the whole of a load, so a reader arriving during a
/// load waits for it and never sees a partial list.
pub struct QueryCache {
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                snapshot: None,
                generation: 0,
            }),
        }
    }

    /// The held snapshot, if loaded.
    pub fn current(&self) -> Option<Snapshot> {
        self.state.lock().snapshot.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().snapshot.is_some()
    }

    /// Generation of the most recent load (0 if never loaded).
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Drop the held snapshot; the next read loads a fresh one.
    pub fn invalidate(&self) {
        self.state.lock().snapshot = None;
    }

    /// Return the held snapshot, loading it first if absent.
    pub fn get_or_load<F>(&self, load: F) -> Result<Snapshot>
    where
        F: FnOnce() -> Result<Vec<Company>>,
    {
        let mut state = self.state.lock();
        if let Some(snapshot) = &state.snapshot {
            return Ok(snapshot.clone());
        }
        Self::load_into(&mut state, load)
    }

    /// Replace the snapshot with a fresh load.
    ///
    /// On failure the cache is left empty, never holding the stale copy.
    pub fn reload<F>(&self, load: F) -> Result<Snapshot>
    where
        F: FnOnce() -> Result<Vec<Company>>,
    {
        let mut state = self.state.lock();
        state.snapshot = None;
        Self::load_into(&mut state, load)
    }

    /// Answer a page request from the snapshot, loading it if needed.
    pub fn page<F>(&self, request: &PageRequest, load: F) -> Result<Page>
    where
        F: FnOnce() -> Result<Vec<Company>>,
    {
        request.validate()?;
        let snapshot = self.get_or_load(load)?;
        request.apply(snapshot.records())
    }

    fn load_into<F>(state: &mut CacheState, load: F) -> Result<Snapshot>
    where
        F: FnOnce() -> Result<Vec<Company>>,
    {
        let records = load()?;
        state.generation += 1;

        let snapshot = Snapshot::new(state.generation, records);
        debug!(
            generation = snapshot.generation,
            records = snapshot.len(),
            "Loaded snapshot"
        );

        state.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}
