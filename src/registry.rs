//! Registry tying a backend, the snapshot cache and the notifier together.

use crate::backend::RecordBackend;
use crate::error::{RegistryError, Result};
use crate::query::{Page, PageRequest, QueryCache, Snapshot};
use crate::samples;
use crate::store::{LogStore, StoreConfig};
use crate::subscriptions::{ChangeNotifier, Subscription, SubscriptionHandle, SubscriptionId};
use crate::types::{Company, CompanyId, NewCompany};
use crate::view::TableState;
use parking_lot::Mutex;
use tracing::{debug, error, info};

/// Registry statistics.
#[derive(Clone, Debug, Default)]
pub struct RegistryStats {
    pub record_count: usize,
    pub snapshot_loaded: bool,
    pub snapshot_generation: u64,
    pub subscriber_count: usize,
}

/// The entry point for reading and changing company records.
///
/// Every mutation runs as its own backend transaction, then replaces the
/// snapshot and tells subscribers. Mutations are serialized, so the snapshot
/// seen after a mutation returns always matches the store.
///
/// ```ignore
/// let registry = Registry::open(StoreConfig::default())?;
///
/// let sub = registry.subscribe(|records| println!("{} companies", records.len()));
/// registry.add(NewCompany::new("Acme", "Ivanov I.I.", "+7 000", address))?;
///
/// let page = registry.get_page(&PageRequest::new(1, 5).with_filter("ivanov"))?;
/// sub.unsubscribe();
/// ```
pub struct Registry<B: RecordBackend> {
    backend: B,
    cache: QueryCache,
    notifier: ChangeNotifier,
    /// Serializes mutations together with the reload that follows them.
    write_lock: Mutex<()>,
}

impl Registry<LogStore> {
    /// Open a file-backed registry.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Ok(Self::new(LogStore::open(config)?))
    }
}

impl<B: RecordBackend> Registry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: QueryCache::new(),
            notifier: ChangeNotifier::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// The injected backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // --- Mutations ---

    /// Insert a company. The store assigns its identifier.
    pub fn add(&self, company: NewCompany) -> Result<Company> {
        let lock = self.write_lock.lock();

        let company = self.backend.insert(company).map_err(|e| {
            error!(error = %e, "Failed to add company");
            RegistryError::write("add", e)
        })?;
        info!(company_id = %company.id, "Added company");

        let snapshot = self.refresh();
        drop(lock);

        self.deliver(snapshot);
        Ok(company)
    }

    /// Replace the company stored at `company.id`.
    pub fn update(&self, company: &Company) -> Result<()> {
        let lock = self.write_lock.lock();

        self.backend.put(company).map_err(|e| {
            error!(company_id = %company.id, error = %e, "Failed to update company");
            RegistryError::write("update", e)
        })?;
        info!(company_id = %company.id, "Updated company");

        let snapshot = self.refresh();
        drop(lock);

        self.deliver(snapshot);
        Ok(())
    }

    /// Remove a company. Removing an unknown identifier succeeds and
    /// returns `false`.
    pub fn delete(&self, id: CompanyId) -> Result<bool> {
        let lock = self.write_lock.lock();

        let removed = self.backend.remove(id).map_err(|e| {
            error!(company_id = %id, error = %e, "Failed to delete company");
            RegistryError::write("delete", e)
        })?;
        info!(company_id = %id, removed, "Deleted company");

        let snapshot = self.refresh();
        drop(lock);

        self.deliver(snapshot);
        Ok(removed)
    }

    /// Add the built-in sample companies, in order.
    pub fn seed_samples(&self) -> Result<Vec<Company>> {
        let mut added = Vec::new();
        for company in samples::sample_companies()? {
            added.push(self.add(company)?);
        }
        info!(count = added.len(), "Seeded sample companies");
        Ok(added)
    }

    // --- Reads ---

    /// Point lookup straight from the backend.
    pub fn get_by_id(&self, id: CompanyId) -> Result<Option<Company>> {
        self.backend.get(id).map_err(|e| {
            error!(company_id = %id, error = %e, "Failed to read company");
            RegistryError::read("get_by_id", e)
        })
    }

    /// Answer a page request from the snapshot, loading it first if absent.
    pub fn get_page(&self, request: &PageRequest) -> Result<Page> {
        self.cache.page(request, || self.scan())
    }

    /// Fetch the page `state` points at, moving it back to the last page
    /// when it points past the end.
    pub fn load_view(&self, state: &mut TableState) -> Result<Page> {
        let page = self.get_page(&state.request())?;
        if !state.apply_total_pages(page.total_pages) {
            return Ok(page);
        }

        debug!(page = state.page(), "Clamped view to last page");
        self.get_page(&state.request())
    }

    /// The held snapshot, if loaded.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.cache.current()
    }

    /// Drop the held snapshot; the next page request reloads it.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Reload the snapshot now and notify subscribers.
    pub fn reload(&self) -> Result<Snapshot> {
        let lock = self.write_lock.lock();
        let snapshot = self.cache.reload(|| self.scan());
        drop(lock);

        let snapshot = snapshot.map_err(|e| {
            error!(error = %e, "Failed to reload companies");
            e
        })?;
        self.notifier.notify(&snapshot);
        Ok(snapshot)
    }

    // --- Subscriptions ---

    /// Register a callback and reload, so every subscriber (the new one
    /// included) receives the current records.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Company]) + Send + Sync + 'static,
    {
        let subscription = self.notifier.subscribe(callback);
        let _ = self.reload();
        subscription
    }

    /// Register a bounded channel subscriber and reload.
    pub fn subscribe_channel(&self, buffer_size: usize) -> SubscriptionHandle {
        let handle = self.notifier.subscribe_channel(buffer_size);
        let _ = self.reload();
        handle
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // --- Housekeeping ---

    pub fn stats(&self) -> Result<RegistryStats> {
        let record_count = self
            .backend
            .len()
            .map_err(|e| RegistryError::read("stats", e))?;

        Ok(RegistryStats {
            record_count,
            snapshot_loaded: self.cache.is_loaded(),
            snapshot_generation: self.cache.generation(),
            subscriber_count: self.notifier.subscription_count(),
        })
    }

    /// Flush the backend.
    pub fn sync(&self) -> Result<()> {
        self.backend.sync().map_err(|e| {
            error!(error = %e, "Failed to sync company store");
            RegistryError::write("sync", e)
        })
    }

    fn scan(&self) -> Result<Vec<Company>> {
        self.backend
            .scan()
            .map_err(|e| RegistryError::read("scan", e))
    }

    /// Invalidate and reload after a mutation. A failed reload leaves the
    /// cache empty and is only logged; the mutation itself has committed.
    fn refresh(&self) -> Option<Snapshot> {
        match self.cache.reload(|| self.scan()) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!(error = %e, "Failed to reload companies after mutation");
                None
            }
        }
    }

    fn deliver(&self, snapshot: Option<Snapshot>) {
        if let Some(snapshot) = snapshot {
            self.notifier.notify(&snapshot);
        }
    }
}
