//! File-backed record store.

use crate::backend::RecordBackend;
use crate::error::{RegistryError, Result};
use crate::records::{EntryLog, EntryOp, RecordIndex};
use crate::types::{Company, CompanyId, NewCompany, StoreStats};
use fs2::FileExt;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding the store.
    pub path: PathBuf,

    /// Requested schema version. A higher version than the one on disk
    /// drops and recreates the collection.
    pub schema_version: u32,

    /// Point-lookup cache size (number of records).
    pub record_cache_size: usize,

    /// Fsync the log every N writes.
    pub sync_interval: u64,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./companies"),
            schema_version: SCHEMA_VERSION,
            record_cache_size: 256,
            sync_interval: EntryLog::DEFAULT_SYNC_INTERVAL,
            create_if_missing: true,
        }
    }
}

/// Current schema version of the company collection.
pub const SCHEMA_VERSION: u32 = 2;

/// Secondary indexes declared on the collection (non-unique).
pub const INDEXES: [&str; 2] = ["companyName", "directorFullName"];

/// Magic bytes for store manifest.
const STORE_MAGIC: &[u8; 4] = b"CRS\0";

/// Current manifest format.
const STORE_FORMAT: u8 = 1;

const LOG_FILE: &str = "companies.log";

/// A persistent, single-collection company store.
///
/// Each write appends one entry to the log and is applied to the index only
/// once the append succeeded.
pub struct LogStore {
    /// Store configuration.
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Entry log.
    log: EntryLog,

    /// Key and secondary indexes. Readers hold this across their log reads
    /// and compaction holds it exclusively across the file swap.
    index: RwLock<RecordIndex>,

    /// Recently read records.
    cache: Mutex<LruCache<CompanyId, Company>>,

    /// Next identifier to assign. Held for the duration of every write.
    write_lock: Mutex<CompanyId>,
}

impl LogStore {
    /// Open the store, creating or migrating it as needed.
    ///
    /// Every failure is reported as [`RegistryError::StoreUnavailable`].
    pub fn open(config: StoreConfig) -> Result<Self> {
        let path = config.path.clone();
        Self::open_inner(config).map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to open company store");
            match e {
                RegistryError::StoreUnavailable { .. } => e,
                other => RegistryError::unavailable(other),
            }
        })
    }

    fn open_inner(config: StoreConfig) -> Result<Self> {
        if config.schema_version == 0 {
            return Err(RegistryError::InvalidOperation(
                "Schema version must be at least 1".into(),
            ));
        }

        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(RegistryError::unavailable(format!(
                    "No store at {}",
                    config.path.display()
                )));
            }
            fs::create_dir_all(&config.path)?;
        }

        let lock_file = Self::acquire_lock(&config.path)?;
        let log_path = config.path.join(LOG_FILE);

        match Self::read_manifest(&config.path)? {
            Some(stored) if stored > config.schema_version => {
                return Err(RegistryError::unavailable(format!(
                    "Requested schema version {} is older than stored version {}",
                    config.schema_version, stored
                )));
            }
            Some(stored) if stored == config.schema_version => {}
            stored => {
                // Upgrade drops the old collection and recreates it empty
                if log_path.exists() {
                    fs::remove_file(&log_path)?;
                }
                Self::write_manifest(&config.path, config.schema_version)?;
                info!(
                    path = %config.path.display(),
                    from = stored.unwrap_or(0),
                    to = config.schema_version,
                    indexes = ?INDEXES,
                    "Created company collection"
                );
            }
        }

        let log = EntryLog::open_with_sync_interval(&log_path, config.sync_interval)?;
        let mut index = RecordIndex::new();
        let next_id = Self::replay(&log, &mut index)?;

        let cache_size = NonZeroUsize::new(config.record_cache_size).unwrap_or(NonZeroUsize::MIN);

        info!(
            path = %config.path.display(),
            records = index.count(),
            next_id = %next_id,
            "Opened company store"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            index: RwLock::new(index),
            cache: Mutex::new(LruCache::new(cache_size)),
            write_lock: Mutex::new(next_id),
        })
    }

    /// Rebuild the indexes from the log. Returns the next identifier to assign.
    fn replay(log: &EntryLog, index: &mut RecordIndex) -> Result<CompanyId> {
        let mut next_id = CompanyId(1);
        let mut entries = 0usize;

        for result in log.iter_from(0)? {
            let (offset, entry) = result?;
            entries += 1;

            match (entry.op, entry.company) {
                (EntryOp::Put, Some(company)) => {
                    index.put(
                        entry.id,
                        offset,
                        &company.company_name,
                        &company.director_full_name,
                    );
                    next_id = next_id.max(entry.id.next());
                }
                (EntryOp::Put, None) => {
                    return Err(RegistryError::Corruption {
                        id: entry.id,
                        detail: "put entry without payload".into(),
                    });
                }
                (EntryOp::Delete, _) => {
                    index.remove(entry.id);
                    next_id = next_id.max(entry.id.next());
                }
                (EntryOp::Reserve, _) => {
                    next_id = next_id.max(entry.id);
                }
            }
        }

        debug!(entries, live = index.count(), "Replayed company log");
        Ok(next_id)
    }

    // --- Queries beyond the backend trait ---

    /// Identifiers of companies with exactly this name.
    pub fn ids_by_company_name(&self, name: &str) -> Vec<CompanyId> {
        self.index.read().get_by_company_name(name)
    }

    /// Identifiers of companies with exactly this director.
    pub fn ids_by_director(&self, name: &str) -> Vec<CompanyId> {
        self.index.read().get_by_director(name)
    }

    /// Rewrite the log keeping only live records. Returns bytes reclaimed.
    pub fn compact(&self) -> Result<u64> {
        let next_id = self.write_lock.lock();
        let mut index = self.index.write();

        let live = self.read_indexed(&index)?;
        let (offsets, reclaimed) = self.log.compact(&live, *next_id)?;

        for (id, offset) in offsets {
            index.relocate(id, offset);
        }
        drop(index);

        info!(live = live.len(), reclaimed, "Compacted company store");
        Ok(reclaimed)
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        // Same lock order as writers: next id first, then the index
        let next_id = self.write_lock.lock();
        let record_count = self.index.read().count() as u64;

        StoreStats {
            record_count,
            log_size_bytes: self.log.size(),
            schema_version: self.config.schema_version,
            next_id: next_id.0,
        }
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn schema_version(&self) -> u32 {
        self.config.schema_version
    }

    fn read_record(&self, id: CompanyId, offset: u64) -> Result<Company> {
        let entry = self.log.read_at(offset)?;
        if entry.id != id {
            return Err(RegistryError::Corruption {
                id,
                detail: format!("index points at an entry for {}", entry.id),
            });
        }

        entry.company.ok_or_else(|| RegistryError::Corruption {
            id,
            detail: "index points at an entry without payload".into(),
        })
    }

    fn read_all(&self) -> Result<Vec<Company>> {
        let index = self.index.read();
        self.read_indexed(&index)
    }

    /// Read every live record. The caller holds the index lock.
    fn read_indexed(&self, index: &RecordIndex) -> Result<Vec<Company>> {
        let offsets = index.offsets();
        let mut companies = Vec::with_capacity(offsets.len());

        for (id, offset) in offsets {
            let cached = self.cache.lock().peek(&id).cloned();
            match cached {
                Some(company) => companies.push(company),
                None => companies.push(self.read_record(id, offset)?),
            }
        }

        Ok(companies)
    }

    // --- Private Helpers ---

    fn write_manifest(path: &Path, schema_version: u32) -> Result<()> {
        use std::io::Write;

        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_FORMAT])?;
        file.write_all(&schema_version.to_le_bytes())?;
        file.sync_all()?;

        Ok(())
    }

    /// Stored schema version, or `None` for a fresh directory.
    fn read_manifest(path: &Path) -> Result<Option<u32>> {
        use std::io::Read;

        let manifest_path = path.join("MANIFEST");
        if !manifest_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(manifest_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(RegistryError::InvalidFormat("Invalid store magic".into()));
        }

        let mut format = [0u8; 1];
        file.read_exact(&mut format)?;
        if format[0] != STORE_FORMAT {
            return Err(RegistryError::InvalidFormat(format!(
                "Unsupported store format: {}",
                format[0]
            )));
        }

        let mut version = [0u8; 4];
        file.read_exact(&mut version)?;
        Ok(Some(u32::from_le_bytes(version)))
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| RegistryError::unavailable("Store is locked by another process"))?;

        Ok(lock_file)
    }
}

impl RecordBackend for LogStore {
    fn insert(&self, company: NewCompany) -> Result<Company> {
        let mut next_id = self.write_lock.lock();

        let id = *next_id;
        let company = company.with_id(id);
        let offset = self.log.append(EntryOp::Put, id, Some(&company))?;

        {
            let mut index = self.index.write();
            index.put(id, offset, &company.company_name, &company.director_full_name);
            self.cache.lock().put(id, company.clone());
        }
        *next_id = id.next();

        debug!(company_id = %id, offset, "Appended company");
        Ok(company)
    }

    fn put(&self, company: &Company) -> Result<()> {
        let mut next_id = self.write_lock.lock();

        let offset = self.log.append(EntryOp::Put, company.id, Some(company))?;

        {
            // Cache and index change together so no reader pairs a new
            // offset with the old cached record.
            let mut index = self.index.write();
            index.put(
                company.id,
                offset,
                &company.company_name,
                &company.director_full_name,
            );
            self.cache.lock().put(company.id, company.clone());
        }
        if company.id >= *next_id {
            *next_id = company.id.next();
        }

        debug!(company_id = %company.id, offset, "Replaced company");
        Ok(())
    }

    fn remove(&self, id: CompanyId) -> Result<bool> {
        let _lock = self.write_lock.lock();

        if !self.index.read().contains(id) {
            return Ok(false);
        }

        self.log.append(EntryOp::Delete, id, None)?;
        {
            let mut index = self.index.write();
            index.remove(id);
            self.cache.lock().pop(&id);
        }

        debug!(company_id = %id, "Removed company");
        Ok(true)
    }

    fn get(&self, id: CompanyId) -> Result<Option<Company>> {
        if let Some(company) = self.cache.lock().get(&id).cloned() {
            return Ok(Some(company));
        }

        let index = self.index.read();
        let Some(offset) = index.get_offset(id) else {
            return Ok(None);
        };

        let company = self.read_record(id, offset)?;
        self.cache.lock().put(id, company.clone());
        Ok(Some(company))
    }

    fn scan(&self) -> Result<Vec<Company>> {
        self.read_all()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.index.read().count())
    }

    fn sync(&self) -> Result<()> {
        self.log.sync()
    }
}

impl Drop for LogStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.log.sync();
    }
}
