//! Threaded tests for the store, snapshot and notification ordering.

use company_registry::{
    Address, Company, CompanyId, LogStore, MemoryBackend, NewCompany, PageRequest, RecordBackend,
    Registry, Result, StoreConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> LogStore {
    LogStore::open(StoreConfig {
        path: dir.path().join("companies"),
        record_cache_size: 8,
        ..Default::default()
    })
    .unwrap()
}

fn company(name: &str, director: &str) -> NewCompany {
    NewCompany::new(name, director, "+7 000", Address::new("Moscow", "Lenina", "1"))
}

/// Names follow ids so a read at the wrong offset shows up as a mismatch.
fn assert_consistent(records: &[Company], base: u64) {
    for pair in records.windows(2) {
        assert!(pair[0].id < pair[1].id, "scan out of id order");
    }
    for record in records {
        assert_eq!(record.company_name, format!("C{}", record.id));
    }
    for id in 1..=base {
        assert!(
            records.iter().any(|c| c.id == CompanyId(id)),
            "live company {} missing from scan",
            id
        );
    }
}

// --- Store ---

#[test]
fn test_scan_during_churn_and_compaction() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir));

    for i in 1..=200u64 {
        store.insert(company(&format!("C{}", i), "Base")).unwrap();
    }

    let stop = Arc::new(AtomicBool::new(false));
    let writer = {
        let store = Arc::clone(&store);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut round = 0u64;
            while !stop.load(Ordering::SeqCst) {
                let next = store.stats().next_id;
                let added = store
                    .insert(company(&format!("C{}", next), "Churn"))
                    .unwrap();
                assert_eq!(added.id, CompanyId(next));
                store.remove(added.id).unwrap();
                round += 1;
                if round % 10 == 0 {
                    store.compact().unwrap();
                }
            }
        })
    };

    for _ in 0..300 {
        let records = store.scan().unwrap();
        assert_consistent(&records, 200);
    }

    stop.store(true, Ordering::SeqCst);
    writer.join().unwrap();
    assert_eq!(store.len().unwrap(), 200);
}

#[test]
fn test_update_never_hides_record() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir));
    let mut acme = store.insert(company("C1", "Ivanov")).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let writer = {
        let store = Arc::clone(&store);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut flip = false;
            while !stop.load(Ordering::SeqCst) {
                flip = !flip;
                acme.director_full_name = if flip { "Petrov" } else { "Ivanov" }.into();
                store.put(&acme).unwrap();
            }
        })
    };

    for _ in 0..500 {
        let records = store.scan().unwrap();
        assert_eq!(records.len(), 1);
        assert!(store.get(CompanyId(1)).unwrap().is_some());
        assert_eq!(store.ids_by_company_name("C1"), vec![CompanyId(1)]);
    }

    stop.store(true, Ordering::SeqCst);
    writer.join().unwrap();
}

// --- Registry ---

#[test]
fn test_parallel_adds_keep_snapshot_and_order() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(Registry::new(open_store(&dir)));

    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sizes_clone = Arc::clone(&sizes);
    let _sub = registry.subscribe(move |records| {
        sizes_clone.lock().unwrap().push(records.len());
    });

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..50 {
                    registry
                        .add(company(&format!("T{}-{}", t, i), "Director"))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let sizes = sizes.lock().unwrap();
    assert!(
        sizes.windows(2).all(|pair| pair[0] < pair[1]),
        "subscriber saw an older snapshot after a newer one"
    );
    assert_eq!(sizes.last(), Some(&400));

    let snapshot = registry.snapshot().unwrap();
    assert_eq!(snapshot.records(), registry.backend().scan().unwrap().as_slice());
}

#[test]
fn test_parallel_mixed_mutations_match_store() {
    let registry = Arc::new(Registry::new(MemoryBackend::new()));
    for i in 0..20 {
        registry.add(company(&format!("Seed {}", i), "Director")).unwrap();
    }

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..25u64 {
                    let added = registry.add(company("New", "Director")).unwrap();
                    if i % 2 == 0 {
                        registry.delete(CompanyId(t * 5 + i % 5 + 1)).unwrap();
                    } else {
                        let mut renamed = added.clone();
                        renamed.company_name = format!("Renamed {}", t);
                        registry.update(&renamed).unwrap();
                    }
                    registry.get_page(&PageRequest::new(1, 5)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = registry.snapshot().unwrap();
    assert_eq!(snapshot.records(), registry.backend().scan().unwrap().as_slice());
}

/// Backend whose scans are slow and counted.
struct SlowScan {
    inner: MemoryBackend,
    scans: AtomicUsize,
}

impl RecordBackend for SlowScan {
    fn insert(&self, company: NewCompany) -> Result<Company> {
        self.inner.insert(company)
    }

    fn put(&self, company: &Company) -> Result<()> {
        self.inner.put(company)
    }

    fn remove(&self, id: CompanyId) -> Result<bool> {
        self.inner.remove(id)
    }

    fn get(&self, id: CompanyId) -> Result<Option<Company>> {
        self.inner.get(id)
    }

    fn scan(&self) -> Result<Vec<Company>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        self.inner.scan()
    }

    fn len(&self) -> Result<usize> {
        self.inner.len()
    }
}

#[test]
fn test_reader_waits_for_in_flight_load() {
    let backend = SlowScan {
        inner: MemoryBackend::new(),
        scans: AtomicUsize::new(0),
    };
    for i in 0..7 {
        backend.insert(company(&format!("C{}", i), "Director")).unwrap();
    }
    let registry = Arc::new(Registry::new(backend));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.get_page(&PageRequest::new(2, 5)).unwrap())
        })
        .collect();

    for reader in readers {
        let page = reader.join().unwrap();
        assert_eq!(page.total_records, 7);
        assert_eq!(page.records.len(), 2);
    }
    assert_eq!(registry.backend().scans.load(Ordering::SeqCst), 1);
}
