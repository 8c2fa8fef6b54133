//! Integration tests for the company registry.

use company_registry::{
    Address, CompanyId, LogStore, NewCompany, PageRequest, Registry, SnapshotEvent, SortDirection,
    SortField, StoreConfig, TableState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn config(dir: &TempDir) -> StoreConfig {
    StoreConfig {
        path: dir.path().join("companies"),
        record_cache_size: 16,
        ..Default::default()
    }
}

fn test_registry(dir: &TempDir) -> Registry<LogStore> {
    init_tracing();
    Registry::open(config(dir)).unwrap()
}

fn company(name: &str, director: &str) -> NewCompany {
    NewCompany::new(
        name,
        director,
        "+7 000 123 45 67",
        Address::new("Moscow", "Lenina", "1"),
    )
}

// --- Realistic Workflow Tests ---

#[test]
fn test_add_then_list() {
    let dir = TempDir::new().unwrap();
    let registry = test_registry(&dir);

    let added = registry.add(company("Vector LLC", "Ivanov I.I.")).unwrap();
    let page = registry.get_page(&PageRequest::new(1, 5)).unwrap();

    assert_eq!(page.total_records, 1);
    assert_eq!(page.records[0], added);
    assert_eq!(page.records[0].company_name, "Vector LLC");
}

#[test]
fn test_paging_seven_records() {
    let dir = TempDir::new().unwrap();
    let registry = test_registry(&dir);

    for i in 1..=7 {
        registry.add(company(&format!("Company {}", i), "Ivanov")).unwrap();
    }

    let first = registry.get_page(&PageRequest::new(1, 5)).unwrap();
    assert_eq!(first.records.len(), 5);
    assert_eq!(first.total_pages, 2);

    let second = registry.get_page(&PageRequest::new(2, 5)).unwrap();
    let ids: Vec<u64> = second.records.iter().map(|c| c.id.0).collect();
    assert_eq!(ids, vec![6, 7]);

    let past_end = registry.get_page(&PageRequest::new(3, 5)).unwrap();
    assert!(past_end.is_empty());
    assert_eq!(past_end.total_pages, 2);
}

#[test]
fn test_filter_and_sort() {
    let dir = TempDir::new().unwrap();
    let registry = test_registry(&dir);

    registry.add(company("Zeta", "Ivanov I.I.")).unwrap();
    registry.add(company("Alpha", "Petrov P.P.")).unwrap();
    registry.add(company("Acme", "IVANOVA A.A.")).unwrap();

    let page = registry
        .get_page(
            &PageRequest::new(1, 5)
                .with_filter("  ivanov ")
                .with_sort(SortField::CompanyName, SortDirection::Asc),
        )
        .unwrap();

    let names: Vec<&str> = page.records.iter().map(|c| c.company_name.as_str()).collect();
    assert_eq!(names, vec!["Acme", "Zeta"]);
    assert_eq!(page.total_records, 2);
}

#[test]
fn test_update_and_delete_roundtrip() {
    let dir = TempDir::new().unwrap();
    let registry = test_registry(&dir);

    let mut acme = registry.add(company("Acme", "Ivanov")).unwrap();
    acme.director_full_name = "Sidorov S.S.".into();
    registry.update(&acme).unwrap();

    let page = registry
        .get_page(&PageRequest::new(1, 5).with_filter("sidorov"))
        .unwrap();
    assert_eq!(page.records, vec![acme.clone()]);

    assert!(registry.delete(acme.id).unwrap());
    assert_eq!(registry.get_by_id(acme.id).unwrap(), None);
    assert!(registry.get_page(&PageRequest::new(1, 5)).unwrap().is_empty());
}

// --- Persistence ---

#[test]
fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let ids: Vec<CompanyId> = {
        let registry = test_registry(&dir);
        registry.seed_samples().unwrap().iter().map(|c| c.id).collect()
    };

    let registry = test_registry(&dir);
    let page = registry.get_page(&PageRequest::new(1, 5)).unwrap();
    let reopened: Vec<CompanyId> = page.records.iter().map(|c| c.id).collect();

    assert_eq!(reopened, ids);
    assert_eq!(page.records[1].director_full_name, "Сидоров С.С.");
}

#[test]
fn test_ids_not_reused_after_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let registry = test_registry(&dir);
        registry.add(company("A", "D")).unwrap();
        let b = registry.add(company("B", "D")).unwrap();
        registry.delete(b.id).unwrap();
    }

    let registry = test_registry(&dir);
    let c = registry.add(company("C", "D")).unwrap();
    assert_eq!(c.id, CompanyId(3));
}

#[test]
fn test_compaction_keeps_records_and_ids() {
    let dir = TempDir::new().unwrap();
    {
        let registry = test_registry(&dir);
        for i in 0..10 {
            registry.add(company(&format!("C{}", i), "D")).unwrap();
        }
        for id in 1..=9 {
            registry.delete(CompanyId(id)).unwrap();
        }
        let reclaimed = registry.backend().compact().unwrap();
        assert!(reclaimed > 0);
    }

    let registry = test_registry(&dir);
    let page = registry.get_page(&PageRequest::new(1, 5)).unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].id, CompanyId(10));

    let next = registry.add(company("Next", "D")).unwrap();
    assert_eq!(next.id, CompanyId(11));
}

#[test]
fn test_schema_upgrade_recreates_collection() {
    let dir = TempDir::new().unwrap();
    {
        let registry = test_registry(&dir);
        registry.seed_samples().unwrap();
    }

    let registry = Registry::open(StoreConfig {
        schema_version: 3,
        ..config(&dir)
    })
    .unwrap();

    assert_eq!(registry.backend().schema_version(), 3);
    assert!(registry.get_page(&PageRequest::new(1, 5)).unwrap().is_empty());
}

// --- Notifications ---

#[test]
fn test_subscriber_sees_every_mutation() {
    let dir = TempDir::new().unwrap();
    let registry = test_registry(&dir);

    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sizes_clone = Arc::clone(&sizes);
    let sub = registry.subscribe(move |records| {
        sizes_clone.lock().unwrap().push(records.len());
    });

    let a = registry.add(company("A", "D")).unwrap();
    registry.add(company("B", "D")).unwrap();
    registry.delete(a.id).unwrap();

    assert_eq!(*sizes.lock().unwrap(), vec![0, 1, 2, 1]);

    sub.unsubscribe();
    registry.add(company("C", "D")).unwrap();
    assert_eq!(sizes.lock().unwrap().len(), 4);
}

#[test]
fn test_every_subscriber_refreshed_on_subscribe() {
    let dir = TempDir::new().unwrap();
    let registry = test_registry(&dir);
    registry.add(company("A", "D")).unwrap();

    let first_calls = Arc::new(AtomicUsize::new(0));
    let first_clone = Arc::clone(&first_calls);
    let _first = registry.subscribe(move |_| {
        first_clone.fetch_add(1, Ordering::SeqCst);
    });
    let _second = registry.subscribe(|_| {});

    assert_eq!(first_calls.load(Ordering::SeqCst), 2);
    assert_eq!(registry.stats().unwrap().subscriber_count, 2);
}

#[test]
fn test_channel_subscriber() {
    let dir = TempDir::new().unwrap();
    let registry = test_registry(&dir);
    let handle = registry.subscribe_channel(16);

    registry.add(company("A", "D")).unwrap();

    let mut last_len = None;
    while let Ok(event) = handle.recv_timeout(Duration::from_millis(50)) {
        if let SnapshotEvent::Changed { records, .. } = event {
            last_len = Some(records.len());
        }
    }
    assert_eq!(last_len, Some(1));

    assert!(registry.unsubscribe(handle.id));
    assert!(!registry.unsubscribe(handle.id));
}

// --- Table view ---

#[test]
fn test_view_clamps_after_delete() {
    let dir = TempDir::new().unwrap();
    let registry = test_registry(&dir);
    for i in 1..=6 {
        registry.add(company(&format!("C{}", i), "D")).unwrap();
    }

    let mut state = TableState::default();
    registry.load_view(&mut state).unwrap();
    assert_eq!(state.total_pages(), 2);
    assert!(state.go_to_page(2));

    registry.delete(CompanyId(6)).unwrap();
    let page = registry.load_view(&mut state).unwrap();

    assert_eq!(state.page(), 1);
    assert_eq!(page.records.len(), 5);
}

#[test]
fn test_view_sort_toggle() {
    let dir = TempDir::new().unwrap();
    let registry = test_registry(&dir);
    registry.add(company("Beta", "D")).unwrap();
    registry.add(company("alpha", "D")).unwrap();
    registry.add(company("Gamma", "D")).unwrap();

    let mut state = TableState::default();
    state.toggle_sort(SortField::CompanyName);
    let asc = registry.load_view(&mut state).unwrap();
    assert_eq!(asc.records[0].company_name, "alpha");

    state.toggle_sort(SortField::CompanyName);
    let desc = registry.load_view(&mut state).unwrap();
    assert_eq!(desc.records[0].company_name, "Gamma");

    state.toggle_sort(SortField::CompanyName);
    let unsorted = registry.load_view(&mut state).unwrap();
    assert_eq!(unsorted.records[0].company_name, "Beta");
}
