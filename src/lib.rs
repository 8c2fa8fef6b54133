//! # Company Registry
//!
//! A persistent store of company records with a paged, filtered, sorted
//! query layer and change notifications.
//!
//! ## Core Concepts
//!
//! - **Store**: Append-only log of company records with a schema version
//!   and secondary indexes on company and director name
//! - **Snapshot**: One in-memory copy of the whole collection, reloaded
//!   after every mutation
//! - **Pages**: Filter by director, stable sort, 1-based slicing
//! - **Subscribers**: Callbacks or channels told about every new snapshot
//!
//! ## Example
//!
//! ```ignore
//! use company_registry::{Address, NewCompany, PageRequest, Registry, StoreConfig};
//!
//! let registry = Registry::open(StoreConfig {
//!     path: "./companies".into(),
//!     ..Default::default()
//! })?;
//!
//! registry.add(NewCompany::new(
//!     "Vector LLC",
//!     "Ivanov I.I.",
//!     "+7 000 123 45 67",
//!     Address::new("Moscow", "Lenina", "1"),
//! ))?;
//!
//! let page = registry.get_page(&PageRequest::new(1, 5).with_filter("ivanov"))?;
//! ```

pub mod backend;
pub mod error;
pub mod query;
pub mod records;
pub mod registry;
pub mod samples;
pub mod store;
pub mod subscriptions;
pub mod types;
pub mod view;

// Re-exports
pub use backend::{MemoryBackend, RecordBackend};
pub use error::{RegistryError, Result};
pub use query::{Page, PageRequest, QueryCache, Snapshot};
pub use records::{EntryLog, RecordIndex};
pub use registry::{Registry, RegistryStats};
pub use samples::sample_companies;
pub use store::{LogStore, StoreConfig, INDEXES, SCHEMA_VERSION};
pub use subscriptions::{
    ChangeNotifier, DropReason, Observer, SnapshotEvent, Subscription, SubscriptionHandle,
    SubscriptionId,
};
pub use types::*;
pub use view::{page_window, PageLink, TableState, DEFAULT_PAGE_SIZE};
