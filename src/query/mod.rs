//! Snapshot cache and page queries.
//!
//! Page requests are answered from an in-memory [`Snapshot`] of the whole
//! collection, loaded on first use and replaced after every mutation.

mod cache;
mod page;

pub use cache::{QueryCache, Snapshot};
pub use page::{Page, PageRequest};
