//! Briar - a disk-resident B+-tree secondary index in Rust
//!
//! This crate implements a paged B+-tree that maps variable-length byte
//! string keys to opaque record identifiers (the (page, slot) address of
//! an external tuple). Point insertion, deletion, exact lookup, and
//! bounded range scans are supported.
//!
//! # Architecture
//!
//! The engine is organised in layers, leaves first:
//!
//! - **Storage Layer** (`storage`): disk I/O and page organisation
//!   - `DiskManager`: reads and writes pages of a single database file
//!   - `SlottedPage`: ordered variable-length records within a page,
//!     with sibling links and a node-type tag in the header
//!   - `CatalogPage`: the database directory at page 0
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: caches pages in a fixed set of frames
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pin/unpin with dirty tracking
//!
//! - **Catalog** (`catalog`): maps index file names to header pages
//!
//! - **Index** (`index`): the B+-tree itself
//!   - `LeafPage`/`IndexPage`: the two node kinds over the slotted substrate
//!   - `BTreeFile`: recursive insert/delete/search with splits, sibling
//!     redistribution, and merges
//!   - `BTreeScan`: forward cursor over the leaf chain
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use briar::buffer::BufferPoolManager;
//! use briar::storage::disk::DiskManager;
//! use briar::index::BTreeFile;
//! use briar::{PageId, RecordId, SlotId};
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! let mut index = BTreeFile::open("orders_by_customer", bpm).unwrap();
//! index
//!     .insert(b"acme", RecordId::new(PageId::new(12), SlotId::new(3)))
//!     .unwrap();
//!
//! let mut scan = index.open_scan(Some(b"a"), Some(b"b")).unwrap();
//! while let Some((key, rid)) = scan.next().unwrap() {
//!     println!("{:?} -> {}", key, rid);
//! }
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{BriarError, PageId, RecordId, Result, SlotId};
pub use index::{BTreeFile, BTreeScan};
