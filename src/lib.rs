//! shardpool - a sharded buffer pool for disk-backed storage engines.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        Index structures / query execution (not in this crate)   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                ↓  BufferPool trait
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 ParallelBufferPoolManager                       │
//! │        routes page_id → instance[page_id mod N]                 │
//! │  ┌───────────────────┐ ┌───────────────────┐                    │
//! │  │ BufferPoolInstance│ │ BufferPoolInstance│  ...               │
//! │  │ frames + table +  │ │ frames + table +  │                    │
//! │  │ free list + LRU   │ │ free list + LRU   │                    │
//! │  └───────────────────┘ └───────────────────┘                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                ↓  PageStore trait
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            Storage (storage/): DiskManager, MemoryStore         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool management and eviction policies
//! - [`storage`] - Page store trait, disk and in-memory stores
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use shardpool::{DiskManager, ParallelBufferPoolManager};
//!
//! let dm = DiskManager::open_or_create("my_database.db").unwrap();
//! let pool = ParallelBufferPoolManager::new(4, 64, Arc::new(dm));
//!
//! let page_id = {
//!     let mut guard = pool.new_page_guard().unwrap();
//!     guard.as_mut_slice()[0] = 0xAB;
//!     guard.page_id()
//! };
//! pool.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{BufferPoolConfig, Error, FrameId, PageId, Result};

pub use buffer::{
    BufferPool, BufferPoolInstance, BufferPoolStats, PageHandle, PageReadGuard, PageWriteGuard,
    ParallelBufferPoolManager, StatsSnapshot,
};
pub use storage::{DiskManager, MemoryStore, Page, PageStore};
