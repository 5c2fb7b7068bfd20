//! Storage layer - the page store behind the buffer pool.
//!
//! The buffer pool only talks to storage through the [`PageStore`] trait:
//! - [`DiskManager`] - Single-file store, page N at offset `N × PAGE_SIZE`
//! - [`MemoryStore`] - In-memory store for tests and embedding
//! - [`Page`] - The raw 4KB data container

mod disk_manager;
mod memory_store;
mod page;

pub use disk_manager::DiskManager;
pub use memory_store::MemoryStore;
pub use page::Page;

use crate::common::{PageId, Result};

/// Synchronous, blocking page storage.
///
/// Page ids are chosen by the buffer pool (each shard strides through its own
/// residue class), so the store only needs to be told which ids are live.
/// Implementations synchronize internally: several shards call into one
/// store concurrently.
///
/// Failures are assumed to be catastrophic; the buffer pool never retries.
pub trait PageStore: Send + Sync {
    /// Read the page's bytes into `page`.
    ///
    /// A page that was allocated but never written reads back as zeroes.
    fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Persist `page` as the contents of `page_id`.
    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()>;

    /// Reserve space for a freshly allocated page id.
    fn allocate_page(&self, page_id: PageId) -> Result<()>;

    /// Release a page id that is no longer in use.
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;
}
