//! The page-access interface consumed by the layers above the buffer pool.

use crate::buffer::{BufferPoolInstance, PageHandle, ParallelBufferPoolManager};
use crate::common::{PageId, Result};

/// Fetch, allocate, unpin, flush and delete pages.
///
/// Implemented by both [`BufferPoolInstance`] and
/// [`ParallelBufferPoolManager`], so index and execution code can hold a
/// `&dyn BufferPool` without caring whether the pool is sharded.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use shardpool::{BufferPool, MemoryStore, ParallelBufferPoolManager};
///
/// fn touch(pool: &dyn BufferPool) -> shardpool::Result<()> {
///     let handle = pool.new_page()?;
///     handle.write().as_mut_slice()[0] = 1;
///     pool.unpin_page(handle.page_id(), true)
/// }
///
/// let pool = ParallelBufferPoolManager::new(2, 4, Arc::new(MemoryStore::new()));
/// touch(&pool).unwrap();
/// ```
pub trait BufferPool: Send + Sync {
    /// Pin `page_id`, reading it from storage if it is not resident.
    fn fetch_page(&self, page_id: PageId) -> Result<PageHandle<'_>>;

    /// Allocate a fresh page id and pin a zeroed frame for it.
    fn new_page(&self) -> Result<PageHandle<'_>>;

    /// Drop one pin, OR-ing `is_dirty` into the page's dirty flag.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()>;

    /// Write one resident page to storage.
    fn flush_page(&self, page_id: PageId) -> Result<()>;

    /// Write every dirty resident page to storage.
    fn flush_all_pages(&self) -> Result<()>;

    /// Drop an unpinned page from the pool and release its id.
    fn delete_page(&self, page_id: PageId) -> Result<()>;

    /// Number of frames.
    fn pool_size(&self) -> usize;
}

macro_rules! impl_buffer_pool {
    ($pool:ty) => {
        impl BufferPool for $pool {
            fn fetch_page(&self, page_id: PageId) -> Result<PageHandle<'_>> {
                <$pool>::fetch_page(self, page_id)
            }

            fn new_page(&self) -> Result<PageHandle<'_>> {
                <$pool>::new_page(self)
            }

            fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
                <$pool>::unpin_page(self, page_id, is_dirty)
            }

            fn flush_page(&self, page_id: PageId) -> Result<()> {
                <$pool>::flush_page(self, page_id)
            }

            fn flush_all_pages(&self) -> Result<()> {
                <$pool>::flush_all_pages(self)
            }

            fn delete_page(&self, page_id: PageId) -> Result<()> {
                <$pool>::delete_page(self, page_id)
            }

            fn pool_size(&self) -> usize {
                <$pool>::pool_size(self)
            }
        }
    };
}

impl_buffer_pool!(BufferPoolInstance);
impl_buffer_pool!(ParallelBufferPoolManager);
