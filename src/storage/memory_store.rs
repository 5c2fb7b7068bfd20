//! In-memory page store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result};
use crate::storage::{Page, PageStore};

/// A [`PageStore`] that keeps every page in a hash map.
///
/// Useful for tests and benchmarks: it never touches the file system and
/// counts the reads and writes it serves, so callers can check exactly when
/// the buffer pool went to storage.
///
/// # Example
/// ```
/// use shardpool::{MemoryStore, Page, PageId, PageStore};
///
/// let store = MemoryStore::new();
/// let mut page = Page::new();
/// page.as_mut_slice()[0] = 7;
/// store.write_page(PageId::new(3), &page).unwrap();
/// assert_eq!(store.write_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: Mutex<HashMap<PageId, Box<Page>>>,
    allocated: Mutex<HashSet<PageId>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `read_page` calls served.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `write_page` calls served.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Whether `page_id` is currently allocated.
    pub fn is_allocated(&self, page_id: PageId) -> bool {
        self.allocated.lock().contains(&page_id)
    }

    /// Number of live (allocated, not yet deallocated) page ids.
    pub fn allocated_count(&self) -> usize {
        self.allocated.lock().len()
    }

    /// Copy of the persisted bytes of `page_id`, if it was ever written.
    pub fn stored_bytes(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.pages
            .lock()
            .get(&page_id)
            .map(|page| page.as_slice().to_vec())
    }
}

impl PageStore for MemoryStore {
    fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        match self.pages.lock().get(&page_id) {
            Some(stored) => page.copy_from(stored),
            None => page.reset(),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut pages = self.pages.lock();
        pages
            .entry(page_id)
            .or_insert_with(|| Box::new(Page::new()))
            .copy_from(page);
        Ok(())
    }

    fn allocate_page(&self, page_id: PageId) -> Result<()> {
        self.allocated.lock().insert(page_id);
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        self.allocated.lock().remove(&page_id);
        self.pages.lock().remove(&page_id);
        Ok(())
    }
}
