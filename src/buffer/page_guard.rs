//! Handles and RAII guards for page access.
//!
//! - [`PageHandle`] - A pinned page; the caller unpins it explicitly
//! - [`PageReadGuard`] - Shared read access, unpins clean on drop
//! - [`PageWriteGuard`] - Exclusive write access, unpins dirty on drop
//!
//! Page bytes are latched separately from the pool's metadata lock. Never
//! call back into the pool while holding a latch from [`PageHandle::read`]
//! or [`PageHandle::write`]; the guards release their latch before they
//! unpin.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::common::{FrameId, PageId};
use crate::storage::Page;

use super::buffer_pool_instance::BufferPoolInstance;

/// A page pinned in the buffer pool.
///
/// Returned by fetch and new-page. The pin is a manual reference count:
/// every handle obtained must be matched by exactly one `unpin_page` call,
/// and the handle must not be used afterwards.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use shardpool::{BufferPoolInstance, MemoryStore};
///
/// let bpm = BufferPoolInstance::new(4, Arc::new(MemoryStore::new()));
/// let handle = bpm.new_page().unwrap();
/// handle.write().as_mut_slice()[0] = 0xAB;
/// bpm.unpin_page(handle.page_id(), true).unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PageHandle<'a> {
    page_id: PageId,
    frame_id: FrameId,
    latch: &'a RwLock<Page>,
}

impl<'a> PageHandle<'a> {
    pub(crate) fn new(page_id: PageId, frame_id: FrameId, latch: &'a RwLock<Page>) -> Self {
        Self {
            page_id,
            frame_id,
            latch,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Latch the page bytes for reading.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'a, Page> {
        self.latch.read()
    }

    /// Latch the page bytes for writing.
    ///
    /// Writing does not mark the page dirty; pass `is_dirty = true` when
    /// unpinning.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'a, Page> {
        self.latch.write()
    }
}

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
/// The page is automatically unpinned (clean) when the guard is dropped.
pub struct PageReadGuard<'a> {
    bpm: &'a BufferPoolInstance,
    page_id: PageId,
    frame_id: FrameId,
    /// `Option` so the latch can be released before unpinning.
    lock: Option<RwLockReadGuard<'a, Page>>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolInstance, handle: PageHandle<'a>) -> Self {
        Self {
            bpm,
            page_id: handle.page_id(),
            frame_id: handle.frame_id(),
            lock: Some(handle.read()),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        self.lock.as_ref().expect("latch held until drop")
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.take();
        if let Err(e) = self.bpm.unpin_page(self.page_id, false) {
            warn!(page_id = %self.page_id, error = %e, "read guard failed to unpin");
        }
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time. The page is
/// marked dirty and unpinned when the guard is dropped.
pub struct PageWriteGuard<'a> {
    bpm: &'a BufferPoolInstance,
    page_id: PageId,
    frame_id: FrameId,
    /// `Option` so the latch can be released before unpinning.
    lock: Option<RwLockWriteGuard<'a, Page>>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolInstance, handle: PageHandle<'a>) -> Self {
        Self {
            bpm,
            page_id: handle.page_id(),
            frame_id: handle.frame_id(),
            lock: Some(handle.write()),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        self.lock.as_ref().expect("latch held until drop")
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.lock.as_mut().expect("latch held until drop")
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.take();
        if let Err(e) = self.bpm.unpin_page(self.page_id, true) {
            warn!(page_id = %self.page_id, error = %e, "write guard failed to unpin");
        }
    }
}
