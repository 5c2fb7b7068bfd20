//! Buffer Pool Instance - the core page caching layer.
//!
//! A [`BufferPoolInstance`] provides:
//! - Page caching between the page store and memory
//! - Pin-based reference counting
//! - Dirty page write-back on eviction and flush
//! - Shard-strided page id allocation, so several instances can split one
//!   page id space (see [`ParallelBufferPoolManager`])
//!
//! [`ParallelBufferPoolManager`]: crate::buffer::ParallelBufferPoolManager

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::buffer::replacer::{LruReplacer, Replacer};
use crate::buffer::stats::StatsSnapshot;
use crate::buffer::{BufferPoolStats, Frame, PageHandle, PageReadGuard, PageWriteGuard};
use crate::common::{BufferPoolConfig, Error, FrameId, PageId, Result};
use crate::storage::{Page, PageStore};

/// Manages a fixed pool of frames caching pages of a [`PageStore`].
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                    BufferPoolInstance                        │
/// │  ┌──────────────────── Mutex<PoolState> ──────────────────┐  │
/// │  │ ┌────────────┐ ┌────────────┐ ┌───────────┐ ┌────────┐ │  │
/// │  │ │ page_table │ │ free_list  │ │ replacer  │ │ frames │ │  │
/// │  │ │PageId → Fid│ │Vec<FrameId>│ │LruReplacer│ │metadata│ │  │
/// │  │ └────────────┘ └────────────┘ └───────────┘ └────────┘ │  │
/// │  └────────────────────────────────────────────────────────┘  │
/// │  ┌────────────────────────────────────────┐  ┌───────────┐   │
/// │  │ pages: [RwLock<Page>; pool_size]       │  │   store   │   │
/// │  └────────────────────────────────────────┘  └───────────┘   │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `state`: one `Mutex` held for the whole of every public operation,
///   including page store I/O
/// - `pages`: one `RwLock` per frame, so pinned pages can be read and written
///   without the instance lock
/// - `stats`: atomic counters
///
/// Lock order is always instance lock, then page latch.
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use shardpool::{BufferPoolInstance, MemoryStore};
///
/// let bpm = BufferPoolInstance::new(10, Arc::new(MemoryStore::new()));
///
/// let handle = bpm.new_page().unwrap();
/// let page_id = handle.page_id();
/// handle.write().as_mut_slice()[0] = 0xAB;
/// bpm.unpin_page(page_id, true).unwrap();
///
/// let guard = bpm.fetch_page_read(page_id).unwrap();
/// assert_eq!(guard.as_slice()[0], 0xAB);
/// ```
pub struct BufferPoolInstance {
    /// Page bytes, one latch per frame. Allocated once, never resized.
    pages: Box<[RwLock<Page>]>,

    /// Everything that must change together.
    state: Mutex<PoolState>,

    /// Backing storage, shared with sibling shards.
    store: Arc<dyn PageStore>,

    /// Performance statistics.
    stats: BufferPoolStats,

    pool_size: usize,
    num_instances: u32,
    instance_index: u32,
}

/// Page table, free list, replacer and frame metadata.
///
/// Invariants, checked by [`PoolState::check`]:
/// - `page_table.len() + free_list.len() == frames.len()`
/// - `page_table[p] == f` implies `frames[f].page_id() == p`
/// - free frames are empty
/// - a frame is a replacer candidate iff it is resident and unpinned
struct PoolState {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    /// Stack of free frame IDs.
    free_list: Vec<FrameId>,
    replacer: Box<dyn Replacer>,
    /// Next id this instance hands out; advances by `num_instances`.
    next_page_id: Option<u32>,
}

impl BufferPoolInstance {
    /// Create a standalone (unsharded) instance.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, store: Arc<dyn PageStore>) -> Self {
        Self::new_sharded(pool_size, 1, 0, store)
    }

    /// Create instance `instance_index` of a pool split into
    /// `num_instances` shards.
    ///
    /// # Panics
    /// Panics if `pool_size` or `num_instances` is 0, or if
    /// `instance_index >= num_instances`.
    pub fn new_sharded(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        store: Arc<dyn PageStore>,
    ) -> Self {
        let replacer = Box::new(LruReplacer::new(pool_size));
        Self::with_replacer(pool_size, num_instances, instance_index, store, replacer)
    }

    /// Create a standalone instance sized by `config.pool_size`.
    pub fn from_config(config: &BufferPoolConfig, store: Arc<dyn PageStore>) -> Self {
        config.validate();
        Self::new(config.pool_size, store)
    }

    /// Create an instance with a custom eviction policy.
    ///
    /// The replacer must start empty and accept frame ids below `pool_size`.
    pub fn with_replacer(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        store: Arc<dyn PageStore>,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");
        assert!(num_instances > 0, "num_instances must be > 0");
        assert!(
            instance_index < num_instances,
            "instance_index {} out of range for {} instances",
            instance_index,
            num_instances
        );
        assert_eq!(replacer.size(), 0, "replacer must start empty");

        // Allocate all frames upfront
        let pages: Box<[RwLock<Page>]> = (0..pool_size).map(|_| RwLock::new(Page::new())).collect();

        // All frames start on the free list; popping from the back hands out
        // frame 0 first.
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        debug!(pool_size, num_instances, instance_index, "buffer pool instance created");

        Self {
            pages,
            state: Mutex::new(PoolState {
                frames: vec![Frame::new(); pool_size],
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                replacer,
                next_page_id: Some(instance_index),
            }),
            store,
            stats: BufferPoolStats::new(),
            pool_size,
            num_instances,
            instance_index,
        }
    }

    // ========================================================================
    // Public API: Fetch and create pages
    // ========================================================================

    /// Pin `page_id` in the pool, reading it from the store on a miss.
    ///
    /// A hit leaves the dirty flag as it was; only `unpin_page` and flushes
    /// change it.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if the page is not resident and every frame
    ///   is pinned
    /// - `Error::InvalidPageId` for the sentinel id
    /// - I/O errors from the store
    pub fn fetch_page(&self, page_id: PageId) -> Result<PageHandle<'_>> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let mut state = self.state.lock();

        // Cache hit
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.frames[frame_id.0].pin();
            state.replacer.pin(frame_id);
            BufferPoolStats::bump(&self.stats.cache_hits);
            trace!(%page_id, %frame_id, "cache hit");
            return Ok(self.handle(page_id, frame_id));
        }

        // Cache miss: need to load from the store
        BufferPoolStats::bump(&self.stats.cache_misses);
        let frame_id = self.acquire_frame(&mut state)?;

        {
            let mut page = self.pages[frame_id.0].write();
            if let Err(e) = self.store.read_page(page_id, &mut page) {
                state.free_list.push(frame_id);
                return Err(e);
            }
        }
        BufferPoolStats::bump(&self.stats.pages_read);

        state.install(frame_id, page_id);
        trace!(%page_id, %frame_id, "page loaded");

        Ok(self.handle(page_id, frame_id))
    }

    /// Allocate a fresh page id and pin a zeroed frame for it.
    ///
    /// The new id is `handle.page_id()`. Ids produced by instance `i` of `N`
    /// are always congruent to `i` modulo `N`.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned (no id is consumed)
    /// - `Error::PageIdsExhausted` if this instance ran out of ids
    /// - I/O errors from the store
    pub fn new_page(&self) -> Result<PageHandle<'_>> {
        let mut state = self.state.lock();

        if !state.has_available_frame() {
            return Err(Error::NoFreeFrames);
        }
        let frame_id = self.acquire_frame(&mut state)?;

        let page_id = match self.allocate_page_id(&mut state) {
            Ok(page_id) => page_id,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };

        self.pages[frame_id.0].write().reset();
        state.install(frame_id, page_id);
        BufferPoolStats::bump(&self.stats.pages_allocated);
        debug!(%page_id, %frame_id, instance = self.instance_index, "new page");

        Ok(self.handle(page_id, frame_id))
    }

    /// Fetch a page and latch it for reading; unpins (clean) on drop.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let handle = self.fetch_page(page_id)?;
        Ok(PageReadGuard::new(self, handle))
    }

    /// Fetch a page and latch it for writing; unpins (dirty) on drop.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let handle = self.fetch_page(page_id)?;
        Ok(PageWriteGuard::new(self, handle))
    }

    /// Allocate a new page and latch it for writing; unpins (dirty) on drop.
    pub fn new_page_guard(&self) -> Result<PageWriteGuard<'_>> {
        let handle = self.new_page()?;
        Ok(PageWriteGuard::new(self, handle))
    }

    // ========================================================================
    // Public API: Unpin, flush, delete
    // ========================================================================

    /// Drop one pin on `page_id`, OR-ing `is_dirty` into its dirty flag.
    ///
    /// When the pin count reaches zero the frame becomes an eviction
    /// candidate. The dirty flag is never cleared here.
    ///
    /// # Errors
    /// - `Error::PageNotResident` if the page is not in the pool
    /// - `Error::PageNotPinned` if its pin count is already zero
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut state = self.state.lock();

        let frame_id = state
            .page_table
            .get(&page_id)
            .copied()
            .ok_or(Error::PageNotResident(page_id.0))?;

        let frame = &mut state.frames[frame_id.0];
        if !frame.is_pinned() {
            return Err(Error::PageNotPinned(page_id.0));
        }
        if is_dirty {
            frame.mark_dirty();
        }
        if frame.unpin() == Some(0) {
            state.replacer.unpin(frame_id);
        }

        Ok(())
    }

    /// Write `page_id` to the store and clear its dirty flag, whether or not
    /// it is dirty or pinned.
    ///
    /// Never waits for the page latch while holding the instance lock: a
    /// writer holding the latch may itself be waiting for that lock.
    ///
    /// # Errors
    /// - `Error::PageNotResident` if the page is not in the pool
    /// - `Error::PageLatched` if the page is latched for writing right now;
    ///   the page stays dirty and the call can be retried
    /// - I/O errors from the store
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        let frame_id = state
            .page_table
            .get(&page_id)
            .copied()
            .ok_or(Error::PageNotResident(page_id.0))?;

        let Some(page) = self.pages[frame_id.0].try_read() else {
            debug!(%page_id, %frame_id, "page is write-latched, flush refused");
            return Err(Error::PageLatched(page_id.0));
        };
        self.persist(&mut state, frame_id, page_id, &page)
    }

    /// Write every dirty resident page to the store, pinned ones included.
    ///
    /// A pinned page whose latch is write-held at this moment is skipped and
    /// stays dirty: it is mid-modification, and waiting for its latch under
    /// the instance lock could deadlock a writer that fetches another page
    /// before releasing it.
    ///
    /// # Errors
    /// Stops at the first I/O error; pages already written stay clean.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut state = self.state.lock();

        let dirty: Vec<(PageId, FrameId)> = state
            .page_table
            .iter()
            .filter(|(_, fid)| state.frames[fid.0].is_dirty())
            .map(|(&pid, &fid)| (pid, fid))
            .collect();

        for (page_id, frame_id) in dirty {
            if !state.frames[frame_id.0].is_pinned() {
                self.write_back(&mut state, frame_id, page_id)?;
                continue;
            }

            let Some(page) = self.pages[frame_id.0].try_read() else {
                debug!(%page_id, %frame_id, "page is write-latched, left dirty");
                continue;
            };
            self.persist(&mut state, frame_id, page_id, &page)?;
        }

        Ok(())
    }

    /// Drop `page_id` from the pool without writing it back and release the
    /// id in the store.
    ///
    /// Deleting a page that is not resident succeeds and changes nothing.
    ///
    /// # Errors
    /// - `Error::PagePinned` if the page is still pinned
    /// - I/O errors from the store
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&fid) => fid,
            None => return Ok(()), // Page not in pool, nothing to do
        };

        if state.frames[frame_id.0].is_pinned() {
            return Err(Error::PagePinned(page_id.0));
        }

        state.page_table.remove(&page_id);
        state.frames[frame_id.0].reset();
        state.replacer.pin(frame_id);
        self.pages[frame_id.0].write().reset();
        state.free_list.push(frame_id);

        self.store.deallocate_page(page_id)?;
        BufferPoolStats::bump(&self.stats.pages_deallocated);
        debug!(%page_id, %frame_id, "page deleted");

        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Number of frames in this instance.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn num_instances(&self) -> u32 {
        self.num_instances
    }

    pub fn instance_index(&self) -> u32 {
        self.instance_index
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Pin count of a resident page, `None` if not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let frame_id = state.page_table.get(&page_id)?;
        Some(state.frames[frame_id.0].pin_count())
    }

    /// Dirty flag of a resident page, `None` if not resident.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        let frame_id = state.page_table.get(&page_id)?;
        Some(state.frames[frame_id.0].is_dirty())
    }

    /// Whether `page_id` currently occupies a frame.
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    pub fn resident_page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Number of frames the replacer could evict right now.
    pub fn replacer_size(&self) -> usize {
        self.state.lock().replacer.size()
    }

    /// Verify the page table, free list, frames and replacer agree.
    ///
    /// # Panics
    /// Panics with a description of the first violated invariant.
    pub fn check_invariants(&self) {
        self.state.lock().check();
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn handle(&self, page_id: PageId, frame_id: FrameId) -> PageHandle<'_> {
        PageHandle::new(page_id, frame_id, &self.pages[frame_id.0])
    }

    /// Take a frame from the free list, or evict the replacer's victim.
    ///
    /// The returned frame is empty and not a replacer candidate.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.victim().ok_or(Error::NoFreeFrames)?;
        let victim = state.frames[frame_id.0];

        if victim.is_dirty() {
            if let Err(e) = self.write_back(state, frame_id, victim.page_id()) {
                // Still resident and unpinned: hand it back to the replacer.
                state.replacer.unpin(frame_id);
                return Err(e);
            }
        }

        state.page_table.remove(&victim.page_id());
        state.frames[frame_id.0].reset();
        BufferPoolStats::bump(&self.stats.evictions);
        trace!(page_id = %victim.page_id(), %frame_id, "evicted");

        Ok(frame_id)
    }

    /// Write the frame's bytes to the store and mark it clean.
    fn write_back(&self, state: &mut PoolState, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let page = self.pages[frame_id.0].read();
        self.persist(state, frame_id, page_id, &page)
    }

    fn persist(
        &self,
        state: &mut PoolState,
        frame_id: FrameId,
        page_id: PageId,
        page: &Page,
    ) -> Result<()> {
        self.store.write_page(page_id, page)?;
        state.frames[frame_id.0].clear_dirty();
        BufferPoolStats::bump(&self.stats.pages_written);
        trace!(%page_id, %frame_id, "written back");
        Ok(())
    }

    /// Hand out the next id of this instance's residue class and register it
    /// with the store.
    fn allocate_page_id(&self, state: &mut PoolState) -> Result<PageId> {
        let next = state.next_page_id.ok_or(Error::PageIdsExhausted)?;
        let page_id = PageId::new(next);
        if !page_id.is_valid() {
            return Err(Error::PageIdsExhausted);
        }
        debug_assert_eq!(page_id.shard(self.num_instances as usize), self.instance_index as usize);

        self.store.allocate_page(page_id)?;
        state.next_page_id = next.checked_add(self.num_instances);
        Ok(page_id)
    }
}

impl PoolState {
    /// A frame can be handed out without failing.
    fn has_available_frame(&self) -> bool {
        !self.free_list.is_empty() || self.replacer.size() > 0
    }

    /// Bind an empty frame to `page_id`, pinned once and clean.
    fn install(&mut self, frame_id: FrameId, page_id: PageId) {
        self.frames[frame_id.0].install(page_id);
        self.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
    }

    fn check(&self) {
        let pool_size = self.frames.len();
        assert_eq!(
            self.page_table.len() + self.free_list.len(),
            pool_size,
            "resident pages + free frames must equal pool size"
        );

        for (&page_id, &frame_id) in &self.page_table {
            assert_eq!(
                self.frames[frame_id.0].page_id(),
                page_id,
                "{} maps to {} which holds another page",
                page_id,
                frame_id
            );
        }

        let mut seen = HashSet::with_capacity(self.free_list.len());
        for &frame_id in &self.free_list {
            assert!(seen.insert(frame_id), "{} is on the free list twice", frame_id);
            assert!(self.frames[frame_id.0].is_empty(), "free {} holds a page", frame_id);
        }

        let mut candidates = 0;
        for (index, frame) in self.frames.iter().enumerate() {
            let frame_id = FrameId::new(index);
            assert_eq!(
                self.replacer.contains(frame_id),
                frame.is_evictable(),
                "replacer membership of {} disagrees with its pin state",
                frame_id
            );
            if frame.is_evictable() {
                candidates += 1;
            }
        }
        assert_eq!(self.replacer.size(), candidates, "replacer holds unknown frames");
    }
}
