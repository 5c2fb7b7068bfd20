//! Parallel Buffer Pool Manager - several independent instances behind one
//! interface.
//!
//! Page ids are partitioned by residue: instance `i` of `N` owns every id
//! with `id % N == i`. Operations on different shards never contend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::buffer::{
    BufferPoolInstance, PageHandle, PageReadGuard, PageWriteGuard, StatsSnapshot,
};
use crate::common::{BufferPoolConfig, Error, PageId, Result};
use crate::storage::PageStore;

/// Routes page operations to the shard owning the page id.
///
/// ```text
///                  ParallelBufferPoolManager
///                 ┌──────────────────────────┐
///   page_id ───▶  │  owner = page_id mod N   │
///                 └─────┬──────┬──────┬──────┘
///                       ▼      ▼      ▼
///                   ┌──────┐┌──────┐┌──────┐
///                   │ BPI 0││ BPI 1││ BPI 2│   each with its own lock
///                   └──┬───┘└──┬───┘└──┬───┘
///                      └───────┼───────┘
///                              ▼
///                      Arc<dyn PageStore>
/// ```
///
/// New pages are handed out round-robin: each call starts at a rotating
/// cursor and takes the first shard with a usable frame.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use shardpool::{MemoryStore, ParallelBufferPoolManager};
///
/// let pool = ParallelBufferPoolManager::new(3, 4, Arc::new(MemoryStore::new()));
/// assert_eq!(pool.pool_size(), 12);
///
/// let handle = pool.new_page().unwrap();
/// let page_id = handle.page_id();
/// assert_eq!(page_id.0 % 3, 0);
/// pool.unpin_page(page_id, false).unwrap();
/// ```
pub struct ParallelBufferPoolManager {
    instances: Vec<BufferPoolInstance>,

    /// Shard the next `new_page` tries first. Races between concurrent
    /// allocations only affect which shard is tried first.
    next_instance: AtomicUsize,
}

impl ParallelBufferPoolManager {
    /// Create `num_instances` shards of `pool_size` frames each, all backed
    /// by `store`.
    ///
    /// # Panics
    /// Panics if `num_instances` or `pool_size` is 0.
    pub fn new(num_instances: usize, pool_size: usize, store: Arc<dyn PageStore>) -> Self {
        let config = BufferPoolConfig::new(pool_size, num_instances);
        Self::from_config(&config, store)
    }

    /// Create the shards described by `config`.
    ///
    /// # Panics
    /// Panics if the configuration is invalid.
    pub fn from_config(config: &BufferPoolConfig, store: Arc<dyn PageStore>) -> Self {
        config.validate();
        // validate() bounds num_instances by the page id space.
        let num_instances = config.num_instances as u32;

        let instances = (0..num_instances)
            .map(|index| {
                BufferPoolInstance::new_sharded(
                    config.pool_size,
                    num_instances,
                    index,
                    Arc::clone(&store),
                )
            })
            .collect();

        debug!(
            num_instances,
            pool_size = config.pool_size,
            "parallel buffer pool created"
        );

        Self {
            instances,
            next_instance: AtomicUsize::new(0),
        }
    }

    /// The shard responsible for `page_id`.
    pub fn instance_for(&self, page_id: PageId) -> &BufferPoolInstance {
        &self.instances[page_id.shard(self.instances.len())]
    }

    /// All shards, in index order.
    pub fn instances(&self) -> &[BufferPoolInstance] {
        &self.instances
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    /// Total frames across all shards.
    pub fn pool_size(&self) -> usize {
        self.instances.iter().map(BufferPoolInstance::pool_size).sum()
    }

    // ========================================================================
    // Routed operations
    // ========================================================================

    pub fn fetch_page(&self, page_id: PageId) -> Result<PageHandle<'_>> {
        self.instance_for(page_id).fetch_page(page_id)
    }

    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        self.instance_for(page_id).unpin_page(page_id, is_dirty)
    }

    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        self.instance_for(page_id).flush_page(page_id)
    }

    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        self.instance_for(page_id).delete_page(page_id)
    }

    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        self.instance_for(page_id).fetch_page_read(page_id)
    }

    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        self.instance_for(page_id).fetch_page_write(page_id)
    }

    /// Flush every shard. Stops at the first I/O error.
    pub fn flush_all_pages(&self) -> Result<()> {
        for instance in &self.instances {
            instance.flush_all_pages()?;
        }
        Ok(())
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocate a new page on the first shard, starting at the rotating
    /// cursor, that can produce one.
    ///
    /// The cursor moves to just past the shard that succeeded, so
    /// consecutive allocations visit every shard before repeating one. A
    /// shard that fails for any reason is skipped.
    ///
    /// # Errors
    /// Only when every shard failed:
    /// - the first non-capacity error a shard raised (I/O, id exhaustion)
    /// - otherwise `Error::NoFreeFrames`, every shard being fully pinned
    pub fn new_page(&self) -> Result<PageHandle<'_>> {
        let num_instances = self.instances.len();
        let start = self.next_instance.load(Ordering::Relaxed);
        let mut first_error = None;

        for offset in 0..num_instances {
            let index = (start + offset) % num_instances;
            match self.instances[index].new_page() {
                Ok(handle) => {
                    self.next_instance
                        .store((index + 1) % num_instances, Ordering::Relaxed);
                    trace!(page_id = %handle.page_id(), shard = index, "allocated");
                    return Ok(handle);
                }
                Err(Error::NoFreeFrames) => continue,
                Err(e) => {
                    warn!(shard = index, error = %e, "shard failed to allocate a page");
                    first_error.get_or_insert(e);
                }
            }
        }

        // Every shard tried; the cursor wraps back to where this call began.
        self.next_instance.store(start, Ordering::Relaxed);
        Err(first_error.unwrap_or(Error::NoFreeFrames))
    }

    /// Like [`new_page`](Self::new_page), latched for writing; unpins
    /// (dirty) on drop.
    pub fn new_page_guard(&self) -> Result<PageWriteGuard<'_>> {
        let handle = self.new_page()?;
        Ok(PageWriteGuard::new(self.instance_for(handle.page_id()), handle))
    }

    // ========================================================================
    // Stats and info
    // ========================================================================

    /// Counters summed over every shard.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.instances
            .iter()
            .map(BufferPoolInstance::stats_snapshot)
            .sum()
    }

    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.instance_for(page_id).pin_count(page_id)
    }

    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        self.instance_for(page_id).is_dirty(page_id)
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.instance_for(page_id).is_resident(page_id)
    }

    pub fn free_frame_count(&self) -> usize {
        self.instances
            .iter()
            .map(BufferPoolInstance::free_frame_count)
            .sum()
    }

    pub fn resident_page_count(&self) -> usize {
        self.instances
            .iter()
            .map(BufferPoolInstance::resident_page_count)
            .sum()
    }

    /// Check the invariants of every shard.
    ///
    /// # Panics
    /// Panics on the first violation.
    pub fn check_invariants(&self) {
        for instance in &self.instances {
            instance.check_invariants();
        }
    }
}
