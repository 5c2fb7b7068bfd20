//! Configuration for the buffer pool.

/// Size of a page in bytes (4KB).
///
/// This value is chosen to match:
/// - OS page size on most systems (4096 bytes)
/// - Common database page sizes
///
/// # Alignment
/// Pages are aligned to 4096 bytes for efficient Direct I/O (O_DIRECT).
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId (the last value is the sentinel).
pub const MAX_PAGES: u64 = u32::MAX as u64;

/// Maximum theoretical database size in bytes.
pub const MAX_DB_SIZE_BYTES: u64 = MAX_PAGES * PAGE_SIZE as u64;

/// Frames per instance when nothing else is configured.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Shard count when nothing else is configured.
pub const DEFAULT_NUM_INSTANCES: usize = 1;

/// Sizing of a (possibly sharded) buffer pool.
///
/// `pool_size` is the number of frames in each instance; a parallel pool
/// holds `pool_size * num_instances` frames in total.
///
/// # Example
/// ```
/// use shardpool::BufferPoolConfig;
///
/// let config = BufferPoolConfig::default()
///     .with_pool_size(16)
///     .with_num_instances(4);
/// assert_eq!(config.total_frames(), 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Frames per instance.
    pub pool_size: usize,
    /// Number of independent instances (shards).
    pub num_instances: usize,
}

impl BufferPoolConfig {
    pub fn new(pool_size: usize, num_instances: usize) -> Self {
        Self {
            pool_size,
            num_instances,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_num_instances(mut self, num_instances: usize) -> Self {
        self.num_instances = num_instances;
        self
    }

    /// Frames across all instances.
    pub fn total_frames(&self) -> usize {
        self.pool_size * self.num_instances
    }

    /// Reject configurations that indicate a broken caller.
    ///
    /// # Panics
    /// Panics if `pool_size` or `num_instances` is 0.
    pub fn validate(&self) {
        assert!(self.pool_size > 0, "pool_size must be > 0");
        assert!(self.num_instances > 0, "num_instances must be > 0");
        assert!(
            self.num_instances as u64 <= MAX_PAGES,
            "num_instances exceeds the page id space"
        );
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE, DEFAULT_NUM_INSTANCES)
    }
}
