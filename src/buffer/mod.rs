//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between the upper layers
//! and the page store. It manages fixed pools of frames, each holding one
//! page.
//!
//! # Components
//! - [`BufferPoolInstance`] - One pool of frames under one lock
//! - [`ParallelBufferPoolManager`] - N instances splitting the page id space
//! - [`BufferPool`] - The interface both implement
//! - [`Frame`] - Per-frame metadata (page id, pin count, dirty flag)
//! - [`PageHandle`], [`PageReadGuard`] / [`PageWriteGuard`] - Page access
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod buffer_pool;
mod buffer_pool_instance;
mod frame;
mod page_guard;
mod parallel_buffer_pool_manager;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use buffer_pool_instance::BufferPoolInstance;
pub use frame::Frame;
pub use page_guard::{PageHandle, PageReadGuard, PageWriteGuard};
pub use parallel_buffer_pool_manager::ParallelBufferPoolManager;
pub use stats::{BufferPoolStats, StatsSnapshot};
