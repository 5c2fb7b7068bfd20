//! Error types for shardpool.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors surfaced by the buffer pool.
///
/// Every failure is reported through an explicit result; the pool never
/// retries internally, so callers decide their own backoff policy.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the page store.
    ///
    /// Storage failures are not modelled as recoverable at this layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every frame is pinned and the free list is empty.
    ///
    /// Returned by fetch and new-page when no victim can be chosen.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The page is resident but still pinned, so it cannot be deleted.
    #[error("Page {0} is pinned")]
    PagePinned(u32),

    /// The page is not resident in the buffer pool.
    #[error("Page {0} is not resident")]
    PageNotResident(u32),

    /// The sentinel id was passed where a real page was expected.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// This instance has handed out every id in its residue class.
    #[error("Page id space exhausted")]
    PageIdsExhausted,

    /// The page's latch is held for writing, so it cannot be flushed
    /// without waiting under the instance lock.
    #[error("Page {0} is latched for writing")]
    PageLatched(u32),

    /// Attempted to unpin a page whose pin count is already zero.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("Page {0} is not pinned")]
    PageNotPinned(u32),
}

impl Error {
    /// Whether the operation may succeed if retried later without any change
    /// on the caller's side (another thread may release a pin meanwhile).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::NoFreeFrames | Error::PagePinned(_) | Error::PageLatched(_)
        )
    }
}
