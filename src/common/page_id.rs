//! Page identifier type.

use std::fmt;

/// Identifies a page in the page store.
///
/// Ids are process-wide unique. In a sharded pool the id also encodes its
/// owner: instance `i` of `N` only ever holds ids with `id % N == i`.
///
/// # Example
/// ```
/// use shardpool::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.shard(4), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    ///
    /// Used to represent "no page", e.g. the id stored in an empty frame.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Index of the shard that owns this id in a pool of `num_instances`.
    #[inline]
    pub fn shard(&self, num_instances: usize) -> usize {
        (self.0 as u64 % num_instances as u64) as usize
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
