//! Frame - bookkeeping for one slot of the buffer pool.
//!
//! A [`Frame`] records what the slot currently holds:
//! - Which page is loaded (or [`PageId::INVALID`])
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking
//!
//! The page bytes themselves live next to the frames in the instance's
//! arena; frames are only touched while the instance lock is held.

use crate::common::PageId;

/// Metadata of a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Which page is currently loaded, or `PageId::INVALID` if empty.
    page_id: PageId,

    /// Number of outstanding pins.
    pin_count: u32,

    /// Whether the in-memory bytes differ from the persisted copy.
    is_dirty: bool,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page_id: PageId::INVALID,
            pin_count: 0,
            is_dirty: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Bind the frame to `page_id`: pinned once, clean.
    pub fn install(&mut self, page_id: PageId) {
        self.page_id = page_id;
        self.pin_count = 1;
        self.is_dirty = false;
    }

    /// Return the frame to the empty state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // ========================================================================
    // Pin count
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.pin_count
    }

    /// Decrement the pin count. Returns the new pin count, or `None` if it
    /// was already zero (the count is left untouched).
    #[inline]
    pub fn unpin(&mut self) -> Option<u32> {
        self.pin_count = self.pin_count.checked_sub(1)?;
        Some(self.pin_count)
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    // ========================================================================
    // Dirty flag
    // ========================================================================

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    #[inline]
    pub fn clear_dirty(&mut self) {
        self.is_dirty = false;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    // ========================================================================
    // Frame state queries
    // ========================================================================

    /// Check if the frame is empty (no page loaded).
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.page_id.is_valid()
    }

    /// Resident and unpinned: exactly the frames the replacer may hold.
    #[inline]
    pub fn is_evictable(&self) -> bool {
        !self.is_empty() && !self.is_pinned()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
