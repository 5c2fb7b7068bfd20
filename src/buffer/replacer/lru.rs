//! LRU (least-recently-unpinned) replacement policy.
//!
//! Candidates are ordered by the time they were last unpinned. Pinning a
//! frame removes it; unpinning it again puts it at the back of the line.

use hashlink::LinkedHashSet;
use parking_lot::Mutex;
use tracing::error;

use super::Replacer;
use crate::common::FrameId;

/// Evicts the frame that has been unpinned the longest.
///
/// # Structure
/// ```text
///   oldest unpin                       newest unpin
///   ┌────────┬────────┬────────┬────────┐
///   │ Frame3 │ Frame0 │ Frame5 │ Frame1 │   LinkedHashSet<FrameId>
///   └────────┴────────┴────────┴────────┘
///     ▲ victim()                 ▲ unpin() appends here
/// ```
///
/// The linked set gives O(1) insertion at the back, removal from the middle
/// (`pin`) and removal from the front (`victim`).
///
/// # Example
/// ```
/// use shardpool::buffer::replacer::{LruReplacer, Replacer};
/// use shardpool::FrameId;
///
/// let replacer = LruReplacer::new(4);
/// replacer.unpin(FrameId::new(1));
/// replacer.unpin(FrameId::new(2));
/// assert_eq!(replacer.victim(), Some(FrameId::new(1)));
/// ```
pub struct LruReplacer {
    /// Candidate frames, front = unpinned longest ago.
    candidates: Mutex<LinkedHashSet<FrameId>>,

    /// Maximum number of candidates (the instance's pool size).
    capacity: usize,
}

impl LruReplacer {
    /// Create a replacer for a pool of `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            candidates: Mutex::new(LinkedHashSet::with_capacity(capacity)),
            capacity,
        }
    }

    /// Maximum number of candidates.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Replacer for LruReplacer {
    fn victim(&self) -> Option<FrameId> {
        self.candidates.lock().pop_front()
    }

    fn pin(&self, frame_id: FrameId) {
        self.candidates.lock().remove(&frame_id);
    }

    /// # Panics
    /// Panics if `frame_id` is outside the pool or the candidate set is
    /// already full. Candidates are distinct frames of this pool, so neither
    /// can happen unless the caller broke the pin accounting.
    fn unpin(&self, frame_id: FrameId) {
        let mut candidates = self.candidates.lock();
        if candidates.contains(&frame_id) {
            return;
        }

        if frame_id.index() >= self.capacity || candidates.len() >= self.capacity {
            error!(
                %frame_id,
                candidates = candidates.len(),
                capacity = self.capacity,
                "replacer overflow"
            );
            panic!(
                "replacer overflow: cannot add {} with {} of {} candidates",
                frame_id,
                candidates.len(),
                self.capacity
            );
        }

        candidates.insert(frame_id);
    }

    fn size(&self) -> usize {
        self.candidates.lock().len()
    }

    fn contains(&self, frame_id: FrameId) -> bool {
        self.candidates.lock().contains(&frame_id)
    }
}
