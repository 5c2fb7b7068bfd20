//! Eviction policy implementations (replacers).
//!
//! A replacer only knows about frames whose page is resident and unpinned;
//! the buffer pool tells it when that changes through [`Replacer::pin`] and
//! [`Replacer::unpin`].
//!
//! Currently implements:
//! - [`LruReplacer`] - evicts the frame that was unpinned longest ago

mod lru;

pub use lru::LruReplacer;

use crate::common::FrameId;

/// An eviction policy over the frames of one buffer pool instance.
///
/// Implementations carry their own lock so `&self` suffices; the buffer pool
/// only calls them while holding its instance lock.
pub trait Replacer: Send + Sync {
    /// Remove and return the next frame to reclaim, or `None` if no frame is
    /// a candidate.
    fn victim(&self) -> Option<FrameId>;

    /// The frame is in use; stop considering it. No-op if not a candidate.
    fn pin(&self, frame_id: FrameId);

    /// The frame's pin count reached zero; start considering it.
    /// No-op if already a candidate.
    fn unpin(&self, frame_id: FrameId);

    /// Number of candidate frames.
    fn size(&self) -> usize;

    /// Whether `frame_id` is currently a candidate.
    fn contains(&self, frame_id: FrameId) -> bool;
}
