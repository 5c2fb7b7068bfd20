//! Frame identifier type.

use std::fmt;

/// Identifies a frame in a buffer pool instance.
///
/// A frame's identity is its index into the instance's frame arena, never an
/// address, so reusing a frame for another page cannot leave a dangling
/// reference behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }

    /// Position in the frame arena.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}
