//! Host stack headroom for the recursive passes.
//!
//! Parser, resolver and interpreter all recurse over the tree.  Each
//! recursive step goes through [`guarded`], which moves the walk onto a fresh
//! heap segment when the current stack runs low, so nesting depth is bounded
//! by the language limits rather than by the thread the caller happens to be
//! on.

/// Remaining stack below which a new segment is allocated.
const RED_ZONE: usize = 128 * 1024;

/// Size of each freshly allocated segment.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

#[inline]
pub fn guarded<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}
