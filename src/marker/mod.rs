//! Marker Module - Stop-the-World Parallel Mark Engine
//!
//! Identifies live ephemeral objects before the nursery is compacted and
//! evacuated. The engine couples:
//!
//! - a `SegmentDirectory`: an immutable snapshot of every segment span
//!   across all heaps, answering both "is this address ephemeral?" and
//!   "which heap owns it?" with one binary search
//! - a `MarkSet` of per-span atomic bitmaps whose test-and-set is the
//!   mark-first linearization point: exactly one thread ever enqueues any
//!   address
//! - one LIFO worklist per heap, popped by the heap's worker and stolen
//!   from by the others in index order
//! - an outstanding-work counter for convergence: it counts objects that
//!   have been enqueued but not fully scanned, and children are counted
//!   before their parent's scan completes, so zero means every worklist
//!   is empty and no worker is mid-scan
//!
//! Work stealing is work-conserving: while any queue holds an item the
//! counter stays positive and no worker terminates.

pub mod bitmap;
pub mod directory;
pub mod parallel;
pub mod trace;
pub mod worklist;

pub use bitmap::MarkBitmap;
pub use directory::{SegmentDirectory, Span};
pub use parallel::run_parallel_mark;
pub use trace::{for_each_ref_slot, MarkContext};
pub use worklist::WorkStack;

/// Which generations a marking pass traverses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkScope {
    /// Minor collections: Gen0 and Gen1 only
    Ephemeral,
    /// Full diagnostic mark: every managed generation
    AllManaged,
}

impl MarkScope {
    /// Whether a generation is inside this scope
    pub fn covers(self, generation: crate::heap::Generation) -> bool {
        match self {
            MarkScope::Ephemeral => generation.is_ephemeral(),
            MarkScope::AllManaged => generation.is_managed(),
        }
    }
}
