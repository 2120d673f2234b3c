//! Relocate Module - Nursery Compaction, Promotion, and Reference Fixup
//!
//! After the mark phase, each heap in order:
//! 1. compacts its Gen0 in place, copying live objects densely to the low
//!    end through a scratch buffer, and broadcasts the resulting
//!    relocation map to every heap;
//! 2. promotes the compacted survivors into Gen1 and broadcasts the
//!    promotion map likewise.
//!
//! Broadcasting rewrites every reference in every heap (named roots,
//! region external-root sets, and every object's reference fields in
//! every segment), so no intermediate compaction address is ever
//! observable once the collection returns.

pub mod compact;
pub mod fixup;
pub mod forwarding;
pub mod promote;

pub use compact::compact_gen0;
pub use fixup::rewrite_heap_references;
pub use forwarding::RelocationMap;
pub use promote::promote_gen0;
