//! Allocator Module - Nursery Allocation
//!
//! Gen0 allocation goes through thread-local nursery slabs (TLHs) carved
//! from the heap's Gen0 segment; everything else bump-allocates directly
//! on the target segment.

pub mod tlab;

pub use tlab::{Tlh, TlhManager};
