//! Util Module - Shared Utilities
//!
//! Alignment helpers and size constants used throughout SGC.

pub mod alignment;

pub use alignment::{align_down, align_up, is_aligned};

/// Size constants for SGC
pub mod constants {
    /// 1 Kilobyte
    pub const KB: usize = 1024;
    /// 1 Megabyte
    pub const MB: usize = 1024 * 1024;

    /// Default nursery (Gen0) segment size: 1MB
    pub const DEFAULT_GEN0_SIZE: usize = MB;
    /// Default intermediate (Gen1) segment size: 1MB
    pub const DEFAULT_GEN1_SIZE: usize = MB;
    /// Default tenured (Gen2) segment size: 2MB
    pub const DEFAULT_GEN2_SIZE: usize = 2 * MB;
    /// Default large-object segment size: 2MB
    pub const DEFAULT_LOH_SIZE: usize = 2 * MB;

    /// Allocations of this many bytes or more go to the large-object heap
    pub const DEFAULT_LARGE_OBJECT_THRESHOLD: usize = 85_000;

    /// Default card granule: 256 bytes per card byte
    pub const DEFAULT_CARD_SIZE: usize = 256;
    /// Minimum legal card granule
    pub const MIN_CARD_SIZE: usize = 64;
    /// Default brick granule: 2048 bytes per brick entry
    pub const DEFAULT_BRICK_SIZE: usize = 2048;

    /// Default thread-local nursery slab: 32KB
    pub const DEFAULT_TLH_SLAB_SIZE: usize = 32 * KB;
}
