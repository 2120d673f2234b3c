//! # SGC - Server-Style Generational Garbage Collector
//!
//! SGC is a didactic, production-leaning model of a server GC operating
//! over raw unmanaged memory: per-core heaps of segmented memory, a
//! thread-local nursery allocator, card-table write barriers, brick
//! indexes for address snapping, and a stop-the-world parallel minor
//! collection that compacts the nursery and promotes survivors.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Runtime                              │
//! │  thread→heap affinity · type registry · parallel GC driver  │
//! │  ┌────────────────┐  ┌────────────────┐  ┌───────────────┐ │
//! │  │     Heap 0     │  │     Heap 1     │  │    Heap N     │ │
//! │  │ Gen0 Gen1 Gen2 │  │ Gen0 Gen1 Gen2 │  │ Gen0 Gen1 ... │ │
//! │  │ Loh  regions   │  │ Loh  regions   │  │               │ │
//! │  │ roots TLHs     │  │ roots TLHs     │  │               │ │
//! │  └────────────────┘  └────────────────┘  └───────────────┘ │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutators allocate in their home heap's nursery through thread-local
//! slabs; reference stores route through the write barrier, which
//! dirties the parent segment's card on old→young edges. A minor
//! collection seeds per-heap worklists from roots, region external
//! roots, and dirty-card scans, marks in parallel with work stealing
//! (mark-first, so each address is enqueued exactly once), then per heap
//! compacts the nursery and promotes survivors into Gen1, broadcasting
//! each relocation map to every heap.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sgc::{FieldKind, GcConfig, Generation, Runtime, TypeDesc};
//!
//! fn main() -> sgc::Result<()> {
//!     let runtime = Runtime::new(GcConfig {
//!         heap_count: Some(2),
//!         ..Default::default()
//!     })?;
//!
//!     let node = runtime.register_type(
//!         TypeDesc::class("Node")
//!             .with_field("Id", FieldKind::Int32)
//!             .with_field("Next", FieldKind::Ref),
//!     )?;
//!
//!     let holder = runtime.alloc(&node, Some(Generation::Gen1))?;
//!     let young = runtime.alloc(&node, None)?;
//!     runtime.set_int32(young, "Id", 123)?;
//!     runtime.set_ref(holder, "Next", young)?;
//!     runtime.set_root("holder", holder)?;
//!
//!     // Stop-the-world parallel minor collection: the nursery empties,
//!     // survivors land in Gen1, and holder.Next is rewritten.
//!     runtime.collect_ephemeral_all_parallel()?;
//!     assert_ne!(runtime.get_ref(holder, "Next")?, young);
//!     Ok(())
//! }
//! ```
//!
//! ## Safety
//!
//! References handed out by [`Runtime::alloc`] are raw absolute
//! addresses. The collector moves nursery objects; a minor collection
//! invalidates every address that pointed into Gen0. Re-read object
//! addresses from roots or parent fields after collecting, and quiesce
//! every mutator thread before entering a collection.

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod stats;

// Memory substrate
pub mod allocator;
pub mod heap;
pub mod memory;
pub mod object;

// Collection engine
pub mod marker;
pub mod relocate;

// Runtime integration
pub mod runtime;

// Utilities
pub mod util;

// Re-export main types for convenience
pub use config::{ConfigError, GcConfig};
pub use error::{GcError, Result};
pub use heap::{
    FieldReport, Generation, Heap, HeapReport, ObjectReport, Region, RootReport, SegmentReport,
};
pub use logging::GcEvent;
pub use object::{FieldDesc, FieldKind, TypeDesc, TypeKind};
pub use runtime::Runtime;
pub use stats::{CollectionKind, CollectionStats};

/// SGC version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize a runtime with the default configuration
pub fn init() -> Result<Runtime> {
    Runtime::with_defaults()
}

/// Initialize a runtime with a custom configuration
pub fn init_with_config(config: GcConfig) -> Result<Runtime> {
    Runtime::new(config)
}
