//! Test Utilities for the SGC Integration Suite
//!
//! Builds runtimes from explicit small configurations and registers the
//! example type catalog the scenarios share:
//!
//! - `Loc`   - inline struct `{ RefToNode: Ref, X: Int32 }`
//! - `Node`  - class `{ Id: Int32, Next: Ref }`
//! - `Holder`- class `{ Child: Ref, Loc: Loc }`

#![allow(dead_code)]

use sgc::{FieldKind, GcConfig, Generation, Runtime, TypeDesc};
use std::sync::Arc;

/// Small per-heap segment sizes so collections stay fast
pub const TEST_GEN0_SIZE: usize = 256 * 1024;
pub const TEST_GEN1_SIZE: usize = 256 * 1024;
pub const TEST_GEN2_SIZE: usize = 256 * 1024;
pub const TEST_LOH_SIZE: usize = 512 * 1024;

/// Test fixture: a runtime plus the registered example types
pub struct GcFixture {
    pub runtime: Arc<Runtime>,
    pub loc: Arc<TypeDesc>,
    pub node: Arc<TypeDesc>,
    pub holder: Arc<TypeDesc>,
}

impl GcFixture {
    /// Fixture with an explicit heap count
    pub fn with_heaps(heap_count: usize) -> Self {
        Self::with_config(GcConfig {
            heap_count: Some(heap_count),
            ..small_config()
        })
    }

    /// Fixture with a fully custom configuration
    pub fn with_config(config: GcConfig) -> Self {
        let runtime =
            Arc::new(Runtime::new(config).expect("runtime should come up with a valid config"));

        let loc = runtime
            .register_type(
                TypeDesc::value_struct("Loc")
                    .with_field("RefToNode", FieldKind::Ref)
                    .with_field("X", FieldKind::Int32),
            )
            .expect("Loc registration should succeed");

        let node = runtime
            .register_type(
                TypeDesc::class("Node")
                    .with_field("Id", FieldKind::Int32)
                    .with_field("Next", FieldKind::Ref),
            )
            .expect("Node registration should succeed");

        let holder = runtime
            .register_type(
                TypeDesc::class("Holder")
                    .with_field("Child", FieldKind::Ref)
                    .with_field("Loc", FieldKind::Struct(loc.clone())),
            )
            .expect("Holder registration should succeed");

        Self {
            runtime,
            loc,
            node,
            holder,
        }
    }

    /// Allocate a Node with the given id in the nursery
    pub fn new_node(&self, id: i32) -> usize {
        let addr = self
            .runtime
            .alloc(&self.node, None)
            .expect("nursery allocation should succeed");
        self.runtime
            .set_int32(addr, "Id", id)
            .expect("Id store should succeed");
        addr
    }

    /// Allocate a Node with the given id in a specific generation
    pub fn new_node_in(&self, id: i32, generation: Generation) -> usize {
        let addr = self
            .runtime
            .alloc(&self.node, Some(generation))
            .expect("forced allocation should succeed");
        self.runtime
            .set_int32(addr, "Id", id)
            .expect("Id store should succeed");
        addr
    }

    /// Allocate a Holder in a specific generation
    pub fn new_holder_in(&self, generation: Generation) -> usize {
        self.runtime
            .alloc(&self.holder, Some(generation))
            .expect("forced allocation should succeed")
    }

    /// Gen0 occupancy of one heap
    pub fn gen0_allocated(&self, heap_index: usize) -> usize {
        self.segment(heap_index, Generation::Gen0).0
    }

    /// Dirty cards summed over every heap's old segments
    pub fn total_dirty_cards(&self) -> usize {
        (0..self.runtime.heap_count())
            .map(|i| self.runtime.heap(i).unwrap().dirty_card_total())
            .sum()
    }

    /// `(allocated_bytes, base, size)` of a segment
    pub fn segment(&self, heap_index: usize, generation: Generation) -> (usize, usize, usize) {
        let heap = self.runtime.heap(heap_index).expect("heap index in range");
        let segment = heap.segment_for(generation);
        (
            segment.allocated_bytes(),
            segment.base(),
            segment.size_bytes(),
        )
    }

    /// Whether an address lies inside a given segment of a given heap
    pub fn in_segment(&self, heap_index: usize, generation: Generation, addr: usize) -> bool {
        let (_, base, size) = self.segment(heap_index, generation);
        addr >= base && addr < base + size
    }
}

/// Base configuration for a single small heap
pub fn small_config() -> GcConfig {
    GcConfig {
        gen0_size: TEST_GEN0_SIZE,
        gen1_size: TEST_GEN1_SIZE,
        gen2_size: TEST_GEN2_SIZE,
        loh_size: TEST_LOH_SIZE,
        tlh_slab_bytes: 8 * 1024,
        heap_count: Some(1),
        ..Default::default()
    }
}
