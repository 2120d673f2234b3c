//! Region - Non-Moving Arena Attached to a Heap
//!
//! A region owns one segment whose objects are never moved and never
//! traced into from managed memory (managed→region stores are rejected
//! by the write barrier). Region objects may reference managed objects;
//! every such store is recorded in the region's external-root set, which
//! minor-GC seeding treats as an additional root source.
//!
//! Regions are destroyed explicitly and en masse; destruction removes the
//! segment from the owning heap's address-sorted span index and discards
//! the external-root set.

use crate::error::Result;
use crate::heap::segment::{Generation, Segment};
use crate::relocate::RelocationMap;
use indexmap::IndexSet;
use parking_lot::Mutex;

/// Non-moving arena segment plus its recorded region→managed roots
pub struct Region {
    id: u64,
    segment: Segment,
    external_roots: Mutex<IndexSet<usize>>,
}

impl Region {
    /// Map a fresh region of `size` bytes
    pub fn new(id: u64, size: usize, card_size: usize, brick_size: usize) -> Result<Self> {
        Ok(Self {
            id,
            segment: Segment::new(Generation::Region, size, card_size, brick_size)?,
            external_roots: Mutex::new(IndexSet::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Record a region→managed reference target
    pub fn record_external_root(&self, addr: usize) {
        self.external_roots.lock().insert(addr);
    }

    /// Snapshot the external-root set for GC seeding
    pub fn external_roots(&self) -> Vec<usize> {
        self.external_roots.lock().iter().copied().collect()
    }

    pub fn external_root_count(&self) -> usize {
        self.external_roots.lock().len()
    }

    /// Rewrite recorded roots through a relocation map
    pub fn remap_external_roots(&self, map: &RelocationMap) {
        let mut roots = self.external_roots.lock();
        if roots.is_empty() {
            return;
        }
        let remapped: IndexSet<usize> = roots
            .iter()
            .map(|&addr| map.lookup(addr).unwrap_or(addr))
            .collect();
        *roots = remapped;
    }
}
