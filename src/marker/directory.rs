//! Segment Directory - Global Address Resolution Snapshot
//!
//! An immutable, address-sorted snapshot of every segment span across the
//! heaps participating in a collection. One binary search answers both of
//! the marker's questions: whether an address is ephemeral (or managed at
//! all) and which heap's worklist owns it.
//!
//! The snapshot is taken under stop-the-world; segment bases never move
//! while it is alive, so workers share it without synchronization.

use crate::heap::{Generation, Heap};

/// One segment's address range, owner, and generation
#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub base: usize,
    pub size: usize,
    pub heap_index: usize,
    pub generation: Generation,
}

impl Span {
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.size
    }
}

/// Address-sorted snapshot of segment spans
pub struct SegmentDirectory {
    spans: Vec<Span>,
}

impl SegmentDirectory {
    /// Snapshot every segment (including regions) of the given heaps
    ///
    /// `heap_index` in each span is the heap's position in `heaps`, which
    /// is also the index of that heap's worklist.
    pub fn snapshot(heaps: &[&Heap]) -> Self {
        let mut spans = Vec::new();
        for (heap_index, heap) in heaps.iter().enumerate() {
            heap.for_each_segment(|segment| {
                spans.push(Span {
                    base: segment.base(),
                    size: segment.size_bytes(),
                    heap_index,
                    generation: segment.generation(),
                });
            });
        }
        spans.sort_by_key(|s| s.base);
        Self { spans }
    }

    /// Resolve an address to its span and span index
    pub fn resolve(&self, addr: usize) -> Option<(usize, Span)> {
        let idx = self.spans.partition_point(|s| s.base <= addr);
        if idx == 0 {
            return None;
        }
        let span = self.spans[idx - 1];
        if span.contains(addr) {
            Some((idx - 1, span))
        } else {
            None
        }
    }

    /// True iff some heap holds `addr` in its Gen0 or Gen1
    pub fn is_ephemeral(&self, addr: usize) -> bool {
        self.resolve(addr)
            .map(|(_, s)| s.generation.is_ephemeral())
            .unwrap_or(false)
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use std::sync::Arc;

    fn small_config() -> Arc<GcConfig> {
        Arc::new(GcConfig {
            gen0_size: 64 * 1024,
            gen1_size: 64 * 1024,
            gen2_size: 64 * 1024,
            loh_size: 128 * 1024,
            large_object_threshold: 64 * 1024,
            tlh_slab_bytes: 4 * 1024,
            heap_count: Some(1),
            ..Default::default()
        })
    }

    #[test]
    fn test_snapshot_resolves_all_generations() {
        let heap = Heap::new(0, small_config()).unwrap();
        let refs = [&heap];
        let dir = SegmentDirectory::snapshot(&refs);
        assert_eq!(dir.len(), 4);

        for gen in [
            Generation::Gen0,
            Generation::Gen1,
            Generation::Gen2,
            Generation::Loh,
        ] {
            let base = heap.segment_for(gen).base();
            let (_, span) = dir.resolve(base + 8).expect("address should resolve");
            assert_eq!(span.generation, gen);
            assert_eq!(span.heap_index, 0);
        }
    }

    #[test]
    fn test_unmapped_address_does_not_resolve() {
        let heap = Heap::new(0, small_config()).unwrap();
        let refs = [&heap];
        let dir = SegmentDirectory::snapshot(&refs);
        assert!(dir.resolve(0).is_none());
        assert!(dir.resolve(usize::MAX - 64).is_none());
    }

    #[test]
    fn test_is_ephemeral() {
        let heap = Heap::new(0, small_config()).unwrap();
        let refs = [&heap];
        let dir = SegmentDirectory::snapshot(&refs);
        assert!(dir.is_ephemeral(heap.segment_for(Generation::Gen0).base()));
        assert!(dir.is_ephemeral(heap.segment_for(Generation::Gen1).base()));
        assert!(!dir.is_ephemeral(heap.segment_for(Generation::Gen2).base()));
        assert!(!dir.is_ephemeral(heap.segment_for(Generation::Loh).base()));
    }
}
