//! Tracing - Seeding and Object Scanning
//!
//! `MarkContext` is the shared state of one marking pass: the segment
//! directory snapshot, per-span mark bitmaps, per-heap worklists, and the
//! outstanding-work counter. Seeding runs single-threaded on the driver;
//! scanning runs on the parallel workers (or inline for the sequential
//! collectors).
//!
//! Seeding sources, per heap:
//! - heap-local named roots
//! - each region's recorded external roots
//! - dirty-card ranges of the old segments (Gen1, Gen2, Loh): snap the
//!   range start back to an object start through the brick table, then
//!   walk objects contiguously until past the range end, scanning every
//!   reference-typed field (nested struct refs included)

use crate::error::{GcError, Result};
use crate::heap::{Generation, Heap};
use crate::marker::bitmap::MarkBitmap;
use crate::marker::directory::SegmentDirectory;
use crate::marker::worklist::WorkStack;
use crate::marker::MarkScope;
use crate::memory;
use crate::object::{header, TypeDesc, TypeTable};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Invoke `f` with the address of every reference slot of an object
/// payload, recursing through nested struct fields
pub fn for_each_ref_slot(ty: &TypeDesc, payload: usize, f: &mut impl FnMut(usize)) {
    for field in &ty.fields {
        match &field.kind {
            crate::object::FieldKind::Ref => f(payload + field.offset),
            crate::object::FieldKind::Struct(inner) => {
                for_each_ref_slot(inner, payload + field.offset, f)
            }
            _ => {}
        }
    }
}

/// Shared state of one marking pass
pub struct MarkContext {
    directory: SegmentDirectory,
    /// Parallel to `directory.spans()`; Some only for spans in scope
    bitmaps: Vec<Option<MarkBitmap>>,
    pub worklists: Vec<WorkStack>,
    /// Objects enqueued but not yet fully scanned. Children are counted
    /// before their parent's scan completes, so zero implies every
    /// worklist is empty and no worker is mid-scan.
    pub outstanding: AtomicUsize,
    types: TypeTable,
    scope: MarkScope,
    visited: AtomicUsize,
    cards_scanned: AtomicUsize,
}

impl MarkContext {
    /// Snapshot the given heaps and prepare scratch state for one pass
    ///
    /// Worklist `i` belongs to `heaps[i]`; the directory's span owners
    /// use the same indexing.
    pub fn new(heaps: &[&Heap], scope: MarkScope, types: TypeTable) -> Self {
        let directory = SegmentDirectory::snapshot(heaps);
        let bitmaps = directory
            .spans()
            .iter()
            .map(|span| {
                if scope.covers(span.generation) {
                    Some(MarkBitmap::new(span.base, span.size))
                } else {
                    None
                }
            })
            .collect();
        let worklists = (0..heaps.len()).map(|_| WorkStack::new()).collect();

        Self {
            directory,
            bitmaps,
            worklists,
            outstanding: AtomicUsize::new(0),
            types,
            scope,
            visited: AtomicUsize::new(0),
            cards_scanned: AtomicUsize::new(0),
        }
    }

    pub fn directory(&self) -> &SegmentDirectory {
        &self.directory
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Objects discovered by this pass so far
    pub fn visited_count(&self) -> usize {
        self.visited.load(Ordering::Acquire)
    }

    /// Dirty card ranges walked during seeding
    pub fn cards_scanned(&self) -> usize {
        self.cards_scanned.load(Ordering::Acquire)
    }

    /// Whether this pass marked the object at `addr`
    pub fn is_marked(&self, addr: usize) -> bool {
        match self.directory.resolve(addr) {
            Some((span_idx, _)) => self.bitmaps[span_idx]
                .as_ref()
                .map(|b| b.is_marked(addr))
                .unwrap_or(false),
            None => false,
        }
    }

    /// Mark-first discovery: insert into the mark set and, on first
    /// insertion, route the address to its owning heap's worklist
    pub fn enqueue_if_first(&self, addr: usize) {
        let Some((span_idx, span)) = self.directory.resolve(addr) else {
            return;
        };
        if !self.scope.covers(span.generation) {
            return;
        }
        let Some(bitmap) = &self.bitmaps[span_idx] else {
            return;
        };
        if bitmap.test_and_set(addr) {
            self.visited.fetch_add(1, Ordering::Relaxed);
            self.outstanding.fetch_add(1, Ordering::AcqRel);
            self.worklists[span.heap_index].push(addr);
        }
    }

    /// Scan one object's reference fields, discovering in-scope children
    pub fn scan_object(&self, addr: usize) -> Result<()> {
        let type_id = unsafe { header::type_id_at(addr) };
        let ty = self
            .types
            .get(&type_id)
            .ok_or(GcError::UnknownTypeId { type_id })?;
        for_each_ref_slot(ty, header::payload_addr(addr), &mut |slot| {
            let child = unsafe { memory::read_pointer(slot) };
            if child != 0 {
                self.enqueue_if_first(child);
            }
        });
        Ok(())
    }

    /// Seed every source of the given heaps, single-threaded
    pub fn seed_all(&self, heaps: &[&Heap]) -> Result<()> {
        for (index, heap) in heaps.iter().enumerate() {
            self.seed_heap(heap, index)?;
        }
        Ok(())
    }

    /// Seed one heap: named roots, region external roots, dirty cards
    pub fn seed_heap(&self, heap: &Heap, heap_index: usize) -> Result<()> {
        self.seed_roots_and_regions(heap, heap_index);
        for generation in [Generation::Gen1, Generation::Gen2, Generation::Loh] {
            self.seed_dirty_cards(heap, generation)?;
        }
        Ok(())
    }

    /// Seed only the root sources of one heap: named roots and region
    /// external roots; full marks skip the card scan entirely
    pub fn seed_roots_and_regions(&self, heap: &Heap, _heap_index: usize) {
        for (_, addr) in heap.roots_snapshot() {
            if addr != 0 {
                self.enqueue_if_first(addr);
            }
        }

        for region in heap.regions_snapshot() {
            for addr in region.external_roots() {
                if addr != 0 {
                    self.enqueue_if_first(addr);
                }
            }
        }
    }

    /// Walk one old segment's dirty card ranges, scanning every object
    /// that starts before a range end
    fn seed_dirty_cards(&self, heap: &Heap, generation: Generation) -> Result<()> {
        let segment = heap.segment_for(generation);
        let top = segment.allocated_bytes();
        if top == 0 {
            return Ok(());
        }

        for (start, end) in segment.dirty_ranges() {
            if start >= top {
                continue;
            }
            self.cards_scanned.fetch_add(1, Ordering::Relaxed);

            let limit = end.min(top);
            let mut cursor = segment.snap_to_object_start(segment.base() + start);
            while cursor - segment.base() < limit {
                let type_id = unsafe { header::type_id_at(cursor) };
                if type_id == 0 {
                    cursor += std::mem::size_of::<usize>();
                    continue;
                }
                let ty = self
                    .types
                    .get(&type_id)
                    .ok_or(GcError::UnknownTypeId { type_id })?;
                for_each_ref_slot(ty, header::payload_addr(cursor), &mut |slot| {
                    let child = unsafe { memory::read_pointer(slot) };
                    if child != 0 {
                        self.enqueue_if_first(child);
                    }
                });
                cursor += header::total_object_size(ty.size);
            }
        }
        Ok(())
    }

    /// Drain every worklist on the calling thread; used by the
    /// sequential collectors and the diagnostic marks
    pub fn drain_sequential(&self) -> Result<()> {
        loop {
            let mut found = false;
            for worklist in &self.worklists {
                while let Some(addr) = worklist.pop() {
                    found = true;
                    let result = self.scan_object(addr);
                    self.outstanding.fetch_sub(1, Ordering::AcqRel);
                    result?;
                }
            }
            if !found {
                return Ok(());
            }
        }
    }
}
