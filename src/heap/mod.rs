//! Heap Module - One Per-Core Heap
//!
//! A heap owns four generation segments (Gen0/Gen1/Gen2/Loh), any number
//! of attached non-moving regions, a named root map, its copy of the
//! broadcast type table, and its mutators' thread-local nursery slabs.
//! Segments are indexed by base address so `segment_containing` is a
//! binary search.
//!
//! Mutation of a single heap (allocation, field stores, root updates) is
//! serialized by the caller; collections are entered stop-the-world.

pub mod brick_table;
pub mod card_table;
pub mod region;
pub mod report;
pub mod segment;

pub use region::Region;
pub use report::{FieldReport, HeapReport, ObjectReport, RootReport, SegmentReport};
pub use segment::{Generation, Segment};

use crate::allocator::TlhManager;
use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::marker::{MarkContext, MarkScope};
use crate::object::{header, TypeDesc, TypeKind, TypeTable};
use crate::relocate::{compact_gen0, promote_gen0, rewrite_heap_references, RelocationMap};
use crate::stats::{CollectionKind, CollectionStats};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;

/// Resolved location of an address within one heap
#[derive(Debug, Clone)]
pub struct HeapSpan {
    pub base: usize,
    pub size: usize,
    pub generation: Generation,
    /// Set when the span is a region segment
    pub region_id: Option<u64>,
}

impl HeapSpan {
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.size
    }
}

/// One heap: four generation segments, regions, roots, types, TLHs
pub struct Heap {
    index: usize,
    name: String,
    config: Arc<GcConfig>,
    gen0: Segment,
    gen1: Segment,
    gen2: Segment,
    loh: Segment,
    regions: RwLock<Vec<Arc<Region>>>,
    /// Sorted by base; rebuilt when regions come and go
    span_index: RwLock<Vec<HeapSpan>>,
    roots: Mutex<IndexMap<String, usize>>,
    types: RwLock<TypeTable>,
    tlhs: TlhManager,
}

impl Heap {
    /// Create a heap with freshly mapped segments
    pub fn new(index: usize, config: Arc<GcConfig>) -> Result<Self> {
        let card = config.card_size_bytes;
        let brick = config.brick_size_bytes;

        let heap = Self {
            index,
            name: format!("heap-{}", index),
            gen0: Segment::new(Generation::Gen0, config.gen0_size, card, brick)?,
            gen1: Segment::new(Generation::Gen1, config.gen1_size, card, brick)?,
            gen2: Segment::new(Generation::Gen2, config.gen2_size, card, brick)?,
            loh: Segment::new(Generation::Loh, config.loh_size, card, brick)?,
            regions: RwLock::new(Vec::new()),
            span_index: RwLock::new(Vec::new()),
            roots: Mutex::new(IndexMap::new()),
            types: RwLock::new(TypeTable::new()),
            tlhs: TlhManager::new(config.tlh_slab_bytes),
            config,
        };
        heap.rebuild_span_index();
        Ok(heap)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The segment of a managed generation
    ///
    /// Region segments are reached through their `Region`, never here.
    pub fn segment_for(&self, generation: Generation) -> &Segment {
        match generation {
            Generation::Gen0 => &self.gen0,
            Generation::Gen1 => &self.gen1,
            Generation::Gen2 => &self.gen2,
            Generation::Loh => &self.loh,
            Generation::Region => unreachable!("regions are not addressed by generation"),
        }
    }

    /// Visit every segment: the four generations plus attached regions
    pub fn for_each_segment(&self, mut f: impl FnMut(&Segment)) {
        f(&self.gen0);
        f(&self.gen1);
        f(&self.gen2);
        f(&self.loh);
        for region in self.regions.read().iter() {
            f(region.segment());
        }
    }

    fn rebuild_span_index(&self) {
        let mut spans = vec![
            self.span_of(&self.gen0, None),
            self.span_of(&self.gen1, None),
            self.span_of(&self.gen2, None),
            self.span_of(&self.loh, None),
        ];
        for region in self.regions.read().iter() {
            spans.push(self.span_of(region.segment(), Some(region.id())));
        }
        spans.sort_by_key(|s| s.base);
        *self.span_index.write() = spans;
    }

    fn span_of(&self, segment: &Segment, region_id: Option<u64>) -> HeapSpan {
        HeapSpan {
            base: segment.base(),
            size: segment.size_bytes(),
            generation: segment.generation(),
            region_id,
        }
    }

    /// Binary-search the address-sorted span index
    pub fn segment_containing(&self, addr: usize) -> Option<HeapSpan> {
        let spans = self.span_index.read();
        let idx = spans.partition_point(|s| s.base <= addr);
        if idx == 0 {
            return None;
        }
        let span = &spans[idx - 1];
        if span.contains(addr) {
            Some(span.clone())
        } else {
            None
        }
    }

    // === Types ===

    /// Install a broadcast type descriptor
    pub fn register_type(&self, desc: Arc<TypeDesc>) {
        self.types.write().insert(desc.id, desc);
    }

    /// Clone the heap's type table for a GC or report pass
    pub fn types_snapshot(&self) -> TypeTable {
        self.types.read().clone()
    }

    /// Descriptor of the object starting at `addr`
    pub fn type_of(&self, addr: usize) -> Result<Arc<TypeDesc>> {
        let type_id = unsafe { header::type_id_at(addr) };
        self.types
            .read()
            .get(&type_id)
            .cloned()
            .ok_or(GcError::UnknownTypeId { type_id })
    }

    // === Roots ===

    /// Bind a named root; a null reference removes the binding
    pub fn set_root(&self, name: &str, addr: usize) -> Result<()> {
        if name.is_empty() {
            return Err(GcError::BadArgument("root name must not be empty".into()));
        }
        let mut roots = self.roots.lock();
        if addr == 0 {
            roots.shift_remove(name);
        } else {
            roots.insert(name.to_string(), addr);
        }
        Ok(())
    }

    pub fn get_root(&self, name: &str) -> Option<usize> {
        self.roots.lock().get(name).copied()
    }

    pub fn roots_snapshot(&self) -> Vec<(String, usize)> {
        self.roots
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Rewrite root values through a relocation map
    pub fn remap_roots(&self, map: &RelocationMap) {
        let mut roots = self.roots.lock();
        for value in roots.values_mut() {
            if let Some(new_value) = map.lookup(*value) {
                *value = new_value;
            }
        }
    }

    // === Regions ===

    /// Attach a fresh non-moving region
    pub fn create_region(&self, id: u64, bytes: usize) -> Result<Arc<Region>> {
        let region = Arc::new(Region::new(
            id,
            bytes,
            self.config.card_size_bytes,
            self.config.brick_size_bytes,
        )?);
        self.regions.write().push(region.clone());
        self.rebuild_span_index();
        Ok(region)
    }

    /// Detach and destroy a region; its segment leaves the span index
    pub fn remove_region(&self, id: u64) -> bool {
        let removed = {
            let mut regions = self.regions.write();
            let before = regions.len();
            regions.retain(|r| r.id() != id);
            regions.len() != before
        };
        if removed {
            self.rebuild_span_index();
        }
        removed
    }

    pub fn region_by_id(&self, id: u64) -> Option<Arc<Region>> {
        self.regions.read().iter().find(|r| r.id() == id).cloned()
    }

    pub fn regions_snapshot(&self) -> Vec<Arc<Region>> {
        self.regions.read().clone()
    }

    // === Allocation ===

    /// Allocate an object of a registered class type
    ///
    /// Routing: objects at or above the large-object threshold (or forced
    /// to Loh) go to the large-object segment; forced Gen1/Gen2 requests
    /// bump-allocate directly there; everything else goes through the
    /// calling thread's TLH in Gen0. Non-Gen0 allocations record the
    /// object start in the segment's brick table.
    pub fn alloc(&self, ty: &Arc<TypeDesc>, forced: Option<Generation>) -> Result<usize> {
        if ty.kind != TypeKind::Class {
            return Err(GcError::BadArgument(format!(
                "cannot heap-allocate non-class type '{}'",
                ty.name
            )));
        }
        if ty.id == 0 || !ty.is_laid_out() {
            return Err(GcError::BadArgument(format!(
                "type '{}' is not registered",
                ty.name
            )));
        }

        let total = header::total_object_size(ty.size);
        if total >= self.config.large_object_threshold || forced == Some(Generation::Loh) {
            return self.alloc_in_segment(Generation::Loh, total, ty.id);
        }

        match forced {
            Some(Generation::Gen1) => self.alloc_in_segment(Generation::Gen1, total, ty.id),
            Some(Generation::Gen2) => self.alloc_in_segment(Generation::Gen2, total, ty.id),
            Some(Generation::Region) => Err(GcError::BadArgument(
                "allocate into a region through the region API".into(),
            )),
            _ => self.tlhs.allocate_gen0(&self.gen0, total, ty.id, || {
                self.collect_ephemeral_local().map(|_| ())
            }),
        }
    }

    fn alloc_in_segment(
        &self,
        generation: Generation,
        total: usize,
        type_id: u64,
    ) -> Result<usize> {
        let segment = self.segment_for(generation);
        let offset = segment.try_allocate(total).ok_or(GcError::OutOfMemory {
            requested: total,
            available: segment.remaining(),
        })?;
        let addr = segment.base() + offset;
        unsafe { header::write_header(addr, type_id) };
        segment.record_allocation(addr);
        Ok(addr)
    }

    /// Allocate an object inside an attached region
    pub fn alloc_in_region(&self, region: &Region, ty: &Arc<TypeDesc>) -> Result<usize> {
        if ty.kind != TypeKind::Class {
            return Err(GcError::BadArgument(format!(
                "cannot allocate non-class type '{}'",
                ty.name
            )));
        }
        let total = header::total_object_size(ty.size);
        let segment = region.segment();
        let offset = segment.try_allocate(total).ok_or(GcError::OutOfMemory {
            requested: total,
            available: segment.remaining(),
        })?;
        let addr = segment.base() + offset;
        unsafe { header::write_header(addr, ty.id) };
        segment.record_allocation(addr);
        Ok(addr)
    }

    // === Write barrier support ===

    /// Dirty the card covering a slot inside one of this heap's old
    /// segments
    pub fn mark_card_at(&self, generation: Generation, slot_addr: usize) {
        debug_assert!(generation.is_old());
        let segment = self.segment_for(generation);
        debug_assert!(segment.contains(slot_addr));
        segment.mark_card_for_offset(slot_addr - segment.base());
    }

    /// Clear the remembered set of every old segment
    pub fn clear_old_cards(&self) {
        self.gen1.clear_cards();
        self.gen2.clear_cards();
        self.loh.clear_cards();
    }

    /// Sum of dirty cards over the old segments
    pub fn dirty_card_total(&self) -> usize {
        self.gen1.dirty_card_count() + self.gen2.dirty_card_count() + self.loh.dirty_card_count()
    }

    /// Retire every mutator TLH; their nursery is gone after a collection
    pub fn invalidate_tlhs(&self) {
        self.tlhs.invalidate_all();
    }

    // === Local sequential minor collection ===

    /// Sequential minor collection over this heap only
    ///
    /// Seeding, traversal, compaction, promotion, and reference fixup are
    /// all restricted to this heap's own segments. Cross-heap pointers
    /// into this nursery are healed only by the parallel driver; this is
    /// the single-heap fallback path and the allocator's out-of-space
    /// hook.
    pub fn collect_ephemeral_local(&self) -> Result<CollectionStats> {
        let started = Instant::now();
        let heaps = [self];
        let ctx = MarkContext::new(&heaps, MarkScope::Ephemeral, self.types_snapshot());

        ctx.seed_all(&heaps)?;
        ctx.drain_sequential()?;

        let (compaction, live_bytes) = compact_gen0(self, &ctx)?;
        rewrite_heap_references(self, ctx.types(), &compaction)?;

        let (promotion, promoted_bytes) = promote_gen0(self, ctx.types())?;
        let promoted_objects = promotion.len();
        rewrite_heap_references(self, ctx.types(), &promotion)?;

        self.invalidate_tlhs();
        self.clear_old_cards();

        let stats = CollectionStats {
            kind: CollectionKind::MinorSequential,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            objects_marked: ctx.visited_count(),
            objects_promoted: promoted_objects,
            bytes_promoted: promoted_bytes,
            bytes_compacted: live_bytes,
            cards_scanned: ctx.cards_scanned(),
        };
        log::debug!("[gc] {} local minor: {}", self.name, stats);
        Ok(stats)
    }
}
