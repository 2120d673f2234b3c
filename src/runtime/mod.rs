//! Runtime Module - Multi-Heap Runtime and Public API
//!
//! The runtime owns one heap per logical CPU (configurable), the global
//! type-id issuer, and the stop-the-world GC driver. Mutator threads map
//! to home heaps through the affinity cache; allocations and object
//! mutations route to the heap owning the touched address.
//!
//! Collections assume the caller has quiesced every mutator: the parallel
//! driver spawns one worker per heap for the mark phase, then performs
//! per-heap compaction and promotion with global relocation broadcast so
//! no cross-heap pointer ever observes an intermediate address.

pub mod affinity;

use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::heap::{Generation, Heap, HeapReport, HeapSpan, Region};
use crate::logging::GcLogger;
use crate::marker::{run_parallel_mark, MarkContext, MarkScope};
use crate::memory;
use crate::object::{header, FieldDesc, FieldKind, TypeDesc, TypeTable};
use crate::relocate::{compact_gen0, promote_gen0, rewrite_heap_references};
use crate::stats::{CollectionKind, CollectionStats};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Multi-heap GC runtime
pub struct Runtime {
    id: u64,
    config: Arc<GcConfig>,
    heaps: Vec<Arc<Heap>>,
    next_type_id: AtomicU64,
    types: parking_lot::RwLock<TypeTable>,
    next_region_id: AtomicU64,
    /// Portable thread→heap registration counter
    next_thread_slot: AtomicUsize,
    logger: GcLogger,
}

impl Runtime {
    /// Create a runtime with one heap per `config.resolved_heap_count()`
    pub fn new(config: GcConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let heap_count = config.resolved_heap_count();

        let mut heaps = Vec::with_capacity(heap_count);
        for index in 0..heap_count {
            heaps.push(Arc::new(Heap::new(index, config.clone())?));
        }

        log::info!(
            "[gc] runtime up: {} heaps, gen0 {} bytes each",
            heap_count,
            config.gen0_size
        );

        Ok(Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            logger: GcLogger::new(config.verbose),
            config,
            heaps,
            next_type_id: AtomicU64::new(1),
            types: parking_lot::RwLock::new(TypeTable::new()),
            next_region_id: AtomicU64::new(1),
            next_thread_slot: AtomicUsize::new(0),
        })
    }

    /// Create a runtime with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(GcConfig::default())
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    pub fn heap_count(&self) -> usize {
        self.heaps.len()
    }

    pub fn heaps(&self) -> &[Arc<Heap>] {
        &self.heaps
    }

    pub fn heap(&self, index: usize) -> Option<&Arc<Heap>> {
        self.heaps.get(index)
    }

    /// Collections started on this runtime
    pub fn gc_cycle_count(&self) -> u64 {
        self.logger.cycle_count()
    }

    /// Recent GC events recorded by the cycle logger
    pub fn recent_gc_events(&self) -> Vec<crate::logging::GcEvent> {
        self.logger.recent_events()
    }

    // === Thread affinity ===

    /// The calling thread's home heap
    pub fn current_heap(&self) -> &Arc<Heap> {
        let index = affinity::home_heap_index(self.id, self.heaps.len(), || self.cpu_slot());
        &self.heaps[index]
    }

    /// Name of the calling thread's home heap
    pub fn current_heap_name(&self) -> String {
        self.current_heap().name().to_string()
    }

    fn cpu_slot(&self) -> usize {
        if self.config.numa_aware {
            if let Some(cpu) = affinity::current_cpu_id() {
                return cpu;
            }
        }
        self.next_thread_slot.fetch_add(1, Ordering::Relaxed)
    }

    /// Pin the calling thread to a heap, overriding the affinity mapping
    pub fn pin_current_thread(&self, index: usize) -> Result<()> {
        if index >= self.heaps.len() {
            return Err(GcError::BadArgument(format!(
                "heap index {} out of range ({} heaps)",
                index,
                self.heaps.len()
            )));
        }
        affinity::pin_home_heap(self.id, index);
        Ok(())
    }

    // === Type registration ===

    /// Register a type: compute its layout once, assign a global id if
    /// unassigned, and broadcast the descriptor to every heap
    ///
    /// Struct field types must be registered before the types embedding
    /// them.
    pub fn register_type(&self, mut desc: TypeDesc) -> Result<Arc<TypeDesc>> {
        if desc.name.is_empty() {
            return Err(GcError::BadArgument("type name must not be empty".into()));
        }
        for field in &desc.fields {
            if let FieldKind::Struct(inner) = &field.kind {
                if inner.id == 0 || !inner.is_laid_out() {
                    return Err(GcError::BadArgument(format!(
                        "struct field '{}' of '{}' uses unregistered type '{}'",
                        field.name, desc.name, inner.name
                    )));
                }
            }
        }

        desc.compute_layout();
        if desc.id == 0 {
            desc.id = self.next_type_id.fetch_add(1, Ordering::Relaxed);
        }

        let desc = Arc::new(desc);
        self.types.write().insert(desc.id, desc.clone());
        for heap in &self.heaps {
            heap.register_type(desc.clone());
        }
        Ok(desc)
    }

    fn types_snapshot(&self) -> TypeTable {
        self.types.read().clone()
    }

    // === Allocation ===

    /// Allocate an object on the calling thread's home heap
    pub fn alloc(&self, ty: &Arc<TypeDesc>, forced: Option<Generation>) -> Result<usize> {
        self.current_heap().alloc(ty, forced)
    }

    // === Address resolution ===

    /// Resolve an address to its owning heap and segment span
    pub fn resolve(&self, addr: usize) -> Option<(usize, HeapSpan)> {
        for (index, heap) in self.heaps.iter().enumerate() {
            if let Some(span) = heap.segment_containing(addr) {
                return Some((index, span));
            }
        }
        None
    }

    fn resolve_object(&self, addr: usize) -> Result<(usize, HeapSpan, Arc<TypeDesc>)> {
        let (heap_index, span) = self
            .resolve(addr)
            .ok_or(GcError::InvalidReference { address: addr })?;
        let ty = self.heaps[heap_index].type_of(addr)?;
        Ok((heap_index, span, ty))
    }

    fn field_of<'t>(ty: &'t TypeDesc, name: &str) -> Result<&'t FieldDesc> {
        ty.field(name).ok_or_else(|| {
            GcError::BadArgument(format!("type '{}' has no field '{}'", ty.name, name))
        })
    }

    // === Roots ===

    /// Bind a named root on the heap owning `addr`; a null reference
    /// removes the binding everywhere
    ///
    /// Rebinding a name to an object on a different heap drops the old
    /// binding first, so a name never resolves twice.
    pub fn set_root(&self, name: &str, addr: usize) -> Result<()> {
        if name.is_empty() {
            return Err(GcError::BadArgument("root name must not be empty".into()));
        }
        if addr == 0 {
            for heap in &self.heaps {
                heap.set_root(name, 0)?;
            }
            return Ok(());
        }
        let (heap_index, _) = self
            .resolve(addr)
            .ok_or(GcError::InvalidReference { address: addr })?;
        for (index, heap) in self.heaps.iter().enumerate() {
            if index != heap_index {
                heap.set_root(name, 0)?;
            }
        }
        self.heaps[heap_index].set_root(name, addr)
    }

    /// Look a named root up across all heaps
    pub fn get_root(&self, name: &str) -> Option<usize> {
        self.heaps.iter().find_map(|h| h.get_root(name))
    }

    // === Field access ===

    /// Write an Int32 field
    pub fn set_int32(&self, obj: usize, field: &str, value: i32) -> Result<()> {
        let (_, _, ty) = self.resolve_object(obj)?;
        let fd = Self::field_of(&ty, field)?;
        if !matches!(fd.kind, FieldKind::Int32) {
            return Err(GcError::BadArgument(format!(
                "field '{}' of '{}' is not Int32",
                field, ty.name
            )));
        }
        unsafe { memory::write_value::<i32>(header::payload_addr(obj) + fd.offset, value) };
        Ok(())
    }

    /// Read an Int32 field
    pub fn get_int32(&self, obj: usize, field: &str) -> Result<i32> {
        let (_, _, ty) = self.resolve_object(obj)?;
        let fd = Self::field_of(&ty, field)?;
        if !matches!(fd.kind, FieldKind::Int32) {
            return Err(GcError::BadArgument(format!(
                "field '{}' of '{}' is not Int32",
                field, ty.name
            )));
        }
        Ok(unsafe { memory::read_value::<i32>(header::payload_addr(obj) + fd.offset) })
    }

    /// Write a reference field through the write barrier
    pub fn set_ref(&self, obj: usize, field: &str, child: usize) -> Result<()> {
        let (heap_index, span, ty) = self.resolve_object(obj)?;
        let fd = Self::field_of(&ty, field)?;
        if !matches!(fd.kind, FieldKind::Ref) {
            return Err(GcError::BadArgument(format!(
                "field '{}' of '{}' is not a reference",
                field, ty.name
            )));
        }
        let slot = header::payload_addr(obj) + fd.offset;
        self.store_ref(heap_index, &span, obj, slot, child)
    }

    /// Read a reference field
    pub fn get_ref(&self, obj: usize, field: &str) -> Result<usize> {
        let (_, _, ty) = self.resolve_object(obj)?;
        let fd = Self::field_of(&ty, field)?;
        if !matches!(fd.kind, FieldKind::Ref) {
            return Err(GcError::BadArgument(format!(
                "field '{}' of '{}' is not a reference",
                field, ty.name
            )));
        }
        Ok(unsafe { memory::read_pointer(header::payload_addr(obj) + fd.offset) })
    }

    /// Write a reference nested inside a struct field, through the write
    /// barrier
    pub fn set_struct_ref(
        &self,
        obj: usize,
        struct_field: &str,
        nested_field: &str,
        child: usize,
    ) -> Result<()> {
        let (heap_index, span, ty) = self.resolve_object(obj)?;
        let slot = Self::struct_ref_slot(&ty, obj, struct_field, nested_field)?;
        self.store_ref(heap_index, &span, obj, slot, child)
    }

    /// Read a reference nested inside a struct field
    pub fn get_struct_ref(
        &self,
        obj: usize,
        struct_field: &str,
        nested_field: &str,
    ) -> Result<usize> {
        let (_, _, ty) = self.resolve_object(obj)?;
        let slot = Self::struct_ref_slot(&ty, obj, struct_field, nested_field)?;
        Ok(unsafe { memory::read_pointer(slot) })
    }

    fn struct_ref_slot(
        ty: &TypeDesc,
        obj: usize,
        struct_field: &str,
        nested_field: &str,
    ) -> Result<usize> {
        let fd = Self::field_of(ty, struct_field)?;
        let inner = match &fd.kind {
            FieldKind::Struct(inner) => inner,
            _ => {
                return Err(GcError::BadArgument(format!(
                    "field '{}' of '{}' is not a struct",
                    struct_field, ty.name
                )))
            }
        };
        let nested = Self::field_of(inner, nested_field)?;
        if !matches!(nested.kind, FieldKind::Ref) {
            return Err(GcError::BadArgument(format!(
                "field '{}.{}' is not a reference",
                struct_field, nested_field
            )));
        }
        Ok(header::payload_addr(obj) + fd.offset + nested.offset)
    }

    /// The write barrier: validate the edge, store the reference, then
    /// maintain the remembered sets
    ///
    /// 1. A managed→region store is rejected before the write: regions
    ///    may be destroyed en masse, which would dangle the reference.
    /// 2. The 64-bit child address is written into the slot.
    /// 3. If the parent lives in an old generation and the child is
    ///    ephemeral on any heap, the card covering the slot is dirtied on
    ///    the parent's segment.
    /// 4. If the parent lives in a region and the child is managed, the
    ///    child lands in the region's external-root set.
    fn store_ref(
        &self,
        heap_index: usize,
        span: &HeapSpan,
        parent: usize,
        slot: usize,
        child: usize,
    ) -> Result<()> {
        if child == 0 {
            unsafe { memory::write_pointer(slot, 0) };
            return Ok(());
        }

        let (_, child_span) = self
            .resolve(child)
            .ok_or(GcError::InvalidReference { address: child })?;

        if span.generation.is_managed() && child_span.generation == Generation::Region {
            return Err(GcError::BadReferenceEdge { parent, child });
        }

        unsafe { memory::write_pointer(slot, child) };

        if span.generation.is_old() && child_span.generation.is_ephemeral() {
            self.heaps[heap_index].mark_card_at(span.generation, slot);
        }

        if span.generation == Generation::Region {
            if let Some(region_id) = span.region_id {
                if let Some(region) = self.heaps[heap_index].region_by_id(region_id) {
                    region.record_external_root(child);
                }
            }
        }

        Ok(())
    }

    // === Regions ===

    /// Create a non-moving region on the calling thread's home heap
    pub fn create_region(&self, bytes: usize) -> Result<u64> {
        if bytes == 0 {
            return Err(GcError::BadArgument("region size must be > 0".into()));
        }
        let id = self.next_region_id.fetch_add(1, Ordering::Relaxed);
        self.current_heap().create_region(id, bytes)?;
        Ok(id)
    }

    /// Allocate an object inside a region
    pub fn alloc_in_region(&self, region_id: u64, ty: &Arc<TypeDesc>) -> Result<usize> {
        let (heap, region) = self.find_region(region_id)?;
        heap.alloc_in_region(&region, ty)
    }

    /// Destroy a region: its segment leaves the owning heap's span index
    /// and its external-root set is discarded
    pub fn destroy_region(&self, region_id: u64) -> Result<()> {
        for heap in &self.heaps {
            if heap.remove_region(region_id) {
                return Ok(());
            }
        }
        Err(GcError::BadArgument(format!(
            "no region with id {}",
            region_id
        )))
    }

    fn find_region(&self, region_id: u64) -> Result<(&Arc<Heap>, Arc<Region>)> {
        for heap in &self.heaps {
            if let Some(region) = heap.region_by_id(region_id) {
                return Ok((heap, region));
            }
        }
        Err(GcError::BadArgument(format!(
            "no region with id {}",
            region_id
        )))
    }

    // === Collections ===

    /// Diagnostic mark over the ephemeral generations; moves nothing,
    /// never reduces dirty-card counts, never changes Gen0 occupancy
    ///
    /// With `mark_all_old_cards` every old card is dirtied first, forcing
    /// the seeding pass to walk the old generations in full.
    pub fn mark_ephemeral_all(&self, mark_all_old_cards: bool) -> Result<CollectionStats> {
        let started = Instant::now();
        let cycle = self.logger.next_cycle();
        self.logger.cycle_start("mark-ephemeral", cycle);

        if mark_all_old_cards {
            for heap in &self.heaps {
                for generation in [Generation::Gen1, Generation::Gen2, Generation::Loh] {
                    heap.segment_for(generation).mark_all_cards_dirty();
                }
            }
        }

        let heap_refs: Vec<&Heap> = self.heaps.iter().map(|h| h.as_ref()).collect();
        let ctx = MarkContext::new(&heap_refs, MarkScope::Ephemeral, self.types_snapshot());
        ctx.seed_all(&heap_refs)?;
        ctx.drain_sequential()?;

        let stats = CollectionStats::mark_only(
            CollectionKind::MarkEphemeral,
            started.elapsed().as_secs_f64() * 1000.0,
            ctx.visited_count(),
            ctx.cards_scanned(),
        );
        self.logger.cycle_end(cycle, &stats);
        Ok(stats)
    }

    /// Diagnostic mark across every managed generation; no sweep, no
    /// moves
    pub fn collect_full_all(&self) -> Result<CollectionStats> {
        let started = Instant::now();
        let cycle = self.logger.next_cycle();
        self.logger.cycle_start("mark-full", cycle);

        let heap_refs: Vec<&Heap> = self.heaps.iter().map(|h| h.as_ref()).collect();
        let ctx = MarkContext::new(&heap_refs, MarkScope::AllManaged, self.types_snapshot());
        for (index, heap) in heap_refs.iter().enumerate() {
            ctx.seed_roots_and_regions(heap, index);
        }
        ctx.drain_sequential()?;

        let stats = CollectionStats::mark_only(
            CollectionKind::MarkFull,
            started.elapsed().as_secs_f64() * 1000.0,
            ctx.visited_count(),
            0,
        );
        self.logger.cycle_end(cycle, &stats);
        Ok(stats)
    }

    /// Sequential minor collection: each heap collects itself in order
    pub fn collect_ephemeral_all(&self) -> Result<CollectionStats> {
        let started = Instant::now();
        let cycle = self.logger.next_cycle();
        self.logger.cycle_start("minor", cycle);

        let mut objects_marked = 0;
        let mut objects_promoted = 0;
        let mut bytes_promoted = 0;
        let mut bytes_compacted = 0;
        let mut cards_scanned = 0;
        for heap in &self.heaps {
            let stats = heap.collect_ephemeral_local()?;
            objects_marked += stats.objects_marked;
            objects_promoted += stats.objects_promoted;
            bytes_promoted += stats.bytes_promoted;
            bytes_compacted += stats.bytes_compacted;
            cards_scanned += stats.cards_scanned;
        }

        let stats = CollectionStats {
            kind: CollectionKind::MinorSequential,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            objects_marked,
            objects_promoted,
            bytes_promoted,
            bytes_compacted,
            cards_scanned,
        };
        self.logger.cycle_end(cycle, &stats);
        Ok(stats)
    }

    /// The core parallel stop-the-world minor collection
    ///
    /// Mutators must be quiesced. One worker per heap marks to
    /// quiescence with work stealing; then, per heap in order, the
    /// nursery is compacted and its survivors promoted into Gen1, each
    /// relocation map broadcast to every heap so cross-heap pointers are
    /// rewritten. Afterwards every TLH is invalid and every old card is
    /// clean.
    pub fn collect_ephemeral_all_parallel(&self) -> Result<CollectionStats> {
        let started = Instant::now();
        let cycle = self.logger.next_cycle();
        self.logger.cycle_start("minor-parallel", cycle);

        let heap_refs: Vec<&Heap> = self.heaps.iter().map(|h| h.as_ref()).collect();
        let ctx = MarkContext::new(&heap_refs, MarkScope::Ephemeral, self.types_snapshot());

        let mark_started = Instant::now();
        ctx.seed_all(&heap_refs)?;
        run_parallel_mark(&ctx, heap_refs.len());
        self.logger.phase_end(
            "mark",
            cycle,
            mark_started.elapsed().as_secs_f64() * 1000.0,
        );

        let compact_started = Instant::now();
        let mut bytes_compacted = 0;
        for heap in &heap_refs {
            let (map, live_bytes) = compact_gen0(heap, &ctx)?;
            bytes_compacted += live_bytes;
            for target in &heap_refs {
                rewrite_heap_references(target, ctx.types(), &map)?;
            }
        }
        self.logger.phase_end(
            "compact",
            cycle,
            compact_started.elapsed().as_secs_f64() * 1000.0,
        );

        let promote_started = Instant::now();
        let mut objects_promoted = 0;
        let mut bytes_promoted = 0;
        for heap in &heap_refs {
            let (map, bytes) = promote_gen0(heap, ctx.types())?;
            objects_promoted += map.len();
            bytes_promoted += bytes;
            for target in &heap_refs {
                rewrite_heap_references(target, ctx.types(), &map)?;
            }
        }
        self.logger.phase_end(
            "promote",
            cycle,
            promote_started.elapsed().as_secs_f64() * 1000.0,
        );

        for heap in &heap_refs {
            heap.invalidate_tlhs();
            heap.clear_old_cards();
        }

        let stats = CollectionStats {
            kind: CollectionKind::MinorParallel,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            objects_marked: ctx.visited_count(),
            objects_promoted,
            bytes_promoted,
            bytes_compacted,
            cards_scanned: ctx.cards_scanned(),
        };
        self.logger.cycle_end(cycle, &stats);
        Ok(stats)
    }

    // === Reports ===

    /// Snapshot every heap
    pub fn report(&self) -> Result<Vec<HeapReport>> {
        self.heaps.iter().map(|h| h.report()).collect()
    }

    /// Snapshot one heap by index
    pub fn report_for(&self, index: usize) -> Result<HeapReport> {
        self.heaps
            .get(index)
            .ok_or_else(|| {
                GcError::BadArgument(format!(
                    "heap index {} out of range ({} heaps)",
                    index,
                    self.heaps.len()
                ))
            })?
            .report()
    }
}
