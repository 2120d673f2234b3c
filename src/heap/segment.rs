//! Segment - One Contiguous Unmanaged Buffer per Generation
//!
//! A segment owns an anonymous memory mapping, a generation tag, an
//! atomic bump cursor, and its card and brick tables. Objects are
//! allocated back-to-back from offset 0; `[0, top)` always holds valid,
//! headered objects except for transient scratch during compaction.

use crate::error::{GcError, Result};
use crate::heap::brick_table::BrickTable;
use crate::heap::card_table::CardTable;
use crate::memory;
use crate::object::header;
use crate::object::{TypeDesc, TypeTable};
use crate::util::align_up;
use memmap2::MmapMut;
use serde::Serialize;
use std::mem::size_of;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Generation tag of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Generation {
    /// Nursery; compacted and evacuated by minor GC
    Gen0,
    /// Intermediate; receives Gen0 survivors
    Gen1,
    /// Tenured
    Gen2,
    /// Large-object heap
    Loh,
    /// Non-moving arena, external to the collector
    Region,
}

impl Generation {
    /// Subject to minor GC
    pub fn is_ephemeral(self) -> bool {
        matches!(self, Generation::Gen0 | Generation::Gen1)
    }

    /// Carries a remembered set scanned by minor-GC seeding
    pub fn is_old(self) -> bool {
        matches!(self, Generation::Gen1 | Generation::Gen2 | Generation::Loh)
    }

    /// Managed by the collector (everything except regions)
    pub fn is_managed(self) -> bool {
        !matches!(self, Generation::Region)
    }

    /// Stable name for reports and logging
    pub fn name(self) -> &'static str {
        match self {
            Generation::Gen0 => "Gen0",
            Generation::Gen1 => "Gen1",
            Generation::Gen2 => "Gen2",
            Generation::Loh => "Loh",
            Generation::Region => "Region",
        }
    }
}

/// One contiguous bump-allocated buffer of unmanaged memory
pub struct Segment {
    generation: Generation,
    /// Owning mapping; released on drop
    _map: MmapMut,
    base: usize,
    size: usize,
    /// Next free offset; objects occupy `[0, top)`
    top: AtomicUsize,
    cards: CardTable,
    bricks: BrickTable,
}

impl Segment {
    /// Map a fresh zeroed segment of `size` bytes
    pub fn new(
        generation: Generation,
        size: usize,
        card_size: usize,
        brick_size: usize,
    ) -> Result<Self> {
        let mut map = MmapMut::map_anon(size).map_err(|e| {
            GcError::HeapInitialization(format!(
                "failed to map {} bytes for {}: {}",
                size,
                generation.name(),
                e
            ))
        })?;
        let base = map.as_mut_ptr() as usize;

        Ok(Self {
            generation,
            _map: map,
            base,
            size,
            top: AtomicUsize::new(0),
            cards: CardTable::new(size, card_size),
            bricks: BrickTable::new(size, brick_size),
        })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn size_bytes(&self) -> usize {
        self.size
    }

    /// Bytes currently occupied by objects
    pub fn allocated_bytes(&self) -> usize {
        self.top.load(Ordering::Acquire)
    }

    /// Bytes still free behind the bump cursor
    pub fn remaining(&self) -> usize {
        self.size - self.allocated_bytes()
    }

    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.size
    }

    /// Bump-allocate `n` bytes, aligned up to pointer size
    ///
    /// Returns the pre-advance offset, or None when the segment cannot
    /// hold the request. Never panics; exhaustion is the caller's signal.
    pub fn try_allocate(&self, n: usize) -> Option<usize> {
        let aligned = align_up(n, size_of::<usize>());
        let mut top = self.top.load(Ordering::Relaxed);
        loop {
            let new_top = top.checked_add(aligned)?;
            if new_top > self.size {
                return None;
            }
            match self
                .top
                .compare_exchange_weak(top, new_top, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return Some(top),
                Err(actual) => top = actual,
            }
        }
    }

    /// Zero the occupied prefix, rewind the cursor, and clear the card
    /// and brick tables
    ///
    /// Only safe under stop-the-world; the mapping stays in place.
    pub fn reset_nursery_layout(&self) {
        let old_top = self.top.swap(0, Ordering::SeqCst);
        unsafe {
            memory::zero_memory(self.base, old_top);
        }
        self.cards.clear_all();
        self.bricks.clear_all();
    }

    /// Rewind the cursor to `new_top` without zeroing; compaction support
    pub(crate) fn set_top(&self, new_top: usize) {
        debug_assert!(new_top <= self.size);
        self.top.store(new_top, Ordering::SeqCst);
    }

    /// Record an object start in the brick table
    #[inline]
    pub fn record_allocation(&self, abs_addr: usize) {
        debug_assert!(self.contains(abs_addr));
        self.bricks.on_allocation(abs_addr - self.base);
    }

    /// Absolute address of the last recorded object start at or before
    /// `abs_addr`, falling back to the segment base
    pub fn snap_to_object_start(&self, abs_addr: usize) -> usize {
        debug_assert!(self.contains(abs_addr));
        self.base + self.bricks.snap_to_object_start(abs_addr - self.base)
    }

    /// Dirty the card covering a segment-relative offset
    #[inline]
    pub fn mark_card_for_offset(&self, offset: usize) {
        self.cards.mark_dirty_by_offset(offset);
    }

    pub fn dirty_card_count(&self) -> usize {
        self.cards.dirty_count()
    }

    /// Segment-relative `(start, end)` spans of dirty cards
    pub fn dirty_ranges(&self) -> Vec<(usize, usize)> {
        self.cards.dirty_ranges()
    }

    pub fn mark_all_cards_dirty(&self) {
        self.cards.mark_all_dirty();
    }

    pub fn clear_cards(&self) {
        self.cards.clear_all();
    }

    /// Walk the back-to-back objects in `[0, top)`
    ///
    /// The callback receives the object's absolute address, its
    /// descriptor, and its total footprint. A zero type id marks free
    /// space (the zeroed slack a retired TLH slab leaves behind); the
    /// walk steps over it one pointer width at a time. Fails on a header
    /// whose non-zero type id is not registered.
    pub fn for_each_object<F>(&self, types: &TypeTable, mut f: F) -> Result<()>
    where
        F: FnMut(usize, &Arc<TypeDesc>, usize),
    {
        let top = self.allocated_bytes();
        let mut cursor = 0usize;
        while cursor < top {
            let addr = self.base + cursor;
            let type_id = unsafe { header::type_id_at(addr) };
            if type_id == 0 {
                cursor += size_of::<usize>();
                continue;
            }
            let ty = types
                .get(&type_id)
                .ok_or(GcError::UnknownTypeId { type_id })?;
            let total = header::total_object_size(ty.size);
            f(addr, ty, total);
            cursor += total;
        }
        Ok(())
    }
}
