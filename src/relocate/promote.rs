//! Promotion - Evacuate Compacted Gen0 Survivors into Gen1
//!
//! Walks the compacted nursery front-to-back, bump-allocates each object
//! in Gen1, byte-copies it, and records the move. Gen1's brick table
//! learns every promoted object so later card scans can snap into it.
//! After the walk the nursery is reset to its pristine layout.
//!
//! A survivor that Gen1 cannot accommodate fails the collection with
//! OutOfMemory; there is no escalation to a major collection.

use crate::error::{GcError, Result};
use crate::heap::{Generation, Heap};
use crate::memory;
use crate::object::{header, TypeTable};
use crate::relocate::forwarding::RelocationMap;

/// Promote one heap's compacted Gen0 into its Gen1
///
/// Returns the promotion map and the number of bytes promoted. The
/// nursery is reset (zeroed, cursor rewound, card and brick tables
/// cleared) before returning.
pub fn promote_gen0(heap: &Heap, types: &TypeTable) -> Result<(RelocationMap, usize)> {
    let gen0 = heap.segment_for(Generation::Gen0);
    let gen1 = heap.segment_for(Generation::Gen1);
    let base = gen0.base();
    let top = gen0.allocated_bytes();

    let mut map = RelocationMap::new();
    let mut promoted_bytes = 0usize;
    let mut cursor = 0usize;

    while cursor < top {
        let addr = base + cursor;
        let type_id = unsafe { header::type_id_at(addr) };
        let ty = types
            .get(&type_id)
            .ok_or(GcError::UnknownTypeId { type_id })?;
        let total = header::total_object_size(ty.size);

        let offset = gen1.try_allocate(total).ok_or(GcError::OutOfMemory {
            requested: total,
            available: gen1.remaining(),
        })?;
        let new_addr = gen1.base() + offset;

        unsafe {
            memory::copy_memory(addr, new_addr, total);
        }
        gen1.record_allocation(new_addr);
        map.add_entry(addr, new_addr);
        promoted_bytes += total;

        cursor += total;
    }

    gen0.reset_nursery_layout();

    log::debug!(
        "[gc] promoted {} objects ({} bytes) from {} gen0 into gen1",
        map.len(),
        promoted_bytes,
        heap.name()
    );

    Ok((map, promoted_bytes))
}
