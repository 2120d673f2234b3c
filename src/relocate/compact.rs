//! Gen0 Compaction - Slide Live Objects to the Low End
//!
//! Walks the nursery object-by-object, copies marked objects densely into
//! a scratch buffer, then replaces the nursery prefix with the scratch
//! contents and zeroes the tail. Dead objects simply vanish. The returned
//! map records every live object's address, including those that did not
//! move, so the composite compaction∘promotion map is total over live
//! nursery objects.

use crate::error::Result;
use crate::heap::{Generation, Heap};
use crate::marker::MarkContext;
use crate::memory;
use crate::object::header;
use crate::relocate::forwarding::RelocationMap;

/// Compact one heap's Gen0 in place
///
/// Returns the relocation map and the number of live bytes retained.
/// Must run under stop-the-world after marking.
pub fn compact_gen0(heap: &Heap, ctx: &MarkContext) -> Result<(RelocationMap, usize)> {
    let gen0 = heap.segment_for(Generation::Gen0);
    let base = gen0.base();
    let top = gen0.allocated_bytes();

    let mut map = RelocationMap::new();
    if top == 0 {
        return Ok((map, 0));
    }

    let mut scratch = vec![0u8; top];
    let mut dense = 0usize;
    let mut cursor = 0usize;

    while cursor < top {
        let addr = base + cursor;
        let type_id = unsafe { header::type_id_at(addr) };
        if type_id == 0 {
            // Zeroed slack left where a TLH slab was retired part-full.
            cursor += std::mem::size_of::<usize>();
            continue;
        }
        let ty = ctx
            .types()
            .get(&type_id)
            .ok_or(crate::error::GcError::UnknownTypeId { type_id })?;
        let total = header::total_object_size(ty.size);

        if ctx.is_marked(addr) {
            let src = unsafe { std::slice::from_raw_parts(addr as *const u8, total) };
            scratch[dense..dense + total].copy_from_slice(src);
            map.add_entry(addr, base + dense);
            dense += total;
        }

        cursor += total;
    }

    unsafe {
        memory::copy_memory(scratch.as_ptr() as usize, base, dense);
        memory::zero_memory(base + dense, top - dense);
    }
    gen0.set_top(dense);

    log::debug!(
        "[gc] compacted {} gen0: {} -> {} bytes, {} live objects",
        heap.name(),
        top,
        dense,
        map.len()
    );

    Ok((map, dense))
}
