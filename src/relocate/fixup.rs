//! Reference Fixup - Broadcast Relocation Maps Across Heaps
//!
//! Rewrites every reference in one heap whose pre-move value is a key of
//! a relocation map: named roots, region external-root sets, and the
//! reference-typed fields (nested struct refs included) of every object
//! in every segment, region segments too. The GC driver invokes this for
//! every heap after each compaction and each promotion, so cross-heap
//! pointers are healed the moment a map is produced.

use crate::error::Result;
use crate::marker::for_each_ref_slot;
use crate::memory;
use crate::object::{header, TypeTable};
use crate::relocate::forwarding::RelocationMap;

/// Rewrite every reference in `heap` through `map`
pub fn rewrite_heap_references(
    heap: &crate::heap::Heap,
    types: &TypeTable,
    map: &RelocationMap,
) -> Result<()> {
    if map.is_empty() {
        return Ok(());
    }

    heap.remap_roots(map);

    for region in heap.regions_snapshot() {
        region.remap_external_roots(map);
    }

    let mut walk_error = None;
    heap.for_each_segment(|segment| {
        if walk_error.is_some() {
            return;
        }
        let result = segment.for_each_object(types, |addr, ty, _total| {
            for_each_ref_slot(ty, header::payload_addr(addr), &mut |slot| {
                let value = unsafe { memory::read_pointer(slot) };
                if value != 0 {
                    if let Some(new_value) = map.lookup(value) {
                        unsafe { memory::write_pointer(slot, new_value) };
                    }
                }
            });
        });
        if let Err(e) = result {
            walk_error = Some(e);
        }
    });

    match walk_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
