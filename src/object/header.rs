//! Object Header - Metadata preceding every managed object
//!
//! Object Header Layout (16 bytes):
//! ┌─────────────────────────────────────────┐
//! │       Sync Block (8 bytes) = 0          │
//! ├─────────────────────────────────────────┤
//! │         Type Id (8 bytes)               │
//! └─────────────────────────────────────────┘
//!
//! References between objects are raw absolute addresses of the header
//! word; the null reference is address 0. An object's total footprint is
//! header + payload, rounded up to pointer size.

use crate::memory;
use crate::util::align_up;
use std::mem::size_of;

/// Size of the object header in bytes
pub const HEADER_SIZE: usize = 16;

/// Byte offset of the sync block word within the header
pub const SYNC_BLOCK_OFFSET: usize = 0;

/// Byte offset of the type id word within the header
pub const TYPE_ID_OFFSET: usize = 8;

/// Write a fresh header at `addr`: zero sync block, given type id
///
/// # Safety
///
/// `addr` must be pointer-aligned and valid for `HEADER_SIZE` bytes of
/// writes.
#[inline]
pub unsafe fn write_header(addr: usize, type_id: u64) {
    memory::write_value::<u64>(addr + SYNC_BLOCK_OFFSET, 0);
    memory::write_value::<u64>(addr + TYPE_ID_OFFSET, type_id);
}

/// Read the type id of the object starting at `addr`
///
/// # Safety
///
/// `addr` must be the start of a valid object header.
#[inline]
pub unsafe fn type_id_at(addr: usize) -> u64 {
    memory::read_value::<u64>(addr + TYPE_ID_OFFSET)
}

/// Read the sync block word of the object starting at `addr`
///
/// # Safety
///
/// `addr` must be the start of a valid object header.
#[inline]
pub unsafe fn sync_block_at(addr: usize) -> u64 {
    memory::read_value::<u64>(addr + SYNC_BLOCK_OFFSET)
}

/// Address of the payload of the object starting at `obj`
#[inline]
pub const fn payload_addr(obj: usize) -> usize {
    obj + HEADER_SIZE
}

/// Total footprint of an object with the given payload size: header plus
/// payload, rounded up to pointer size
#[inline]
pub fn total_object_size(payload_size: usize) -> usize {
    align_up(HEADER_SIZE + payload_size, size_of::<usize>())
}
