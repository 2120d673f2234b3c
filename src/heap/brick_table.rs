//! Brick Table - Address-to-Object-Start Snapping
//!
//! One entry per brick granule of the owning segment. Each entry holds
//! the segment-relative offset of the last object start recorded within
//! that brick, or -1 if none. Card-range seeding snaps an arbitrary
//! offset back to a preceding object start, then walks objects forward.

use std::sync::atomic::{AtomicI64, Ordering};

const EMPTY: i64 = -1;

/// Per-segment "last object start" index over fixed brick granules
pub struct BrickTable {
    bricks: Box<[AtomicI64]>,
    brick_size: usize,
}

impl BrickTable {
    /// Create an empty brick table covering `segment_size` bytes
    pub fn new(segment_size: usize, brick_size: usize) -> Self {
        let count = segment_size.div_ceil(brick_size);
        let bricks = (0..count).map(|_| AtomicI64::new(EMPTY)).collect();
        Self { bricks, brick_size }
    }

    /// Number of brick entries
    pub fn len(&self) -> usize {
        self.bricks.len()
    }

    /// True when the table covers zero bytes
    pub fn is_empty(&self) -> bool {
        self.bricks.is_empty()
    }

    /// Record an object start at the given segment-relative offset
    ///
    /// Keeps the maximum start seen per brick, so concurrent allocators
    /// on the same segment cannot regress an entry.
    #[inline]
    pub fn on_allocation(&self, offset: usize) {
        let index = offset / self.brick_size;
        if index < self.bricks.len() {
            self.bricks[index].fetch_max(offset as i64, Ordering::AcqRel);
        }
    }

    /// Segment-relative offset of the last recorded object start at or
    /// before `offset`
    ///
    /// The query's own brick is used only when its entry does not lie past
    /// the query; otherwise the scan walks left until a recorded entry, and
    /// falls back to offset 0 (the segment base is always a safe snap).
    pub fn snap_to_object_start(&self, offset: usize) -> usize {
        let mut index = (offset / self.brick_size).min(self.bricks.len().saturating_sub(1));

        let entry = self.bricks[index].load(Ordering::Acquire);
        if entry >= 0 && entry as usize <= offset {
            return entry as usize;
        }

        while index > 0 {
            index -= 1;
            let entry = self.bricks[index].load(Ordering::Acquire);
            if entry >= 0 {
                return entry as usize;
            }
        }

        0
    }

    /// Reset every entry to empty
    pub fn clear_all(&self) {
        for brick in self.bricks.iter() {
            brick.store(EMPTY, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_snaps_to_base() {
        let table = BrickTable::new(8192, 2048);
        assert_eq!(table.len(), 4);
        assert_eq!(table.snap_to_object_start(5000), 0);
    }

    #[test]
    fn test_snap_within_brick() {
        let table = BrickTable::new(8192, 2048);
        table.on_allocation(2100);
        assert_eq!(table.snap_to_object_start(2500), 2100);
    }

    #[test]
    fn test_snap_walks_left() {
        let table = BrickTable::new(8192, 2048);
        table.on_allocation(100);
        assert_eq!(table.snap_to_object_start(7000), 100);
    }

    #[test]
    fn test_entry_past_query_is_skipped() {
        let table = BrickTable::new(8192, 2048);
        table.on_allocation(96);
        table.on_allocation(2600);
        // 2600 is in the query's brick but past the query offset; the
        // snap must not land after the query.
        assert_eq!(table.snap_to_object_start(2300), 96);
    }

    #[test]
    fn test_keeps_last_start_per_brick() {
        let table = BrickTable::new(8192, 2048);
        table.on_allocation(0);
        table.on_allocation(512);
        table.on_allocation(128);
        assert_eq!(table.snap_to_object_start(2000), 512);
    }

    #[test]
    fn test_clear_all() {
        let table = BrickTable::new(8192, 2048);
        table.on_allocation(512);
        table.clear_all();
        assert_eq!(table.snap_to_object_start(2000), 0);
    }
}
