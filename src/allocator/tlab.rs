//! TLH - Thread-Local Nursery Slabs
//!
//! Each mutator thread owns a private slab carved out of its home heap's
//! Gen0 segment. Allocation inside the slab is a bump of the slab cursor
//! with no heap-wide coordination; only slab reservation touches Gen0's
//! shared bump cursor.
//!
//! How it works:
//! 1. Thread requests a slab from Gen0
//! 2. Thread bump-allocates objects inside its own slab
//! 3. Slab full: thread reserves a new slab
//! 4. Gen0 full: the heap runs a local minor GC and the reservation is
//!    retried exactly once
//!
//! Every collection retires all slabs; the nursery they pointed into has
//! been reset.

use crate::error::{GcError, Result};
use crate::heap::segment::Segment;
use crate::object::header;
use crate::util::align_up;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::mem::size_of;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_THREAD_KEY: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static THREAD_KEY: u64 = NEXT_THREAD_KEY.fetch_add(1, Ordering::Relaxed);
}

/// Stable per-thread key for TLH ownership
pub fn current_thread_key() -> u64 {
    THREAD_KEY.with(|k| *k)
}

/// A thread's private nursery slab
///
/// Invariants: `slab_start <= cursor <= limit`, all inside the owning
/// Gen0 segment.
pub struct Tlh {
    slab_start: usize,
    cursor: AtomicUsize,
    limit: usize,
    retired: AtomicBool,
}

impl Tlh {
    fn new(slab_start: usize, slab_bytes: usize) -> Self {
        Self {
            slab_start,
            cursor: AtomicUsize::new(slab_start),
            limit: slab_start + slab_bytes,
            retired: AtomicBool::new(false),
        }
    }

    /// Bump-allocate `n` bytes inside the slab
    ///
    /// Returns the absolute object address, or None when the slab cannot
    /// hold the request.
    pub fn allocate(&self, n: usize) -> Option<usize> {
        if self.retired.load(Ordering::Acquire) {
            return None;
        }
        let mut cursor = self.cursor.load(Ordering::Relaxed);
        loop {
            let new_cursor = cursor.checked_add(n)?;
            if new_cursor > self.limit {
                return None;
            }
            match self.cursor.compare_exchange_weak(
                cursor,
                new_cursor,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(cursor),
                Err(actual) => cursor = actual,
            }
        }
    }

    /// Bytes still free in the slab
    pub fn remaining(&self) -> usize {
        self.limit
            .saturating_sub(self.cursor.load(Ordering::Acquire))
    }

    pub fn slab_start(&self) -> usize {
        self.slab_start
    }

    /// Retire the slab; no further allocations will succeed
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

/// Per-heap manager of all mutator TLHs
pub struct TlhManager {
    slab_bytes: usize,
    tlhs: Mutex<HashMap<u64, Arc<Tlh>>>,
    refill_count: AtomicUsize,
}

impl TlhManager {
    pub fn new(slab_bytes: usize) -> Self {
        Self {
            slab_bytes,
            tlhs: Mutex::new(HashMap::new()),
            refill_count: AtomicUsize::new(0),
        }
    }

    /// Allocate `total` bytes in Gen0 through the calling thread's TLH
    /// and write the object header
    ///
    /// `on_out_of_space` runs when Gen0 cannot supply a fresh slab
    /// (typically the heap's local minor GC); the reservation is retried
    /// exactly once afterwards. This is the only internal retry in the
    /// collector.
    pub fn allocate_gen0(
        &self,
        gen0: &Segment,
        total: usize,
        type_id: u64,
        mut on_out_of_space: impl FnMut() -> Result<()>,
    ) -> Result<usize> {
        let key = current_thread_key();

        let tlh = self.ensure_tlh(gen0, key, total, &mut on_out_of_space)?;
        if let Some(addr) = tlh.allocate(total) {
            unsafe { header::write_header(addr, type_id) };
            return Ok(addr);
        }

        // The slab was exhausted between the capacity check and the bump
        // (or retired by a collection triggered on this thread). One more
        // reservation settles it.
        let tlh = self.refill_tlh(gen0, key, total, &mut on_out_of_space)?;
        match tlh.allocate(total) {
            Some(addr) => {
                unsafe { header::write_header(addr, type_id) };
                Ok(addr)
            }
            None => Err(GcError::OutOfMemory {
                requested: total,
                available: gen0.remaining(),
            }),
        }
    }

    /// Get the calling thread's TLH, reserving a fresh slab if the
    /// current one is missing, retired, or too small for `needed`
    fn ensure_tlh(
        &self,
        gen0: &Segment,
        key: u64,
        needed: usize,
        on_out_of_space: &mut impl FnMut() -> Result<()>,
    ) -> Result<Arc<Tlh>> {
        {
            let tlhs = self.tlhs.lock();
            if let Some(tlh) = tlhs.get(&key) {
                if !tlh.is_retired() && tlh.remaining() >= needed {
                    return Ok(tlh.clone());
                }
            }
        }
        self.refill_tlh(gen0, key, needed, on_out_of_space)
    }

    /// Reserve a fresh slab for the calling thread, replacing any
    /// existing TLH
    fn refill_tlh(
        &self,
        gen0: &Segment,
        key: u64,
        needed: usize,
        on_out_of_space: &mut impl FnMut() -> Result<()>,
    ) -> Result<Arc<Tlh>> {
        let slab_bytes = self
            .slab_bytes
            .max(align_up(needed, size_of::<usize>()));

        let offset = match gen0.try_allocate(slab_bytes) {
            Some(offset) => offset,
            None => {
                // The TLH map lock must not be held here: the fallback
                // typically runs a collection that calls invalidate_all.
                on_out_of_space()?;
                gen0.try_allocate(slab_bytes)
                    .ok_or(GcError::OutOfMemory {
                        requested: slab_bytes,
                        available: gen0.remaining(),
                    })?
            }
        };

        let tlh = Arc::new(Tlh::new(gen0.base() + offset, slab_bytes));
        let mut tlhs = self.tlhs.lock();
        if let Some(old) = tlhs.insert(key, tlh.clone()) {
            old.retire();
            self.refill_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(tlh)
    }

    /// Retire and forget every TLH; called after each collection
    pub fn invalidate_all(&self) {
        let mut tlhs = self.tlhs.lock();
        for tlh in tlhs.values() {
            tlh.retire();
        }
        tlhs.clear();
    }

    pub fn active_count(&self) -> usize {
        self.tlhs.lock().len()
    }

    pub fn total_refills(&self) -> usize {
        self.refill_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::segment::Generation;

    fn gen0(size: usize) -> Segment {
        Segment::new(Generation::Gen0, size, 256, 2048).unwrap()
    }

    #[test]
    fn test_tlh_bump_allocation() {
        let seg = gen0(64 * 1024);
        let mgr = TlhManager::new(4096);
        let a = mgr
            .allocate_gen0(&seg, 32, 7, || panic!("no fallback expected"))
            .unwrap();
        let b = mgr
            .allocate_gen0(&seg, 32, 7, || panic!("no fallback expected"))
            .unwrap();
        assert_eq!(b, a + 32);
        assert_eq!(unsafe { header::type_id_at(a) }, 7);
        // Only one slab was carved from Gen0.
        assert_eq!(seg.allocated_bytes(), 4096);
    }

    #[test]
    fn test_slab_grows_for_large_request() {
        let seg = gen0(64 * 1024);
        let mgr = TlhManager::new(1024);
        let addr = mgr
            .allocate_gen0(&seg, 8192, 3, || panic!("no fallback expected"))
            .unwrap();
        assert!(seg.contains(addr));
        assert!(seg.allocated_bytes() >= 8192);
    }

    #[test]
    fn test_out_of_space_fallback_runs_once() {
        let seg = gen0(4096);
        let mgr = TlhManager::new(4096);
        // Fill the segment so reservation fails.
        seg.try_allocate(4096).unwrap();

        let mut calls = 0;
        let result = mgr.allocate_gen0(&seg, 64, 1, || {
            calls += 1;
            // A real heap would collect here; this rig frees nothing.
            Ok(())
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(GcError::OutOfMemory { .. })));
    }

    #[test]
    fn test_invalidate_all_retires_slabs() {
        let seg = gen0(64 * 1024);
        let mgr = TlhManager::new(4096);
        mgr.allocate_gen0(&seg, 32, 1, || Ok(())).unwrap();
        assert_eq!(mgr.active_count(), 1);

        mgr.invalidate_all();
        assert_eq!(mgr.active_count(), 0);

        // Allocation after invalidation reserves a fresh slab.
        let addr = mgr.allocate_gen0(&seg, 32, 1, || Ok(())).unwrap();
        assert!(seg.contains(addr));
    }
}
