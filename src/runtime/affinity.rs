//! Thread Affinity - Mapping Mutator Threads to Home Heaps
//!
//! Each thread maps to a home heap once and caches the answer. Two
//! mapping sources exist:
//!
//! - the portable default: a per-runtime registration counter, so the
//!   Nth thread to touch a runtime lands on heap `N mod heap_count`
//! - the Linux NUMA path (`numa_aware`): `sched_getcpu() mod heap_count`
//!
//! The cache is keyed by runtime id, so a thread using two runtimes (as
//! tests do) resolves each independently. An explicit pin overrides both
//! sources.

use std::cell::Cell;

thread_local! {
    /// Cached (runtime id, heap index) for the calling thread
    static HOME_HEAP: Cell<Option<(u64, usize)>> = const { Cell::new(None) };
}

/// Resolve the calling thread's cached home heap for a runtime, or
/// compute and cache it
pub fn home_heap_index(
    runtime_id: u64,
    heap_count: usize,
    compute: impl FnOnce() -> usize,
) -> usize {
    HOME_HEAP.with(|cell| match cell.get() {
        Some((cached_id, index)) if cached_id == runtime_id && index < heap_count => index,
        _ => {
            let index = compute() % heap_count;
            cell.set(Some((runtime_id, index)));
            index
        }
    })
}

/// Pin the calling thread to a heap, overriding the affinity mapping
pub fn pin_home_heap(runtime_id: u64, index: usize) {
    HOME_HEAP.with(|cell| cell.set(Some((runtime_id, index))));
}

/// Current CPU id on Linux, if available
#[cfg(target_os = "linux")]
pub fn current_cpu_id() -> Option<usize> {
    let cpu = unsafe { libc::sched_getcpu() };
    if cpu >= 0 {
        Some(cpu as usize)
    } else {
        None
    }
}

#[cfg(not(target_os = "linux"))]
pub fn current_cpu_id() -> Option<usize> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_is_cached_per_runtime() {
        let first = home_heap_index(900_001, 4, || 3);
        // A changed compute result is ignored while the cache holds.
        let second = home_heap_index(900_001, 4, || 0);
        assert_eq!(first, 3);
        assert_eq!(second, 3);

        // A different runtime id recomputes.
        let other = home_heap_index(900_002, 4, || 1);
        assert_eq!(other, 1);
    }

    #[test]
    fn test_pin_overrides_mapping() {
        home_heap_index(900_003, 4, || 0);
        pin_home_heap(900_003, 2);
        let index = home_heap_index(900_003, 4, || 0);
        assert_eq!(index, 2);
    }

    #[test]
    fn test_stale_index_recomputes() {
        // Cache an index that is out of range for a smaller heap count.
        pin_home_heap(900_004, 5);
        let index = home_heap_index(900_004, 2, || 1);
        assert_eq!(index, 1);
    }
}
