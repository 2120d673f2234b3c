//! Parallel GC Tests - Thread Affinity and Cross-Heap Minor Collection

mod common;

use common::GcFixture;
use sgc::Generation;
use std::collections::HashSet;
use std::thread;

#[test]
fn threads_spread_across_heaps() {
    let fixture = GcFixture::with_heaps(2);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let runtime = fixture.runtime.clone();
        handles.push(thread::spawn(move || runtime.current_heap_name()));
    }

    let names: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(
        names.len() >= 2,
        "4 threads over 2 heaps must land on at least 2 distinct heaps, got {:?}",
        names
    );
}

#[test]
fn affinity_is_cached_per_thread() {
    let fixture = GcFixture::with_heaps(2);
    let first = fixture.runtime.current_heap_name();
    for _ in 0..10 {
        assert_eq!(fixture.runtime.current_heap_name(), first);
    }
}

/// The spec's cross-heap scenario: an old holder on heap B keeps a young
/// node on heap A alive through a dirty card; the parallel collection
/// promotes the node into heap A's Gen1 and heals heap B's pointer.
#[test]
fn cross_heap_parallel_minor_collection() {
    let fixture = GcFixture::with_heaps(2);
    let runtime = &fixture.runtime;

    // Heap A: old rooted node and a young unrooted node.
    runtime.pin_current_thread(0).unwrap();
    let old_a = fixture.new_node_in(21, Generation::Gen1);
    runtime.set_root("rootA", old_a).unwrap();
    let young_a = fixture.new_node(11);
    assert!(fixture.in_segment(0, Generation::Gen0, young_a));

    // Heap B (mutating from its own thread): an old holder referencing
    // both heap-A objects.
    let holder_b = {
        let fixture_runtime = runtime.clone();
        let holder_ty = fixture.holder.clone();
        thread::spawn(move || {
            fixture_runtime.pin_current_thread(1).unwrap();
            let holder = fixture_runtime
                .alloc(&holder_ty, Some(Generation::Gen1))
                .unwrap();
            fixture_runtime.set_ref(holder, "Child", young_a).unwrap();
            fixture_runtime
                .set_struct_ref(holder, "Loc", "RefToNode", old_a)
                .unwrap();
            holder
        })
        .join()
        .unwrap()
    };
    assert!(fixture.in_segment(1, Generation::Gen1, holder_b));
    assert!(fixture.runtime.heap(1).unwrap().dirty_card_total() >= 1);

    let stats = runtime.collect_ephemeral_all_parallel().unwrap();
    assert!(stats.objects_marked >= 2);

    // Every nursery is empty.
    assert_eq!(fixture.gen0_allocated(0), 0);
    assert_eq!(fixture.gen0_allocated(1), 0);

    // Heap B's pointer now lands inside heap A's Gen1.
    let healed = runtime.get_ref(holder_b, "Child").unwrap();
    assert_ne!(healed, young_a);
    assert!(fixture.in_segment(0, Generation::Gen1, healed));
    assert_eq!(runtime.get_int32(healed, "Id").unwrap(), 11);

    // The already-old node did not move.
    assert_eq!(
        runtime.get_struct_ref(holder_b, "Loc", "RefToNode").unwrap(),
        old_a
    );
    assert_eq!(runtime.get_root("rootA"), Some(old_a));
    assert_eq!(runtime.get_int32(old_a, "Id").unwrap(), 21);

    // The remembered sets were rebuilt empty.
    assert_eq!(fixture.total_dirty_cards(), 0);
}

#[test]
fn parallel_and_sequential_agree_on_liveness() {
    let build = |fixture: &GcFixture| {
        let head = fixture.new_node(0);
        let mut cursor = head;
        for i in 1..20 {
            let next = fixture.new_node(i);
            fixture.runtime.set_ref(cursor, "Next", next).unwrap();
            cursor = next;
        }
        fixture.runtime.set_root("list", head).unwrap();
        for i in 0..30 {
            fixture.new_node(1000 + i);
        }
    };

    let sequential = GcFixture::with_heaps(1);
    build(&sequential);
    let seq_stats = sequential.runtime.collect_ephemeral_all().unwrap();

    let parallel = GcFixture::with_heaps(1);
    build(&parallel);
    let par_stats = parallel.runtime.collect_ephemeral_all_parallel().unwrap();

    assert_eq!(seq_stats.objects_marked, 20);
    assert_eq!(par_stats.objects_marked, 20);
    assert_eq!(seq_stats.objects_promoted, par_stats.objects_promoted);
}

/// Work stealing must traverse graphs that repeatedly cross heaps.
#[test]
fn cross_heap_chains_survive_parallel_collection() {
    let fixture = GcFixture::with_heaps(2);
    let runtime = &fixture.runtime;

    // Build a chain alternating between the two heaps' nurseries.
    let mut addresses = Vec::new();
    for i in 0..40 {
        runtime.pin_current_thread((i % 2) as usize).unwrap();
        addresses.push(fixture.new_node(i));
    }
    for window in addresses.windows(2) {
        runtime.set_ref(window[0], "Next", window[1]).unwrap();
    }
    runtime.set_root("chain", addresses[0]).unwrap();

    let stats = runtime.collect_ephemeral_all_parallel().unwrap();
    assert_eq!(stats.objects_marked, 40, "every link marked exactly once");
    assert_eq!(stats.objects_promoted, 40);

    // Walk the healed chain; ids must be intact and every link old.
    let mut cursor = runtime.get_root("chain").unwrap();
    for expected in 0..40 {
        assert!(
            fixture.in_segment(0, Generation::Gen1, cursor)
                || fixture.in_segment(1, Generation::Gen1, cursor),
            "link {} must live in some Gen1",
            expected
        );
        assert_eq!(runtime.get_int32(cursor, "Id").unwrap(), expected);
        cursor = runtime.get_ref(cursor, "Next").unwrap();
    }
    assert_eq!(cursor, 0);

    assert_eq!(fixture.gen0_allocated(0), 0);
    assert_eq!(fixture.gen0_allocated(1), 0);
    assert_eq!(fixture.total_dirty_cards(), 0);
}

#[test]
fn repeated_parallel_collections_keep_survivors_stable() {
    let fixture = GcFixture::with_heaps(2);
    let runtime = &fixture.runtime;

    runtime.pin_current_thread(0).unwrap();
    let keeper = fixture.new_node(7);
    runtime.set_root("keeper", keeper).unwrap();

    runtime.collect_ephemeral_all_parallel().unwrap();
    let promoted = runtime.get_root("keeper").unwrap();
    assert!(fixture.in_segment(0, Generation::Gen1, promoted));

    // Subsequent collections leave the now-old object in place.
    for _ in 0..3 {
        runtime.collect_ephemeral_all_parallel().unwrap();
        assert_eq!(runtime.get_root("keeper"), Some(promoted));
        assert_eq!(runtime.get_int32(promoted, "Id").unwrap(), 7);
    }
}

#[test]
fn empty_parallel_collection_completes() {
    let fixture = GcFixture::with_heaps(4);
    let stats = fixture.runtime.collect_ephemeral_all_parallel().unwrap();
    assert_eq!(stats.objects_marked, 0);
    assert_eq!(stats.objects_promoted, 0);
    for i in 0..4 {
        assert_eq!(fixture.gen0_allocated(i), 0);
    }
}
