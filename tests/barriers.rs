//! Write Barrier Tests - Cards, Region Edges, External Roots

mod common;

use common::GcFixture;
use sgc::{GcError, Generation};

#[test]
fn old_to_young_store_dirties_a_card() {
    let fixture = GcFixture::with_heaps(1);
    let holder = fixture.new_holder_in(Generation::Gen1);
    let young = fixture.new_node(1);

    assert_eq!(fixture.total_dirty_cards(), 0);
    fixture.runtime.set_ref(holder, "Child", young).unwrap();
    assert!(fixture.total_dirty_cards() >= 1);

    let report = fixture.runtime.report_for(0).unwrap();
    let gen1 = report
        .segments
        .iter()
        .find(|s| s.generation == Generation::Gen1)
        .unwrap();
    assert!(gen1.dirty_card_count >= 1);
}

#[test]
fn cross_heap_old_to_young_store_dirties_the_parents_card() {
    let fixture = GcFixture::with_heaps(2);

    // Node N in heap 0's nursery.
    fixture.runtime.pin_current_thread(0).unwrap();
    let young = fixture.new_node(1);
    assert!(fixture.in_segment(0, Generation::Gen0, young));

    // Holder H in heap 1's Gen1, storing a reference to N.
    fixture.runtime.pin_current_thread(1).unwrap();
    let holder = fixture.new_holder_in(Generation::Gen1);
    assert!(fixture.in_segment(1, Generation::Gen1, holder));
    fixture.runtime.set_ref(holder, "Child", young).unwrap();

    let report = fixture.runtime.report_for(1).unwrap();
    let gen1 = report
        .segments
        .iter()
        .find(|s| s.generation == Generation::Gen1)
        .unwrap();
    assert!(gen1.dirty_card_count >= 1, "card must land on H's segment");

    // Heap 0 saw no store into an old generation.
    assert_eq!(fixture.runtime.heap(0).unwrap().dirty_card_total(), 0);
}

#[test]
fn young_parent_store_leaves_cards_clean() {
    let fixture = GcFixture::with_heaps(1);
    let a = fixture.new_node(1);
    let b = fixture.new_node(2);
    fixture.runtime.set_ref(a, "Next", b).unwrap();
    assert_eq!(fixture.total_dirty_cards(), 0);
}

#[test]
fn old_to_old_store_leaves_cards_clean() {
    let fixture = GcFixture::with_heaps(1);
    let holder = fixture.new_holder_in(Generation::Gen1);
    let old = fixture.new_node_in(1, Generation::Gen2);
    fixture.runtime.set_ref(holder, "Child", old).unwrap();
    assert_eq!(fixture.total_dirty_cards(), 0);
}

#[test]
fn nested_struct_ref_store_goes_through_the_barrier() {
    let fixture = GcFixture::with_heaps(1);
    let holder = fixture.new_holder_in(Generation::Gen1);
    let young = fixture.new_node(5);

    fixture
        .runtime
        .set_struct_ref(holder, "Loc", "RefToNode", young)
        .unwrap();
    assert!(fixture.total_dirty_cards() >= 1);
    assert_eq!(
        fixture
            .runtime
            .get_struct_ref(holder, "Loc", "RefToNode")
            .unwrap(),
        young
    );
}

#[test]
fn null_store_clears_the_field_without_a_card() {
    let fixture = GcFixture::with_heaps(1);
    let holder = fixture.new_holder_in(Generation::Gen1);
    fixture.runtime.set_ref(holder, "Child", 0).unwrap();
    assert_eq!(fixture.runtime.get_ref(holder, "Child").unwrap(), 0);
    assert_eq!(fixture.total_dirty_cards(), 0);
}

#[test]
fn managed_to_region_store_is_rejected_before_writing() {
    let fixture = GcFixture::with_heaps(1);
    let region = fixture.runtime.create_region(64 * 1024).unwrap();
    let region_obj = fixture
        .runtime
        .alloc_in_region(region, &fixture.node)
        .unwrap();
    let managed = fixture.new_node(1);

    let result = fixture.runtime.set_ref(managed, "Next", region_obj);
    assert!(matches!(result, Err(GcError::BadReferenceEdge { .. })));
    // The store was rejected; the field still reads null.
    assert_eq!(fixture.runtime.get_ref(managed, "Next").unwrap(), 0);
}

#[test]
fn region_to_managed_store_records_an_external_root() {
    let fixture = GcFixture::with_heaps(1);
    let region_id = fixture.runtime.create_region(64 * 1024).unwrap();
    let region_obj = fixture
        .runtime
        .alloc_in_region(region_id, &fixture.node)
        .unwrap();
    let young = fixture.new_node(77);

    fixture.runtime.set_ref(region_obj, "Next", young).unwrap();

    let heap = fixture.runtime.heap(0).unwrap();
    let region = heap.region_by_id(region_id).unwrap();
    assert_eq!(region.external_root_count(), 1);
    assert!(region.external_roots().contains(&young));

    // The external root keeps the otherwise-unreachable node alive
    // across a minor collection, and the region's field is healed.
    fixture.runtime.collect_ephemeral_all().unwrap();
    let healed = fixture.runtime.get_ref(region_obj, "Next").unwrap();
    assert!(fixture.in_segment(0, Generation::Gen1, healed));
    assert_eq!(fixture.runtime.get_int32(healed, "Id").unwrap(), 77);
}

#[test]
fn destroyed_region_leaves_the_address_space() {
    let fixture = GcFixture::with_heaps(1);
    let region_id = fixture.runtime.create_region(64 * 1024).unwrap();
    let region_obj = fixture
        .runtime
        .alloc_in_region(region_id, &fixture.node)
        .unwrap();
    assert!(fixture.runtime.resolve(region_obj).is_some());

    fixture.runtime.destroy_region(region_id).unwrap();
    assert!(fixture.runtime.resolve(region_obj).is_none());
    assert!(fixture.runtime.destroy_region(region_id).is_err());
}

#[test]
fn unknown_field_store_is_rejected() {
    let fixture = GcFixture::with_heaps(1);
    let node = fixture.new_node(1);
    assert!(matches!(
        fixture.runtime.set_ref(node, "NoSuchField", 0),
        Err(GcError::BadArgument(_))
    ));
    assert!(matches!(
        fixture.runtime.set_int32(node, "Next", 1),
        Err(GcError::BadArgument(_))
    ));
}

#[test]
fn store_through_unmapped_address_is_invalid() {
    let fixture = GcFixture::with_heaps(1);
    let result = fixture.runtime.set_int32(0x10, "Id", 1);
    assert!(matches!(result, Err(GcError::InvalidReference { .. })));
}
