//! Layout Tests - Field Placement and Size Computation

mod common;

use common::GcFixture;
use sgc::{FieldKind, TypeDesc};

#[test]
fn struct_int_int_long_has_size_16() {
    let fixture = GcFixture::with_heaps(1);
    let desc = fixture
        .runtime
        .register_type(
            TypeDesc::value_struct("P1")
                .with_field("X", FieldKind::Int32)
                .with_field("Y", FieldKind::Int32)
                .with_field("Z", FieldKind::Long),
        )
        .unwrap();
    assert_eq!(desc.size, 16);
}

#[test]
fn struct_int_long_int_has_size_24() {
    let fixture = GcFixture::with_heaps(1);
    let desc = fixture
        .runtime
        .register_type(
            TypeDesc::value_struct("P2")
                .with_field("X", FieldKind::Int32)
                .with_field("Y", FieldKind::Long)
                .with_field("Z", FieldKind::Int32),
        )
        .unwrap();
    assert_eq!(desc.size, 24);
}

#[test]
fn layout_is_deterministic_and_idempotent() {
    let mut desc = TypeDesc::class("C")
        .with_field("A", FieldKind::Int32)
        .with_field("B", FieldKind::Decimal)
        .with_field("C", FieldKind::Ref);
    desc.compute_layout();
    let first: Vec<usize> = desc.fields.iter().map(|f| f.offset).collect();
    let size = desc.size;

    desc.compute_layout();
    let second: Vec<usize> = desc.fields.iter().map(|f| f.offset).collect();
    assert_eq!(first, second);
    assert_eq!(desc.size, size);

    // A structurally identical descriptor lays out identically.
    let mut twin = TypeDesc::class("C")
        .with_field("A", FieldKind::Int32)
        .with_field("B", FieldKind::Decimal)
        .with_field("C", FieldKind::Ref);
    twin.compute_layout();
    assert_eq!(
        twin.fields.iter().map(|f| f.offset).collect::<Vec<_>>(),
        first
    );
    assert_eq!(twin.size, size);
}

#[test]
fn every_field_offset_is_aligned() {
    let fixture = GcFixture::with_heaps(1);
    let desc = fixture
        .runtime
        .register_type(
            TypeDesc::class("Mixed")
                .with_field("A", FieldKind::Int32)
                .with_field("B", FieldKind::Long)
                .with_field("C", FieldKind::Decimal)
                .with_field("D", FieldKind::Ref)
                .with_field("E", FieldKind::Int32)
                .with_field("F", FieldKind::Struct(fixture.loc.clone())),
        )
        .unwrap();

    for field in &desc.fields {
        assert_eq!(
            field.offset % field.align,
            0,
            "field {} at offset {} violates alignment {}",
            field.name,
            field.offset,
            field.align
        );
    }
}

#[test]
fn decimal_fields_are_four_aligned_not_sixteen() {
    let fixture = GcFixture::with_heaps(1);
    let desc = fixture
        .runtime
        .register_type(
            TypeDesc::value_struct("D")
                .with_field("A", FieldKind::Int32)
                .with_field("B", FieldKind::Decimal),
        )
        .unwrap();
    let b = desc.field("B").unwrap();
    assert_eq!(b.offset, 4);
    assert_eq!(b.size, 16);
    assert_eq!(b.align, 4);
}

#[test]
fn fields_are_placed_in_declaration_order() {
    let fixture = GcFixture::with_heaps(1);
    let desc = fixture
        .runtime
        .register_type(
            TypeDesc::class("Ordered")
                .with_field("First", FieldKind::Int32)
                .with_field("Second", FieldKind::Long)
                .with_field("Third", FieldKind::Int32),
        )
        .unwrap();
    let offsets: Vec<usize> = desc.fields.iter().map(|f| f.offset).collect();
    assert_eq!(offsets, vec![0, 8, 16]);
    // Class size is the final cursor, unpadded.
    assert_eq!(desc.size, 20);
}

#[test]
fn allocated_objects_are_pointer_sized_multiples() {
    let fixture = GcFixture::with_heaps(1);
    fixture.new_node(1);
    fixture.new_holder_in(sgc::Generation::Gen1);

    let report = fixture.runtime.report_for(0).unwrap();
    for segment in &report.segments {
        for object in &segment.objects {
            assert_eq!(
                object.size_bytes % std::mem::size_of::<usize>(),
                0,
                "object {} in {} has unaligned size {}",
                object.index,
                segment.base,
                object.size_bytes
            );
        }
    }
}

#[test]
fn struct_field_types_must_be_registered_first() {
    let fixture = GcFixture::with_heaps(1);
    let unregistered = {
        let mut s = TypeDesc::value_struct("Orphan").with_field("R", FieldKind::Ref);
        s.compute_layout();
        std::sync::Arc::new(s)
    };
    let result = fixture.runtime.register_type(
        TypeDesc::class("Bad").with_field("S", FieldKind::Struct(unregistered)),
    );
    assert!(result.is_err());
}
