//! Heap Report - Inspectable Snapshot of One Heap
//!
//! Builds a structured, serializable picture of a heap: every segment
//! with its occupancy and dirty-card count, every object with its typed
//! field values, and the named roots. Pretty-printing is left to the
//! consumer; the snapshot itself is plain data.

use crate::error::Result;
use crate::heap::{Generation, Heap, Segment};
use crate::memory;
use crate::object::{header, FieldKind, TypeDesc, TypeTable};
use serde::Serialize;

/// Snapshot of one heap
#[derive(Debug, Clone, Serialize)]
pub struct HeapReport {
    pub name: String,
    pub index: usize,
    pub segments: Vec<SegmentReport>,
    pub roots: Vec<RootReport>,
}

/// Snapshot of one segment
#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub generation: Generation,
    pub base: usize,
    pub size_bytes: usize,
    pub allocated_bytes: usize,
    pub dirty_card_count: usize,
    pub objects: Vec<ObjectReport>,
}

impl SegmentReport {
    /// Whether an address lies inside this segment's range
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.size_bytes
    }
}

/// Snapshot of one object
#[derive(Debug, Clone, Serialize)]
pub struct ObjectReport {
    pub index: usize,
    pub type_name: String,
    pub address: usize,
    pub size_bytes: usize,
    pub fields: Vec<FieldReport>,
    pub struct_summaries: Vec<String>,
}

/// One field's formatted value
#[derive(Debug, Clone, Serialize)]
pub struct FieldReport {
    pub name: String,
    pub kind: String,
    pub value: String,
}

/// One named root binding
#[derive(Debug, Clone, Serialize)]
pub struct RootReport {
    pub name: String,
    pub address: usize,
}

impl Heap {
    /// Build a full snapshot of this heap
    pub fn report(&self) -> Result<HeapReport> {
        let types = self.types_snapshot();
        let mut segments = Vec::new();

        let mut error = None;
        self.for_each_segment(|segment| {
            if error.is_some() {
                return;
            }
            match segment_report(segment, &types) {
                Ok(report) => segments.push(report),
                Err(e) => error = Some(e),
            }
        });
        if let Some(e) = error {
            return Err(e);
        }

        let roots = self
            .roots_snapshot()
            .into_iter()
            .map(|(name, address)| RootReport { name, address })
            .collect();

        Ok(HeapReport {
            name: self.name().to_string(),
            index: self.index(),
            segments,
            roots,
        })
    }
}

fn segment_report(segment: &Segment, types: &TypeTable) -> Result<SegmentReport> {
    let mut objects = Vec::new();
    segment.for_each_object(types, |addr, ty, total| {
        objects.push(object_report(objects.len(), addr, ty, total));
    })?;

    Ok(SegmentReport {
        generation: segment.generation(),
        base: segment.base(),
        size_bytes: segment.size_bytes(),
        allocated_bytes: segment.allocated_bytes(),
        dirty_card_count: segment.dirty_card_count(),
        objects,
    })
}

fn object_report(index: usize, addr: usize, ty: &TypeDesc, total: usize) -> ObjectReport {
    let payload = header::payload_addr(addr);
    let mut fields = Vec::new();
    let mut struct_summaries = Vec::new();

    for field in &ty.fields {
        fields.push(FieldReport {
            name: field.name.clone(),
            kind: field.kind.kind_name().to_string(),
            value: field_value(&field.kind, payload + field.offset),
        });
        if let FieldKind::Struct(inner) = &field.kind {
            struct_summaries.push(format!(
                "{} {}",
                field.name,
                struct_summary(inner, payload + field.offset)
            ));
        }
    }

    ObjectReport {
        index,
        type_name: ty.name.clone(),
        address: addr,
        size_bytes: total,
        fields,
        struct_summaries,
    }
}

fn field_value(kind: &FieldKind, slot: usize) -> String {
    match kind {
        FieldKind::Int32 => unsafe { memory::read_value::<i32>(slot) }.to_string(),
        FieldKind::Long => unsafe { memory::read_value::<i64>(slot) }.to_string(),
        // Decimals are 4-aligned, so the 16-byte load must not assume
        // natural alignment.
        FieldKind::Decimal => unsafe { memory::read_unaligned_value::<i128>(slot) }.to_string(),
        FieldKind::Ref => format_ref(unsafe { memory::read_pointer(slot) }),
        FieldKind::Struct(inner) => struct_summary(inner, slot),
    }
}

fn struct_summary(ty: &TypeDesc, base: usize) -> String {
    let parts: Vec<String> = ty
        .fields
        .iter()
        .map(|f| format!("{}: {}", f.name, field_value(&f.kind, base + f.offset)))
        .collect();
    format!("{{ {} }}", parts.join(", "))
}

fn format_ref(addr: usize) -> String {
    if addr == 0 {
        "null".to_string()
    } else {
        format!("{:#x}", addr)
    }
}
