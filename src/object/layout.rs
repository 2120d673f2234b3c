//! Type Descriptors and Field Layout
//!
//! A `TypeDesc` is a stable, per-process identity for an object shape:
//! a unique non-zero id, a kind (class or inline struct), and an ordered
//! field sequence. `compute_layout` places fields in declaration order,
//! each at the next offset satisfying its alignment, and freezes the
//! resulting size and alignment.
//!
//! Layout rules:
//! - Int32: size 4, align 4
//! - Long: size 8, align = pointer size
//! - Decimal: size 16, align 4
//! - Ref: size and align = pointer size
//! - Struct: recursively laid out; size rounded up to its own effective
//!   alignment so arrays of the struct stay aligned; an otherwise-empty
//!   struct has size 1
//! - Class total size is the final cursor, not padded

use crate::util::align_up;
use std::collections::HashMap;
use std::mem::size_of;
use std::sync::Arc;

/// Shared table mapping type ids to frozen descriptors
pub type TypeTable = HashMap<u64, Arc<TypeDesc>>;

/// Kind of a type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Heap-allocated, headered object
    Class,
    /// Inline value embedded in a class payload
    Struct,
}

/// Kind of a field within a type
#[derive(Debug, Clone)]
pub enum FieldKind {
    Int32,
    Long,
    /// 16-byte decimal; deliberately 4-aligned
    Decimal,
    /// Pointer-sized reference to another class object
    Ref,
    /// Inline struct value; the descriptor must be laid out before use
    Struct(Arc<TypeDesc>),
}

impl FieldKind {
    /// Size and alignment of this field kind, pointer width dependent
    pub fn layout(&self) -> (usize, usize) {
        let ptr = size_of::<usize>();
        match self {
            FieldKind::Int32 => (4, 4),
            FieldKind::Long => (8, ptr),
            FieldKind::Decimal => (16, 4),
            FieldKind::Ref => (ptr, ptr),
            FieldKind::Struct(inner) => (inner.size, inner.align),
        }
    }

    /// Human-readable kind name for reports
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldKind::Int32 => "Int32",
            FieldKind::Long => "Long",
            FieldKind::Decimal => "Decimal",
            FieldKind::Ref => "Ref",
            FieldKind::Struct(_) => "Struct",
        }
    }
}

/// A single field within a type: declared kind plus computed placement
#[derive(Debug, Clone)]
pub struct FieldDesc {
    pub name: String,
    pub kind: FieldKind,
    /// Byte offset within the payload, valid after layout
    pub offset: usize,
    /// Field size in bytes, valid after layout
    pub size: usize,
    /// Field alignment in bytes, valid after layout
    pub align: usize,
}

/// A type descriptor: identity, kind, ordered fields, computed layout
///
/// Ids are assigned by the runtime at registration; 0 means unassigned.
/// After `compute_layout` the descriptor is frozen and shared as
/// `Arc<TypeDesc>`.
#[derive(Debug, Clone)]
pub struct TypeDesc {
    pub id: u64,
    pub name: String,
    pub kind: TypeKind,
    pub fields: Vec<FieldDesc>,
    /// Payload size in bytes, valid after layout
    pub size: usize,
    /// Effective alignment, valid after layout
    pub align: usize,
    laid_out: bool,
}

impl TypeDesc {
    /// Start a class descriptor
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Start an inline struct descriptor
    pub fn value_struct(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Struct)
    }

    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            id: 0,
            name: name.into(),
            kind,
            fields: Vec::new(),
            size: 0,
            align: 1,
            laid_out: false,
        }
    }

    /// Append a field in declaration order
    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDesc {
            name: name.into(),
            kind,
            offset: 0,
            size: 0,
            align: 0,
        });
        self
    }

    /// Whether layout has been computed and frozen
    pub fn is_laid_out(&self) -> bool {
        self.laid_out
    }

    /// Compute field offsets, total size, and alignment
    ///
    /// Pure function of the field sequence; calling twice is a no-op.
    /// Struct field descriptors must already be laid out.
    pub fn compute_layout(&mut self) {
        if self.laid_out {
            return;
        }

        let mut cursor = 0usize;
        let mut max_align = 1usize;

        for field in &mut self.fields {
            if let FieldKind::Struct(inner) = &field.kind {
                debug_assert!(inner.is_laid_out(), "struct field type not laid out");
            }
            let (size, align) = field.kind.layout();
            cursor = align_up(cursor, align);
            field.offset = cursor;
            field.size = size;
            field.align = align;
            cursor += size;
            max_align = max_align.max(align);
        }

        self.align = max_align;
        self.size = match self.kind {
            // Classes end at the final cursor, unpadded.
            TypeKind::Class => cursor,
            // Structs pad to their own alignment so arrays of the struct
            // preserve alignment; an empty struct still occupies one byte.
            TypeKind::Struct => {
                let padded = align_up(cursor, max_align);
                if padded == 0 {
                    1
                } else {
                    padded
                }
            }
        };
        self.laid_out = true;
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDesc> {
        self.fields.iter().find(|f| f.name == name)
    }
}
