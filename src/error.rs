//! Error Module - SGC Error Types
//!
//! Defines all error types used in SGC.

use thiserror::Error;

/// Main error type for all SGC operations
#[derive(Debug, Error)]
pub enum GcError {
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    #[error("Heap initialization failed: {0}")]
    HeapInitialization(String),

    #[error("Invalid reference: address {address:#x} maps to no segment")]
    InvalidReference { address: usize },

    #[error("Unknown type id {type_id} in object header")]
    UnknownTypeId { type_id: u64 },

    #[error("Forbidden reference edge: managed object {parent:#x} may not reference region object {child:#x}")]
    BadReferenceEdge { parent: usize, child: usize },

    #[error("Bad argument: {0}")]
    BadArgument(String),

    #[error("Collection failed: {0}")]
    CollectionFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GcError {
    /// Check if this error is recoverable by freeing memory or retrying
    /// with different arguments
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GcError::OutOfMemory { .. } | GcError::BadArgument(_) | GcError::BadReferenceEdge { .. }
        )
    }

    /// Check if this error indicates corrupted memory or a bug
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            GcError::InvalidReference { .. } | GcError::UnknownTypeId { .. }
        )
    }
}

/// Result type alias for SGC operations
pub type Result<T> = std::result::Result<T, GcError>;
