//! Statistics - Per-Collection Outcome Summaries
//!
//! Every collection entry point returns a `CollectionStats` describing
//! what the pass did; the runtime's cycle logger echoes them.

use serde::Serialize;
use std::fmt;

/// Which collector produced the stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectionKind {
    /// Sequential per-heap minor collection
    MinorSequential,
    /// Parallel stop-the-world minor collection
    MinorParallel,
    /// Diagnostic ephemeral mark, no moves
    MarkEphemeral,
    /// Diagnostic mark across all managed generations, no moves
    MarkFull,
}

impl CollectionKind {
    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::MinorSequential => "minor",
            CollectionKind::MinorParallel => "minor-parallel",
            CollectionKind::MarkEphemeral => "mark-ephemeral",
            CollectionKind::MarkFull => "mark-full",
        }
    }
}

/// Outcome of one collection or diagnostic mark
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub kind: CollectionKind,
    pub duration_ms: f64,
    /// Objects discovered by the mark phase
    pub objects_marked: usize,
    /// Gen0 survivors evacuated into Gen1 (zero for mark-only passes)
    pub objects_promoted: usize,
    /// Bytes evacuated into Gen1
    pub bytes_promoted: usize,
    /// Live bytes retained by nursery compaction
    pub bytes_compacted: usize,
    /// Dirty card ranges walked during seeding
    pub cards_scanned: usize,
}

impl CollectionStats {
    /// A mark-only outcome: nothing moved
    pub fn mark_only(
        kind: CollectionKind,
        duration_ms: f64,
        objects_marked: usize,
        cards_scanned: usize,
    ) -> Self {
        Self {
            kind,
            duration_ms,
            objects_marked,
            objects_promoted: 0,
            bytes_promoted: 0,
            bytes_compacted: 0,
            cards_scanned,
        }
    }
}

impl fmt::Display for CollectionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} marked {} promoted {} ({} bytes) cards {} {:.3}ms",
            self.kind.name(),
            self.objects_marked,
            self.objects_promoted,
            self.bytes_promoted,
            self.cards_scanned,
            self.duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let stats = CollectionStats::mark_only(CollectionKind::MarkFull, 1.5, 10, 2);
        let line = stats.to_string();
        assert!(line.contains("mark-full"));
        assert!(line.contains("marked 10"));
    }
}
