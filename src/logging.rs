//! GC Logging - Cycle and Phase Events
//!
//! Collection progress is reported through the `log` facade; in verbose
//! mode the logger also echoes pause lines to stderr with timestamps, and
//! it keeps a bounded buffer of recent events for inspection.

use crate::stats::CollectionStats;
use chrono::Local;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum buffered events before the oldest are dropped
const EVENT_BUFFER_LIMIT: usize = 256;

/// One GC lifecycle event
#[derive(Debug, Clone, Serialize)]
pub enum GcEvent {
    /// A collection entered stop-the-world
    CycleStart { kind: String, cycle: u64 },
    /// One phase of a collection finished
    PhaseEnd {
        phase: String,
        cycle: u64,
        duration_ms: f64,
    },
    /// A collection completed
    CycleEnd {
        kind: String,
        cycle: u64,
        duration_ms: f64,
        objects_marked: usize,
        objects_promoted: usize,
        bytes_promoted: usize,
    },
}

/// Centralized logger for collection events
pub struct GcLogger {
    verbose: bool,
    events: Mutex<Vec<GcEvent>>,
    cycle: AtomicU64,
}

impl GcLogger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            events: Mutex::new(Vec::new()),
            cycle: AtomicU64::new(0),
        }
    }

    /// Issue the next cycle number
    pub fn next_cycle(&self) -> u64 {
        self.cycle.fetch_add(1, Ordering::Relaxed)
    }

    /// Total cycles started so far
    pub fn cycle_count(&self) -> u64 {
        self.cycle.load(Ordering::Relaxed)
    }

    /// Record a cycle start
    pub fn cycle_start(&self, kind: &str, cycle: u64) {
        self.log(GcEvent::CycleStart {
            kind: kind.to_string(),
            cycle,
        });
    }

    /// Record a finished phase
    pub fn phase_end(&self, phase: &str, cycle: u64, duration_ms: f64) {
        self.log(GcEvent::PhaseEnd {
            phase: phase.to_string(),
            cycle,
            duration_ms,
        });
    }

    /// Record a completed collection from its stats
    pub fn cycle_end(&self, cycle: u64, stats: &CollectionStats) {
        self.log(GcEvent::CycleEnd {
            kind: stats.kind.name().to_string(),
            cycle,
            duration_ms: stats.duration_ms,
            objects_marked: stats.objects_marked,
            objects_promoted: stats.objects_promoted,
            bytes_promoted: stats.bytes_promoted,
        });
    }

    fn log(&self, event: GcEvent) {
        match &event {
            GcEvent::CycleStart { kind, cycle } => {
                log::info!("[gc] GC({}) {} start", cycle, kind);
            }
            GcEvent::PhaseEnd {
                phase,
                cycle,
                duration_ms,
            } => {
                log::debug!("[gc] GC({}) {} {:.3}ms", cycle, phase, duration_ms);
            }
            GcEvent::CycleEnd {
                kind,
                cycle,
                duration_ms,
                objects_marked,
                objects_promoted,
                bytes_promoted,
            } => {
                log::info!(
                    "[gc] GC({}) {} end: marked {} promoted {} ({} bytes) {:.3}ms",
                    cycle,
                    kind,
                    objects_marked,
                    objects_promoted,
                    bytes_promoted,
                    duration_ms
                );
            }
        }

        if self.verbose {
            match serde_json::to_string(&event) {
                Ok(json) => eprintln!("[gc {}] {}", Local::now().format("%H:%M:%S%.3f"), json),
                Err(_) => eprintln!("[gc {}] {:?}", Local::now().format("%H:%M:%S%.3f"), event),
            }
        }

        let mut events = self.events.lock();
        if events.len() >= EVENT_BUFFER_LIMIT {
            events.remove(0);
        }
        events.push(event);
    }

    /// Snapshot of the buffered recent events
    pub fn recent_events(&self) -> Vec<GcEvent> {
        self.events.lock().clone()
    }
}
