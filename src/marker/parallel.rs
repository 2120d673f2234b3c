//! Parallel Mark Driver - One Worker per Heap with Work Stealing
//!
//! Each worker pins itself to a home heap index, pops from its own
//! worklist, and steals from the others in index order when dry. A worker
//! terminates only when the outstanding-work counter reaches zero, which
//! (because children are counted before their parent's scan completes)
//! means every worklist is empty and no worker is mid-scan. Waiting
//! workers spin with exponential backoff; there are no suspension points.

use crate::marker::trace::MarkContext;
use crossbeam::utils::Backoff;
use std::sync::atomic::Ordering;

/// Run the marking loop to quiescence with `worker_count` workers
///
/// Seeding must already have populated the worklists. The call returns
/// once every worker has observed convergence.
pub fn run_parallel_mark(ctx: &MarkContext, worker_count: usize) {
    if worker_count <= 1 {
        if let Err(e) = ctx.drain_sequential() {
            log::error!("[gc] mark failed: {}", e);
        }
        return;
    }

    crossbeam::thread::scope(|scope| {
        for home in 0..worker_count {
            scope
                .builder()
                .name(format!("gc-worker-{}", home))
                .spawn(move |_| worker_loop(ctx, home, worker_count))
                .expect("failed to spawn GC worker thread");
        }
    })
    .expect("GC worker thread panicked");
}

/// Main loop of one mark worker
fn worker_loop(ctx: &MarkContext, home: usize, worker_count: usize) {
    let backoff = Backoff::new();

    loop {
        let item = ctx.worklists[home]
            .pop()
            .or_else(|| steal(ctx, home, worker_count));

        match item {
            Some(addr) => {
                if let Err(e) = ctx.scan_object(addr) {
                    log::error!("[gc-worker-{}] error scanning {:#x}: {}", home, addr, e);
                }
                ctx.outstanding.fetch_sub(1, Ordering::AcqRel);
                backoff.reset();
            }
            None => {
                if ctx.outstanding.load(Ordering::Acquire) == 0 {
                    break;
                }
                backoff.snooze();
            }
        }
    }
}

/// Fixed round-scan steal: try every other heap's worklist in index order
fn steal(ctx: &MarkContext, home: usize, worker_count: usize) -> Option<usize> {
    for victim in 0..worker_count {
        if victim == home {
            continue;
        }
        if let Some(addr) = ctx.worklists[victim].pop() {
            return Some(addr);
        }
    }
    None
}
