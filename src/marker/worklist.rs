//! Work Stack - Per-Heap Mark Worklist
//!
//! A LIFO stack of object addresses awaiting a field scan. Any worker may
//! push (discovery routes items to the owning heap's stack) and any
//! worker may pop (the owner in its fast path, the others when
//! stealing).

use parking_lot::Mutex;

/// LIFO worklist with atomic push and try-pop
pub struct WorkStack {
    items: Mutex<Vec<usize>>,
}

impl WorkStack {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(256)),
        }
    }

    /// Push an address
    pub fn push(&self, addr: usize) {
        self.items.lock().push(addr);
    }

    /// Pop the most recently pushed address, if any
    pub fn pop(&self) -> Option<usize> {
        self.items.lock().pop()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }
}

impl Default for WorkStack {
    fn default() -> Self {
        Self::new()
    }
}
