//! Card Table - Remembered Set over Fixed Card Granules
//!
//! One byte per card granule of the owning segment: 0 clean, 1 dirty.
//! The write barrier dirties the card covering an old→young reference
//! store; minor-GC seeding scans dirty ranges and the collector clears
//! the table afterwards.
//!
//! Cards are written with atomic byte stores so a barrier resolving a
//! store into a foreign heap's segment never races its owner.

use std::sync::atomic::{AtomicU8, Ordering};

const CLEAN: u8 = 0;
const DIRTY: u8 = 1;

/// Per-segment dirty bytemap over fixed card granules
pub struct CardTable {
    cards: Box<[AtomicU8]>,
    card_size: usize,
    segment_size: usize,
}

impl CardTable {
    /// Create a clean card table covering `segment_size` bytes
    pub fn new(segment_size: usize, card_size: usize) -> Self {
        let count = segment_size.div_ceil(card_size);
        let cards = (0..count).map(|_| AtomicU8::new(CLEAN)).collect();
        Self {
            cards,
            card_size,
            segment_size,
        }
    }

    /// Number of cards in the table
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// True when the table covers zero bytes
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Dirty the card covering the given segment-relative offset
    #[inline]
    pub fn mark_dirty_by_offset(&self, offset: usize) {
        let index = offset / self.card_size;
        if index < self.cards.len() {
            self.cards[index].store(DIRTY, Ordering::Release);
        }
    }

    /// Check a card by index
    pub fn is_dirty(&self, index: usize) -> bool {
        self.cards
            .get(index)
            .map(|c| c.load(Ordering::Acquire) == DIRTY)
            .unwrap_or(false)
    }

    /// Count of dirty cards
    pub fn dirty_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|c| c.load(Ordering::Acquire) == DIRTY)
            .count()
    }

    /// Segment-relative `(start, end)` byte span for each dirty card,
    /// clipped to the segment size
    pub fn dirty_ranges(&self) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        for (index, card) in self.cards.iter().enumerate() {
            if card.load(Ordering::Acquire) == DIRTY {
                let start = index * self.card_size;
                let end = ((index + 1) * self.card_size).min(self.segment_size);
                ranges.push((start, end));
            }
        }
        ranges
    }

    /// Dirty every card; used by the diagnostic full-old-card mark
    pub fn mark_all_dirty(&self) {
        for card in self.cards.iter() {
            card.store(DIRTY, Ordering::Release);
        }
    }

    /// Reset every card to clean
    pub fn clear_all(&self) {
        for card in self.cards.iter() {
            card.store(CLEAN, Ordering::Release);
        }
    }
}
