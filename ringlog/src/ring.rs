//! Ring semantics over a point-in-time copy of a store.
//!
//! Writers never stop, so readers work from a [`Snapshot`]: a private copy of
//! every slot bracketed by two reads of the append counter. Everything
//! downstream (export, follow) reads the snapshot and never the live mapping,
//! so a long render pass cannot observe the ring changing shape under it.
//!
//! # Design
//!
//! - Logical index `i` lives in slot `i % CAPACITY`
//! - The counter read before the copy (`settled_index`) bounds the lines that
//!   were claimed before any slot was copied
//! - The counter read after the copy (`next_index`) is at least one past
//!   every line the copy can contain, so indices below
//!   `next_index - CAPACITY` may have been overwritten
//! - The readable window is `next_index - CAPACITY .. settled_index`;
//!   indices claimed while the copy ran are left for the next snapshot
//! - Slots with the sentinel timestamp (never written, or mid-write) are
//!   skipped

use std::ops::Range;

use crate::line::LogLine;
use crate::slab::{CAPACITY, RawSlot, Slab};

/// Maps a logical index to its physical slot.
#[inline]
#[allow(clippy::cast_possible_truncation)] // Result is bounded by CAPACITY
pub fn slot_for(index: u64) -> usize {
    (index % CAPACITY as u64) as usize
}

/// A private copy of a store's slots and the counter values around it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    settled_index: u64,
    next_index: u64,
    slots: Box<[RawSlot]>,
}

impl Snapshot {
    /// Reads the counter, copies every slot, then reads the counter again.
    pub(crate) fn capture(slab: &Slab) -> Self {
        let settled_index = slab.next_index();
        let slots = copy_slots(slab);
        let next_index = slab.next_index();
        Self::from_parts(settled_index, slots, next_index)
    }

    /// Copies the slots against a counter value the caller read earlier, as
    /// if writers ran between that read and the copy.
    #[cfg(test)]
    pub(crate) fn capture_after(settled_index: u64, slab: &Slab) -> Self {
        let slots = copy_slots(slab);
        Self::from_parts(settled_index, slots, slab.next_index())
    }

    fn from_parts(settled_index: u64, slots: Box<[RawSlot]>, next_index: u64) -> Self {
        debug_assert!(settled_index <= next_index && slots.len() == CAPACITY);
        Self {
            settled_index,
            next_index,
            slots,
        }
    }

    /// Returns the append counter read after the copy.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Returns the append counter read before the copy.
    ///
    /// Lines at or past this index were claimed while the copy ran and may
    /// be missing or stale in this snapshot.
    pub fn settled_index(&self) -> u64 {
        self.settled_index
    }

    /// Logical indices this snapshot can report reliably.
    pub(crate) fn window(&self) -> Range<u64> {
        let oldest = self.next_index.saturating_sub(CAPACITY as u64);
        oldest.min(self.settled_index)..self.settled_index
    }

    /// Returns the line stored for logical index `index`, if its slot holds
    /// a complete line.
    ///
    /// The slot is shared by every index congruent modulo the capacity; the
    /// caller decides whether `index` is inside [`Snapshot::window`].
    pub fn line_at(&self, index: u64) -> Option<LogLine> {
        self.slots[slot_for(index)].to_line()
    }

    /// Iterates the readable window oldest-first.
    pub fn iter(&self) -> RingIter<'_> {
        let window = self.window();
        RingIter {
            snapshot: self,
            next: window.start,
            end: window.end,
        }
    }

    /// Returns the number of visible lines.
    pub fn live_len(&self) -> usize {
        self.window()
            .filter(|&index| self.slots[slot_for(index)].timestamp_ns != 0)
            .count()
    }

    /// Returns whether no line is visible.
    pub fn is_empty(&self) -> bool {
        self.live_len() == 0
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = LogLine;
    type IntoIter = RingIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn copy_slots(slab: &Slab) -> Box<[RawSlot]> {
    (0..CAPACITY).map(|slot| slab.read_slot(slot)).collect()
}

/// Oldest-first iterator over a snapshot's readable window.
///
/// Makes at most one pass over the ring, skipping slots with the sentinel
/// timestamp.
#[derive(Debug)]
pub struct RingIter<'a> {
    snapshot: &'a Snapshot,
    next: u64,
    end: u64,
}

impl Iterator for RingIter<'_> {
    type Item = LogLine;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.end {
            let index = self.next;
            self.next += 1;

            if let Some(line) = self.snapshot.line_at(index) {
                return Some(line);
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, usize::try_from(self.end - self.next).ok())
    }
}
