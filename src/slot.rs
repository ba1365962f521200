//! Fixed-size slot table and CLOCK victim selection.
//!
//! The slot table owns the key copies and one `Arc` per resident entry,
//! and carries the clock hand, which persists across calls and wraps
//! modulo capacity. Victim selection implements the second-chance sweep:
//! probe up to `2 × capacity` slots, returning the first empty slot or
//! the first unpinned entry whose reference bit is already clear, and
//! clearing reference bits along the way. If the budget runs out, any
//! empty slot is taken; failing that the sweep's starting slot is forced
//! out, flagged to the caller so the engine can detach rather than free.
//!
//! Internal infrastructure; consumers interact with it only through
//! [`ClockCache`](crate::ClockCache).

extern crate alloc;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::entry::EntryCell;
use crate::error::CacheError;

/// One occupied slot: the owned key copy plus the table's share of the
/// entry cell.
pub(crate) struct SlotEntry {
    pub(crate) key: String,
    pub(crate) cell: Arc<EntryCell>,
}

/// Victim chosen by the CLOCK sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Victim {
    pub(crate) slot: usize,
    /// The degraded last resort: every slot was pinned or referenced and
    /// no empty slot existed, so the starting slot is evicted regardless
    /// of pin state.
    pub(crate) forced: bool,
}

pub(crate) struct SlotTable {
    slots: Box<[Option<SlotEntry>]>,
    hand: usize,
    len: usize,
}

impl SlotTable {
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, CacheError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        slots.resize_with(capacity, || None);
        Ok(Self {
            slots: slots.into_boxed_slice(),
            hand: 0,
            len: 0,
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn hand(&self) -> usize {
        self.hand
    }

    #[inline]
    pub(crate) fn key_at(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot)?.as_ref().map(|e| e.key.as_str())
    }

    #[inline]
    pub(crate) fn cell_at(&self, slot: usize) -> Option<&Arc<EntryCell>> {
        self.slots.get(slot)?.as_ref().map(|e| &e.cell)
    }

    /// Puts `key`/`cell` into an empty slot.
    pub(crate) fn install(&mut self, slot: usize, key: String, cell: Arc<EntryCell>) {
        debug_assert!(self.slots[slot].is_none(), "install over occupied slot");
        self.slots[slot] = Some(SlotEntry { key, cell });
        self.len += 1;
    }

    /// Vacates `slot`, handing ownership of its key and cell share to
    /// the caller.
    pub(crate) fn take(&mut self, slot: usize) -> Option<SlotEntry> {
        let entry = self.slots[slot].take();
        if entry.is_some() {
            self.len -= 1;
        }
        entry
    }

    /// Occupied slots in table order, for snapshots and teardown.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = (usize, &SlotEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (i, e)))
    }

    /// Runs the CLOCK sweep and returns the victim slot. Always
    /// succeeds; `forced` marks the degraded path.
    pub(crate) fn select_victim(&mut self) -> Victim {
        let start_hand = self.hand;
        let capacity = self.slots.len();
        let max_probes = capacity * 2;

        let mut probes = 0;
        while probes < max_probes {
            let slot = self.hand;
            let is_victim = match &self.slots[slot] {
                None => true,
                Some(entry) => {
                    if entry.cell.pins() == 0 && !entry.cell.referenced() {
                        true
                    } else {
                        // Second chance: unconditionally clear the bit,
                        // even for pinned entries.
                        entry.cell.clear_referenced();
                        false
                    }
                }
            };
            self.advance_hand();
            if is_victim {
                return Victim {
                    slot,
                    forced: false,
                };
            }
            probes += 1;
        }

        // Budget exhausted with everything pinned or freshly referenced;
        // fall back to any empty slot before forcing one out.
        for slot in 0..capacity {
            if self.slots[slot].is_none() {
                return Victim {
                    slot,
                    forced: false,
                };
            }
        }

        Victim {
            slot: start_hand,
            forced: true,
        }
    }

    fn advance_hand(&mut self) {
        self.hand = (self.hand + 1) % self.slots.len();
    }
}

impl core::fmt::Debug for SlotTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlotTable")
            .field("capacity", &self.slots.len())
            .field("len", &self.len)
            .field("hand", &self.hand)
            .finish()
    }
}
