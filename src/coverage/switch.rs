//! Multi-way branch records.

use crate::coverage::{jump::slot_value, SlotId};

/// Every outcome of one multi-way branch.
///
/// Table switches are stored with their range expanded, so both switch shapes look alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchRecord {
    /// Case keys in dispatch order
    pub keys: Vec<i32>,
    /// One slot per key
    pub key_slots: Vec<SlotId>,
    /// One counter per key
    pub key_hits: Vec<u32>,
    /// Slot of the default outcome, `None` when the default is known to be unreachable
    pub default_slot: Option<SlotId>,
    /// Times the default outcome was taken
    pub default_hits: u32,
}

impl SwitchRecord {
    /// Creates a record with zeroed counters.
    #[must_use]
    pub fn new(keys: Vec<i32>, key_slots: Vec<SlotId>, default_slot: Option<SlotId>) -> Self {
        let key_hits = vec![0; key_slots.len()];
        SwitchRecord {
            keys,
            key_slots,
            key_hits,
            default_slot,
            default_hits: 0,
        }
    }

    /// Counters of every tracked outcome, cases first.
    pub fn outcomes(&self) -> impl Iterator<Item = u32> + '_ {
        self.key_hits
            .iter()
            .copied()
            .chain(self.default_slot.map(|_| self.default_hits))
    }

    /// Number of tracked outcomes.
    #[must_use]
    pub fn outcome_count(&self) -> usize {
        self.key_slots.len() + usize::from(self.default_slot.is_some())
    }

    /// Copies the counters of this record's slots out of `hits`.
    pub fn apply_hits(&mut self, hits: &[u32]) {
        self.key_hits = self
            .key_slots
            .iter()
            .map(|slot| slot_value(hits, *slot))
            .collect();
        self.default_hits = self
            .default_slot
            .map_or(0, |slot| slot_value(hits, slot));
    }

    /// Adds the counters of `other` key by key; keys only `other` has are ignored.
    pub fn accumulate(&mut self, other: &SwitchRecord) {
        for (mine, theirs) in self.key_hits.iter_mut().zip(&other.key_hits) {
            *mine = mine.saturating_add(*theirs);
        }
        if self.default_slot.is_some() {
            self.default_hits = self.default_hits.saturating_add(other.default_hits);
        }
    }
}
