//! Two-way branch records.

use crate::coverage::SlotId;

/// Both outcomes of one conditional jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpRecord {
    /// Slot counting executions that took the jump
    pub true_slot: SlotId,
    /// Slot counting executions that fell through
    pub false_slot: SlotId,
    /// Times the jump was taken
    pub true_hits: u32,
    /// Times execution fell through
    pub false_hits: u32,
}

impl JumpRecord {
    /// Creates a record with zeroed counters.
    #[must_use]
    pub fn new(true_slot: SlotId, false_slot: SlotId) -> Self {
        JumpRecord {
            true_slot,
            false_slot,
            true_hits: 0,
            false_hits: 0,
        }
    }

    /// Counters in outcome order, taken first.
    pub fn outcomes(&self) -> impl Iterator<Item = u32> {
        [self.true_hits, self.false_hits].into_iter()
    }

    /// Copies the counters of this record's slots out of `hits`; missing slots read as zero.
    pub fn apply_hits(&mut self, hits: &[u32]) {
        self.true_hits = slot_value(hits, self.true_slot);
        self.false_hits = slot_value(hits, self.false_slot);
    }

    /// Adds the counters of `other`.
    pub fn accumulate(&mut self, other: &JumpRecord) {
        self.true_hits = self.true_hits.saturating_add(other.true_hits);
        self.false_hits = self.false_hits.saturating_add(other.false_hits);
    }
}

pub(crate) fn slot_value(hits: &[u32], slot: SlotId) -> u32 {
    usize::try_from(slot)
        .ok()
        .and_then(|index| hits.get(index))
        .copied()
        .unwrap_or(0)
}
