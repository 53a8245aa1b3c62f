//! Line records and their status rules.

use crate::coverage::{jump::slot_value, JumpRecord, LineStatus, SlotId, SwitchRecord};

/// Coverage of one source line.
///
/// Branch records keep the order in which the instrumenter met their instructions, which is
/// also the order their slots were allocated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    /// Line number
    pub line: u32,
    /// Signature (`name` + descriptor) of the method the line was first seen in
    pub method: String,
    /// Slot counting executions of the line
    pub slot: SlotId,
    /// Times the line was executed
    pub hits: u32,
    /// Conditional jumps on this line
    pub jumps: Vec<JumpRecord>,
    /// Switches on this line
    pub switches: Vec<SwitchRecord>,
    /// Executable instructions attributed to this line, when instruction counting is on
    pub instructions: Option<u32>,
}

impl LineRecord {
    /// Creates a record without branches.
    #[must_use]
    pub fn new(line: u32, method: &str, slot: SlotId) -> Self {
        LineRecord {
            line,
            method: method.to_string(),
            slot,
            hits: 0,
            jumps: Vec::new(),
            switches: Vec::new(),
            instructions: None,
        }
    }

    /// Derived coverage state.
    ///
    /// `FULL` requires every outcome of every jump and switch on the line to have been taken.
    #[must_use]
    pub fn status(&self) -> LineStatus {
        LineStatus::from_counts(self.hits, self.outcomes())
    }

    /// Hit counters of all branch outcomes on the line.
    pub fn outcomes(&self) -> impl Iterator<Item = u32> + '_ {
        self.jumps
            .iter()
            .flat_map(JumpRecord::outcomes)
            .chain(self.switches.iter().flat_map(SwitchRecord::outcomes))
    }

    /// Number of branch outcomes on the line.
    #[must_use]
    pub fn outcome_count(&self) -> usize {
        self.jumps.len() * 2
            + self
                .switches
                .iter()
                .map(SwitchRecord::outcome_count)
                .sum::<usize>()
    }

    /// Returns `true` if the line carries jumps or switches.
    #[must_use]
    pub fn has_branches(&self) -> bool {
        !self.jumps.is_empty() || !self.switches.is_empty()
    }

    /// Copies the counters of the line and all of its branches out of a class hit array.
    pub fn apply_hits(&mut self, hits: &[u32]) {
        self.hits = slot_value(hits, self.slot);
        for jump in &mut self.jumps {
            jump.apply_hits(hits);
        }
        for switch in &mut self.switches {
            switch.apply_hits(hits);
        }
    }

    /// Every slot owned by this line, line slot first.
    #[must_use]
    pub fn slots(&self) -> Vec<SlotId> {
        let mut slots = vec![self.slot];
        for jump in &self.jumps {
            slots.push(jump.true_slot);
            slots.push(jump.false_slot);
        }
        for switch in &self.switches {
            slots.extend_from_slice(&switch.key_slots);
            slots.extend(switch.default_slot);
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_with_jump(line_hits: u32, taken: u32, not_taken: u32) -> LineRecord {
        let mut record = LineRecord::new(4, "run()V", 0);
        record.jumps.push(JumpRecord::new(1, 2));
        record.apply_hits(&[line_hits, taken, not_taken]);
        record
    }

    #[test]
    fn one_sided_branch_is_partial() {
        let record = line_with_jump(1, 1, 0);
        assert_eq!(record.status(), LineStatus::Partial);
        assert_eq!(record.jumps[0].true_hits, 1);
        assert_eq!(record.jumps[0].false_hits, 0);
    }

    #[test]
    fn both_sides_full() {
        assert_eq!(line_with_jump(2, 1, 1).status(), LineStatus::Full);
        assert_eq!(line_with_jump(0, 0, 0).status(), LineStatus::None);
    }

    #[test]
    fn unhit_switch_case_keeps_partial() {
        let mut record = line_with_jump(1, 1, 1);
        record
            .switches
            .push(SwitchRecord::new(vec![0, 1], vec![3, 4], Some(5)));
        record.apply_hits(&[1, 1, 1, 1, 1, 0]);
        assert_eq!(record.status(), LineStatus::Partial);
        assert_eq!(record.outcome_count(), 5);
        assert_eq!(record.slots(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn line_only_mode() {
        let mut record = LineRecord::new(9, "f()V", 0);
        record.apply_hits(&[7]);
        assert_eq!(record.status(), LineStatus::Full);
        assert!(!record.has_branches());
    }
}
