//! Slot assignment.
//!
//! Slots of a class are allocated contiguously from 0, method by method, in the order the
//! surviving records appear in each method's instruction stream. A line shared by several
//! methods (field initializers copied into every constructor, for example) keeps a single
//! record and slot; the record names the first method it was seen in.

use std::collections::HashMap;

use crate::{
    coverage::{ClassRecord, JumpRecord, SlotId, SwitchRecord},
    instrument::{context::MethodScan, split::ProbeSite},
};

/// Slots of one method's probe sites, keyed by original instruction index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSlots {
    /// Line slots by line number
    pub lines: HashMap<u32, SlotId>,
    /// `(taken, not taken)` slots by jump index
    pub jumps: HashMap<usize, (SlotId, SlotId)>,
    /// Case slots in key order and the default slot, by switch index
    pub switches: HashMap<usize, (Vec<SlotId>, Option<SlotId>)>,
}

impl MethodSlots {
    /// Slot counted by a probe site.
    #[must_use]
    pub fn slot(&self, site: ProbeSite) -> Option<SlotId> {
        match site {
            ProbeSite::Line(line) => self.lines.get(&line).copied(),
            ProbeSite::JumpTaken(index) => self.jumps.get(&index).map(|slots| slots.0),
            ProbeSite::JumpNotTaken(index) => self.jumps.get(&index).map(|slots| slots.1),
            ProbeSite::SwitchCase(index, position) => self
                .switches
                .get(&index)
                .and_then(|(cases, _)| cases.get(position).copied()),
            ProbeSite::SwitchDefault(index) => {
                self.switches.get(&index).and_then(|(_, default)| *default)
            }
        }
    }

    /// Returns `true` if the method has no probe.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

enum Event {
    Line(u32),
    Jump(usize, u32),
    Switch(usize, u32, usize, bool),
}

/// Creates the records of one scanned method in `record` and returns their slots.
///
/// With `count_instructions` the executable instruction counts of the surviving lines are
/// added to their records.
pub fn assign_slots(
    record: &mut ClassRecord,
    signature: &str,
    scan: &MethodScan,
    count_instructions: bool,
) -> MethodSlots {
    let mut events: Vec<(usize, Event)> = scan
        .markers
        .iter()
        .filter(|marker| !marker.retracted)
        .map(|marker| (marker.index, Event::Line(marker.line)))
        .collect();
    events.extend(scan.surviving_jumps().into_iter().map(|position| {
        let jump = &scan.jumps[position];
        (jump.index, Event::Jump(jump.index, jump.line))
    }));
    events.extend(scan.surviving_switches().into_iter().map(|position| {
        let switch = &scan.switches[position];
        (
            switch.index,
            Event::Switch(switch.index, switch.line, position, switch.default_retracted),
        )
    }));
    events.sort_by_key(|(index, _)| *index);

    let mut slots = MethodSlots::default();
    for (_, event) in events {
        match event {
            Event::Line(line) => {
                let (line_record, _) = record.line_or_insert(line, signature);
                slots.lines.insert(line, line_record.slot);
            }
            Event::Jump(index, line) => {
                let line_slot = record.line_or_insert(line, signature).0.slot;
                slots.lines.entry(line).or_insert(line_slot);
                let taken = record.allocate_slot();
                let not_taken = record.allocate_slot();
                if let Some(line_record) = record.line_mut(line) {
                    line_record.jumps.push(JumpRecord::new(taken, not_taken));
                }
                slots.jumps.insert(index, (taken, not_taken));
            }
            Event::Switch(index, line, position, default_retracted) => {
                let line_slot = record.line_or_insert(line, signature).0.slot;
                slots.lines.entry(line).or_insert(line_slot);
                let keys = scan.switches[position].keys.clone();
                let cases: Vec<SlotId> = keys.iter().map(|_| record.allocate_slot()).collect();
                let default = (!default_retracted).then(|| record.allocate_slot());
                if let Some(line_record) = record.line_mut(line) {
                    line_record
                        .switches
                        .push(SwitchRecord::new(keys, cases.clone(), default));
                }
                slots.switches.insert(index, (cases, default));
            }
        }
    }

    if count_instructions {
        for (line, count) in &scan.instruction_counts {
            if !slots.lines.contains_key(line) {
                continue;
            }
            if let Some(line_record) = record.line_mut(*line) {
                line_record.instructions = Some(line_record.instructions.unwrap_or(0) + count);
            }
        }
    }

    slots
}
