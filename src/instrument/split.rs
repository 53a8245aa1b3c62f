//! Branch splitting.
//!
//! Every surviving branch outcome gets an instruction window of its own, so a probe placed in
//! the window runs exactly when that outcome is taken:
//!
//! ```text
//! iload 0                          iload 0
//! ifeq L            ==>            ifeq T
//! ...                              <probe: not taken>
//! goto M                           ...
//! L: ...                           goto M
//!                                  T: <probe: taken>
//!                                  L: ...
//! ```
//!
//! Windows are placed directly in front of their original destination. The last window of a
//! destination falls into it, every other window ends with a `goto` to it, and code that
//! reached the destination by falling through is sent over the windows with a `goto` of its
//! own. Original labels stay where they were, so the exception table and every jump that was
//! not split are unaffected.
//!
//! Line probes are placed right after their surviving marker.

use std::collections::{BTreeSet, HashMap};

use crate::{
    assembly::{Instruction, LabelId, MethodBody, Opcode, TryCatchBlock},
    instrument::context::MethodScan,
};

/// What a probe counts. Indices refer to the original instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeSite {
    /// A line marker was passed
    Line(u32),
    /// The jump at this index was taken
    JumpTaken(usize),
    /// The jump at this index fell through
    JumpNotTaken(usize),
    /// The switch at this index selected the case at this position of its key list
    SwitchCase(usize, usize),
    /// The switch at this index selected its default
    SwitchDefault(usize),
}

/// Element of a split stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitItem {
    /// An instruction of the rewritten stream
    Insn(Instruction),
    /// Placeholder for a probe
    Probe(ProbeSite),
}

/// A method body with probe placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitBody {
    /// Instructions and probe placeholders
    pub items: Vec<SplitItem>,
    /// Exception table of the original body
    pub try_catch: Vec<TryCatchBlock>,
    /// Operand stack depth of the original body
    pub max_stack: u16,
    /// Local variable slots of the original body
    pub max_locals: u16,
}

impl SplitBody {
    /// Probe placeholders in stream order.
    pub fn probes(&self) -> impl Iterator<Item = ProbeSite> + '_ {
        self.items.iter().filter_map(|item| match item {
            SplitItem::Probe(site) => Some(*site),
            SplitItem::Insn(_) => None,
        })
    }
}

struct Window {
    label: LabelId,
    site: ProbeSite,
}

struct Splitter {
    next_label: u32,
    windows: HashMap<LabelId, Vec<Window>>,
}

impl Splitter {
    fn window(&mut self, destination: LabelId, site: ProbeSite) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        self.windows
            .entry(destination)
            .or_default()
            .push(Window { label, site });
        label
    }
}

/// Splits the surviving branches of `body` and marks probe positions.
#[must_use]
pub fn split_branches(body: &MethodBody, scan: &MethodScan) -> SplitBody {
    let markers: BTreeSet<usize> = scan
        .markers
        .iter()
        .filter(|marker| !marker.retracted)
        .map(|marker| marker.index)
        .collect();
    let jumps: BTreeSet<usize> = scan
        .surviving_jumps()
        .into_iter()
        .map(|position| scan.jumps[position].index)
        .collect();
    let switches: HashMap<usize, bool> = scan
        .surviving_switches()
        .into_iter()
        .map(|position| {
            let site = &scan.switches[position];
            (site.index, site.default_retracted)
        })
        .collect();

    let mut splitter = Splitter {
        next_label: body.label_watermark(),
        windows: HashMap::new(),
    };

    // Rewrite branch instructions first; windows are collected per destination.
    let mut rewritten: Vec<Vec<SplitItem>> = Vec::with_capacity(body.instructions.len());
    for (index, insn) in body.instructions.iter().enumerate() {
        let mut items = Vec::with_capacity(2);
        match insn {
            Instruction::Line(line) if markers.contains(&index) => {
                items.push(SplitItem::Insn(insn.clone()));
                items.push(SplitItem::Probe(ProbeSite::Line(*line)));
            }
            Instruction::Jump { opcode, target } if jumps.contains(&index) => {
                let taken = splitter.window(*target, ProbeSite::JumpTaken(index));
                items.push(SplitItem::Insn(Instruction::Jump {
                    opcode: *opcode,
                    target: taken,
                }));
                items.push(SplitItem::Probe(ProbeSite::JumpNotTaken(index)));
            }
            Instruction::TableSwitch {
                min,
                max,
                default,
                targets,
            } if switches.contains_key(&index) => {
                let (default, targets) =
                    split_switch(&mut splitter, index, *default, targets, switches[&index]);
                items.push(SplitItem::Insn(Instruction::TableSwitch {
                    min: *min,
                    max: *max,
                    default,
                    targets,
                }));
            }
            Instruction::LookupSwitch {
                default,
                keys,
                targets,
            } if switches.contains_key(&index) => {
                let (default, targets) =
                    split_switch(&mut splitter, index, *default, targets, switches[&index]);
                items.push(SplitItem::Insn(Instruction::LookupSwitch {
                    default,
                    keys: keys.clone(),
                    targets,
                }));
            }
            _ => items.push(SplitItem::Insn(insn.clone())),
        }
        rewritten.push(items);
    }

    let mut items = Vec::with_capacity(body.instructions.len() * 2);
    let mut reachable = true;
    for (insn, replacement) in body.instructions.iter().zip(rewritten) {
        if let Instruction::Label(label) = insn {
            if let Some(windows) = splitter.windows.remove(label) {
                if reachable {
                    items.push(SplitItem::Insn(Instruction::Jump {
                        opcode: Opcode::Goto,
                        target: *label,
                    }));
                }
                let last = windows.len() - 1;
                for (position, window) in windows.into_iter().enumerate() {
                    items.push(SplitItem::Insn(Instruction::Label(window.label)));
                    items.push(SplitItem::Probe(window.site));
                    if position != last {
                        items.push(SplitItem::Insn(Instruction::Jump {
                            opcode: Opcode::Goto,
                            target: *label,
                        }));
                    }
                }
            }
        }

        for item in replacement {
            if let SplitItem::Insn(insn) = &item {
                match insn {
                    Instruction::Label(_) => reachable = true,
                    Instruction::Line(_) => {}
                    _ => reachable = insn.falls_through(),
                }
            }
            items.push(item);
        }
    }

    SplitBody {
        items,
        try_catch: body.try_catch.clone(),
        max_stack: body.max_stack,
        max_locals: body.max_locals,
    }
}

fn split_switch(
    splitter: &mut Splitter,
    index: usize,
    default: LabelId,
    targets: &[LabelId],
    default_retracted: bool,
) -> (LabelId, Vec<LabelId>) {
    let targets = targets
        .iter()
        .enumerate()
        .map(|(position, target)| splitter.window(*target, ProbeSite::SwitchCase(index, position)))
        .collect();
    let default = if default_retracted {
        default
    } else {
        splitter.window(default, ProbeSite::SwitchDefault(index))
    };
    (default, targets)
}
