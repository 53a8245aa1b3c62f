//! Method body: instruction arena, exception table and frame limits.
//!
//! [`MethodBody`] is the unit the loader hook hands to the instrumenter and the unit the
//! instrumenter hands back. Instructions live in a flat vector; labels are ids, so rewriting
//! a body means building a new vector and copying the exception table unchanged.
//!
//! [`MethodBody::validate`] checks the structural consistency the rewriter relies on. Bodies
//! that fail it are never rewritten.

use std::collections::{HashMap, HashSet};

use crate::{
    assembly::{Instruction, LabelId},
    Result,
};

/// One protected region of the exception table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// First label of the protected range (inclusive)
    pub start: LabelId,
    /// End label of the protected range (exclusive)
    pub end: LabelId,
    /// Entry of the handler code
    pub handler: LabelId,
    /// Internal name of the caught type, `None` for catch-all (finally) handlers
    pub catch_type: Option<String>,
}

/// A method's code.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodBody {
    /// The instruction stream
    pub instructions: Vec<Instruction>,
    /// Exception table in priority order
    pub try_catch: Vec<TryCatchBlock>,
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots, including parameters
    pub max_locals: u16,
    next_label: u32,
}

impl MethodBody {
    /// Creates a body from an instruction stream.
    ///
    /// The label allocator starts above the highest label id used in `instructions`.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>, max_stack: u16, max_locals: u16) -> Self {
        let next_label = instructions
            .iter()
            .flat_map(|insn| {
                let mut labels = insn.targets();
                if let Instruction::Label(label) = insn {
                    labels.push(*label);
                }
                labels
            })
            .map(|label| label.0 + 1)
            .max()
            .unwrap_or(0);

        MethodBody {
            instructions,
            try_catch: Vec::new(),
            max_stack,
            max_locals,
            next_label,
        }
    }

    /// Attaches an exception table.
    #[must_use]
    pub fn with_try_catch(mut self, blocks: Vec<TryCatchBlock>) -> Self {
        for block in &blocks {
            let highest = block.start.0.max(block.end.0).max(block.handler.0);
            self.next_label = self.next_label.max(highest + 1);
        }
        self.try_catch = blocks;
        self
    }

    /// Allocates a label id that is not used anywhere in this body.
    pub fn new_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    /// Returns the next label id the allocator would hand out.
    #[must_use]
    pub fn label_watermark(&self) -> u32 {
        self.next_label
    }

    /// Number of instructions, markers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` for a body without instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the index of each placed label.
    #[must_use]
    pub fn label_positions(&self) -> HashMap<LabelId, usize> {
        self.instructions
            .iter()
            .enumerate()
            .filter_map(|(index, insn)| match insn {
                Instruction::Label(label) => Some((*label, index)),
                _ => None,
            })
            .collect()
    }

    /// Returns the distinct line numbers of all line markers, in first-encounter order.
    #[must_use]
    pub fn lines(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        self.instructions
            .iter()
            .filter_map(|insn| match insn {
                Instruction::Line(line) if seen.insert(*line) => Some(*line),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if the body contains at least one line marker.
    #[must_use]
    pub fn has_lines(&self) -> bool {
        self.instructions
            .iter()
            .any(|insn| matches!(insn, Instruction::Line(_)))
    }

    /// Number of instructions that execute at runtime.
    #[must_use]
    pub fn executable_len(&self) -> usize {
        self.instructions
            .iter()
            .filter(|insn| insn.is_executable())
            .count()
    }

    /// Checks that the body is structurally consistent.
    ///
    /// A valid body places every label at most once, every branch and exception table entry
    /// refers to a placed label, table switches have one target per key in a non-empty range,
    /// and lookup switch keys are strictly ascending with one target each.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        let mut placed = HashSet::new();
        for (index, insn) in self.instructions.iter().enumerate() {
            if let Instruction::Label(label) = insn {
                if !placed.insert(*label) {
                    return Err(malformed_error!(
                        "Label {} placed twice (second at instruction {})",
                        label,
                        index
                    ));
                }
            }
        }

        for (index, insn) in self.instructions.iter().enumerate() {
            match insn {
                Instruction::TableSwitch {
                    min, max, targets, ..
                } => {
                    if min > max {
                        return Err(malformed_error!(
                            "tableswitch at {} has empty range {}..{}",
                            index,
                            min,
                            max
                        ));
                    }
                    let expected = i64::from(*max) - i64::from(*min) + 1;
                    if i64::try_from(targets.len()).ok() != Some(expected) {
                        return Err(malformed_error!(
                            "tableswitch at {} has {} targets for {} keys",
                            index,
                            targets.len(),
                            expected
                        ));
                    }
                }
                Instruction::LookupSwitch { keys, targets, .. } => {
                    if keys.len() != targets.len() {
                        return Err(malformed_error!(
                            "lookupswitch at {} has {} keys but {} targets",
                            index,
                            keys.len(),
                            targets.len()
                        ));
                    }
                    if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
                        return Err(malformed_error!(
                            "lookupswitch at {} keys are not strictly ascending",
                            index
                        ));
                    }
                }
                _ => {}
            }

            for target in insn.targets() {
                if !placed.contains(&target) {
                    return Err(malformed_error!(
                        "Instruction {} ({}) targets unplaced label {}",
                        index,
                        insn,
                        target
                    ));
                }
            }
        }

        for block in &self.try_catch {
            for label in [block.start, block.end, block.handler] {
                if !placed.contains(&label) {
                    return Err(malformed_error!(
                        "Exception table entry refers to unplaced label {}",
                        label
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Opcode;

    fn jump(opcode: Opcode, target: u32) -> Instruction {
        Instruction::Jump {
            opcode,
            target: LabelId(target),
        }
    }

    #[test]
    fn label_allocation_skips_used_ids() {
        let mut body = MethodBody::new(
            vec![
                jump(Opcode::Goto, 4),
                Instruction::Label(LabelId(4)),
                Instruction::simple(Opcode::Return),
            ],
            0,
            0,
        );
        assert_eq!(body.new_label(), LabelId(5));
        assert_eq!(body.new_label(), LabelId(6));
        assert_eq!(body.label_watermark(), 7);
    }

    #[test]
    fn lines_in_encounter_order() {
        let body = MethodBody::new(
            vec![
                Instruction::Line(7),
                Instruction::simple(Opcode::Nop),
                Instruction::Line(3),
                Instruction::Line(7),
                Instruction::simple(Opcode::Return),
            ],
            0,
            0,
        );
        assert_eq!(body.lines(), vec![7, 3]);
        assert!(body.has_lines());
        assert_eq!(body.executable_len(), 2);
    }

    #[test]
    fn validate_accepts_well_formed() {
        let body = MethodBody::new(
            vec![
                Instruction::Label(LabelId(0)),
                Instruction::Var {
                    opcode: Opcode::Iload,
                    index: 0,
                },
                jump(Opcode::Ifeq, 1),
                Instruction::simple(Opcode::Return),
                Instruction::Label(LabelId(1)),
                Instruction::simple(Opcode::Return),
            ],
            1,
            1,
        )
        .with_try_catch(vec![TryCatchBlock {
            start: LabelId(0),
            end: LabelId(1),
            handler: LabelId(1),
            catch_type: None,
        }]);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unplaced_target() {
        let body = MethodBody::new(vec![jump(Opcode::Goto, 9)], 0, 0);
        assert!(matches!(
            body.validate(),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicate_label() {
        let body = MethodBody::new(
            vec![
                Instruction::Label(LabelId(0)),
                Instruction::Label(LabelId(0)),
            ],
            0,
            0,
        );
        assert!(body.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_switches() {
        let table = MethodBody::new(
            vec![
                Instruction::Label(LabelId(0)),
                Instruction::TableSwitch {
                    min: 0,
                    max: 2,
                    default: LabelId(0),
                    targets: vec![LabelId(0)],
                },
            ],
            1,
            0,
        );
        assert!(table.validate().is_err());

        let lookup = MethodBody::new(
            vec![
                Instruction::Label(LabelId(0)),
                Instruction::LookupSwitch {
                    default: LabelId(0),
                    keys: vec![5, 1],
                    targets: vec![LabelId(0), LabelId(0)],
                },
            ],
            1,
            0,
        );
        assert!(lookup.validate().is_err());
    }

    #[test]
    fn validate_rejects_dangling_try_catch() {
        let body = MethodBody::new(
            vec![
                Instruction::Label(LabelId(0)),
                Instruction::simple(Opcode::Return),
            ],
            0,
            0,
        )
        .with_try_catch(vec![TryCatchBlock {
            start: LabelId(0),
            end: LabelId(3),
            handler: LabelId(0),
            catch_type: None,
        }]);
        assert!(body.validate().is_err());
    }
}
