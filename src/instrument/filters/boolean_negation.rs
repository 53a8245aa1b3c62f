//! Boolean negation lowered to a branch.
//!
//! `return !flag;` compiles to a test of the operand followed by two constant pushes:
//!
//! ```text
//! iload flag
//! ifne L1
//! iconst_1
//! goto L2
//! L1: iconst_0
//! L2: ...
//! ```
//!
//! The jump only selects which constant to push. Comparisons (`a < b`) lower to the same
//! shape with a two-operand jump and are left alone.

use crate::{
    assembly::{Instruction, LabelId, Opcode},
    instrument::{
        context::{JumpId, MethodContext},
        filters::{Action, Pattern},
    },
};

/// Retracts the jump of a lowered `!` expression.
pub struct BooleanNegationFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for `ifeq` or `ifne`
    #[default]
    Idle,
    /// Saw the jump
    Jumped { jump: JumpId, target: LabelId },
    /// Saw the constant of the fall-through path
    FirstConst {
        jump: JumpId,
        target: LabelId,
        value: i32,
    },
    /// Saw the jump over the other constant
    Skipped {
        jump: JumpId,
        target: LabelId,
        value: i32,
        end: LabelId,
    },
    /// Reached the jump target
    AtTarget {
        jump: JumpId,
        value: i32,
        end: LabelId,
    },
    /// Saw the constant of the jump path
    SecondConst { jump: JumpId, end: LabelId },
}

fn start(insn: &Instruction, ctx: &MethodContext<'_>) -> State {
    match (insn, ctx.jump_here()) {
        (
            Instruction::Jump {
                opcode: Opcode::Ifeq | Opcode::Ifne,
                target,
            },
            Some(jump),
        ) => State::Jumped {
            jump,
            target: *target,
        },
        _ => State::Idle,
    }
}

fn boolean_constant(insn: &Instruction) -> Option<i32> {
    insn.int_constant().filter(|value| *value == 0 || *value == 1)
}

impl Pattern for BooleanNegationFilter {
    const NAME: &'static str = "boolean-negation";
    type State = State;

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        let next = match (state, insn) {
            (State::Jumped { jump, target }, _) => {
                boolean_constant(insn).map(|value| State::FirstConst {
                    jump,
                    target,
                    value,
                })
            }
            (
                State::FirstConst {
                    jump,
                    target,
                    value,
                },
                Instruction::Jump {
                    opcode: Opcode::Goto,
                    target: end,
                },
            ) => Some(State::Skipped {
                jump,
                target,
                value,
                end: *end,
            }),
            (
                State::Skipped {
                    jump,
                    target,
                    value,
                    end,
                },
                Instruction::Label(label),
            ) if *label == target => Some(State::AtTarget { jump, value, end }),
            (State::AtTarget { jump, value, end }, _) => boolean_constant(insn)
                .filter(|other| *other == 1 - value)
                .map(|_| State::SecondConst { jump, end }),
            (State::SecondConst { jump, end }, Instruction::Label(label)) if *label == end => {
                return (State::Idle, Action::RemoveJump(jump));
            }
            _ => None,
        };

        (next.unwrap_or_else(|| start(insn, ctx)), Action::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::BodyAssembler,
        instrument::{context::MethodScope, filters::drive},
        test::fixtures,
    };

    fn negation(opcode: Opcode) -> BodyAssembler {
        let mut asm = BodyAssembler::new();
        let other = asm.new_label();
        let end = asm.new_label();
        asm.line(3)
            .iload(0)
            .jump(opcode, other)
            .iconst(1)
            .goto(end)
            .place(other)
            .iconst(0)
            .place(end)
            .ireturn();
        asm
    }

    #[test]
    fn negation_retracted() {
        let (class, method) = fixtures::single_method("not", "(Z)Z", negation(Opcode::Ifne));
        let actions = drive::<BooleanNegationFilter>(&class, &method);
        assert_eq!(actions, vec![(7, Action::RemoveJump(JumpId(0)))]);
    }

    #[test]
    fn comparison_kept() {
        let (class, method) = fixtures::single_method("lt", "(II)Z", negation(Opcode::IfIcmpge));
        assert!(drive::<BooleanNegationFilter>(&class, &method).is_empty());
    }

    #[test]
    fn unregistered_jump_ignored() {
        let mut asm = negation(Opcode::Ifeq);
        let mut body = asm.build();
        body.instructions.remove(0);
        let (class, method) = fixtures::single_method_body("not", "(Z)Z", body);
        assert!(drive::<BooleanNegationFilter>(&class, &method).is_empty());
    }

    #[test]
    fn transitions() {
        let (class, method) = fixtures::single_method("f", "()V", BodyAssembler::new());
        let mut ctx = MethodContext::new(MethodScope::new(&class, &method));
        ctx.register_line(0, 1);
        ctx.advance(1);
        ctx.register_jump(1);
        let jump = Instruction::Jump {
            opcode: Opcode::Ifeq,
            target: LabelId(4),
        };
        let (state, _) = BooleanNegationFilter::transition(State::Idle, &jump, &ctx);
        assert_eq!(
            state,
            State::Jumped {
                jump: JumpId(0),
                target: LabelId(4)
            }
        );
        ctx.advance(2);
        let (state, _) =
            BooleanNegationFilter::transition(state, &Instruction::simple(Opcode::Iconst5), &ctx);
        assert_eq!(state, State::Idle);
    }
}
