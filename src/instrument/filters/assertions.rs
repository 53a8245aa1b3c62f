//! Assertion guards.
//!
//! Every `assert` statement is lowered to a check of the class's synthetic
//! `$assertionsDisabled` flag followed by the condition and a throw:
//!
//! ```text
//! getstatic Foo.$assertionsDisabled Z
//! ifne L_end
//! <condition>
//! ifne L_end
//! new java/lang/AssertionError
//! ...
//! athrow
//! L_end:
//! ```
//!
//! Assertions are disabled in most runs and their failure path is not meant to execute, so
//! both the toggle and the condition jump leading to the `AssertionError` are retracted.

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{JumpId, MethodContext, MethodScope},
        filters::{Action, Pattern},
    },
};

/// Name of the synthetic assertion toggle.
pub const ASSERTIONS_DISABLED: &str = "$assertionsDisabled";

/// Retracts assertion toggles and assertion conditions.
pub struct AssertionsFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for a read of the toggle
    #[default]
    Idle,
    /// Read the toggle
    Flag,
    /// Inside the condition of an assertion
    InAssert,
    /// Saw a condition jump, expecting the throw path next
    CondJump { jump: JumpId },
}

fn start(insn: &Instruction) -> State {
    match insn {
        Instruction::Field {
            opcode: Opcode::Getstatic,
            name,
            ..
        } if name == ASSERTIONS_DISABLED => State::Flag,
        _ => State::Idle,
    }
}

impl Pattern for AssertionsFilter {
    const NAME: &'static str = "assertions";
    type State = State;

    fn is_applicable(scope: &MethodScope<'_>) -> bool {
        scope.class.field(ASSERTIONS_DISABLED).is_some()
    }

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        match state {
            State::Idle => (start(insn), Action::None),
            State::Flag => {
                if insn.is_jump_with(Opcode::Ifne) {
                    let action = ctx.jump_here().map_or(Action::None, Action::RemoveJump);
                    (State::InAssert, action)
                } else {
                    (start(insn), Action::None)
                }
            }
            State::InAssert | State::CondJump { .. } => {
                if let (State::CondJump { jump }, true) =
                    (state, insn.is_new("java/lang/AssertionError"))
                {
                    return (State::Idle, Action::RemoveJump(jump));
                }
                match insn {
                    Instruction::Label(_) | Instruction::Line(_) => (state, Action::None),
                    _ if insn.is_conditional_jump() => match ctx.jump_here() {
                        Some(jump) => (State::CondJump { jump }, Action::None),
                        None => (State::InAssert, Action::None),
                    },
                    Instruction::Simple(opcode)
                        if *opcode == Opcode::Athrow || opcode.is_return() =>
                    {
                        (State::Idle, Action::None)
                    }
                    _ => match start(insn) {
                        State::Flag => (State::Flag, Action::None),
                        _ => (State::InAssert, Action::None),
                    },
                }
            }
        }
    }
}
