//! Null guard of unchecked casts to non-null types.
//!
//! ```text
//! dup
//! ifnonnull L
//! new java/lang/NullPointerException
//! dup
//! ldc "null cannot be cast to non-null type ..."
//! invokespecial java/lang/NullPointerException.<init>(Ljava/lang/String;)V
//! athrow
//! L: checkcast T
//! ```

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{JumpId, MethodContext},
        filters::{Action, Pattern},
    },
};

const MESSAGE_PREFIX: &str = "null cannot be cast to non-null type";
const EXCEPTION: &str = "java/lang/NullPointerException";

/// Retracts the null test generated for casts to non-null types.
pub struct CastGuardFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for `dup`
    #[default]
    Idle,
    /// Duplicated the cast operand
    Duplicated,
    /// Tested it against null
    Tested { jump: JumpId },
    /// Allocated the exception
    Allocated { jump: JumpId },
    /// Duplicated the exception reference
    Constructing { jump: JumpId },
}

fn start(insn: &Instruction) -> State {
    if insn.is(Opcode::Dup) {
        State::Duplicated
    } else {
        State::Idle
    }
}

impl Pattern for CastGuardFilter {
    const NAME: &'static str = "cast-guard";
    type State = State;

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        let next = match state {
            State::Duplicated if insn.is_jump_with(Opcode::Ifnonnull) => {
                ctx.jump_here().map(|jump| State::Tested { jump })
            }
            State::Tested { jump } if insn.is_new(EXCEPTION) => Some(State::Allocated { jump }),
            State::Allocated { jump } if insn.is(Opcode::Dup) => {
                Some(State::Constructing { jump })
            }
            State::Constructing { jump }
                if insn
                    .string_constant()
                    .is_some_and(|text| text.starts_with(MESSAGE_PREFIX)) =>
            {
                return (State::Idle, Action::RemoveJump(jump));
            }
            _ => None,
        };

        (next.unwrap_or_else(|| start(insn)), Action::None)
    }
}
