//! Not-null parameter assertions.
//!
//! Compilers and annotation processors guard non-null parameters with a test that can only
//! fail when a caller breaks the contract:
//!
//! ```text
//! aload p
//! ifnonnull L
//! iconst_0                                   new java/lang/IllegalArgumentException
//! invokestatic Foo.$$$reportNull$$$0(I)V     ...
//! L:                                         athrow
//! ```
//!
//! The variant with `dup` before the jump (checking a return value) and the runtime helpers
//! `Intrinsics.throwNpe`/`throwJavaNpe` are recognized too.

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{JumpId, MethodContext},
        filters::{Action, Pattern},
    },
};

const REPORT_NULL: &str = "$$$reportNull$$$0";
const INTRINSICS: &str = "kotlin/jvm/internal/Intrinsics";
const GUARD_EXCEPTIONS: [&str; 3] = [
    "java/lang/IllegalArgumentException",
    "java/lang/IllegalStateException",
    "java/lang/NullPointerException",
];

/// Retracts generated not-null checks.
pub struct NotNullFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for a reference load
    #[default]
    Idle,
    /// Loaded a reference
    Loaded,
    /// Duplicated it
    Duplicated,
    /// Saw `ifnonnull`
    Tested { jump: JumpId },
    /// Pushed the parameter index for the report helper
    PushedIndex { jump: JumpId },
}

fn start(insn: &Instruction) -> State {
    if insn.load_index(Opcode::Aload).is_some() {
        State::Loaded
    } else {
        State::Idle
    }
}

impl Pattern for NotNullFilter {
    const NAME: &'static str = "not-null";
    type State = State;

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        let next = match state {
            State::Idle => None,
            State::Loaded if insn.is(Opcode::Dup) => Some(State::Duplicated),
            State::Loaded | State::Duplicated if insn.is_jump_with(Opcode::Ifnonnull) => {
                ctx.jump_here().map(|jump| State::Tested { jump })
            }
            State::Tested { jump } => {
                if insn.int_constant().is_some() {
                    Some(State::PushedIndex { jump })
                } else if GUARD_EXCEPTIONS.iter().any(|class| insn.is_new(class))
                    || insn.is_call_to(INTRINSICS, "throwNpe")
                    || insn.is_call_to(INTRINSICS, "throwJavaNpe")
                {
                    return (State::Idle, Action::RemoveJump(jump));
                } else {
                    None
                }
            }
            State::PushedIndex { jump } if insn.is_call_to("", REPORT_NULL) => {
                return (State::Idle, Action::RemoveJump(jump));
            }
            _ => None,
        };

        (next.unwrap_or_else(|| start(insn)), Action::None)
    }
}
