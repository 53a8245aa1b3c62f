//! Default argument stubs.
//!
//! Functions with default parameter values get a static companion `name$default` that receives
//! a bitmask of the arguments the caller omitted and fills them in:
//!
//! ```text
//! iload mask
//! iconst_2
//! iand
//! ifeq L
//! ldc "fallback"
//! astore 1
//! L: ...
//! ```
//!
//! One branch per defaulted parameter, none of them authored.

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{MethodContext, MethodScope},
        filters::{Action, Pattern},
    },
};

/// Suffix of generated default argument stubs.
pub const DEFAULT_STUB_SUFFIX: &str = "$default";

/// Retracts the mask tests of default argument stubs.
pub struct DefaultArgsFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for an `int` load
    #[default]
    Idle,
    /// Loaded the mask
    Loaded,
    /// Pushed the bit
    Bit,
    /// Masked
    Masked,
}

fn start(insn: &Instruction) -> State {
    if insn.load_index(Opcode::Iload).is_some() {
        State::Loaded
    } else {
        State::Idle
    }
}

impl Pattern for DefaultArgsFilter {
    const NAME: &'static str = "default-args";
    type State = State;

    fn is_applicable(scope: &MethodScope<'_>) -> bool {
        scope.method.is_static() && scope.method.name.ends_with(DEFAULT_STUB_SUFFIX)
    }

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        match state {
            State::Loaded if insn.int_constant().is_some() => (State::Bit, Action::None),
            State::Bit if insn.is(Opcode::Iand) => (State::Masked, Action::None),
            State::Masked if insn.is_jump_with(Opcode::Ifeq) || insn.is_jump_with(Opcode::Ifne) => {
                let action = ctx.jump_here().map_or(Action::None, Action::RemoveJump);
                (State::Idle, action)
            }
            _ => (start(insn), Action::None),
        }
    }
}
