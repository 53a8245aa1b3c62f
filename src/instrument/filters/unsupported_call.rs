//! Super-call guard of default argument stubs.
//!
//! Stubs for overridable members reject calls through `super` with a marker argument check:
//!
//! ```text
//! aload marker
//! ifnull L
//! new java/lang/UnsupportedOperationException
//! dup
//! ldc "Super calls with default arguments not supported in this target, function: f"
//! invokespecial java/lang/UnsupportedOperationException.<init>(Ljava/lang/String;)V
//! athrow
//! L: ...
//! ```

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{JumpId, MethodContext, MethodScope},
        filters::{default_args::DEFAULT_STUB_SUFFIX, Action, Pattern},
    },
};

const MESSAGE_PREFIX: &str = "Super calls with default arguments not supported";
const EXCEPTION: &str = "java/lang/UnsupportedOperationException";

/// Retracts the marker check of default argument stubs.
pub struct UnsupportedCallFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for a reference load
    #[default]
    Idle,
    /// Loaded the marker
    Loaded,
    /// Tested it against null
    Tested { jump: JumpId },
    /// Allocated the exception
    Allocated { jump: JumpId },
    /// Duplicated the exception reference
    Duplicated { jump: JumpId },
}

fn start(insn: &Instruction) -> State {
    if insn.load_index(Opcode::Aload).is_some() {
        State::Loaded
    } else {
        State::Idle
    }
}

impl Pattern for UnsupportedCallFilter {
    const NAME: &'static str = "unsupported-call";
    type State = State;

    fn is_applicable(scope: &MethodScope<'_>) -> bool {
        scope.method.name.ends_with(DEFAULT_STUB_SUFFIX)
    }

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        let next = match state {
            State::Loaded if insn.is_jump_with(Opcode::Ifnull) => {
                ctx.jump_here().map(|jump| State::Tested { jump })
            }
            State::Tested { jump } if insn.is_new(EXCEPTION) => Some(State::Allocated { jump }),
            State::Allocated { jump } if insn.is(Opcode::Dup) => Some(State::Duplicated { jump }),
            State::Duplicated { jump }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{instrument::filters::drive, test::fixtures};

    #[test]
    fn marker_check_retracted() {
        let (class, method) = fixtures::single_method(
            "greet$default",
            "(Ljava/lang/String;ILjava/lang/Object;)V",
            fixtures::default_args_stub(),
        );
        let actions = drive::<UnsupportedCallFilter>(&class, &method);
        assert_eq!(actions, vec![(5, Action::RemoveJump(JumpId(0)))]);
    }

    #[test]
    fn other_message_kept() {
        let mut asm = crate::assembly::BodyAssembler::new();
        let ok = asm.new_label();
        asm.line(1)
            .aload(0)
            .jump(Opcode::Ifnull, ok)
            .new_type(EXCEPTION)
            .op(Opcode::Dup)
            .ldc_str("not yet")
            .athrow()
            .place(ok)
            .ret();
        let (class, method) = fixtures::single_method("f$default", "(Ljava/lang/Object;)V", asm);
        assert!(drive::<UnsupportedCallFilter>(&class, &method).is_empty());
    }
}
