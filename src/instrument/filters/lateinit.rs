//! Uninitialized access guard of late-initialized properties.
//!
//! ```text
//! getfield Foo.name
//! dup
//! ifnonnull L
//! ldc "name"
//! invokestatic kotlin/jvm/internal/Intrinsics.throwUninitializedPropertyAccessException
//! L: ...
//! ```

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{JumpId, MethodContext},
        filters::{Action, Pattern},
    },
};

const INTRINSICS: &str = "kotlin/jvm/internal/Intrinsics";
const THROW_UNINITIALIZED: &str = "throwUninitializedPropertyAccessException";

/// Retracts the null test in front of late-initialized property reads.
pub struct LateinitFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for a field read
    #[default]
    Idle,
    /// Read the backing field
    Read,
    /// Duplicated it
    Duplicated,
    /// Tested it against null
    Tested { jump: JumpId },
    /// Pushed the property name
    Named { jump: JumpId },
}

fn start(insn: &Instruction) -> State {
    match insn {
        Instruction::Field {
            opcode: Opcode::Getfield | Opcode::Getstatic,
            ..
        } => State::Read,
        _ => State::Idle,
    }
}

impl Pattern for LateinitFilter {
    const NAME: &'static str = "lateinit";
    type State = State;

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        let next = match state {
            State::Read if insn.is(Opcode::Dup) => Some(State::Duplicated),
            State::Read | State::Duplicated if insn.is_jump_with(Opcode::Ifnonnull) => {
                ctx.jump_here().map(|jump| State::Tested { jump })
            }
            State::Tested { jump } if insn.string_constant().is_some() => {
                Some(State::Named { jump })
            }
            State::Named { jump } if insn.is_call_to(INTRINSICS, THROW_UNINITIALIZED) => {
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
    use crate::{assembly::BodyAssembler, instrument::filters::drive, test::fixtures};

    #[test]
    fn property_guard_retracted() {
        let mut asm = BodyAssembler::new();
        let ok = asm.new_label();
        asm.line(9)
            .aload(0)
            .field(Opcode::Getfield, "Sample", "name", "Ljava/lang/String;")
            .op(Opcode::Dup)
            .jump(Opcode::Ifnonnull, ok)
            .ldc_str("name")
            .invoke_static(INTRINSICS, THROW_UNINITIALIZED, "(Ljava/lang/String;)V")
            .place(ok)
            .areturn();
        let (class, method) = fixtures::single_method("getName", "()Ljava/lang/String;", asm);
        let actions = drive::<LateinitFilter>(&class, &method);
        assert_eq!(actions, vec![(6, Action::RemoveJump(JumpId(0)))]);
    }

    #[test]
    fn elvis_on_field_kept() {
        let mut asm = BodyAssembler::new();
        let ok = asm.new_label();
        asm.line(9)
            .aload(0)
            .field(Opcode::Getfield, "Sample", "name", "Ljava/lang/String;")
            .op(Opcode::Dup)
            .jump(Opcode::Ifnonnull, ok)
            .op(Opcode::Pop)
            .ldc_str("anonymous")
            .place(ok)
            .areturn();
        let (class, method) = fixtures::single_method("getName", "()Ljava/lang/String;", asm);
        assert!(drive::<LateinitFilter>(&class, &method).is_empty());
    }
}
