//! Resource closing in try-with-resources.
//!
//! The compiler closes a resource only if it was opened, once on the normal path and once per
//! exception path:
//!
//! ```text
//! aload r
//! ifnull L          (or ifnonnull around the suppressed exception path)
//! aload r
//! invokeinterface java/lang/AutoCloseable.close()V
//! L: ...
//! ```

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{JumpId, MethodContext},
        filters::{Action, Pattern},
    },
};

/// Retracts the null tests guarding generated `close()` calls.
pub struct TryWithResourcesFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for a reference load
    #[default]
    Idle,
    /// Loaded the resource
    Loaded { local: u16 },
    /// Tested it against null
    Tested { local: u16, jump: JumpId },
    /// Reloaded the same resource
    Reloaded { jump: JumpId },
}

fn start(insn: &Instruction) -> State {
    match insn.load_index(Opcode::Aload) {
        Some(local) => State::Loaded { local },
        None => State::Idle,
    }
}

fn is_close(insn: &Instruction) -> bool {
    matches!(
        insn,
        Instruction::Method { opcode: Opcode::Invokeinterface | Opcode::Invokevirtual, name, descriptor, .. }
            if name == "close" && descriptor == "()V"
    )
}

impl Pattern for TryWithResourcesFilter {
    const NAME: &'static str = "try-with-resources";
    type State = State;

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        let next = match state {
            State::Loaded { local }
                if insn.is_jump_with(Opcode::Ifnull) || insn.is_jump_with(Opcode::Ifnonnull) =>
            {
                ctx.jump_here().map(|jump| State::Tested { local, jump })
            }
            State::Tested { local, jump } if insn.load_index(Opcode::Aload) == Some(local) => {
                Some(State::Reloaded { jump })
            }
            State::Reloaded { jump } if is_close(insn) => {
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

    fn close_guard(reload: u16) -> BodyAssembler {
        let mut asm = BodyAssembler::new();
        let done = asm.new_label();
        asm.line(14)
            .aload(2)
            .jump(Opcode::Ifnull, done)
            .aload(reload)
            .invoke(
                Opcode::Invokeinterface,
                "java/lang/AutoCloseable",
                "close",
                "()V",
            )
            .place(done)
            .ret();
        asm
    }

    #[test]
    fn close_guard_retracted() {
        let (class, method) = fixtures::single_method("read", "(Ljava/lang/String;)V", close_guard(2));
        let actions = drive::<TryWithResourcesFilter>(&class, &method);
        assert_eq!(actions, vec![(4, Action::RemoveJump(JumpId(0)))]);
    }

    #[test]
    fn different_resource_kept() {
        let (class, method) = fixtures::single_method("read", "(Ljava/lang/String;)V", close_guard(1));
        assert!(drive::<TryWithResourcesFilter>(&class, &method).is_empty());
    }
}
