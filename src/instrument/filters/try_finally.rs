//! Leading no-op markers of try/finally blocks.
//!
//! Some compilers open a `try` with a line marker attached to nothing but a `nop`, so the line
//! of the `try` keyword would otherwise be reported as a line of its own that can never miss.

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{MarkerId, MethodContext},
        filters::{Action, Pattern},
    },
};

/// Retracts line markers that cover no executable instruction besides `nop`.
pub struct TryFinallyFilter;

/// Match progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// No open marker
    #[default]
    Idle,
    /// A marker that has not yet covered a real instruction
    Open(MarkerId),
}

fn open(ctx: &MethodContext<'_>) -> State {
    ctx.line_here().map_or(State::Idle, State::Open)
}

impl Pattern for TryFinallyFilter {
    const NAME: &'static str = "try-finally";
    type State = State;

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        match (state, insn) {
            (State::Open(marker), Instruction::Line(_)) => (open(ctx), Action::RemoveLine(marker)),
            (State::Idle, Instruction::Line(_)) => (open(ctx), Action::None),
            (State::Open(_), Instruction::Label(_)) => (state, Action::None),
            (State::Open(_), _) if insn.is(Opcode::Nop) => (state, Action::None),
            _ => (State::Idle, Action::None),
        }
    }

    fn finish(state: State, _ctx: &MethodContext<'_>) -> Action {
        match state {
            State::Open(marker) => Action::RemoveLine(marker),
            State::Idle => Action::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::BodyAssembler, instrument::filters::drive, test::fixtures};

    #[test]
    fn nop_marker_retracted() {
        let mut asm = BodyAssembler::new();
        asm.line(3)
            .op(Opcode::Nop)
            .label();
        asm.line(4).aload(0).invoke_static("Sample", "work", "(Ljava/lang/Object;)V");
        asm.line(6).ret();
        let (class, method) = fixtures::single_method("run", "(Ljava/lang/Object;)V", asm);
        let actions = drive::<TryFinallyFilter>(&class, &method);
        assert_eq!(actions, vec![(3, Action::RemoveLine(MarkerId(0)))]);
    }

    #[test]
    fn trailing_empty_marker_retracted_at_end() {
        let mut asm = BodyAssembler::new();
        asm.line(3).ret();
        asm.line(4).label();
        let (class, method) = fixtures::single_method("run", "()V", asm);
        let actions = drive::<TryFinallyFilter>(&class, &method);
        assert_eq!(actions, vec![(usize::MAX, Action::RemoveLine(MarkerId(1)))]);
    }

    #[test]
    fn real_lines_kept() {
        let mut asm = BodyAssembler::new();
        asm.line(3).iconst(1).istore(1);
        asm.line(4).ret();
        let (class, method) = fixtures::single_method("run", "()V", asm);
        assert!(drive::<TryFinallyFilter>(&class, &method).is_empty());
    }
}
