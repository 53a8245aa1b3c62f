//! Generated closing lines.
//!
//! The implicit `return` at the end of a void method is attributed to the line of the closing
//! brace. The line is hit exactly when the line before it completes, so it only duplicates
//! information. It is kept when it is the only line of the method.

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{MarkerId, MethodContext},
        filters::{Action, Pattern},
    },
};

/// Retracts the last marker when it covers nothing but a void `return`.
pub struct ClosingLineFilter;

/// Match progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// No candidate
    #[default]
    Idle,
    /// A marker that has covered only labels so far
    Marked(MarkerId),
    /// A marker followed by labels and one void `return`
    Returned(MarkerId),
}

impl Pattern for ClosingLineFilter {
    const NAME: &'static str = "closing-line";
    type State = State;

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        let next = match (state, insn) {
            (_, Instruction::Line(_)) => ctx.line_here().map_or(State::Idle, State::Marked),
            (State::Marked(_) | State::Returned(_), Instruction::Label(_)) => state,
            (State::Marked(marker), Instruction::Simple(Opcode::Return)) => {
                State::Returned(marker)
            }
            _ => State::Idle,
        };
        (next, Action::None)
    }

    fn finish(state: State, ctx: &MethodContext<'_>) -> Action {
        let State::Returned(marker) = state else {
            return Action::None;
        };
        let Some(line) = ctx.marker(marker).map(|marker| marker.line) else {
            return Action::None;
        };
        if ctx.surviving_lines().iter().any(|&other| other != line) {
            Action::RemoveLine(marker)
        } else {
            Action::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::BodyAssembler, instrument::filters::drive, test::fixtures};

    #[test]
    fn closing_brace_retracted() {
        let mut asm = BodyAssembler::new();
        asm.line(3).aload(0).invoke_static("Sample", "log", "(Ljava/lang/Object;)V");
        asm.label();
        asm.line(4).ret();
        let (class, method) = fixtures::single_method("run", "(Ljava/lang/Object;)V", asm);
        let actions = drive::<ClosingLineFilter>(&class, &method);
        assert_eq!(actions, vec![(usize::MAX, Action::RemoveLine(MarkerId(1)))]);
    }

    #[test]
    fn only_line_kept() {
        let mut asm = BodyAssembler::new();
        asm.line(3).ret();
        let (class, method) = fixtures::single_method("run", "()V", asm);
        assert!(drive::<ClosingLineFilter>(&class, &method).is_empty());
    }

    #[test]
    fn value_return_kept() {
        let mut asm = BodyAssembler::new();
        asm.line(3).iconst(2).istore(0);
        asm.line(4).iload(0).ireturn();
        let (class, method) = fixtures::single_method("two", "()I", asm);
        assert!(drive::<ClosingLineFilter>(&class, &method).is_empty());
    }
}
