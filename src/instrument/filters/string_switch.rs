//! Switches on strings.
//!
//! A `switch` over a string is lowered to a switch over `hashCode()` whose cases compare the
//! string against the candidates with `equals`, and (for `javac`) a second switch over the
//! index the comparisons produced:
//!
//! ```text
//! aload s
//! invokevirtual java/lang/String.hashCode()I
//! lookupswitch { 97: La, 98: Lb, default: Ld }
//! La: aload s
//!     ldc "a"
//!     invokevirtual java/lang/String.equals(Ljava/lang/Object;)Z
//!     ifeq Ld
//!     ...
//! Ld: iload idx
//!     tableswitch ...
//! ```
//!
//! The hash switch and the `equals` jumps are artifacts; the second switch (or the case
//! bodies themselves) carry the authored branches. The dispatch region ends at the next switch
//! or at the first line marker for another line.

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::MethodContext,
        filters::{Action, Pattern},
    },
};

/// Retracts the hash dispatch of string switches.
pub struct StringSwitchFilter;

/// Progress through one comparison of the dispatch region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    /// Between comparisons
    #[default]
    Base,
    /// Loaded the switched string
    Loaded,
    /// Pushed the candidate literal
    Literal,
    /// Called `equals`
    Compared,
}

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for `String.hashCode()`
    #[default]
    Idle,
    /// Computed the hash
    Hashed,
    /// Inside the comparison chain of the hash switch on `line`
    Dispatch { line: u32, step: Step },
}

fn is_hash_code(insn: &Instruction) -> bool {
    insn.is_call("java/lang/String", "hashCode", "()I")
}

fn is_equals(insn: &Instruction) -> bool {
    insn.is_call("java/lang/String", "equals", "(Ljava/lang/Object;)Z")
        || insn.is_call(
            "kotlin/jvm/internal/Intrinsics",
            "areEqual",
            "(Ljava/lang/Object;Ljava/lang/Object;)Z",
        )
}

fn start(insn: &Instruction) -> State {
    if is_hash_code(insn) {
        State::Hashed
    } else {
        State::Idle
    }
}

fn step(current: Step, insn: &Instruction) -> Step {
    match (current, insn) {
        (_, Instruction::Var {
            opcode: Opcode::Aload,
            ..
        }) => Step::Loaded,
        (Step::Loaded, Instruction::Ldc(_)) => Step::Literal,
        (Step::Literal, _) if is_equals(insn) => Step::Compared,
        _ => Step::Base,
    }
}

impl Pattern for StringSwitchFilter {
    const NAME: &'static str = "string-switch";
    type State = State;

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        match state {
            State::Idle => (start(insn), Action::None),
            State::Hashed => match (insn.is_switch(), ctx.switch_here()) {
                (true, Some(id)) => {
                    let line = ctx.switch(id).map_or(0, |site| site.line);
                    (
                        State::Dispatch {
                            line,
                            step: Step::Base,
                        },
                        Action::RemoveSwitch(id),
                    )
                }
                _ => (start(insn), Action::None),
            },
            State::Dispatch { line, step: current } => match insn {
                Instruction::Line(other) if *other != line => (start(insn), Action::None),
                Instruction::Label(_) | Instruction::Line(_) => (state, Action::None),
                _ if insn.is_switch() => (State::Idle, Action::None),
                _ if is_hash_code(insn) => (State::Hashed, Action::None),
                Instruction::Jump {
                    opcode: Opcode::Ifeq | Opcode::Ifne,
                    ..
                } if current == Step::Compared => {
                    let action = ctx.jump_here().map_or(Action::None, Action::RemoveJump);
                    (
                        State::Dispatch {
                            line,
                            step: Step::Base,
                        },
                        action,
                    )
                }
                _ => (
                    State::Dispatch {
                        line,
                        step: step(current, insn),
                    },
                    Action::None,
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        instrument::{context::JumpId, context::SwitchId, filters::drive},
        test::fixtures,
    };

    #[test]
    fn hash_dispatch_retracted() {
        let (class, method) =
            fixtures::single_method("pick", "(Ljava/lang/String;)I", fixtures::string_switch());
        let actions = drive::<StringSwitchFilter>(&class, &method);
        let retracted: Vec<Action> = actions.into_iter().map(|(_, action)| action).collect();
        assert_eq!(
            retracted,
            vec![
                Action::RemoveSwitch(SwitchId(0)),
                Action::RemoveJump(JumpId(0)),
                Action::RemoveJump(JumpId(1)),
            ]
        );
    }

    #[test]
    fn steps() {
        let load = Instruction::Var {
            opcode: Opcode::Aload,
            index: 1,
        };
        assert_eq!(step(Step::Base, &load), Step::Loaded);
        assert_eq!(
            step(Step::Loaded, &Instruction::Ldc(crate::assembly::Constant::String("a".into()))),
            Step::Literal
        );
        assert_eq!(step(Step::Literal, &Instruction::simple(Opcode::Pop)), Step::Base);
    }
}
