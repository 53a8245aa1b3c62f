//! Suspension plumbing of compiled coroutines.
//!
//! A suspending function is compiled to a state machine. Its entry dispatches on the
//! continuation's `label` field and every suspension point returns early when the callee
//! reports suspension:
//!
//! ```text
//! aload cont                          invokestatic Foo.bar(Lkotlin/coroutines/Continuation;)Ljava/lang/Object;
//! getfield Foo$run$1.label I          dup
//! tableswitch ...                     aload suspended
//!                                     if_acmpne L
//!                                     aload suspended
//!                                     areturn
//! ```
//!
//! Neither the dispatch nor the early return exists in the source.

use crate::{
    assembly::{Instruction, Opcode},
    instrument::{
        context::{JumpId, MethodContext, MethodScope},
        filters::{Action, Pattern},
    },
};

const COROUTINE_INTRINSICS: &str = "kotlin/coroutines/intrinsics/IntrinsicsKt";
const COROUTINE_SUSPENDED: &str = "getCOROUTINE_SUSPENDED";
const LABEL_FIELD: &str = "label";

/// Retracts the state dispatch and suspension checks of coroutine state machines.
pub struct CoroutineFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for a label read or a suspension check
    #[default]
    Idle,
    /// Read the state label
    LabelRead,
    /// Pushed the callee's result
    Result,
    /// Pushed the suspension marker next to it
    Compared,
    /// Compared them
    Tested { jump: JumpId },
    /// Reloaded the marker for the early return
    Reloaded { jump: JumpId },
}

fn start(insn: &Instruction) -> State {
    match insn {
        Instruction::Field {
            opcode: Opcode::Getfield,
            name,
            descriptor,
            ..
        } if name == LABEL_FIELD && descriptor == "I" => State::LabelRead,
        _ if insn.is(Opcode::Dup) || insn.load_index(Opcode::Aload).is_some() => State::Result,
        _ => State::Idle,
    }
}

impl Pattern for CoroutineFilter {
    const NAME: &'static str = "coroutines";
    type State = State;

    fn is_applicable(scope: &MethodScope<'_>) -> bool {
        scope.calls(COROUTINE_INTRINSICS, COROUTINE_SUSPENDED)
    }

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        let next = match state {
            State::LabelRead if insn.is_switch() => {
                if let Some(switch) = ctx.switch_here() {
                    return (State::Idle, Action::RemoveSwitch(switch));
                }
                None
            }
            State::Result if insn.load_index(Opcode::Aload).is_some() => Some(State::Compared),
            State::Compared if insn.is_jump_with(Opcode::IfAcmpne) => {
                ctx.jump_here().map(|jump| State::Tested { jump })
            }
            State::Tested { jump } if insn.load_index(Opcode::Aload).is_some() => {
                Some(State::Reloaded { jump })
            }
            State::Tested { jump } | State::Reloaded { jump } if insn.is(Opcode::Areturn) => {
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
    use crate::{
        assembly::BodyAssembler,
        instrument::{context::SwitchId, filters::drive},
        test::fixtures,
    };

    const CONTINUATION: &str = "Sample$load$1";

    fn state_machine() -> BodyAssembler {
        let mut asm = BodyAssembler::new();
        let resume = asm.new_label();
        let first = asm.new_label();
        let bad = asm.new_label();
        let proceed = asm.new_label();
        asm.line(20)
            .invoke_static(COROUTINE_INTRINSICS, COROUTINE_SUSPENDED, "()Ljava/lang/Object;")
            .astore(3)
            .aload(2)
            .field(Opcode::Getfield, CONTINUATION, LABEL_FIELD, "I")
            .table_switch(0, bad, &[first, resume])
            .place(first)
            .line(21)
            .aload(2)
            .invoke_static("Sample", "fetch", "(Lkotlin/coroutines/Continuation;)Ljava/lang/Object;")
            .op(Opcode::Dup)
            .aload(3)
            .jump(Opcode::IfAcmpne, proceed)
            .aload(3)
            .areturn()
            .place(resume)
            .aload(1)
            .place(proceed)
            .areturn()
            .place(bad)
            .new_type("java/lang/IllegalStateException")
            .athrow();
        asm
    }

    #[test]
    fn dispatch_and_suspension_retracted() {
        let (class, method) = fixtures::single_method(
            "load",
            "(Ljava/lang/Object;Lkotlin/coroutines/Continuation;)Ljava/lang/Object;",
            state_machine(),
        );
        let actions = drive::<CoroutineFilter>(&class, &method);
        assert_eq!(
            actions,
            vec![
                (5, Action::RemoveSwitch(SwitchId(0))),
                (14, Action::RemoveJump(JumpId(0))),
            ]
        );
    }

    #[test]
    fn plain_methods_not_applicable() {
        let (class, method) =
            fixtures::single_method("run", "()V", fixtures::not_null_guard());
        assert!(!CoroutineFilter::is_applicable(&MethodScope::new(&class, &method)));
    }
}
