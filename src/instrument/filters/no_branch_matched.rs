//! Unreachable default cases of exhaustive switches.
//!
//! Exhaustive `when` and pattern `switch` over enums and sealed types still carry a default
//! case. It only throws, and only if the class set changed after compilation:
//!
//! ```text
//! tableswitch ... default: L
//! ...
//! L: new kotlin/NoWhenBranchMatchedException
//!    dup
//!    invokespecial kotlin/NoWhenBranchMatchedException.<init>()V
//!    athrow
//! ```

use crate::{
    assembly::{Instruction, LabelId},
    instrument::{
        context::{MethodContext, SwitchId},
        filters::{Action, Pattern},
    },
};

const UNMATCHED_EXCEPTIONS: [&str; 3] = [
    "kotlin/NoWhenBranchMatchedException",
    "java/lang/MatchException",
    "java/lang/IncompatibleClassChangeError",
];

/// Retracts the default outcome of switches whose default only throws a no-match exception.
pub struct NoBranchMatchedFilter;

/// Match progress.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// No switch seen
    #[default]
    Idle,
    /// Waiting for the default label of the last switch
    Switched { switch: SwitchId, default: LabelId },
    /// Reached the default label
    AtDefault { switch: SwitchId },
}

fn default_of(insn: &Instruction) -> Option<LabelId> {
    match insn {
        Instruction::TableSwitch { default, .. } | Instruction::LookupSwitch { default, .. } => {
            Some(*default)
        }
        _ => None,
    }
}

impl Pattern for NoBranchMatchedFilter {
    const NAME: &'static str = "no-branch-matched";
    type State = State;

    fn transition(state: State, insn: &Instruction, ctx: &MethodContext<'_>) -> (State, Action) {
        if let Some(default) = default_of(insn) {
            let next = ctx
                .switch_here()
                .map_or(State::Idle, |switch| State::Switched { switch, default });
            return (next, Action::None);
        }

        let next = match (state, insn) {
            (State::Switched { switch, default }, Instruction::Label(label)) if *label == default => {
                State::AtDefault { switch }
            }
            (State::AtDefault { .. }, Instruction::Label(_) | Instruction::Line(_)) => state,
            (State::AtDefault { switch }, _) => {
                if UNMATCHED_EXCEPTIONS.iter().any(|class| insn.is_new(class)) {
                    return (State::Idle, Action::RemoveSwitchDefault(switch));
                }
                State::Idle
            }
            _ => state,
        };
        (next, Action::None)
    }
}
