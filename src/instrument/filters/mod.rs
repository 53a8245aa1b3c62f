//! Compiler noise filters.
//!
//! Source-language lowering and generated helpers introduce lines and branches that have no
//! counterpart in the authored source: assertion toggles, null checks on parameters, the hash
//! dispatch of string switches and so on. Left in place they systematically lower the coverage
//! of idiomatic code. Each filter recognizes one such pattern and retracts the records the
//! enumerator registered for it.
//!
//! Filters are small state machines. They watch the same single pass over the instruction
//! stream as the enumerator, right after it, and never look back: a [`Pattern`] is a state
//! type plus a transition function returning the next state and an [`Action`]. Any
//! instruction that does not continue the pattern returns the machine to its idle state.
//!
//! The matches are heuristics. Hand-written code that happens to compile to the same shape is
//! filtered as well.
//!
//! # Adding a filter
//!
//! Implement [`Pattern`] (or [`MethodFilter`] directly for filters that need more than a
//! state enum) and register a [`FilterFactory`] with a [`FilterRegistry`].

mod assertions;
mod boolean_negation;
mod cast_guard;
mod closing_line;
mod coroutines;
mod default_args;
mod lateinit;
mod no_branch_matched;
mod not_null;
mod string_switch;
mod try_finally;
mod try_with_resources;
mod unsupported_call;

use std::fmt;

use crate::{
    assembly::Instruction,
    instrument::{
        context::{JumpId, MarkerId, MethodContext, MethodScope, SwitchId},
        enumerator::InstructionObserver,
    },
};

pub use assertions::AssertionsFilter;
pub use boolean_negation::BooleanNegationFilter;
pub use cast_guard::CastGuardFilter;
pub use closing_line::ClosingLineFilter;
pub use coroutines::CoroutineFilter;
pub use default_args::{DefaultArgsFilter, DEFAULT_STUB_SUFFIX};
pub use lateinit::LateinitFilter;
pub use no_branch_matched::NoBranchMatchedFilter;
pub use not_null::NotNullFilter;
pub use string_switch::StringSwitchFilter;
pub use try_finally::TryFinallyFilter;
pub use try_with_resources::TryWithResourcesFilter;
pub use unsupported_call::UnsupportedCallFilter;

/// Retraction requested by a filter transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Nothing to retract
    #[default]
    None,
    /// Retract the most recent line marker
    RemoveLastLine,
    /// Retract the most recent conditional jump
    RemoveLastJump,
    /// Retract the most recent switch
    RemoveLastSwitch,
    /// Retract the default outcome of the most recent switch
    RemoveLastSwitchDefault,
    /// Retract a specific line marker
    RemoveLine(MarkerId),
    /// Retract a specific jump
    RemoveJump(JumpId),
    /// Retract a specific switch
    RemoveSwitch(SwitchId),
    /// Retract the default outcome of a specific switch
    RemoveSwitchDefault(SwitchId),
}

impl Action {
    /// Performs the retraction. Returns `true` if a record was retracted.
    pub fn apply(self, ctx: &mut MethodContext<'_>) -> bool {
        match self {
            Action::None => false,
            Action::RemoveLastLine => ctx.remove_last_line(),
            Action::RemoveLastJump => ctx.remove_last_jump(),
            Action::RemoveLastSwitch => ctx.remove_last_switch(),
            Action::RemoveLastSwitchDefault => ctx.remove_last_switch_default(),
            Action::RemoveLine(id) => ctx.remove_line(id),
            Action::RemoveJump(id) => ctx.remove_jump(id),
            Action::RemoveSwitch(id) => ctx.remove_switch(id),
            Action::RemoveSwitchDefault(id) => ctx.remove_switch_default(id),
        }
    }
}

/// A noise filter attached to one method scan.
pub trait MethodFilter: InstructionObserver + Send {
    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// A filter expressed as a state enum and a transition function.
pub trait Pattern: 'static {
    /// Name used in logs and in [`FilterRegistry::names`].
    const NAME: &'static str;

    /// Match progress; the default value is the idle state.
    type State: Copy + Default + fmt::Debug + PartialEq + Send;

    /// Whether the filter runs for a method at all. Checked once per method.
    fn is_applicable(_scope: &MethodScope<'_>) -> bool {
        true
    }

    /// Advances the machine over one instruction.
    ///
    /// `ctx` already contains whatever the enumerator registered for `insn`.
    fn transition(
        state: Self::State,
        insn: &Instruction,
        ctx: &MethodContext<'_>,
    ) -> (Self::State, Action);

    /// Called after the last instruction.
    fn finish(_state: Self::State, _ctx: &MethodContext<'_>) -> Action {
        Action::None
    }
}

/// Runs a [`Pattern`] as a [`MethodFilter`].
pub struct PatternFilter<P: Pattern> {
    state: P::State,
}

impl<P: Pattern> Default for PatternFilter<P> {
    fn default() -> Self {
        PatternFilter {
            state: P::State::default(),
        }
    }
}

impl<P: Pattern> InstructionObserver for PatternFilter<P> {
    fn observe(&mut self, _index: usize, insn: &Instruction, ctx: &mut MethodContext<'_>) {
        let (next, action) = P::transition(self.state, insn, ctx);
        self.state = next;
        action.apply(ctx);
    }

    fn finish(&mut self, ctx: &mut MethodContext<'_>) {
        P::finish(self.state, ctx).apply(ctx);
        self.state = P::State::default();
    }
}

impl<P: Pattern> MethodFilter for PatternFilter<P> {
    fn name(&self) -> &'static str {
        P::NAME
    }
}

type CreateFn = Box<dyn Fn() -> Box<dyn MethodFilter> + Send + Sync>;

/// Creates fresh filter instances for each method.
pub struct FilterFactory {
    name: &'static str,
    applicable: fn(&MethodScope<'_>) -> bool,
    create: CreateFn,
}

impl FilterFactory {
    /// Wraps a custom filter.
    pub fn new<F>(name: &'static str, applicable: fn(&MethodScope<'_>) -> bool, create: F) -> Self
    where
        F: Fn() -> Box<dyn MethodFilter> + Send + Sync + 'static,
    {
        FilterFactory {
            name,
            applicable,
            create: Box::new(create),
        }
    }

    /// Factory of a [`Pattern`] filter.
    #[must_use]
    pub fn pattern<P: Pattern>() -> Self {
        FilterFactory {
            name: P::NAME,
            applicable: P::is_applicable,
            create: Box::new(|| Box::new(PatternFilter::<P>::default())),
        }
    }

    /// Filter name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for FilterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered list of filters run for every method.
#[derive(Debug)]
pub struct FilterRegistry {
    factories: Vec<FilterFactory>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FilterRegistry {
    /// A registry without filters.
    #[must_use]
    pub fn empty() -> Self {
        FilterRegistry {
            factories: Vec::new(),
        }
    }

    /// The built-in filters.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry
            .register(FilterFactory::pattern::<BooleanNegationFilter>())
            .register(FilterFactory::pattern::<AssertionsFilter>())
            .register(FilterFactory::pattern::<NotNullFilter>())
            .register(FilterFactory::pattern::<StringSwitchFilter>())
            .register(FilterFactory::pattern::<DefaultArgsFilter>())
            .register(FilterFactory::pattern::<UnsupportedCallFilter>())
            .register(FilterFactory::pattern::<CastGuardFilter>())
            .register(FilterFactory::pattern::<LateinitFilter>())
            .register(FilterFactory::pattern::<TryWithResourcesFilter>())
            .register(FilterFactory::pattern::<TryFinallyFilter>())
            .register(FilterFactory::pattern::<ClosingLineFilter>())
            .register(FilterFactory::pattern::<CoroutineFilter>())
            .register(FilterFactory::pattern::<NoBranchMatchedFilter>());
        registry
    }

    /// Appends a filter; filters run in registration order.
    pub fn register(&mut self, factory: FilterFactory) -> &mut Self {
        self.factories.push(factory);
        self
    }

    /// Names of the registered filters in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(FilterFactory::name).collect()
    }

    /// Number of registered filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no filter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Creates the filters applicable to `scope`.
    #[must_use]
    pub fn instantiate(&self, scope: &MethodScope<'_>) -> Vec<Box<dyn MethodFilter>> {
        self.factories
            .iter()
            .filter(|factory| (factory.applicable)(scope))
            .map(|factory| (factory.create)())
            .collect()
    }
}

/// Drives one pattern over a method next to the enumerator and returns every action it
/// produced, applied, with the index of the instruction that triggered it (`usize::MAX` for
/// the end of the method).
#[cfg(test)]
pub(crate) fn drive<P: Pattern>(
    class: &crate::class::ClassInfo,
    method: &crate::class::MethodInfo,
) -> Vec<(usize, Action)> {
    use crate::instrument::enumerator::Enumerator;

    let scope = MethodScope::new(class, method);
    let mut ctx = MethodContext::new(scope);
    let mut enumerator = Enumerator::new(true);
    let mut state = P::State::default();
    let mut actions = Vec::new();

    if let Some(body) = &method.body {
        for (index, insn) in body.instructions.iter().enumerate() {
            ctx.advance(index);
            enumerator.observe(index, insn, &mut ctx);
            let (next, action) = P::transition(state, insn, &ctx);
            state = next;
            if action != Action::None {
                action.apply(&mut ctx);
                actions.push((index, action));
            }
        }
    }
    let action = P::finish(state, &ctx);
    if action != Action::None {
        actions.push((usize::MAX, action));
    }
    actions
}
