//! Bytecode rewriting.
//!
//! Instrumenting a class is two passes over each eligible method:
//!
//! 1. **Scan** - the [`enumerator`] walks the instruction stream once and registers a record
//!    for every line marker, conditional jump and switch; the [`filters`] watch the same walk
//!    and retract records produced by compiler lowering. The surviving records get counter
//!    slots from [`layout`].
//! 2. **Rewrite** - [`split`] gives every surviving branch outcome its own window so a probe
//!    can observe it, and [`probe`] replaces the placeholders with counter updates on an array
//!    obtained once per invocation through a [`strategy`].
//!
//! The [`Instrumenter`] drives both passes per class and reports the result to a
//! [`crate::runtime::CoverageSession`].
//!
//! # Key Components
//!
//! - [`InstrumentationOptions`] - parsed session settings
//! - [`Instrumenter`] - class-level entry point
//! - [`filters::FilterRegistry`] - the ordered set of noise filters

mod config;
pub mod context;
pub mod enumerator;
pub mod filters;
mod instrumenter;
pub mod layout;
pub mod probe;
pub mod split;
pub mod strategy;

pub use config::{CounterStrategy, HitMode, InstrumentationOptions, CONSTANT_DYNAMIC_MIN_VERSION};
pub use instrumenter::{Instrumented, Instrumenter, SkipReason};
