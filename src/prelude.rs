//! # covscope Prelude
//!
//! The types needed to instrument classes, run them against a registry and read the results,
//! in one glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all covscope operations
pub use crate::Error;

/// The result type used throughout covscope
pub use crate::Result;

// ================================================================================================
// Class Model
// ================================================================================================

/// Instruction streams and their builder
pub use crate::assembly::{
    BodyAssembler, Constant, Instruction, LabelId, MethodBody, Opcode, TryCatchBlock,
};

/// Decoded classes and members
pub use crate::class::{AccessFlags, ClassInfo, FieldInfo, MethodInfo};

// ================================================================================================
// Instrumentation
// ================================================================================================

/// Options and the class-level entry point
pub use crate::instrument::{
    CounterStrategy, HitMode, InstrumentationOptions, Instrumented, Instrumenter, SkipReason,
};

// ================================================================================================
// Runtime
// ================================================================================================

/// Counter registry and session
pub use crate::runtime::{CoverageSession, HitArray, HitRegistry, TestTrace};

// ================================================================================================
// Results
// ================================================================================================

/// Records, snapshots and merging
pub use crate::coverage::{
    merge, ClassRecord, CoverageSummary, JumpRecord, LineRecord, LineStatus, ProjectSnapshot,
    SnapshotMode, SwitchRecord,
};
