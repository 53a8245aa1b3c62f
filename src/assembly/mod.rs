//! Instruction stream model.
//!
//! # Key Components
//!
//! - [`Opcode`] - the opcode table with classification helpers
//! - [`Instruction`] - one element of an instruction arena, including label and line markers
//! - [`MethodBody`] - instructions, exception table and frame limits of one method
//! - [`BodyAssembler`] - fluent builder for bodies
//!
//! Bodies are plain data; decoding them from class files and encoding the rewritten result
//! is done by the host that loads classes.

mod body;
mod builder;
mod instruction;
mod opcodes;

pub use body::{MethodBody, TryCatchBlock};
pub use builder::BodyAssembler;
pub use instruction::{Constant, DynamicConstant, FlowType, Handle, Instruction, LabelId};
pub use opcodes::Opcode;
