//! Fluent construction of method bodies.
//!
//! [`BodyAssembler`] appends instructions in order and hands out fresh labels. It tracks the
//! highest local variable slot touched so `max_locals` is never under-reported; the operand
//! stack limit has to be given explicitly because the assembler does not simulate the stack.
//!
//! # Examples
//!
//! ```rust
//! use covscope::assembly::{BodyAssembler, Opcode};
//!
//! let mut asm = BodyAssembler::new();
//! let skip = asm.new_label();
//! asm.line(10)
//!     .iload(0)
//!     .jump(Opcode::Ifeq, skip)
//!     .line(11)
//!     .iconst(1)
//!     .ireturn()
//!     .place(skip)
//!     .line(12)
//!     .iconst(0)
//!     .ireturn();
//! let body = asm.max_stack(1).finish().unwrap();
//! assert_eq!(body.lines(), vec![10, 11, 12]);
//! assert_eq!(body.max_locals, 1);
//! ```

use crate::{
    assembly::{Constant, Instruction, LabelId, MethodBody, Opcode, TryCatchBlock},
    Result,
};

/// Builder for [`MethodBody`] values.
#[derive(Debug, Default)]
pub struct BodyAssembler {
    instructions: Vec<Instruction>,
    try_catch: Vec<TryCatchBlock>,
    next_label: u32,
    max_stack: u16,
    max_locals: u16,
}

impl BodyAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `count` local slots up front, e.g. for `this` and parameters.
    pub fn locals(&mut self, count: u16) -> &mut Self {
        self.max_locals = self.max_locals.max(count);
        self
    }

    /// Sets the operand stack limit written into the body.
    pub fn max_stack(&mut self, depth: u16) -> &mut Self {
        self.max_stack = depth;
        self
    }

    /// Allocates a label without placing it.
    pub fn new_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    /// Places `label` at the current position.
    pub fn place(&mut self, label: LabelId) -> &mut Self {
        self.instructions.push(Instruction::Label(label));
        self
    }

    /// Allocates a label and places it at the current position.
    pub fn label(&mut self) -> LabelId {
        let label = self.new_label();
        self.place(label);
        label
    }

    /// Emits a line-boundary marker.
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.instructions.push(Instruction::Line(line));
        self
    }

    /// Appends an arbitrary instruction.
    pub fn emit(&mut self, instruction: Instruction) -> &mut Self {
        match &instruction {
            Instruction::Var { opcode, index } => {
                self.touch_local(*index, opcode.local_width());
            }
            Instruction::Iinc { index, .. } => self.touch_local(*index, 1),
            _ => {}
        }
        self.instructions.push(instruction);
        self
    }

    /// Appends an instruction without operands.
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.emit(Instruction::Simple(opcode))
    }

    /// Pushes an integer constant using the shortest encoding.
    pub fn iconst(&mut self, value: i32) -> &mut Self {
        self.emit(Instruction::push_int(value))
    }

    /// Loads a string literal.
    pub fn ldc_str(&mut self, value: &str) -> &mut Self {
        self.emit(Instruction::Ldc(Constant::String(value.to_string())))
    }

    /// Loads a constant.
    pub fn ldc(&mut self, constant: Constant) -> &mut Self {
        self.emit(Instruction::Ldc(constant))
    }

    /// Local variable access with an explicit opcode.
    pub fn var(&mut self, opcode: Opcode, index: u16) -> &mut Self {
        self.emit(Instruction::Var { opcode, index })
    }

    /// `iload index`
    pub fn iload(&mut self, index: u16) -> &mut Self {
        self.var(Opcode::Iload, index)
    }

    /// `istore index`
    pub fn istore(&mut self, index: u16) -> &mut Self {
        self.var(Opcode::Istore, index)
    }

    /// `aload index`
    pub fn aload(&mut self, index: u16) -> &mut Self {
        self.var(Opcode::Aload, index)
    }

    /// `astore index`
    pub fn astore(&mut self, index: u16) -> &mut Self {
        self.var(Opcode::Astore, index)
    }

    /// `iinc index delta`
    pub fn iinc(&mut self, index: u16, delta: i16) -> &mut Self {
        self.emit(Instruction::Iinc { index, delta })
    }

    /// Conditional or unconditional jump to `target`.
    pub fn jump(&mut self, opcode: Opcode, target: LabelId) -> &mut Self {
        self.emit(Instruction::Jump { opcode, target })
    }

    /// `goto target`
    pub fn goto(&mut self, target: LabelId) -> &mut Self {
        self.jump(Opcode::Goto, target)
    }

    /// Table switch over `min..=min + targets.len() - 1`.
    pub fn table_switch(&mut self, min: i32, default: LabelId, targets: &[LabelId]) -> &mut Self {
        let span = i32::try_from(targets.len()).unwrap_or(i32::MAX);
        self.emit(Instruction::TableSwitch {
            min,
            max: min.saturating_add(span - 1),
            default,
            targets: targets.to_vec(),
        })
    }

    /// Lookup switch; `cases` need not be sorted.
    pub fn lookup_switch(&mut self, default: LabelId, cases: &[(i32, LabelId)]) -> &mut Self {
        let mut cases = cases.to_vec();
        cases.sort_by_key(|(key, _)| *key);
        let (keys, targets) = cases.into_iter().unzip();
        self.emit(Instruction::LookupSwitch {
            default,
            keys,
            targets,
        })
    }

    /// Field access.
    pub fn field(&mut self, opcode: Opcode, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.emit(Instruction::field(opcode, owner, name, descriptor))
    }

    /// Method invocation on a class.
    pub fn invoke(&mut self, opcode: Opcode, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.emit(Instruction::Method {
            opcode,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface: opcode == Opcode::Invokeinterface,
        })
    }

    /// `invokestatic owner.name descriptor`
    pub fn invoke_static(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.emit(Instruction::invoke_static(owner, name, descriptor))
    }

    /// `new`, `checkcast`, `instanceof` or `anewarray`.
    pub fn type_insn(&mut self, opcode: Opcode, descriptor: &str) -> &mut Self {
        self.emit(Instruction::Type {
            opcode,
            descriptor: descriptor.to_string(),
        })
    }

    /// `new class`
    pub fn new_type(&mut self, class: &str) -> &mut Self {
        self.type_insn(Opcode::New, class)
    }

    /// `athrow`
    pub fn athrow(&mut self) -> &mut Self {
        self.op(Opcode::Athrow)
    }

    /// `return`
    pub fn ret(&mut self) -> &mut Self {
        self.op(Opcode::Return)
    }

    /// `ireturn`
    pub fn ireturn(&mut self) -> &mut Self {
        self.op(Opcode::Ireturn)
    }

    /// `areturn`
    pub fn areturn(&mut self) -> &mut Self {
        self.op(Opcode::Areturn)
    }

    /// Registers an exception table entry.
    pub fn try_catch(
        &mut self,
        start: LabelId,
        end: LabelId,
        handler: LabelId,
        catch_type: Option<&str>,
    ) -> &mut Self {
        self.try_catch.push(TryCatchBlock {
            start,
            end,
            handler,
            catch_type: catch_type.map(str::to_string),
        });
        self
    }

    /// Number of instructions emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if nothing was emitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Builds the body without checking it.
    #[must_use]
    pub fn build(&mut self) -> MethodBody {
        let body = MethodBody::new(
            std::mem::take(&mut self.instructions),
            self.max_stack,
            self.max_locals,
        );
        body.with_try_catch(std::mem::take(&mut self.try_catch))
    }

    /// Builds and validates the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if labels, switches or the exception table are
    /// inconsistent.
    pub fn finish(&mut self) -> Result<MethodBody> {
        let body = self.build();
        body.validate()?;
        Ok(body)
    }

    fn touch_local(&mut self, index: u16, width: u16) {
        self.max_locals = self.max_locals.max(index.saturating_add(width));
    }
}
