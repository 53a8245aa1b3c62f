//! Instruction stream representation.
//!
//! A method body is an ordered arena of [`Instruction`] values. Control-flow destinations are
//! not byte offsets but [`LabelId`] values placed into the stream with [`Instruction::Label`];
//! branch instructions name the label they transfer to. This keeps insertion of new code
//! purely positional: inserting instructions never invalidates a target, and renumbering is
//! never needed.
//!
//! Two pseudo-instructions carry no runtime behaviour:
//!
//! - [`Instruction::Label`] - a destination that jumps, switches and try/catch ranges refer to
//! - [`Instruction::Line`] - a line-boundary marker; every following instruction belongs to that
//!   source line until the next marker
//!
//! # Examples
//!
//! ```rust
//! use covscope::assembly::{Instruction, LabelId, Opcode};
//!
//! let jump = Instruction::Jump { opcode: Opcode::Ifeq, target: LabelId(3) };
//! assert!(jump.is_conditional_jump());
//! assert_eq!(jump.targets(), vec![LabelId(3)]);
//! assert!(jump.falls_through());
//! ```

use std::fmt;

use crate::assembly::Opcode;

/// Identifier of a label within one method body.
///
/// Label ids are dense small integers handed out by [`crate::assembly::MethodBody::new_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Reference to a method used as a bootstrap for dynamically computed constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    /// Internal name of the class declaring the method
    pub owner: String,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
}

/// A constant resolved lazily by the execution engine and cached at class level.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicConstant {
    /// Name passed to the bootstrap method
    pub name: String,
    /// Field descriptor of the produced value
    pub descriptor: String,
    /// Method computing the value on first use
    pub bootstrap: Handle,
    /// Static arguments handed to the bootstrap method
    pub arguments: Vec<Constant>,
}

/// Operand of a constant-load instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// String literal
    String(String),
    /// Class literal, given as internal name or array descriptor
    Type(String),
    /// Lazily computed constant
    Dynamic(Box<DynamicConstant>),
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Pseudo-instruction without runtime behaviour (label or line marker)
    Marker,
    /// Normal execution continues to next instruction
    Sequential,
    /// Two-way branch: either the target or the next instruction
    ConditionalBranch,
    /// Always transfers to the target
    UnconditionalBranch,
    /// Multi-way branch
    Switch,
    /// Leaves the method normally
    Return,
    /// Raises an exception
    Throw,
}

/// One element of a method's instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Destination marker
    Label(LabelId),
    /// Line-boundary marker
    Line(u32),
    /// Instruction without operands
    Simple(Opcode),
    /// `bipush`, `sipush` and `newarray`
    Int {
        /// The opcode
        opcode: Opcode,
        /// Immediate operand
        operand: i32,
    },
    /// Local variable load, store or `ret`
    Var {
        /// The opcode
        opcode: Opcode,
        /// Local variable slot
        index: u16,
    },
    /// Increment of an integer local
    Iinc {
        /// Local variable slot
        index: u16,
        /// Signed increment
        delta: i16,
    },
    /// Constant pool load
    Ldc(Constant),
    /// `new`, `anewarray`, `checkcast` and `instanceof`
    Type {
        /// The opcode
        opcode: Opcode,
        /// Internal name or array descriptor
        descriptor: String,
    },
    /// Field access
    Field {
        /// The opcode
        opcode: Opcode,
        /// Declaring class
        owner: String,
        /// Field name
        name: String,
        /// Field descriptor
        descriptor: String,
    },
    /// Method invocation
    Method {
        /// The opcode
        opcode: Opcode,
        /// Declaring class
        owner: String,
        /// Method name
        name: String,
        /// Method descriptor
        descriptor: String,
        /// Whether the owner is an interface
        interface: bool,
    },
    /// Conditional or unconditional jump
    Jump {
        /// The opcode
        opcode: Opcode,
        /// Destination
        target: LabelId,
    },
    /// Multi-way branch over a contiguous key range
    TableSwitch {
        /// Lowest key
        min: i32,
        /// Highest key
        max: i32,
        /// Destination for keys outside the range
        default: LabelId,
        /// One destination per key in `min..=max`
        targets: Vec<LabelId>,
    },
    /// Multi-way branch over explicit keys
    LookupSwitch {
        /// Destination for keys not listed
        default: LabelId,
        /// Sorted keys
        keys: Vec<i32>,
        /// One destination per key
        targets: Vec<LabelId>,
    },
}

impl Instruction {
    /// Creates an instruction without operands.
    #[must_use]
    pub fn simple(opcode: Opcode) -> Self {
        Instruction::Simple(opcode)
    }

    /// Creates the shortest instruction pushing the integer `value`.
    ///
    /// Picks `iconst_*`, `bipush`, `sipush` or a constant load depending on the magnitude.
    #[must_use]
    pub fn push_int(value: i32) -> Self {
        match value {
            -1 => Instruction::Simple(Opcode::IconstM1),
            0 => Instruction::Simple(Opcode::Iconst0),
            1 => Instruction::Simple(Opcode::Iconst1),
            2 => Instruction::Simple(Opcode::Iconst2),
            3 => Instruction::Simple(Opcode::Iconst3),
            4 => Instruction::Simple(Opcode::Iconst4),
            5 => Instruction::Simple(Opcode::Iconst5),
            v if i8::try_from(v).is_ok() => Instruction::Int {
                opcode: Opcode::Bipush,
                operand: v,
            },
            v if i16::try_from(v).is_ok() => Instruction::Int {
                opcode: Opcode::Sipush,
                operand: v,
            },
            v => Instruction::Ldc(Constant::Int(v)),
        }
    }

    /// Creates a static method invocation on a class.
    #[must_use]
    pub fn invoke_static(owner: &str, name: &str, descriptor: &str) -> Self {
        Instruction::Method {
            opcode: Opcode::Invokestatic,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface: false,
        }
    }

    /// Creates a field access.
    #[must_use]
    pub fn field(opcode: Opcode, owner: &str, name: &str, descriptor: &str) -> Self {
        Instruction::Field {
            opcode,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    /// Returns the opcode, or `None` for labels and line markers.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Instruction::Label(_) | Instruction::Line(_) => None,
            Instruction::Simple(opcode)
            | Instruction::Int { opcode, .. }
            | Instruction::Var { opcode, .. }
            | Instruction::Type { opcode, .. }
            | Instruction::Field { opcode, .. }
            | Instruction::Method { opcode, .. }
            | Instruction::Jump { opcode, .. } => Some(*opcode),
            Instruction::Iinc { .. } => Some(Opcode::Iinc),
            Instruction::Ldc(_) => Some(Opcode::Ldc),
            Instruction::TableSwitch { .. } => Some(Opcode::Tableswitch),
            Instruction::LookupSwitch { .. } => Some(Opcode::Lookupswitch),
        }
    }

    /// Returns `true` for instructions that execute at runtime (everything except markers).
    #[must_use]
    pub fn is_executable(&self) -> bool {
        !matches!(self, Instruction::Label(_) | Instruction::Line(_))
    }

    /// Returns `true` for two-way conditional branches.
    #[must_use]
    pub fn is_conditional_jump(&self) -> bool {
        matches!(self, Instruction::Jump { opcode, .. } if opcode.is_conditional_jump())
    }

    /// Returns `true` for table and lookup switches.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. }
        )
    }

    /// Returns `true` if this is `opcode` without operands.
    #[must_use]
    pub fn is(&self, opcode: Opcode) -> bool {
        matches!(self, Instruction::Simple(op) if *op == opcode)
    }

    /// Returns `true` if this is a jump with the given opcode.
    #[must_use]
    pub fn is_jump_with(&self, opcode: Opcode) -> bool {
        matches!(self, Instruction::Jump { opcode: op, .. } if *op == opcode)
    }

    /// Returns the local variable slot if this is a load with the given opcode.
    #[must_use]
    pub fn load_index(&self, opcode: Opcode) -> Option<u16> {
        match self {
            Instruction::Var { opcode: op, index } if *op == opcode && op.is_load() => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Returns the local variable slot if this is a store with the given opcode.
    #[must_use]
    pub fn store_index(&self, opcode: Opcode) -> Option<u16> {
        match self {
            Instruction::Var { opcode: op, index } if *op == opcode && op.is_store() => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Returns `true` for a call of `owner.name` with any opcode and descriptor.
    ///
    /// An empty `owner` matches every declaring class.
    #[must_use]
    pub fn is_call_to(&self, owner: &str, name: &str) -> bool {
        matches!(
            self,
            Instruction::Method { owner: o, name: n, .. } if (owner.is_empty() || o == owner) && n == name
        )
    }

    /// Returns `true` for a call of `owner.name` with exactly `descriptor`.
    #[must_use]
    pub fn is_call(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        matches!(
            self,
            Instruction::Method { owner: o, name: n, descriptor: d, .. }
                if o == owner && n == name && d == descriptor
        )
    }

    /// Returns `true` for `new` of the given class.
    #[must_use]
    pub fn is_new(&self, class: &str) -> bool {
        matches!(
            self,
            Instruction::Type { opcode: Opcode::New, descriptor } if descriptor == class
        )
    }

    /// Returns the string literal of a constant load.
    #[must_use]
    pub fn string_constant(&self) -> Option<&str> {
        match self {
            Instruction::Ldc(Constant::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the pushed value for integer constant instructions.
    #[must_use]
    pub fn int_constant(&self) -> Option<i32> {
        match self {
            Instruction::Simple(opcode) => opcode.int_constant(),
            Instruction::Int {
                opcode: Opcode::Bipush | Opcode::Sipush,
                operand,
            } => Some(*operand),
            Instruction::Ldc(Constant::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Classifies the instruction's effect on control flow.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        match self {
            Instruction::Label(_) | Instruction::Line(_) => FlowType::Marker,
            Instruction::Jump { opcode, .. } if opcode.is_conditional_jump() => {
                FlowType::ConditionalBranch
            }
            Instruction::Jump { .. } => FlowType::UnconditionalBranch,
            Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => {
                FlowType::Switch
            }
            Instruction::Simple(opcode) if opcode.is_return() => FlowType::Return,
            Instruction::Simple(Opcode::Athrow) => FlowType::Throw,
            Instruction::Var {
                opcode: Opcode::Ret,
                ..
            } => FlowType::UnconditionalBranch,
            _ => FlowType::Sequential,
        }
    }

    /// Returns `true` if execution may continue with the next instruction in the stream.
    ///
    /// Markers count as falling through.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        match self {
            Instruction::Jump { opcode, .. } => *opcode != Opcode::Goto,
            _ => !matches!(
                self.flow_type(),
                FlowType::UnconditionalBranch
                    | FlowType::Switch
                    | FlowType::Return
                    | FlowType::Throw
            ),
        }
    }

    /// Returns every label this instruction can transfer control to.
    #[must_use]
    pub fn targets(&self) -> Vec<LabelId> {
        match self {
            Instruction::Jump { target, .. } => vec![*target],
            Instruction::TableSwitch {
                default, targets, ..
            }
            | Instruction::LookupSwitch {
                default, targets, ..
            } => {
                let mut all = Vec::with_capacity(targets.len() + 1);
                all.push(*default);
                all.extend_from_slice(targets);
                all
            }
            _ => Vec::new(),
        }
    }

    /// Returns the switch keys in target order, expanding table ranges to explicit keys.
    ///
    /// Returns `None` for anything but a switch.
    #[must_use]
    pub fn switch_keys(&self) -> Option<Vec<i32>> {
        match self {
            Instruction::TableSwitch { min, max, .. } => Some((*min..=*max).collect()),
            Instruction::LookupSwitch { keys, .. } => Some(keys.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Label(label) => write!(f, "{label}:"),
            Instruction::Line(line) => write!(f, "line {line}"),
            Instruction::Simple(opcode) => write!(f, "{opcode}"),
            Instruction::Int { opcode, operand } => write!(f, "{opcode} {operand}"),
            Instruction::Var { opcode, index } => write!(f, "{opcode} {index}"),
            Instruction::Iinc { index, delta } => write!(f, "iinc {index} {delta}"),
            Instruction::Ldc(constant) => write!(f, "ldc {constant:?}"),
            Instruction::Type { opcode, descriptor } => write!(f, "{opcode} {descriptor}"),
            Instruction::Field {
                opcode,
                owner,
                name,
                descriptor,
            } => write!(f, "{opcode} {owner}.{name}:{descriptor}"),
            Instruction::Method {
                opcode,
                owner,
                name,
                descriptor,
                ..
            } => write!(f, "{opcode} {owner}.{name}{descriptor}"),
            Instruction::Jump { opcode, target } => write!(f, "{opcode} {target}"),
            Instruction::TableSwitch {
                min,
                max,
                default,
                targets,
            } => {
                write!(f, "tableswitch {min}..{max} default {default} [")?;
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{target}")?;
                }
                write!(f, "]")
            }
            Instruction::LookupSwitch {
                default,
                keys,
                targets,
            } => {
                write!(f, "lookupswitch default {default} [")?;
                for (i, (key, target)) in keys.iter().zip(targets).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {target}")?;
                }
                write!(f, "]")
            }
        }
    }
}
