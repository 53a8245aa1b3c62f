//! Opcode table of the target stack machine.
//!
//! The numbering follows the class-file instruction set, so rewritten bodies can be handed
//! back to a host encoder without translation. Mnemonics are the lowercase variant names
//! (`iconst_0`, `if_icmpne`, `tableswitch`, ...), available through [`std::fmt::Display`]
//! and [`std::str::FromStr`].

use strum::{Display, EnumString, FromRepr, IntoStaticStr};

/// A single opcode of the instruction set.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, FromRepr, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    AconstNull = 0x01,
    #[strum(serialize = "iconst_m1")]
    IconstM1 = 0x02,
    #[strum(serialize = "iconst_0")]
    Iconst0 = 0x03,
    #[strum(serialize = "iconst_1")]
    Iconst1 = 0x04,
    #[strum(serialize = "iconst_2")]
    Iconst2 = 0x05,
    #[strum(serialize = "iconst_3")]
    Iconst3 = 0x06,
    #[strum(serialize = "iconst_4")]
    Iconst4 = 0x07,
    #[strum(serialize = "iconst_5")]
    Iconst5 = 0x08,
    #[strum(serialize = "lconst_0")]
    Lconst0 = 0x09,
    #[strum(serialize = "lconst_1")]
    Lconst1 = 0x0A,
    #[strum(serialize = "fconst_0")]
    Fconst0 = 0x0B,
    #[strum(serialize = "fconst_1")]
    Fconst1 = 0x0C,
    #[strum(serialize = "fconst_2")]
    Fconst2 = 0x0D,
    #[strum(serialize = "dconst_0")]
    Dconst0 = 0x0E,
    #[strum(serialize = "dconst_1")]
    Dconst1 = 0x0F,
    Bipush = 0x10,
    Sipush = 0x11,
    Ldc = 0x12,
    Iload = 0x15,
    Lload = 0x16,
    Fload = 0x17,
    Dload = 0x18,
    Aload = 0x19,
    Iaload = 0x2E,
    Laload = 0x2F,
    Faload = 0x30,
    Daload = 0x31,
    Aaload = 0x32,
    Baload = 0x33,
    Caload = 0x34,
    Saload = 0x35,
    Istore = 0x36,
    Lstore = 0x37,
    Fstore = 0x38,
    Dstore = 0x39,
    Astore = 0x3A,
    Iastore = 0x4F,
    Lastore = 0x50,
    Fastore = 0x51,
    Dastore = 0x52,
    Aastore = 0x53,
    Bastore = 0x54,
    Castore = 0x55,
    Sastore = 0x56,
    Pop = 0x57,
    Pop2 = 0x58,
    Dup = 0x59,
    DupX1 = 0x5A,
    DupX2 = 0x5B,
    Dup2 = 0x5C,
    Dup2X1 = 0x5D,
    Dup2X2 = 0x5E,
    Swap = 0x5F,
    Iadd = 0x60,
    Ladd = 0x61,
    Fadd = 0x62,
    Dadd = 0x63,
    Isub = 0x64,
    Lsub = 0x65,
    Fsub = 0x66,
    Dsub = 0x67,
    Imul = 0x68,
    Lmul = 0x69,
    Fmul = 0x6A,
    Dmul = 0x6B,
    Idiv = 0x6C,
    Ldiv = 0x6D,
    Fdiv = 0x6E,
    Ddiv = 0x6F,
    Irem = 0x70,
    Lrem = 0x71,
    Frem = 0x72,
    Drem = 0x73,
    Ineg = 0x74,
    Lneg = 0x75,
    Fneg = 0x76,
    Dneg = 0x77,
    Ishl = 0x78,
    Lshl = 0x79,
    Ishr = 0x7A,
    Lshr = 0x7B,
    Iushr = 0x7C,
    Lushr = 0x7D,
    Iand = 0x7E,
    Land = 0x7F,
    Ior = 0x80,
    Lor = 0x81,
    Ixor = 0x82,
    Lxor = 0x83,
    Iinc = 0x84,
    I2l = 0x85,
    I2f = 0x86,
    I2d = 0x87,
    L2i = 0x88,
    L2f = 0x89,
    L2d = 0x8A,
    F2i = 0x8B,
    F2l = 0x8C,
    F2d = 0x8D,
    D2i = 0x8E,
    D2l = 0x8F,
    D2f = 0x90,
    I2b = 0x91,
    I2c = 0x92,
    I2s = 0x93,
    Lcmp = 0x94,
    Fcmpl = 0x95,
    Fcmpg = 0x96,
    Dcmpl = 0x97,
    Dcmpg = 0x98,
    Ifeq = 0x99,
    Ifne = 0x9A,
    Iflt = 0x9B,
    Ifge = 0x9C,
    Ifgt = 0x9D,
    Ifle = 0x9E,
    IfIcmpeq = 0x9F,
    IfIcmpne = 0xA0,
    IfIcmplt = 0xA1,
    IfIcmpge = 0xA2,
    IfIcmpgt = 0xA3,
    IfIcmple = 0xA4,
    IfAcmpeq = 0xA5,
    IfAcmpne = 0xA6,
    Goto = 0xA7,
    Jsr = 0xA8,
    Ret = 0xA9,
    Tableswitch = 0xAA,
    Lookupswitch = 0xAB,
    Ireturn = 0xAC,
    Lreturn = 0xAD,
    Freturn = 0xAE,
    Dreturn = 0xAF,
    Areturn = 0xB0,
    Return = 0xB1,
    Getstatic = 0xB2,
    Putstatic = 0xB3,
    Getfield = 0xB4,
    Putfield = 0xB5,
    Invokevirtual = 0xB6,
    Invokespecial = 0xB7,
    Invokestatic = 0xB8,
    Invokeinterface = 0xB9,
    Invokedynamic = 0xBA,
    New = 0xBB,
    Newarray = 0xBC,
    Anewarray = 0xBD,
    Arraylength = 0xBE,
    Athrow = 0xBF,
    Checkcast = 0xC0,
    Instanceof = 0xC1,
    Monitorenter = 0xC2,
    Monitorexit = 0xC3,
    Multianewarray = 0xC5,
    Ifnull = 0xC6,
    Ifnonnull = 0xC7,
}

impl Opcode {
    /// Returns the numeric opcode value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Returns `true` for two-way branches whose outcome depends on operand values.
    ///
    /// `goto` and `jsr` are unconditional and therefore not branches in the coverage sense.
    #[must_use]
    pub const fn is_conditional_jump(self) -> bool {
        matches!(
            self,
            Opcode::Ifeq
                | Opcode::Ifne
                | Opcode::Iflt
                | Opcode::Ifge
                | Opcode::Ifgt
                | Opcode::Ifle
                | Opcode::IfIcmpeq
                | Opcode::IfIcmpne
                | Opcode::IfIcmplt
                | Opcode::IfIcmpge
                | Opcode::IfIcmpgt
                | Opcode::IfIcmple
                | Opcode::IfAcmpeq
                | Opcode::IfAcmpne
                | Opcode::Ifnull
                | Opcode::Ifnonnull
        )
    }

    /// Returns `true` for instructions that carry a jump target label.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        self.is_conditional_jump() || matches!(self, Opcode::Goto | Opcode::Jsr)
    }

    /// Returns `true` for multi-way branches.
    #[must_use]
    pub const fn is_switch(self) -> bool {
        matches!(self, Opcode::Tableswitch | Opcode::Lookupswitch)
    }

    /// Returns `true` for the method-exit instructions.
    #[must_use]
    pub const fn is_return(self) -> bool {
        matches!(
            self,
            Opcode::Ireturn
                | Opcode::Lreturn
                | Opcode::Freturn
                | Opcode::Dreturn
                | Opcode::Areturn
                | Opcode::Return
        )
    }

    /// Returns `true` if execution may continue with the next instruction in the stream.
    #[must_use]
    pub const fn falls_through(self) -> bool {
        !(self.is_return()
            || self.is_switch()
            || matches!(self, Opcode::Goto | Opcode::Athrow | Opcode::Ret))
    }

    /// Returns `true` for the local-variable load instructions.
    #[must_use]
    pub const fn is_load(self) -> bool {
        matches!(
            self,
            Opcode::Iload | Opcode::Lload | Opcode::Fload | Opcode::Dload | Opcode::Aload
        )
    }

    /// Returns `true` for the local-variable store instructions.
    #[must_use]
    pub const fn is_store(self) -> bool {
        matches!(
            self,
            Opcode::Istore | Opcode::Lstore | Opcode::Fstore | Opcode::Dstore | Opcode::Astore
        )
    }

    /// Returns `true` for the method invocation instructions.
    #[must_use]
    pub const fn is_invoke(self) -> bool {
        matches!(
            self,
            Opcode::Invokevirtual
                | Opcode::Invokespecial
                | Opcode::Invokestatic
                | Opcode::Invokeinterface
        )
    }

    /// Returns the small-constant value for `iconst_*` opcodes.
    #[must_use]
    pub const fn int_constant(self) -> Option<i32> {
        match self {
            Opcode::IconstM1 => Some(-1),
            Opcode::Iconst0 => Some(0),
            Opcode::Iconst1 => Some(1),
            Opcode::Iconst2 => Some(2),
            Opcode::Iconst3 => Some(3),
            Opcode::Iconst4 => Some(4),
            Opcode::Iconst5 => Some(5),
            _ => None,
        }
    }

    /// Number of local-variable slots occupied by values moved with this load/store opcode.
    #[must_use]
    pub const fn local_width(self) -> u16 {
        match self {
            Opcode::Lload | Opcode::Dload | Opcode::Lstore | Opcode::Dstore => 2,
            _ => 1,
        }
    }
}
