use std::fmt::{self, Display};

use num::FromPrimitive;
use num_derive::{FromPrimitive, ToPrimitive};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::word::{word_from_fields, word_with_imm16, Word, WordExt};

#[allow(clippy::upper_case_acronyms)]
#[repr(u8)]
#[derive(
    FromPrimitive,
    ToPrimitive,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
pub enum Opcode {
    ADD = 0,
    SUB = 1,
    MUL = 2,
    DIV = 3,
    MOD = 4,
    EXP = 5,
    LSH = 6,
    RSH = 7,
    AND = 8,
    OR = 9,
    NOT = 10,
    XOR = 11,
    BCAT = 12,
    HCAT = 13,

    ADDS = 16,
    SUBS = 17,
    MULS = 18,
    DIVS = 19,
    MODS = 20,
    EXPS = 21,
    LSHS = 22,
    RSHS = 23,
    ANDS = 24,
    ORS = 25,
    NOTS = 26,
    XORS = 27,
    BCATS = 28,
    HCATS = 29,

    JEQ = 32,
    JNE = 33,
    JLT = 34,
    JGT = 35,
    JLE = 36,
    JGE = 37,
    JNG = 38,
    JPZ = 39,
    JVS = 40,
    JVC = 41,
    JMP = 42,

    NOOP = 43,

    STORE = 48,
    LOAD = 49,
    STOREI = 50,
    LOADI = 51,
    STORED = 52,
    LOADD = 53,

    PUSH = 56,
    POP = 57,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    NoOp,
    Alu,
    Stack,
    Jump,
    Memory,
}

impl Opcode {
    pub fn from_u8(opcode: u8) -> Option<Opcode> {
        FromPrimitive::from_u8(opcode)
    }

    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    pub fn class(&self) -> OpClass {
        match *self as u8 {
            0..=29 => OpClass::Alu,
            32..=42 => OpClass::Jump,
            43 => OpClass::NoOp,
            48..=53 => OpClass::Memory,
            _ => OpClass::Stack,
        }
    }

    pub fn sets_flags(&self) -> bool {
        self.class() == OpClass::Alu && (*self as u8) & 0x10 != 0
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Opcode::NOT | Opcode::NOTS)
    }

    /// LOAD, LOADI and LOADD take a destination register instead of a value.
    pub fn is_load(&self) -> bool {
        matches!(self, Opcode::LOAD | Opcode::LOADI | Opcode::LOADD)
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[allow(clippy::upper_case_acronyms)]
#[repr(u8)]
#[derive(
    FromPrimitive,
    ToPrimitive,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    AR = 12,
    SP = 13,
    LR = 14,
    PC = 15,
    NIL = 255,
}

pub const REGISTER_COUNT: usize = 16;

impl Register {
    pub fn from_u8(register: u8) -> Option<Register> {
        FromPrimitive::from_u8(register)
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Slot in the register file; NIL has none.
    pub fn index(&self) -> Option<usize> {
        match self {
            Register::NIL => None,
            r => Some(*r as usize),
        }
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Second ALU source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluSource {
    Register(Register),
    Immediate(i8),
}

/// Operand of jumps, stores and pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Immediate(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Noop,
    Alu {
        opcode: Opcode,
        rd: Register,
        rm: Register,
        rn: AluSource,
    },
    Not {
        opcode: Opcode,
        rd: Register,
        rm: Register,
    },
    Jump {
        opcode: Opcode,
        target: Operand,
    },
    Store {
        opcode: Opcode,
        value: Operand,
    },
    Load {
        opcode: Opcode,
        rd: Register,
    },
    Push {
        value: Operand,
    },
    Pop {
        rd: Register,
    },
}

fn operand_word(opcode: Opcode, operand: Operand) -> Word {
    match operand {
        Operand::Register(r) => word_from_fields(false, opcode as u8, 0, r as u8, 0),
        Operand::Immediate(imm) => word_with_imm16(opcode as u8, imm),
    }
}

fn decode_operand(word: Word) -> Option<Operand> {
    if word.is_immediate() {
        Some(Operand::Immediate(word.imm16()))
    } else {
        Register::from_u8(word.rm()).map(Operand::Register)
    }
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Noop => Opcode::NOOP,
            Instruction::Alu { opcode, .. }
            | Instruction::Not { opcode, .. }
            | Instruction::Jump { opcode, .. }
            | Instruction::Store { opcode, .. }
            | Instruction::Load { opcode, .. } => *opcode,
            Instruction::Push { .. } => Opcode::PUSH,
            Instruction::Pop { .. } => Opcode::POP,
        }
    }

    pub fn encode(&self) -> Word {
        match *self {
            Instruction::Noop => word_from_fields(false, Opcode::NOOP as u8, 0, 0, 0),
            Instruction::Alu { opcode, rd, rm, rn } => match rn {
                AluSource::Register(rn) => {
                    word_from_fields(false, opcode as u8, rd as u8, rm as u8, rn as u8)
                }
                AluSource::Immediate(imm) => {
                    word_from_fields(true, opcode as u8, rd as u8, rm as u8, imm as u8)
                }
            },
            Instruction::Not { opcode, rd, rm } => {
                word_from_fields(false, opcode as u8, rd as u8, rm as u8, 0)
            }
            Instruction::Jump { opcode, target } => operand_word(opcode, target),
            Instruction::Store { opcode, value } => operand_word(opcode, value),
            Instruction::Load { opcode, rd } => word_from_fields(false, opcode as u8, rd as u8, 0, 0),
            Instruction::Push { value } => operand_word(Opcode::PUSH, value),
            Instruction::Pop { rd } => word_from_fields(false, Opcode::POP as u8, rd as u8, 0, 0),
        }
    }

    /// None for words no mnemonic can produce: unknown opcodes, immediate
    /// forms of NOT, LOAD* and POP, and register bytes outside the file.
    pub fn decode(word: Word) -> Option<Instruction> {
        let opcode = Opcode::from_u8(word.opcode_bits())?;
        let immediate = word.is_immediate();

        let instruction = match opcode.class() {
            OpClass::NoOp => Instruction::Noop,
            OpClass::Alu => {
                let rd = Register::from_u8(word.rd())?;
                let rm = Register::from_u8(word.rm())?;
                if opcode.is_unary() {
                    if immediate {
                        return None;
                    }
                    Instruction::Not { opcode, rd, rm }
                } else {
                    let rn = if immediate {
                        AluSource::Immediate(word.imm8())
                    } else {
                        AluSource::Register(Register::from_u8(word.rn())?)
                    };
                    Instruction::Alu { opcode, rd, rm, rn }
                }
            }
            OpClass::Jump => Instruction::Jump {
                opcode,
                target: decode_operand(word)?,
            },
            OpClass::Memory if opcode.is_load() => {
                if immediate {
                    return None;
                }
                Instruction::Load {
                    opcode,
                    rd: Register::from_u8(word.rd())?,
                }
            }
            OpClass::Memory => Instruction::Store {
                opcode,
                value: decode_operand(word)?,
            },
            OpClass::Stack if opcode == Opcode::PUSH => Instruction::Push {
                value: decode_operand(word)?,
            },
            OpClass::Stack => {
                if immediate {
                    return None;
                }
                Instruction::Pop {
                    rd: Register::from_u8(word.rd())?,
                }
            }
        };

        Some(instruction)
    }
}

/// Stored and pushed immediates are sign-extended, so they print signed.
struct DataOperand(Operand);

impl Display for DataOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Immediate(imm) => write!(f, "#{}", imm as i16),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Immediate(imm) => write!(f, "#{}", imm),
        }
    }
}

impl Display for AluSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AluSource::Register(r) => write!(f, "{}", r),
            AluSource::Immediate(imm) => write!(f, "#{}", imm),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Noop => write!(f, "NOOP"),
            Instruction::Alu { opcode, rd, rm, rn } => write!(f, "{} {} {} {}", opcode, rd, rm, rn),
            Instruction::Not { opcode, rd, rm } => write!(f, "{} {} {}", opcode, rd, rm),
            Instruction::Jump { opcode, target } => write!(f, "{} {}", opcode, target),
            Instruction::Store { opcode, value } => {
                write!(f, "{} {}", opcode, DataOperand(*value))
            }
            Instruction::Load { opcode, rd } => write!(f, "{} {}", opcode, rd),
            Instruction::Push { value } => write!(f, "PUSH {}", DataOperand(*value)),
            Instruction::Pop { rd } => write!(f, "POP {}", rd),
        }
    }
}
