pub type Word = u32;

pub const IMMEDIATE_FLAG: Word = 0x8000_0000;
pub const SET_FLAGS_FLAG: Word = 0x1000_0000;

pub trait WordExt {
    fn is_immediate(&self) -> bool;
    fn sets_flags(&self) -> bool;
    /// The 7-bit opcode field, without the immediate flag.
    fn opcode_bits(&self) -> u8;
    fn rd(&self) -> u8;
    fn rm(&self) -> u8;
    fn rn(&self) -> u8;
    fn imm8(&self) -> i8;
    fn imm16(&self) -> u16;
    fn as_i32(&self) -> i32;
}

impl WordExt for Word {
    fn is_immediate(&self) -> bool {
        self & IMMEDIATE_FLAG != 0
    }

    fn sets_flags(&self) -> bool {
        self & SET_FLAGS_FLAG != 0
    }

    fn opcode_bits(&self) -> u8 {
        ((self >> 24) & 0x7F) as u8
    }

    fn rd(&self) -> u8 {
        (self >> 16) as u8
    }

    fn rm(&self) -> u8 {
        (self >> 8) as u8
    }

    fn rn(&self) -> u8 {
        *self as u8
    }

    fn imm8(&self) -> i8 {
        *self as u8 as i8
    }

    fn imm16(&self) -> u16 {
        *self as u16
    }

    fn as_i32(&self) -> i32 {
        *self as i32
    }
}

/// Pack the three-register layout: opcode, rd, rm and the low byte.
pub fn word_from_fields(immediate: bool, opcode: u8, rd: u8, rm: u8, low: u8) -> Word {
    let flag = if immediate { IMMEDIATE_FLAG } else { 0 };
    flag | (u32::from(opcode & 0x7F) << 24)
        | (u32::from(rd) << 16)
        | (u32::from(rm) << 8)
        | u32::from(low)
}

/// Pack the 16-bit immediate layout used by jumps, stores and pushes.
pub fn word_with_imm16(opcode: u8, imm: u16) -> Word {
    IMMEDIATE_FLAG | (u32::from(opcode & 0x7F) << 24) | u32::from(imm)
}
