use crate::op::{Instruction, Opcode, Operand};
use crate::vm::HorizonVm;
use crate::word::{Word, WordExt};

pub fn disassemble_word(word: Word) -> String {
    Instruction::decode(word)
        .map(|instruction| instruction.to_string())
        .unwrap_or_else(|| "ILLEGAL".to_string())
}

/// First code address, read back from the `JMP #entry` header. Without a
/// header everything is treated as code.
pub fn code_start(header: Word) -> u32 {
    match Instruction::decode(header) {
        Some(Instruction::Jump {
            opcode: Opcode::JMP,
            target: Operand::Immediate(entry),
        }) => u32::from(entry),
        _ => 0,
    }
}

impl HorizonVm {
    /// Text for the word at `address`: the header jump, a data value, or an
    /// instruction. None outside RAM.
    pub fn disassemble(&self, address: u32) -> Option<String> {
        let word = *self.ram.get(address as usize)?;
        let text = if address != 0 && address < code_start(self.ram[0]) {
            format!("{}", word.as_i32())
        } else {
            disassemble_word(word)
        };
        Some(text)
    }
}
