use std::collections::BTreeSet;
use std::fmt::Debug;

use log::{trace, warn};

use crate::op::{AluSource, Instruction, Opcode, Operand, Register, REGISTER_COUNT};
use crate::word::Word;

pub const RAM_SIZE: usize = 4096;
pub const STACK_SIZE: usize = 512;

/// `JMP PC`: jumps to itself, so the machine treats it as the stop pattern.
pub const HALT: Word = 0x2A00_0F00;

pub trait Debugger {
    fn op_read(&mut self, vm_state: &HorizonVm, instruction: &Instruction);
    fn op_executed(&mut self, vm_state: &HorizonVm, instruction: &Instruction);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub z: bool,
    pub n: bool,
    pub v: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StopReason {
    Halted,
    Breakpoint,
    CycleLimit,
    /// PC points outside RAM, so there is nothing left to fetch.
    PcOutOfRange,
}

pub struct HorizonVm {
    registers: [Word; REGISTER_COUNT],
    pub flags: Flags,
    pub ram: Vec<Word>,
    pub stack: Vec<Word>,
    pub cycles: u64,
    breakpoints: BTreeSet<u32>,
    pub debugger: Option<Box<dyn Debugger>>,
}

impl Debug for HorizonVm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("registers", &self.registers)
            .field("flags", &self.flags)
            .field("cycles", &self.cycles)
            .field("breakpoints", &self.breakpoints)
            .finish()
    }
}

impl Default for HorizonVm {
    fn default() -> Self {
        Self::empty()
    }
}

impl HorizonVm {
    pub fn empty() -> Self {
        Self {
            registers: [0; REGISTER_COUNT],
            flags: Flags::default(),
            ram: vec![0; RAM_SIZE],
            stack: vec![0; STACK_SIZE],
            cycles: 0,
            breakpoints: BTreeSet::new(),
            debugger: None,
        }
    }

    /// Copies `program` to the start of RAM, truncated to fit. Returns the
    /// number of words written.
    pub fn load_rom(&mut self, program: &[Word]) -> usize {
        let count = program.len().min(self.ram.len());
        self.ram[..count].copy_from_slice(&program[..count]);
        count
    }

    pub fn registers(&self) -> &[Word; REGISTER_COUNT] {
        &self.registers
    }

    pub fn register(&self, register: Register) -> Word {
        register
            .index()
            .map(|idx| self.registers[idx])
            .unwrap_or(0)
    }

    pub fn set_register(&mut self, register: Register, value: Word) {
        if let Some(idx) = register.index() {
            self.registers[idx] = value;
        }
    }

    pub fn pc(&self) -> u32 {
        self.register(Register::PC)
    }

    pub fn set_pc(&mut self, address: u32) {
        self.set_register(Register::PC, address);
    }

    fn advance(&mut self) {
        self.set_pc(self.pc().wrapping_add(1));
    }

    fn fetch(&self) -> Option<Word> {
        self.ram.get(self.pc() as usize).copied()
    }

    pub fn is_halted(&self) -> bool {
        self.fetch() == Some(HALT)
    }

    /// Returns false if the breakpoint was already set.
    pub fn set_breakpoint(&mut self, address: u32) -> bool {
        self.breakpoints.insert(address)
    }

    pub fn clear_breakpoint(&mut self, address: u32) -> bool {
        self.breakpoints.remove(&address)
    }

    pub fn has_breakpoint(&self, address: u32) -> bool {
        self.breakpoints.contains(&address)
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &u32> {
        self.breakpoints.iter()
    }

    pub fn reset(&mut self) {
        self.set_pc(0);
    }

    /// Executes the instruction at PC. Returns the reason nothing ran when
    /// the machine is halted or PC has left RAM.
    pub fn step(&mut self) -> Option<StopReason> {
        match self.fetch() {
            Some(HALT) => Some(StopReason::Halted),
            Some(word) => {
                self.execute(word);
                None
            }
            None => Some(StopReason::PcOutOfRange),
        }
    }

    /// Runs until HALT, ignoring breakpoints.
    pub fn run(&mut self) -> StopReason {
        loop {
            if let Some(reason) = self.step() {
                break reason;
            }
        }
    }

    pub fn run_until(&mut self, max_cycles: u64) -> StopReason {
        let mut cycles = 0;
        loop {
            if cycles >= max_cycles {
                break StopReason::CycleLimit;
            }
            if let Some(reason) = self.step() {
                break reason;
            }
            cycles += 1;
        }
    }

    /// Runs until HALT or a breakpoint. The instruction at the current PC
    /// always executes, so continuing from a breakpoint makes progress.
    pub fn continue_execution(&mut self) -> StopReason {
        if let Some(reason) = self.step() {
            return reason;
        }
        loop {
            if self.breakpoints.contains(&self.pc()) {
                break StopReason::Breakpoint;
            }
            if let Some(reason) = self.step() {
                break reason;
            }
        }
    }

    fn execute(&mut self, word: Word) {
        match Instruction::decode(word) {
            Some(instruction) => {
                trace!("({:#06X}): {}", self.pc(), instruction);
                if let Some(mut debugger) = self.debugger.take() {
                    debugger.op_read(self, &instruction);
                    self.debugger = Some(debugger);
                }
                self.run_op(instruction);
                if let Some(mut debugger) = self.debugger.take() {
                    debugger.op_executed(self, &instruction);
                    self.debugger = Some(debugger);
                }
            }
            None => {
                warn!(
                    "({:#06X}): illegal instruction {:#010X}, treating as NOOP",
                    self.pc(),
                    word
                );
                self.advance();
            }
        }
        self.cycles += 1;
    }

    fn run_op(&mut self, instruction: Instruction) {
        match instruction {
            Instruction::Noop => self.advance(),
            Instruction::Alu { opcode, rd, rm, rn } => {
                let a = self.register(rm) as i32;
                let b = match rn {
                    AluSource::Register(rn) => self.register(rn) as i32,
                    AluSource::Immediate(imm) => i32::from(imm),
                };
                self.alu(opcode, rd, a, b);
                self.advance();
            }
            Instruction::Not { opcode, rd, rm } => {
                let a = self.register(rm) as i32;
                self.alu(opcode, rd, a, 0);
                self.advance();
            }
            Instruction::Jump { opcode, target } => {
                self.advance();
                if self.condition(opcode) {
                    let address = match target {
                        Operand::Register(r) => self.register(r),
                        Operand::Immediate(imm) => u32::from(imm),
                    };
                    self.set_pc(address);
                }
            }
            Instruction::Store { opcode, value } => {
                let value = self.data_value(value);
                let address = self.register(Register::AR) as usize;
                if let Some(cell) = self.ram.get_mut(address) {
                    *cell = value;
                }
                self.adjust_ar(opcode);
                self.advance();
            }
            Instruction::Load { opcode, rd } => {
                let address = self.register(Register::AR) as usize;
                if let Some(value) = self.ram.get(address).copied() {
                    self.set_register(rd, value);
                }
                self.adjust_ar(opcode);
                self.advance();
            }
            Instruction::Push { value } => {
                let value = self.data_value(value);
                let sp = self.register(Register::SP);
                if let Some(cell) = self.stack.get_mut(sp as usize) {
                    *cell = value;
                }
                self.set_register(Register::SP, sp.wrapping_add(1));
                self.advance();
            }
            Instruction::Pop { rd } => {
                let sp = self.register(Register::SP).wrapping_sub(1);
                self.set_register(Register::SP, sp);
                if let Some(value) = self.stack.get(sp as usize).copied() {
                    self.set_register(rd, value);
                }
                self.advance();
            }
        }
    }

    fn data_value(&self, operand: Operand) -> Word {
        match operand {
            Operand::Register(r) => self.register(r),
            Operand::Immediate(imm) => imm as i16 as i32 as Word,
        }
    }

    fn adjust_ar(&mut self, opcode: Opcode) {
        let ar = self.register(Register::AR);
        match opcode {
            Opcode::STOREI | Opcode::LOADI => self.set_register(Register::AR, ar.wrapping_add(1)),
            Opcode::STORED | Opcode::LOADD => self.set_register(Register::AR, ar.wrapping_sub(1)),
            _ => {}
        }
    }

    fn condition(&self, opcode: Opcode) -> bool {
        let Flags { z, n, v } = self.flags;
        match opcode {
            Opcode::JEQ => z,
            Opcode::JNE => !z,
            Opcode::JLT => n != v,
            Opcode::JGT => !z && n == v,
            Opcode::JLE => z || n != v,
            Opcode::JGE => n == v,
            Opcode::JNG => n,
            Opcode::JPZ => !n,
            Opcode::JVS => v,
            Opcode::JVC => !v,
            _ => true,
        }
    }

    fn alu(&mut self, opcode: Opcode, rd: Register, a: i32, b: i32) {
        use Opcode::*;

        let result = match opcode {
            ADD | ADDS => a.wrapping_add(b),
            SUB | SUBS => a.wrapping_sub(b),
            MUL | MULS => a.wrapping_mul(b),
            DIV | DIVS => {
                if b == 0 {
                    0
                } else {
                    a.wrapping_div(b)
                }
            }
            MOD | MODS => {
                if b == 0 {
                    0
                } else {
                    a.wrapping_rem(b)
                }
            }
            EXP | EXPS => power(a, b),
            LSH | LSHS => shift_left(a, b),
            RSH | RSHS => shift_right(a, b),
            AND | ANDS => a & b,
            OR | ORS => a | b,
            NOT | NOTS => !a,
            XOR | XORS => a ^ b,
            BCAT | BCATS => ((a as u32) << 8) as i32 | b,
            HCAT | HCATS => ((a as u32) << 16) as i32 | b,
            _ => unreachable!("{} is not an ALU opcode", opcode),
        };

        self.set_register(rd, result as Word);

        if opcode.sets_flags() {
            match opcode {
                ADDS => self.flags.v = (a < 0) == (b < 0) && (a < 0) != (result < 0),
                SUBS => self.flags.v = (a < 0) != (b < 0) && (a < 0) != (result < 0),
                _ => {}
            }
            self.flags.z = result == 0;
            self.flags.n = result < 0;
        }
    }
}

fn power(base: i32, exponent: i32) -> i32 {
    if exponent >= 0 {
        return base.wrapping_pow(exponent as u32);
    }
    match base {
        1 => 1,
        -1 if exponent % 2 == 0 => 1,
        -1 => -1,
        _ => 0,
    }
}

fn shift_left(value: i32, amount: i32) -> i32 {
    if (0..32).contains(&amount) {
        ((value as u32) << amount) as i32
    } else {
        0
    }
}

/// Arithmetic: the sign bit fills in.
fn shift_right(value: i32, amount: i32) -> i32 {
    if (0..32).contains(&amount) {
        value >> amount
    } else if value < 0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::op::Opcode;

    fn alu(opcode: Opcode, rd: Register, rm: Register, rn: Register) -> Word {
        Instruction::Alu {
            opcode,
            rd,
            rm,
            rn: AluSource::Register(rn),
        }
        .encode()
    }

    fn alu_imm(opcode: Opcode, rd: Register, rm: Register, imm: i8) -> Word {
        Instruction::Alu {
            opcode,
            rd,
            rm,
            rn: AluSource::Immediate(imm),
        }
        .encode()
    }

    fn jump(opcode: Opcode, address: u16) -> Word {
        Instruction::Jump {
            opcode,
            target: Operand::Immediate(address),
        }
        .encode()
    }

    fn setup(program: &[Word]) -> HorizonVm {
        let mut vm = HorizonVm::empty();
        vm.load_rom(program);
        vm
    }

    fn binary_op(opcode: Opcode, a: i32, b: i32) -> (i32, Flags) {
        let mut vm = setup(&[alu(opcode, Register::R0, Register::R1, Register::R2), HALT]);
        vm.set_register(Register::R1, a as Word);
        vm.set_register(Register::R2, b as Word);
        vm.step();
        (vm.register(Register::R0) as i32, vm.flags)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(binary_op(Opcode::ADD, 2, 3).0, 5);
        assert_eq!(binary_op(Opcode::SUB, 2, 3).0, -1);
        assert_eq!(binary_op(Opcode::MUL, -4, 3).0, -12);
        assert_eq!(binary_op(Opcode::DIV, 7, 2).0, 3);
        assert_eq!(binary_op(Opcode::DIV, 7, 0).0, 0);
        assert_eq!(binary_op(Opcode::MOD, 7, 0).0, 0);
        assert_eq!(binary_op(Opcode::MOD, -7, 2).0, -1);
        assert_eq!(binary_op(Opcode::DIV, i32::MIN, -1).0, i32::MIN);
        assert_eq!(binary_op(Opcode::EXP, 3, 4).0, 81);
        assert_eq!(binary_op(Opcode::EXP, 2, -1).0, 0);
        assert_eq!(binary_op(Opcode::EXP, -1, -3).0, -1);
    }

    #[test]
    fn bitwise() {
        assert_eq!(binary_op(Opcode::LSH, 1, 4).0, 16);
        assert_eq!(binary_op(Opcode::LSH, 1, 32).0, 0);
        assert_eq!(binary_op(Opcode::RSH, -16, 2).0, -4);
        assert_eq!(binary_op(Opcode::RSH, -16, 40).0, -1);
        assert_eq!(binary_op(Opcode::AND, 0b1100, 0b1010).0, 0b1000);
        assert_eq!(binary_op(Opcode::OR, 0b1100, 0b1010).0, 0b1110);
        assert_eq!(binary_op(Opcode::XOR, 0b1100, 0b1010).0, 0b0110);
        assert_eq!(binary_op(Opcode::BCAT, 0x12, 0x1234).0, 0x1234);
        assert_eq!(binary_op(Opcode::HCAT, 0x12, 0x5678).0, 0x0012_5678);
        // the second operand is not masked
        assert_eq!(binary_op(Opcode::HCAT, 0x12, 0x0001_5678).0, 0x0013_5678);
    }

    #[test]
    fn concat_negative_immediate() {
        let mut vm = setup(&[
            alu_imm(Opcode::BCAT, Register::R0, Register::R1, -1),
            alu_imm(Opcode::HCATS, Register::R2, Register::R1, -2),
            HALT,
        ]);
        vm.set_register(Register::R1, 0x12);
        vm.step();
        vm.step();
        assert_eq!(vm.register(Register::R0), 0xFFFF_FFFF);
        assert_eq!(vm.register(Register::R2), 0xFFFF_FFFE);
        assert!(vm.flags.n);
    }

    #[test]
    fn not() {
        let not = Instruction::Not {
            opcode: Opcode::NOTS,
            rd: Register::R3,
            rm: Register::R3,
        }
        .encode();
        let mut vm = setup(&[not, HALT]);
        vm.step();
        assert_eq!(vm.register(Register::R3), 0xFFFF_FFFF);
        assert!(vm.flags.n);
        assert!(!vm.flags.z);
    }

    #[test]
    fn overflow() {
        let (result, flags) = binary_op(Opcode::ADDS, i32::MAX, 1);
        assert_eq!(result, i32::MIN);
        assert_eq!(
            flags,
            Flags {
                z: false,
                n: true,
                v: true
            }
        );

        let (result, flags) = binary_op(Opcode::SUBS, i32::MIN, 1);
        assert_eq!(result, i32::MAX);
        assert!(flags.v);
        assert!(!flags.n);

        let (_, flags) = binary_op(Opcode::SUBS, 5, 5);
        assert!(flags.z);
        assert!(!flags.v);

        // flags untouched without the S suffix
        let (_, flags) = binary_op(Opcode::ADD, i32::MAX, 1);
        assert_eq!(flags, Flags::default());
    }

    #[test]
    fn nil_register() {
        let mut vm = setup(&[alu_imm(Opcode::ADDS, Register::NIL, Register::NIL, 0), HALT]);
        vm.step();
        assert!(vm.flags.z);
        assert_eq!(vm.pc(), 1);
        assert!(vm.registers()[..15].iter().all(|r| *r == 0));
    }

    #[test]
    fn alu_reads_pc_before_advance() {
        let mut vm = setup(&[
            Instruction::Noop.encode(),
            alu_imm(Opcode::ADD, Register::LR, Register::PC, 2),
            HALT,
        ]);
        vm.step();
        vm.step();
        assert_eq!(vm.register(Register::LR), 3);
        assert_eq!(vm.pc(), 2);
    }

    #[test]
    fn conditions() {
        let cases = [
            (Opcode::JEQ, Flags { z: true, n: false, v: false }, true),
            (Opcode::JEQ, Flags::default(), false),
            (Opcode::JNE, Flags::default(), true),
            (Opcode::JLT, Flags { z: false, n: true, v: false }, true),
            (Opcode::JLT, Flags { z: false, n: true, v: true }, false),
            (Opcode::JGT, Flags::default(), true),
            (Opcode::JGT, Flags { z: true, n: false, v: false }, false),
            (Opcode::JLE, Flags { z: true, n: false, v: false }, true),
            (Opcode::JGE, Flags { z: false, n: true, v: true }, true),
            (Opcode::JNG, Flags { z: false, n: true, v: false }, true),
            (Opcode::JPZ, Flags { z: false, n: true, v: false }, false),
            (Opcode::JVS, Flags { z: false, n: false, v: true }, true),
            (Opcode::JVC, Flags { z: false, n: false, v: true }, false),
            (Opcode::JMP, Flags::default(), true),
        ];

        for (opcode, flags, taken) in cases {
            let mut vm = setup(&[jump(opcode, 10)]);
            vm.flags = flags;
            vm.step();
            let expected = if taken { 10 } else { 1 };
            assert_eq!(vm.pc(), expected, "{} with {:?}", opcode, flags);
        }
    }

    #[test]
    fn jump_register() {
        let jmp_lr = Instruction::Jump {
            opcode: Opcode::JMP,
            target: Operand::Register(Register::LR),
        }
        .encode();
        let mut vm = setup(&[jmp_lr]);
        vm.set_register(Register::LR, 7);
        vm.step();
        assert_eq!(vm.pc(), 7);
    }

    #[test]
    fn halted() {
        let mut vm = setup(&[HALT]);
        assert!(vm.is_halted());
        assert_eq!(vm.step(), Some(StopReason::Halted));
        assert_eq!(vm.cycles, 0);
        assert_eq!(vm.pc(), 0);
    }

    #[test]
    fn illegal_is_noop() {
        let mut vm = setup(&[0x3F00_0000, HALT]);
        assert_eq!(vm.run(), StopReason::Halted);
        assert_eq!(vm.pc(), 1);
        assert_eq!(vm.cycles, 1);
    }

    #[test]
    fn pc_out_of_range() {
        let mut vm = HorizonVm::empty();
        vm.set_pc(RAM_SIZE as u32);
        assert_eq!(vm.step(), Some(StopReason::PcOutOfRange));
    }

    #[test]
    fn cycle_limit() {
        let mut vm = setup(&[jump(Opcode::JMP, 1), jump(Opcode::JMP, 0)]);
        assert_eq!(vm.run_until(10), StopReason::CycleLimit);
        assert_eq!(vm.cycles, 10);
    }

    #[test]
    fn reference_program() {
        // stores 3, 2, 1, 0 at 64.. then sums them into R0
        let mut vm = setup(&[
            0xAA00_0001,
            0x0B00_0000,
            0x8001_FF03,
            0x800C_FF40,
            0x3200_0100,
            0x9101_0101,
            0xA100_0004,
            0xB000_0000,
            0x0B0C_0C0C,
            0x800C_FF40,
            0x3301_0000,
            0x91FF_0100,
            0xA000_000F,
            0x0000_0001,
            0xAA00_000A,
            0x2A00_0F00,
        ]);
        assert_eq!(vm.run(), StopReason::Halted);
        assert_eq!(vm.pc(), 15);
        assert_eq!(vm.register(Register::R0), 6);
        assert_eq!(vm.register(Register::R1), 0);
        assert_eq!(vm.register(Register::AR), 68);
        assert_eq!(&vm.ram[64..68], &[3, 2, 1, 0]);
        assert!(vm.flags.z);
        assert_eq!(vm.cycles, 34);
    }

    #[test]
    fn reset_keeps_state() {
        let mut vm = setup(&[alu_imm(Opcode::ADD, Register::R0, Register::R0, 1), HALT]);
        vm.run();
        vm.reset();
        assert_eq!(vm.pc(), 0);
        assert_eq!(vm.register(Register::R0), 1);
        vm.run();
        assert_eq!(vm.register(Register::R0), 2);
    }

    struct Recorder(Rc<RefCell<Vec<(u32, String)>>>);

    impl Debugger for Recorder {
        fn op_read(&mut self, vm_state: &HorizonVm, instruction: &Instruction) {
            self.0
                .borrow_mut()
                .push((vm_state.pc(), instruction.to_string()));
        }

        fn op_executed(&mut self, vm_state: &HorizonVm, _instruction: &Instruction) {
            self.0
                .borrow_mut()
                .push((vm_state.pc(), "done".to_string()));
        }
    }

    #[test]
    fn debugger_hooks() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut vm = setup(&[Instruction::Noop.encode(), HALT]);
        vm.debugger = Some(Box::new(Recorder(log.clone())));
        vm.run();

        assert_eq!(
            *log.borrow(),
            vec![(0, "NOOP".to_string()), (1, "done".to_string())]
        );
        assert!(vm.debugger.is_some());
    }
}
