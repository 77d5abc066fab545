use hodbg::Hdb;

use crate::op::{Instruction, Operand, Register, REGISTER_COUNT};
use crate::vm::{Debugger, Flags, HorizonVm};
use crate::word::Word;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RegState {
    registers: [Word; REGISTER_COUNT],
    flags: Flags,
}

impl RegState {
    fn capture(vm: &HorizonVm) -> Self {
        RegState {
            registers: *vm.registers(),
            flags: vm.flags,
        }
    }

    fn diff(&self, other: &RegState) -> Option<String> {
        let mut diffs = Vec::new();

        for (idx, (before, after)) in self.registers.iter().zip(other.registers.iter()).enumerate() {
            let Some(register) = Register::from_u8(idx as u8) else {
                continue;
            };
            // stepping forward one word is not interesting
            if register == Register::PC && after.wrapping_sub(*before) == 1 {
                continue;
            }
            if before != after {
                diffs.push(format!("{} {:#010X} -> {:#010X}", register, before, after));
            }
        }

        if self.flags != other.flags {
            diffs.push(format!(
                "flags {} -> {}",
                format_flags(self.flags),
                format_flags(other.flags)
            ));
        }

        if diffs.is_empty() {
            None
        } else {
            Some(diffs.join(", "))
        }
    }
}

fn format_flags(flags: Flags) -> String {
    let bit = |set: bool, c: char| if set { c } else { '-' };
    [bit(flags.z, 'Z'), bit(flags.n, 'N'), bit(flags.v, 'V')]
        .iter()
        .collect()
}

/// Prints every executed instruction, its source line when symbols are
/// loaded, and the registers it changed.
pub struct HdbDebugger {
    verbose: bool,
    hdb: Option<Hdb>,
    last_reg_state: RegState,
}

impl HdbDebugger {
    pub fn new() -> Self {
        HdbDebugger {
            verbose: false,
            hdb: None,
            last_reg_state: RegState::default(),
        }
    }

    pub fn verbose() -> Self {
        HdbDebugger {
            verbose: true,
            ..Self::new()
        }
    }

    pub fn with_symbols(hdb: Hdb) -> Self {
        HdbDebugger {
            hdb: Some(hdb),
            ..Self::new()
        }
    }

    fn source_line(&self, address: u32) -> Option<String> {
        let hdb = self.hdb.as_ref()?;
        let line = match hdb.line_at(address) {
            Some(line) => format!("[{}] {}: {}", hdb.name, line.line_number, line.text),
            None => format!("[{}] Unknown line", hdb.name),
        };
        Some(line)
    }

    fn jump_target(&self, address: u32) -> Option<String> {
        let hdb = self.hdb.as_ref()?;
        let line = hdb.line_at(address)?;
        let target = match hdb.label_at(address) {
            Some(label) => format!("{} ({}: {})", label, line.line_number, line.text),
            None => format!("{}: {}", line.line_number, line.text),
        };
        Some(target)
    }
}

impl Default for HdbDebugger {
    fn default() -> Self {
        Self::new()
    }
}

impl Debugger for HdbDebugger {
    fn op_read(&mut self, vm_state: &HorizonVm, instruction: &Instruction) {
        self.last_reg_state = RegState::capture(vm_state);
        let pc = vm_state.pc();

        print!("({:#06X}): {}", pc, instruction);
        if self.verbose {
            print!(" - {:?}", instruction);
        }
        println!();

        if let Some(line) = self.source_line(pc) {
            println!("  {}", line);
        }

        if let Instruction::Jump {
            target: Operand::Immediate(target),
            ..
        } = instruction
        {
            if let Some(line) = self.jump_target(u32::from(*target)) {
                println!("    Target: {}", line);
            }
        }
    }

    fn op_executed(&mut self, vm_state: &HorizonVm, _instruction: &Instruction) {
        let new_reg_state = RegState::capture(vm_state);

        if let Some(diff) = self.last_reg_state.diff(&new_reg_state) {
            println!("  {}", diff);
        }
    }
}
