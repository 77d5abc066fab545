use hoasm::{assemble, encoder::encode, AsmError, SymbolKind, SymbolTable, SENTINEL};
use libhorizon::{
    op::{AluSource, Instruction, OpClass, Opcode, Operand, Register},
    vm_with_program, StopReason,
};
use strum::IntoEnumIterator;

const SUM: &str = include_str!("../programs/sum.hasm");
const CALLS: &str = include_str!("../programs/calls.hasm");
const ERRORS: &str = include_str!("../programs/errors.hasm");

fn errors(text: &str) -> Vec<(usize, AsmError)> {
    assemble(text)
        .diagnostics
        .into_iter()
        .map(|diagnostic| (diagnostic.line, diagnostic.error))
        .collect()
}

#[test]
fn sum_runs() {
    let words = hoasm::assemble_program(SUM).unwrap();
    assert_eq!(words.len(), 19);

    let mut vm = vm_with_program(&words);
    assert_eq!(vm.run_until(1000), StopReason::Halted);
    assert_eq!(vm.register(Register::R0), 6);
    assert_eq!(vm.register(Register::R1), 0);
    assert_eq!(vm.register(Register::AR), 5);
    assert_eq!(vm.pc(), 18);
    assert_eq!(&vm.ram[1..5], &[3, 2, 1, 0]);
    assert!(vm.flags.z);
}

#[test]
fn sum_metadata() {
    let assembly = assemble(SUM);
    assert_eq!(assembly.name.as_deref(), Some("Sum"));
    assert_eq!(
        assembly.description.as_deref(),
        Some(
            "Fills an array with 3, 2, 1 and a terminating zero,\n\
             then adds the elements up into R0."
        )
    );
    assert_eq!(assembly.entry, 5);
}

#[test]
fn sum_debug_symbols() {
    let debug = assemble(SUM).debug;
    assert_eq!(debug.name, "Sum");
    assert_eq!(debug.entry, 5);
    assert_eq!(debug.label_at(13), Some("SUM"));
    assert_eq!(debug.address_for_label("FILL"), Some(8));
    assert_eq!(debug.address_for_label("SUM"), Some(13));
    assert_eq!(debug.address_for_label("DONE"), Some(18));

    let line = debug.line_at(8).unwrap();
    assert_eq!(line.text, "STOREI R1");
    assert_eq!(line.line_number, 12);

    // macro lines map every expanded word back to the macro's line
    let line = debug.line_at(6).unwrap();
    assert_eq!(line.text, "ADD R1 NIL #COUNT");
    assert_eq!(line.line_number, 10);
    assert!(debug.line_at(1).is_none());
}

#[test]
fn calls_runs() {
    let assembly = assemble(CALLS);
    assert!(assembly.is_ok(), "{:?}", assembly.diagnostics);
    assert_eq!(assembly.name.as_deref(), Some("Calls"));
    assert_eq!(assembly.description, None);
    assert_eq!(assembly.entry, 4);
    assert_eq!(
        assembly.code,
        vec![
            0xAA00_0004,
            0,
            0x0201_0101,
            0x2A00_0E00,
            0x8001_FF07,
            0x800E_0F02,
            0xAA00_0002,
            0xB800_0001,
            0x390C_0000,
            0x3000_0100,
            0x2A00_0F00,
        ]
    );

    let mut vm = vm_with_program(&assembly.words().unwrap());
    assert_eq!(vm.run_until(1000), StopReason::Halted);
    assert_eq!(vm.ram[1], 49);
    assert_eq!(vm.register(Register::LR), 7);
    assert_eq!(vm.register(Register::SP), 0);
}

#[test]
fn broken_lines_keep_their_size() {
    let assembly = assemble(ERRORS);
    assert_eq!(
        assembly.code,
        vec![
            0xAA00_0001,
            SENTINEL,
            SENTINEL,
            SENTINEL,
            0x3901_0000,
            0x2B00_0000,
        ]
    );
    assert_eq!(
        errors(ERRORS),
        vec![
            (2, AsmError::RedefinedIdentifier("X".into())),
            (3, AsmError::OutOfRange8),
            (4, AsmError::UnknownInstruction("FROB".into())),
            (5, AsmError::TooFewArguments),
            (6, AsmError::UndefinedIdentifier("NOWHERE".into())),
            (7, AsmError::OutOfRange16),
        ]
    );
    assert!(assembly.words().is_err());
}

#[test]
fn labels_before_data() {
    let assembly = assemble(
        "START:\n\
         .VAR A 1\n\
         .ARRAY B [2]\n\
         \tJMP START\n",
    );
    assert!(assembly.is_ok(), "{:?}", assembly.diagnostics);
    assert_eq!(assembly.code, vec![0xAA00_0004, 1, 0, 0, 0xAA00_0004]);

    let start = assembly.symbols.lookup("START").unwrap();
    assert_eq!(start.kind, SymbolKind::Label);
    assert_eq!(start.value, 4);
    assert_eq!(assembly.symbols.lookup("B").unwrap().value, 2);
}

#[test]
fn forward_labels() {
    let assembly = assemble(
        "\tJMP END\n\
         \tNOOP\n\
         END: HALT\n",
    );
    assert_eq!(assembly.code, vec![0xAA00_0001, 0xAA00_0003, 0x2B00_0000, 0x2A00_0F00]);
}

#[test]
fn macro_errors() {
    assert_eq!(
        errors("\tCALL\n\tMOV R1\n\tINC R1 R2\n\tRETURN R1\n"),
        vec![
            (1, AsmError::TooFewArguments),
            (2, AsmError::TooFewArguments),
            (3, AsmError::TooManyArguments),
            (4, AsmError::TooManyArguments),
        ]
    );
    assert_eq!(
        errors(".MACRO CALL 1\n. NOOP\n"),
        vec![(1, AsmError::RedefinedIdentifier("CALL".into()))]
    );
}

#[test]
fn macro_names_as_arguments() {
    let assembly = assemble(
        ".MACRO DO 2\n\
         . $1 $2\n\
         \tDO CALL SUB\n\
         \tHALT\n\
         SUB: MOV R0 #7\n\
         \tRETURN\n",
    );
    assert!(assembly.is_ok(), "{:?}", assembly.diagnostics);
    assert_eq!(
        assembly.code,
        vec![
            0xAA00_0001,
            0x800E_0F02,
            0xAA00_0004,
            0x2A00_0F00,
            0x8000_FF07,
            0x2A00_0E00,
        ]
    );

    let mut vm = vm_with_program(&assembly.words().unwrap());
    assert_eq!(vm.run_until(100), StopReason::Halted);
    assert_eq!(vm.register(Register::R0), 7);
    assert_eq!(vm.pc(), 3);
}

#[test]
fn constants_in_operands() {
    let assembly = assemble(
        ".CONST LIMIT -2\n\
         .CONST MASK 0xFF\n\
         .VAR FLAGS 0b101\n\
         \tADD R1 #LIMIT\n\
         \tPUSH #MASK\n\
         \tSTORE #LIMIT\n\
         \tMOV AR #FLAGS\n",
    );
    assert!(assembly.is_ok(), "{:?}", assembly.diagnostics);
    assert_eq!(
        assembly.code,
        vec![
            0xAA00_0002,
            5,
            0x8001_01FE,
            0xB800_00FF,
            0xB000_FFFE,
            0x800C_FF01,
        ]
    );
}

/// One representative instruction per opcode.
fn sample(opcode: Opcode) -> Vec<Instruction> {
    match opcode.class() {
        OpClass::NoOp => vec![Instruction::Noop],
        OpClass::Alu if opcode.is_unary() => vec![Instruction::Not {
            opcode,
            rd: Register::R1,
            rm: Register::R2,
        }],
        OpClass::Alu => vec![
            Instruction::Alu {
                opcode,
                rd: Register::R1,
                rm: Register::R2,
                rn: AluSource::Register(Register::R11),
            },
            Instruction::Alu {
                opcode,
                rd: Register::AR,
                rm: Register::NIL,
                rn: AluSource::Immediate(-5),
            },
        ],
        OpClass::Jump => vec![
            Instruction::Jump {
                opcode,
                target: Operand::Immediate(300),
            },
            Instruction::Jump {
                opcode,
                target: Operand::Register(Register::LR),
            },
        ],
        OpClass::Memory if opcode.is_load() => vec![Instruction::Load {
            opcode,
            rd: Register::R3,
        }],
        OpClass::Memory => vec![
            Instruction::Store {
                opcode,
                value: Operand::Immediate(0xFFF0),
            },
            Instruction::Store {
                opcode,
                value: Operand::Register(Register::SP),
            },
        ],
        OpClass::Stack if opcode == Opcode::PUSH => vec![
            Instruction::Push {
                value: Operand::Immediate(5),
            },
            Instruction::Push {
                value: Operand::Register(Register::R7),
            },
        ],
        OpClass::Stack => vec![Instruction::Pop { rd: Register::R4 }],
    }
}

#[test]
fn every_opcode_reassembles() {
    let symbols = SymbolTable::new();
    for opcode in Opcode::iter() {
        for instruction in sample(opcode) {
            let text = instruction.to_string();
            let word = encode(&text, &symbols).unwrap_or_else(|e| panic!("{}: {}", text, e));
            assert_eq!(word, instruction.encode(), "{}", text);
            assert_eq!(Instruction::decode(word), Some(instruction), "{}", text);
        }
    }
}
