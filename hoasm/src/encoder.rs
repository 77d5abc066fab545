use libhorizon::{
    op::{AluSource, Instruction, Opcode, Operand, Register},
    Word,
};
use log::trace;

use crate::{
    cursor::Cursor,
    error::AsmError,
    matchers::{
        at_end_of_statement, fit16, fit8, match_alu, match_cond, match_end_of_statement,
        match_identifier, match_literal, match_mem, match_noop, match_register, match_separator,
        match_stack, match_whitespace, match_word, optional, MatchResult,
    },
    symbols::{SymbolKind, SymbolTable},
};

type Encoded<'a> = MatchResult<'a, Instruction>;

/// Value of a name used as an operand.
fn resolve(symbols: &SymbolTable, name: &str) -> Result<i64, AsmError> {
    match symbols.lookup(name) {
        Some(symbol) if symbol.kind == SymbolKind::Macro => Err(AsmError::ExpectedConstOrLiteral),
        Some(symbol) if symbol.kind == SymbolKind::Const => Ok(i64::from(symbol.value as i32)),
        Some(symbol) => Ok(i64::from(symbol.value)),
        None => Err(AsmError::UndefinedIdentifier(name.to_string())),
    }
}

/// `#literal` or `#NAME`, before range checking.
fn immediate<'a>(cursor: Cursor<'a>, symbols: &SymbolTable) -> MatchResult<'a, i64> {
    let cursor = cursor.eat('#').ok_or(AsmError::NoMatch)?;
    if let Some(found) = optional(match_literal(cursor))? {
        return Ok(found);
    }
    match optional(match_identifier(cursor))? {
        Some((after, name)) => Ok((after, resolve(symbols, &name)?)),
        None => Err(AsmError::ExpectedImmediate),
    }
}

/// Fails with `TooFewArguments` when the statement has already ended.
fn operand_present(cursor: Cursor) -> Result<(), AsmError> {
    if at_end_of_statement(cursor) {
        Err(AsmError::TooFewArguments)
    } else {
        Ok(())
    }
}

fn register(cursor: Cursor) -> MatchResult<Register> {
    let cursor = match_separator(cursor);
    operand_present(cursor)?;
    match match_register(cursor) {
        Err(AsmError::NoMatch) => Err(AsmError::ExpectedRegister),
        other => other,
    }
}

fn alu_source<'a>(cursor: Cursor<'a>, symbols: &SymbolTable) -> MatchResult<'a, AluSource> {
    let cursor = match_separator(cursor);
    operand_present(cursor)?;
    if let Some((after, r)) = optional(match_register(cursor))? {
        return Ok((after, AluSource::Register(r)));
    }
    match immediate(cursor, symbols) {
        Ok((after, value)) => Ok((after, AluSource::Immediate(fit8(value)?))),
        Err(AsmError::NoMatch) => Err(AsmError::ExpectedRegister),
        Err(e) => Err(e),
    }
}

/// Register or 16-bit immediate; jumps also take a bare name.
fn operand<'a>(cursor: Cursor<'a>, symbols: &SymbolTable, bare_names: bool) -> MatchResult<'a, Operand> {
    let cursor = match_separator(cursor);
    operand_present(cursor)?;
    if let Some((after, r)) = optional(match_register(cursor))? {
        return Ok((after, Operand::Register(r)));
    }
    match immediate(cursor, symbols) {
        Ok((after, value)) => return Ok((after, Operand::Immediate(fit16(value)?))),
        Err(AsmError::NoMatch) => {}
        Err(e) => return Err(e),
    }
    if bare_names {
        if let Some((after, name)) = optional(match_identifier(cursor))? {
            let address = resolve(symbols, &name)?;
            return Ok((after, Operand::Immediate(fit16(address)?)));
        }
    }
    Err(AsmError::ExpectedRegister)
}

fn encode_noop<'a>(cursor: Cursor<'a>, _symbols: &SymbolTable) -> Encoded<'a> {
    let (cursor, _) = match_noop(cursor)?;
    Ok((cursor, Instruction::Noop))
}

/// `OP RD RM RN`, `OP RD RM #imm`, `OP RD RN`, `OP RD #imm`, `NOT RD [RM]`
fn encode_alu<'a>(cursor: Cursor<'a>, symbols: &SymbolTable) -> Encoded<'a> {
    let (cursor, opcode) = match_alu(cursor)?;
    let (cursor, rd) = register(cursor)?;

    if opcode.is_unary() {
        let (cursor, rm) = if at_end_of_statement(cursor) {
            (cursor, rd)
        } else {
            register(cursor)?
        };
        return Ok((cursor, Instruction::Not { opcode, rd, rm }));
    }

    let (cursor, second) = alu_source(cursor, symbols)?;
    let (cursor, rm, rn) = match second {
        AluSource::Register(rm) if !at_end_of_statement(cursor) => {
            let (cursor, rn) = alu_source(cursor, symbols)?;
            (cursor, rm, rn)
        }
        rn => (cursor, rd, rn),
    };

    Ok((cursor, Instruction::Alu { opcode, rd, rm, rn }))
}

fn encode_stack<'a>(cursor: Cursor<'a>, symbols: &SymbolTable) -> Encoded<'a> {
    let (cursor, opcode) = match_stack(cursor)?;
    if opcode == Opcode::PUSH {
        let (cursor, value) = operand(cursor, symbols, false)?;
        Ok((cursor, Instruction::Push { value }))
    } else {
        let (cursor, rd) = register(cursor)?;
        Ok((cursor, Instruction::Pop { rd }))
    }
}

fn encode_cond<'a>(cursor: Cursor<'a>, symbols: &SymbolTable) -> Encoded<'a> {
    let (cursor, opcode) = match_cond(cursor)?;
    let (cursor, target) = operand(cursor, symbols, true)?;
    Ok((cursor, Instruction::Jump { opcode, target }))
}

fn encode_mem<'a>(cursor: Cursor<'a>, symbols: &SymbolTable) -> Encoded<'a> {
    let (cursor, opcode) = match_mem(cursor)?;
    if opcode.is_load() {
        let (cursor, rd) = register(cursor)?;
        Ok((cursor, Instruction::Load { opcode, rd }))
    } else {
        let (cursor, value) = operand(cursor, symbols, false)?;
        Ok((cursor, Instruction::Store { opcode, value }))
    }
}

const ENCODERS: [for<'a> fn(Cursor<'a>, &SymbolTable) -> Encoded<'a>; 5] =
    [encode_noop, encode_alu, encode_stack, encode_cond, encode_mem];

/// Encodes one instruction line; macros must already be expanded.
pub fn encode(text: &str, symbols: &SymbolTable) -> Result<Word, AsmError> {
    let cursor = match_whitespace(Cursor::new(text));

    for encoder in ENCODERS {
        match encoder(cursor, symbols) {
            Err(AsmError::NoMatch) => continue,
            Err(e) => return Err(e),
            Ok((after, instruction)) => {
                match_end_of_statement(after)?;
                let word = instruction.encode();
                trace!("{:<24} {:#010X}", text, word);
                return Ok(word);
            }
        }
    }

    let name = match match_word(cursor) {
        Ok((_, word)) => word,
        Err(_) => text.trim().to_string(),
    };
    Err(AsmError::UnknownInstruction(name))
}

#[cfg(test)]
mod test {
    use super::*;

    fn symbols() -> SymbolTable {
        let mut symbols = SymbolTable::new();
        symbols.define("TEN", 10, SymbolKind::Const).unwrap();
        symbols.define("MINUS", (-3i32) as u32, SymbolKind::Const).unwrap();
        symbols.define("BIG", 300, SymbolKind::Const).unwrap();
        symbols.define("COUNT", 1, SymbolKind::Var).unwrap();
        symbols.define("LOOP", 7, SymbolKind::Label).unwrap();
        symbols.define("CALL", 1, SymbolKind::Macro).unwrap();
        symbols
    }

    fn enc(text: &str) -> Result<Word, AsmError> {
        encode(text, &symbols())
    }

    #[test]
    fn alu_forms() {
        assert_eq!(enc("ADD R1 R2 R3"), Ok(0x0001_0203));
        assert_eq!(enc("ADD R1, R2, R3"), Ok(0x0001_0203));
        assert_eq!(enc("ADD R1 NIL #3"), Ok(0x8001_FF03));
        assert_eq!(enc("SUBS R1 #1"), Ok(0x9101_0101));
        assert_eq!(enc("XOR AR AR"), Ok(0x0B0C_0C0C));
        assert_eq!(enc("ADD R0 R0 #TEN"), Ok(0x8000_000A));
        assert_eq!(enc("ADD R0 R0 #MINUS"), Ok(0x8000_00FD));
        assert_eq!(enc("NOT R1"), Ok(0x0A01_0100));
        assert_eq!(enc("NOTS R1 R2"), Ok(0x1A01_0200));
    }

    #[test]
    fn jumps() {
        assert_eq!(enc("JMP PC"), Ok(libhorizon::HALT));
        assert_eq!(enc("JNE #4"), Ok(0xA100_0004));
        assert_eq!(enc("JEQ LOOP"), Ok(0xA000_0007));
        assert_eq!(enc("JEQ #LOOP"), Ok(0xA000_0007));
        assert_eq!(enc("JMP COUNT"), Ok(0xAA00_0001));
    }

    #[test]
    fn memory_and_stack() {
        assert_eq!(enc("STOREI R1"), Ok(0x3200_0100));
        assert_eq!(enc("STORE #0"), Ok(0xB000_0000));
        assert_eq!(enc("STORE #-1"), Ok(0xB000_FFFF));
        assert_eq!(enc("LOADI R1"), Ok(0x3301_0000));
        assert_eq!(enc("PUSH #1000"), Ok(0xB800_03E8));
        assert_eq!(enc("POP LR"), Ok(0x390E_0000));
        assert_eq!(enc("NOOP"), Ok(0x2B00_0000));
    }

    #[test]
    fn errors() {
        assert_eq!(enc("ADD R1"), Err(AsmError::TooFewArguments));
        assert_eq!(enc("ADD R1 R2 R3 R4"), Err(AsmError::TooManyArguments));
        assert_eq!(enc("NOOP R1"), Err(AsmError::TooManyArguments));
        assert_eq!(enc("ADD R1 R2 #300"), Err(AsmError::OutOfRange8));
        assert_eq!(enc("ADD R1 R2 #BIG"), Err(AsmError::OutOfRange8));
        assert_eq!(enc("PUSH #70000"), Err(AsmError::OutOfRange16));
        assert_eq!(enc("ADD FOO R1"), Err(AsmError::ExpectedRegister));
        assert_eq!(enc("LOAD #1"), Err(AsmError::ExpectedRegister));
        assert_eq!(enc("POP"), Err(AsmError::TooFewArguments));
        assert_eq!(enc("JMP NOWHERE"), Err(AsmError::UndefinedIdentifier("NOWHERE".into())));
        assert_eq!(enc("JMP #CALL"), Err(AsmError::ExpectedConstOrLiteral));
        assert_eq!(enc("PUSH #"), Err(AsmError::ExpectedImmediate));
        assert_eq!(enc("STORE LOOP"), Err(AsmError::ExpectedRegister));
        assert_eq!(enc("FROB R1"), Err(AsmError::UnknownInstruction("FROB".into())));
    }
}
