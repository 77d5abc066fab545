use libhorizon::op::{OpClass, Opcode, Register};

use crate::{
    constants::{is_reserved, literal_regex, register_regex, word_regex, IDENT_MAX_LEN},
    cursor::Cursor,
    directive::Directive,
    error::AsmError,
};

pub type MatchResult<'a, T> = Result<(Cursor<'a>, T), AsmError>;

/// Turns `NoMatch` into a real error, for places where only one
/// alternative makes sense.
pub fn require<'a, T>(result: MatchResult<'a, T>, error: AsmError) -> MatchResult<'a, T> {
    match result {
        Err(AsmError::NoMatch) => Err(error),
        other => other,
    }
}

/// Turns `NoMatch` into `None`.
pub fn optional<'a, T>(result: MatchResult<'a, T>) -> Result<Option<(Cursor<'a>, T)>, AsmError> {
    match result {
        Ok(matched) => Ok(Some(matched)),
        Err(AsmError::NoMatch) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn match_whitespace(cursor: Cursor) -> Cursor {
    let rest = cursor.rest();
    let len = rest.len() - rest.trim_start_matches(|c: char| c == ' ' || c == '\t' || c == '\r').len();
    cursor.advance(len)
}

/// Whitespace and at most one comma between operands.
pub fn match_separator(cursor: Cursor) -> Cursor {
    let cursor = match_whitespace(cursor);
    match cursor.eat(',') {
        Some(cursor) => match_whitespace(cursor),
        None => cursor,
    }
}

/// A `;` comment up to, not including, the newline. Yields the comment text.
pub fn match_comment(cursor: Cursor) -> MatchResult<&str> {
    let after = cursor.eat(';').ok_or(AsmError::NoMatch)?;
    let text = after.current_line();
    Ok((after.advance(text.len()), text.trim()))
}

/// Optional trailing comment, one newline, and the next line's indentation.
pub fn match_newline(cursor: Cursor) -> MatchResult<()> {
    let cursor = match_whitespace(cursor);
    let cursor = match match_comment(cursor) {
        Ok((cursor, _)) => cursor,
        Err(_) => cursor,
    };
    if cursor.is_at_end() {
        return Err(AsmError::EndOfInput);
    }
    let cursor = cursor.eat('\n').ok_or(AsmError::NoMatch)?;
    Ok((match_whitespace(cursor), ()))
}

/// Skips whatever is left of the line so parsing can pick up at the next one.
pub fn match_error(cursor: Cursor) -> Cursor {
    cursor.advance(cursor.current_line().len())
}

/// Nothing but whitespace or a comment left on the line.
pub fn match_end_of_statement(cursor: Cursor) -> Result<Cursor, AsmError> {
    let cursor = match_whitespace(cursor);
    if cursor.statement().is_empty() {
        Ok(cursor)
    } else {
        Err(AsmError::TooManyArguments)
    }
}

pub fn at_end_of_statement(cursor: Cursor) -> bool {
    match_whitespace(cursor).statement().is_empty()
}

/// Signed decimal, `0x` hex or `0b` binary, anywhere in -2^31..2^32.
pub fn match_literal(cursor: Cursor) -> MatchResult<i64> {
    let captures = literal_regex()
        .captures(cursor.rest())
        .ok_or(AsmError::NoMatch)?;
    let len = captures.get(0).map(|m| m.end()).unwrap_or(0);

    let (digits, radix) = if let Some(hex) = captures.name("hex") {
        (hex.as_str(), 16)
    } else if let Some(bin) = captures.name("bin") {
        (bin.as_str(), 2)
    } else {
        (captures.name("dec").map(|m| m.as_str()).unwrap_or(""), 10)
    };

    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| AsmError::OutOfRange32)?;
    let value = if captures.name("sign").is_some() {
        -magnitude
    } else {
        magnitude
    };

    if !(i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&value) {
        return Err(AsmError::OutOfRange32);
    }

    Ok((cursor.advance(len), value))
}

pub fn fit8(value: i64) -> Result<i8, AsmError> {
    if (-128..=255).contains(&value) {
        Ok(value as u8 as i8)
    } else {
        Err(AsmError::OutOfRange8)
    }
}

pub fn fit16(value: i64) -> Result<u16, AsmError> {
    if (-32768..=65535).contains(&value) {
        Ok(value as u16)
    } else {
        Err(AsmError::OutOfRange16)
    }
}

fn match_hash_literal(cursor: Cursor) -> MatchResult<i64> {
    let cursor = cursor.eat('#').ok_or(AsmError::NoMatch)?;
    match_literal(cursor)
}

/// `#` and a literal that fits a signed or unsigned byte.
pub fn match_imm8(cursor: Cursor) -> MatchResult<i8> {
    let (cursor, value) = match_hash_literal(cursor)?;
    Ok((cursor, fit8(value)?))
}

/// `#` and a literal that fits a signed or unsigned half-word.
pub fn match_imm16(cursor: Cursor) -> MatchResult<u16> {
    let (cursor, value) = match_hash_literal(cursor)?;
    Ok((cursor, fit16(value)?))
}

pub fn match_register(cursor: Cursor) -> MatchResult<Register> {
    let found = register_regex()
        .find(cursor.rest())
        .ok_or(AsmError::NoMatch)?;
    let register = found
        .as_str()
        .to_ascii_uppercase()
        .parse::<Register>()
        .map_err(|_| AsmError::NoMatch)?;
    Ok((cursor.advance(found.end()), register))
}

/// Any name-shaped word, reserved or not.
pub fn match_word(cursor: Cursor) -> MatchResult<String> {
    let found = word_regex().find(cursor.rest()).ok_or(AsmError::NoMatch)?;
    if found.end() > IDENT_MAX_LEN {
        return Err(AsmError::IdentifierTooLong);
    }
    Ok((
        cursor.advance(found.end()),
        found.as_str().to_ascii_uppercase(),
    ))
}

pub fn match_identifier(cursor: Cursor) -> MatchResult<String> {
    let (cursor, word) = match_word(cursor)?;
    if is_reserved(&word) {
        return Err(AsmError::ReservedWord(word));
    }
    Ok((cursor, word))
}

pub fn match_directive(cursor: Cursor) -> MatchResult<Directive> {
    let after_dot = cursor.eat('.').ok_or(AsmError::NoMatch)?;
    let (after, word) = match_word(after_dot)
        .map_err(|_| AsmError::UnknownDirective(after_dot.statement().trim().to_string()))?;
    let directive = word
        .parse::<Directive>()
        .map_err(|_| AsmError::UnknownDirective(word))?;
    Ok((after, directive))
}

pub fn match_label(cursor: Cursor) -> MatchResult<String> {
    let (after, word) = match_word(cursor)?;
    let after = after.eat(':').ok_or(AsmError::NoMatch)?;
    if is_reserved(&word) {
        return Err(AsmError::ReservedWord(word));
    }
    Ok((after, word))
}

fn match_class(cursor: Cursor, class: OpClass) -> MatchResult<Opcode> {
    let (after, word) = match_word(cursor)?;
    match word.parse::<Opcode>() {
        Ok(opcode) if opcode.class() == class => Ok((after, opcode)),
        _ => Err(AsmError::NoMatch),
    }
}

pub fn match_noop(cursor: Cursor) -> MatchResult<Opcode> {
    match_class(cursor, OpClass::NoOp)
}

pub fn match_alu(cursor: Cursor) -> MatchResult<Opcode> {
    match_class(cursor, OpClass::Alu)
}

pub fn match_stack(cursor: Cursor) -> MatchResult<Opcode> {
    match_class(cursor, OpClass::Stack)
}

pub fn match_cond(cursor: Cursor) -> MatchResult<Opcode> {
    match_class(cursor, OpClass::Jump)
}

pub fn match_mem(cursor: Cursor) -> MatchResult<Opcode> {
    match_class(cursor, OpClass::Memory)
}
