use libhorizon::op::Opcode;
use log::debug;

use crate::{
    constants::DATA_OFFSET,
    cursor::Cursor,
    directive::Directive,
    error::{AsmError, Diagnostic},
    macros::{split_args, MacroTable},
    matchers::{
        match_comment, match_directive, match_end_of_statement, match_error, match_identifier,
        match_label, match_literal, match_newline, match_whitespace, match_word, optional,
        require, MatchResult,
    },
    symbols::{SymbolKind, SymbolTable},
};

/// An instruction or macro invocation waiting for pass two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLine {
    pub text: String,
    pub line_number: usize,
    pub size: usize,
}

pub struct FirstPass {
    symbols: SymbolTable,
    macros: MacroTable,
    data: Vec<u32>,
    lines: Vec<PendingLine>,
    code_size: usize,
    code_start: usize,
    name: Option<String>,
    description: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

pub struct PassOne {
    pub symbols: SymbolTable,
    pub macros: MacroTable,
    pub data: Vec<u32>,
    pub lines: Vec<PendingLine>,
    /// Code words before the entry point.
    pub code_start: usize,
    pub name: Option<String>,
    pub description: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Array lengths past this could never be addressed by an immediate.
const MAX_ARRAY_LEN: i64 = u16::MAX as i64;

impl FirstPass {
    fn new() -> Self {
        let macros = MacroTable::with_builtins();
        let mut symbols = SymbolTable::new();
        for builtin in macros.iter() {
            // builtin names are distinct, this can't collide
            let _ = symbols.define(&builtin.name, builtin.arg_count as u32, SymbolKind::Macro);
        }

        Self {
            symbols,
            macros,
            data: Vec::new(),
            lines: Vec::new(),
            code_size: 0,
            code_start: 0,
            name: None,
            description: None,
            diagnostics: Vec::new(),
        }
    }

    /// Parses normalized (uppercased outside comments) source text.
    pub fn parse(source: &str) -> PassOne {
        let mut pass = Self::new();
        let mut cursor = match_whitespace(Cursor::new(source));

        loop {
            match match_newline(cursor) {
                Ok((next, _)) => {
                    cursor = next;
                    continue;
                }
                Err(AsmError::EndOfInput) => break,
                Err(_) => {}
            }

            let line = cursor.line();
            cursor = match pass.parse_statement(cursor) {
                Ok(next) => next,
                Err(error) => {
                    pass.error(line, error);
                    match_error(cursor)
                }
            };

            match match_newline(cursor) {
                Ok((next, _)) => cursor = next,
                Err(AsmError::EndOfInput) => break,
                Err(_) => cursor = match_error(cursor),
            }
        }

        let data_end = DATA_OFFSET + pass.data.len() as u32;
        pass.symbols.relocate_labels(data_end);

        PassOne {
            symbols: pass.symbols,
            macros: pass.macros,
            data: pass.data,
            lines: pass.lines,
            code_start: pass.code_start,
            name: pass.name,
            description: pass.description,
            diagnostics: pass.diagnostics,
        }
    }

    fn error(&mut self, line: usize, error: AsmError) {
        debug!("line {}: {}", line, error);
        self.diagnostics.push(Diagnostic { line, error });
    }

    fn parse_statement<'a>(&mut self, cursor: Cursor<'a>) -> Result<Cursor<'a>, AsmError> {
        if let Some((after, directive)) = optional(match_directive(cursor))? {
            return self.parse_directive(directive, after);
        }

        let cursor = match optional(match_label(cursor)) {
            Ok(Some((after, label))) => {
                // labels are code relative until the data size is known
                debug!("label {} at code offset {}", label, self.code_size);
                if let Err(error) =
                    self.symbols
                        .define(&label, self.code_size as u32, SymbolKind::Label)
                {
                    self.error(cursor.line(), error);
                }
                let after = match_whitespace(after);
                if after.statement().is_empty() {
                    return Ok(after);
                }
                after
            }
            Ok(None) => cursor,
            Err(error) => return Err(error),
        };

        self.parse_instruction(cursor)
    }

    fn parse_instruction<'a>(&mut self, cursor: Cursor<'a>) -> Result<Cursor<'a>, AsmError> {
        let statement = cursor.statement();
        let text = statement.trim();

        let (after, word) = match_word(cursor)
            .map_err(|_| AsmError::UnknownInstruction(text.to_string()))?;

        let size = if word.parse::<Opcode>().is_ok() {
            1
        } else if self.macros.get(&word).is_some() {
            // arguments may name macros too, so size the real expansion
            self.macros.expand(&word, &split_args(after.statement()))?.len()
        } else {
            return Err(AsmError::UnknownInstruction(word));
        };

        self.lines.push(PendingLine {
            text: text.to_string(),
            line_number: cursor.line(),
            size,
        });
        self.code_size += size;

        Ok(cursor.advance(statement.len()))
    }

    fn parse_directive<'a>(
        &mut self,
        directive: Directive,
        cursor: Cursor<'a>,
    ) -> Result<Cursor<'a>, AsmError> {
        if directive.is_data() && !self.lines.is_empty() {
            return Err(AsmError::IllegalDataDirective);
        }

        let cursor = match directive {
            Directive::CONST => self.parse_const(cursor)?,
            Directive::VAR => self.parse_var(cursor)?,
            Directive::ARRAY => self.parse_array(cursor)?,
            Directive::START => {
                debug!("entry point at code offset {}", self.code_size);
                self.code_start = self.code_size;
                cursor
            }
            Directive::NAME => {
                let (cursor, text) = self.parse_metadata(cursor)?;
                self.name = Some(text);
                return Ok(cursor);
            }
            Directive::DESC => {
                let (cursor, text) = self.parse_metadata(cursor)?;
                self.description = Some(text);
                return Ok(cursor);
            }
            Directive::MACRO => return Ok(self.parse_macro(cursor)),
        };

        match_end_of_statement(cursor)
    }

    fn name<'a>(&self, cursor: Cursor<'a>) -> MatchResult<'a, String> {
        require(
            match_identifier(match_whitespace(cursor)),
            AsmError::ExpectedIdentifier,
        )
    }

    /// A literal or the name of a constant.
    fn const_or_literal<'a>(&self, cursor: Cursor<'a>) -> MatchResult<'a, i64> {
        let cursor = match_whitespace(cursor);
        if let Some(found) = optional(match_literal(cursor))? {
            return Ok(found);
        }
        let (after, name) = require(match_identifier(cursor), AsmError::ExpectedConstOrLiteral)?;
        match self.symbols.lookup(&name) {
            Some(symbol) if symbol.kind == SymbolKind::Const => {
                Ok((after, i64::from(symbol.value as i32)))
            }
            _ => Err(AsmError::ExpectedConstOrLiteral),
        }
    }

    fn parse_const<'a>(&mut self, cursor: Cursor<'a>) -> Result<Cursor<'a>, AsmError> {
        let (cursor, name) = self.name(cursor)?;
        let (cursor, value) = require(
            match_literal(match_whitespace(cursor)),
            AsmError::ExpectedLiteral,
        )?;
        self.symbols.define(&name, value as u32, SymbolKind::Const)?;
        debug!("const {} = {}", name, value);
        Ok(cursor)
    }

    fn data_address(&self) -> u32 {
        DATA_OFFSET + self.data.len() as u32
    }

    fn parse_var<'a>(&mut self, cursor: Cursor<'a>) -> Result<Cursor<'a>, AsmError> {
        let (cursor, name) = self.name(cursor)?;
        let (cursor, value) = self.const_or_literal(cursor)?;
        let address = self.data_address();
        self.symbols.define(&name, address, SymbolKind::Var)?;
        debug!("var {} at {} = {}", name, address, value);
        self.data.push(value as u32);
        Ok(cursor)
    }

    fn parse_array<'a>(&mut self, cursor: Cursor<'a>) -> Result<Cursor<'a>, AsmError> {
        let (cursor, name) = self.name(cursor)?;

        let cursor = match_whitespace(cursor)
            .eat('[')
            .ok_or(AsmError::ExpectedOpenBracket)?;
        let (cursor, len) = self.const_or_literal(cursor)?;
        let cursor = match_whitespace(cursor)
            .eat(']')
            .ok_or(AsmError::ExpectedCloseBracket)?;

        if len <= 0 {
            return Err(AsmError::ExpectedNonZero);
        }
        if len > MAX_ARRAY_LEN {
            return Err(AsmError::OutOfRange16);
        }
        let len = len as usize;

        let mut values = Vec::new();
        let mut cursor = match_whitespace(cursor);
        if let Some(mut inner) = cursor.eat('{') {
            loop {
                inner = match_whitespace(inner);
                if let Some(closed) = inner.eat('}') {
                    cursor = closed;
                    break;
                }
                if inner.statement().is_empty() {
                    return Err(AsmError::ExpectedCloseBrace);
                }
                let (after, value) = self.const_or_literal(inner)?;
                values.push(value as u32);
                inner = match_whitespace(after);
                if let Some(after_comma) = inner.eat(',') {
                    inner = after_comma;
                }
            }
        } else if !cursor.statement().is_empty() {
            return Err(AsmError::ExpectedOpenBrace);
        }

        if values.len() > len {
            return Err(AsmError::TooManyValues);
        }
        values.resize(len, 0);

        let address = self.data_address();
        self.symbols.define(&name, address, SymbolKind::Var)?;
        debug!("array {}[{}] at {}", name, len, address);
        self.data.extend(values);
        Ok(cursor)
    }

    /// The comment on the directive's line and any comment-only lines
    /// right after it, one line each.
    fn parse_metadata<'a>(&self, cursor: Cursor<'a>) -> MatchResult<'a, String> {
        let mut cursor = match_whitespace(cursor);
        if !cursor.statement().is_empty() {
            return Err(AsmError::TooManyArguments);
        }

        let mut parts = Vec::new();
        if let Ok((after, text)) = match_comment(cursor) {
            parts.push(text.to_string());
            cursor = after;
        }

        while let Ok((next, _)) = match_newline(cursor) {
            match match_comment(next) {
                Ok((after, text)) => {
                    parts.push(text.to_string());
                    cursor = after;
                }
                Err(_) => break,
            }
        }

        if parts.is_empty() {
            return Err(AsmError::ExpectedComment);
        }
        Ok((cursor, parts.join("\n")))
    }

    fn macro_header<'a>(&self, cursor: Cursor<'a>) -> MatchResult<'a, (String, usize)> {
        let (cursor, name) = self.name(cursor)?;
        let cursor = match_whitespace(cursor);

        let (cursor, arg_count) = if let Some(inner) = cursor.eat('[') {
            let (inner, count) = require(
                match_literal(match_whitespace(inner)),
                AsmError::ExpectedLiteral,
            )?;
            let inner = match_whitespace(inner)
                .eat(']')
                .ok_or(AsmError::ExpectedCloseBracket)?;
            (inner, count)
        } else {
            match optional(match_literal(cursor))? {
                Some(found) => found,
                None => (cursor, 0),
            }
        };

        if arg_count < 0 {
            return Err(AsmError::OutOfRange8);
        }
        let cursor = match_end_of_statement(cursor)?;
        Ok((cursor, (name, arg_count as usize)))
    }

    /// Body lines start with `. ` or `.\t` after indentation.
    fn macro_body<'a>(cursor: Cursor<'a>) -> (Cursor<'a>, Vec<String>) {
        let mut cursor = cursor;
        let mut body = Vec::new();

        while let Ok((next, _)) = match_newline(cursor) {
            let rest = next.rest();
            if !(rest.starts_with(". ") || rest.starts_with(".\t")) {
                break;
            }
            let line = next.advance(2);
            body.push(line.statement().trim().to_string());
            cursor = match_error(line);
        }

        (cursor, body)
    }

    /// Always consumes the body, even when the header is broken, so the body
    /// lines don't turn into errors of their own.
    fn parse_macro<'a>(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let line = cursor.line();
        let header = self.macro_header(cursor);
        let after_header = match &header {
            Ok((after, _)) => *after,
            Err(_) => match_error(cursor),
        };
        let (end, body) = Self::macro_body(after_header);

        let (name, arg_count) = match header {
            Ok((_, header)) => header,
            Err(error) => {
                self.error(line, error);
                return end;
            }
        };

        if body.is_empty() {
            self.error(line, AsmError::ExpectedMacro(name));
            return end;
        }

        if let Err(error) = self
            .symbols
            .define(&name, arg_count as u32, SymbolKind::Macro)
        {
            self.error(line, error);
            return end;
        }

        match self.macros.register(&name, arg_count, body) {
            Ok(registered) => debug!(
                "macro {} ({} args) expands to {} words",
                registered.name,
                registered.arg_count,
                registered.expanded_len()
            ),
            Err(error) => self.error(line, error),
        }
        end
    }
}
