use std::fmt::{self, Display};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// Not this alternative; the caller tries the next one.
    #[error("no match")]
    NoMatch,
    #[error("value does not fit in 8 bits")]
    OutOfRange8,
    #[error("value does not fit in 16 bits")]
    OutOfRange16,
    #[error("value does not fit in 32 bits")]
    OutOfRange32,
    #[error("unexpected end of line")]
    UnexpectedNewline,
    #[error("unexpected end of input")]
    EndOfInput,

    #[error("identifier is longer than 255 characters")]
    IdentifierTooLong,
    #[error("{0} is a reserved word")]
    ReservedWord(String),
    #[error("{0} is already defined")]
    RedefinedIdentifier(String),
    #[error("expected an identifier")]
    ExpectedIdentifier,
    #[error("{0} is not defined")]
    UndefinedIdentifier(String),

    #[error("expected a literal")]
    ExpectedLiteral,
    #[error("expected a constant or a literal")]
    ExpectedConstOrLiteral,
    #[error("data must be declared before the first instruction")]
    IllegalDataDirective,
    #[error("expected a non-zero length")]
    ExpectedNonZero,
    #[error("too many values for the array")]
    TooManyValues,
    #[error("expected '['")]
    ExpectedOpenBracket,
    #[error("expected ']'")]
    ExpectedCloseBracket,
    #[error("expected '{{'")]
    ExpectedOpenBrace,
    #[error("expected '}}'")]
    ExpectedCloseBrace,
    #[error("too few arguments")]
    TooFewArguments,
    #[error("too many arguments")]
    TooManyArguments,
    #[error("expected a register")]
    ExpectedRegister,
    #[error("expected an immediate")]
    ExpectedImmediate,
    #[error("expected a comment")]
    ExpectedComment,

    #[error("unknown instruction {0}")]
    UnknownInstruction(String),
    #[error("unknown directive {0}")]
    UnknownDirective(String),
    #[error("macro {0} has no body")]
    ExpectedMacro(String),
    #[error("macro {0} nests too deeply")]
    MacroDepthExceeded(String),
}

/// A statement that failed to assemble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub error: AsmError,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}
