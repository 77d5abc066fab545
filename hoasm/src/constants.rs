use libhorizon::op::{Opcode, Register};
use once_cell::sync::OnceCell;
use regex::Regex;

pub const IDENT_MAX_LEN: usize = 255;
/// Words before the data region: the header jump.
pub const DATA_OFFSET: u32 = 1;
pub const MAX_MACRO_DEPTH: usize = 16;

static WORD_REGEX: OnceCell<Regex> = OnceCell::new();
static LITERAL_REGEX: OnceCell<Regex> = OnceCell::new();
static REGISTER_REGEX: OnceCell<Regex> = OnceCell::new();
static PLACEHOLDER_REGEX: OnceCell<Regex> = OnceCell::new();

pub fn word_regex() -> &'static Regex {
    WORD_REGEX.get_or_init(|| Regex::new(r"^(?i)[A-Z_][A-Z0-9_]*").expect("Invalid word regex"))
}

pub fn literal_regex() -> &'static Regex {
    LITERAL_REGEX.get_or_init(|| {
        Regex::new(r"^(?i)(?P<sign>-)?(?:0X(?P<hex>[0-9A-F]+)|0B(?P<bin>[01]+)|(?P<dec>[0-9]+))")
            .expect("Invalid literal regex")
    })
}

pub fn register_regex() -> &'static Regex {
    REGISTER_REGEX.get_or_init(|| {
        Regex::new(r"^(?i)(?:R1[01]|R[0-9]|AR|SP|LR|PC|NIL)\b").expect("Invalid register regex")
    })
}

pub fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"\$([0-9]+)").expect("Invalid placeholder regex"))
}

/// Mnemonics and register names can't be used as identifiers.
pub fn is_reserved(word: &str) -> bool {
    let word = word.to_ascii_uppercase();
    word.parse::<Opcode>().is_ok() || word.parse::<Register>().is_ok()
}
