use anyhow::{bail, Context, Result};
use hodbg::Hdb;
use libhorizon::Word;

use pass_one::FirstPass;
use pass_two::pass_two;

pub mod constants;
pub mod cursor;
pub mod directive;
pub mod encoder;
pub mod error;
pub mod macros;
pub mod matchers;
pub mod pass_one;
pub mod pass_two;
pub mod symbols;

pub use error::{AsmError, Diagnostic};
pub use pass_two::SENTINEL;
pub use symbols::{Symbol, SymbolKind, SymbolTable};

/// Everything the assembler produced, errors included.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Header jump, data, then code. Words that failed to assemble are
    /// `SENTINEL`.
    pub code: Vec<i64>,
    /// Address of the first instruction executed.
    pub entry: u32,
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub debug: Hdb,
}

impl Assembly {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The machine words, if nothing went wrong.
    pub fn words(&self) -> Result<Vec<Word>> {
        if !self.is_ok() {
            let report = self
                .diagnostics
                .iter()
                .map(|diagnostic| diagnostic.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            bail!("{} errors\n{}", self.diagnostics.len(), report);
        }
        Ok(self.code.iter().map(|word| *word as Word).collect())
    }
}

/// Uppercases everything outside comments and drops carriage returns.
pub fn normalize(source: &str) -> String {
    source
        .split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            match line.find(';') {
                Some(idx) => format!("{}{}", line[..idx].to_ascii_uppercase(), &line[idx..]),
                None => line.to_ascii_uppercase(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assemble a Horizon program from text. Never fails; problems are listed
/// in `Assembly::diagnostics`.
pub fn assemble(program_text: &str) -> Assembly {
    let source = normalize(program_text);
    pass_two(FirstPass::parse(&source))
}

/// Assemble a Horizon program from text.
///
/// # Errors
///
/// If there's an error in the assembly code
pub fn assemble_program(program_text: &str) -> Result<Vec<Word>> {
    assemble(program_text).words()
}

pub fn assemble_with_debug(program_text: &str) -> Result<(Vec<Word>, String)> {
    let assembly = assemble(program_text);
    let words = assembly.words()?;
    let debug = assembly
        .debug
        .to_json()
        .context("Couldn't serialize debug symbols")?;
    Ok((words, debug))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalizes_outside_comments() {
        assert_eq!(
            normalize("loop: add r1 r1 #1 ; Keep Case\r\n.name ; Mine"),
            "LOOP: ADD R1 R1 #1 ; Keep Case\n.NAME ; Mine"
        );
    }

    #[test]
    fn words_refuses_errors() {
        let assembly = assemble("FROB\nNOOP\n");
        assert_eq!(assembly.code, vec![0xAA00_0001, 0x2B00_0000]);
        assert!(!assembly.is_ok());

        let err = assembly.words().unwrap_err().to_string();
        assert!(err.starts_with("1 errors"), "{}", err);
    }
}
