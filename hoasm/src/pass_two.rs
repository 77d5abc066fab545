use hodbg::Hdb;
use libhorizon::op::{Instruction, Opcode, Operand};
use log::debug;

use crate::{
    constants::DATA_OFFSET,
    encoder::encode,
    error::{AsmError, Diagnostic},
    macros::split_args,
    matchers::fit16,
    pass_one::{PassOne, PendingLine},
    symbols::SymbolKind,
    Assembly,
};

/// Marks a word that failed to assemble.
pub const SENTINEL: i64 = -1;

struct PassTwo {
    code: Vec<i64>,
    diagnostics: Vec<Diagnostic>,
    debug: Hdb,
    pass_one: PassOne,
}

impl PassTwo {
    fn new(pass_one: PassOne) -> Self {
        let entry = DATA_OFFSET + pass_one.data.len() as u32 + pass_one.code_start as u32;
        let name = pass_one.name.clone().unwrap_or_default();
        let mut debug = Hdb::new(&name, entry);
        debug.description = pass_one.description.clone();

        Self {
            code: Vec::new(),
            diagnostics: Vec::new(),
            debug,
            pass_one,
        }
    }

    fn header(&mut self) {
        let entry = self.debug.entry;
        match fit16(i64::from(entry)) {
            Ok(target) => {
                let header = Instruction::Jump {
                    opcode: Opcode::JMP,
                    target: Operand::Immediate(target),
                };
                self.code.push(i64::from(header.encode()));
            }
            Err(error) => {
                self.diagnostics.push(Diagnostic { line: 0, error });
                self.code.push(SENTINEL);
            }
        }
    }

    /// The leaf instruction lines a pending line stands for.
    fn expand(&self, line: &PendingLine) -> Result<Vec<String>, AsmError> {
        let (name, rest) = match line.text.find(char::is_whitespace) {
            Some(idx) => line.text.split_at(idx),
            None => (line.text.as_str(), ""),
        };
        match self.pass_one.macros.get(name) {
            Some(_) => self.pass_one.macros.expand(name, &split_args(rest)),
            None => Ok(vec![line.text.clone()]),
        }
    }

    fn assemble_line(&mut self, line: &PendingLine) {
        let start = self.code.len();

        match self.expand(line) {
            Ok(leaves) => {
                for leaf in leaves {
                    let address = self.code.len() as u32;
                    match encode(&leaf, &self.pass_one.symbols) {
                        Ok(word) => {
                            self.code.push(i64::from(word));
                            self.debug.add_word(address, line.line_number, leaf);
                        }
                        Err(error) => {
                            self.diagnostics.push(Diagnostic {
                                line: line.line_number,
                                error,
                            });
                            self.code.push(SENTINEL);
                        }
                    }
                }
            }
            Err(error) => self.diagnostics.push(Diagnostic {
                line: line.line_number,
                error,
            }),
        }

        // keep later addresses where pass one put them
        self.code.resize(start + line.size, SENTINEL);
    }

    fn assemble(mut self) -> Assembly {
        self.header();
        self.code
            .extend(self.pass_one.data.iter().map(|value| i64::from(*value)));

        let lines = std::mem::take(&mut self.pass_one.lines);
        for line in &lines {
            self.assemble_line(line);
        }

        for label in self.pass_one.symbols.of_kind(SymbolKind::Label) {
            self.debug.add_label(&label.name, label.value);
        }

        debug!(
            "assembled {} words with {} errors",
            self.code.len(),
            self.pass_one.diagnostics.len() + self.diagnostics.len()
        );

        let mut diagnostics = self.pass_one.diagnostics;
        diagnostics.extend(self.diagnostics);
        diagnostics.sort_by_key(|diagnostic| diagnostic.line);

        Assembly {
            code: self.code,
            entry: self.debug.entry,
            symbols: self.pass_one.symbols,
            diagnostics,
            name: self.pass_one.name,
            description: self.pass_one.description,
            debug: self.debug,
        }
    }
}

pub fn pass_two(pass_one: PassOne) -> Assembly {
    PassTwo::new(pass_one).assemble()
}
