use indexmap::IndexMap;
use regex::Captures;

use crate::{
    constants::{placeholder_regex, MAX_MACRO_DEPTH},
    error::AsmError,
};

const BUILTINS: &[(&str, usize, &[&str])] = &[
    ("HALT", 0, &["JMP PC"]),
    ("RESET", 0, &["JMP #0"]),
    ("CMP", 2, &["SUBS NIL $1 $2"]),
    ("INC", 1, &["ADD $1 $1 #1"]),
    ("INCS", 1, &["ADDS $1 $1 #1"]),
    ("DEC", 1, &["SUB $1 $1 #1"]),
    ("DECS", 1, &["SUBS $1 $1 #1"]),
    ("CALL", 1, &["ADD LR PC #2", "JMP $1"]),
    ("RETURN", 0, &["JMP LR"]),
    ("MOV", 2, &["ADD $1 NIL $2"]),
    ("MOVS", 2, &["ADDS $1 NIL $2"]),
    ("MOV16", 2, &["PUSH $2", "POP $1"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub arg_count: usize,
    pub body: Vec<String>,
    expanded_len: usize,
    depth: usize,
}

impl Macro {
    /// Instruction words one invocation produces.
    pub fn expanded_len(&self) -> usize {
        self.expanded_len
    }
}

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: IndexMap<String, Macro>,
}

/// Operands of an invocation: whitespace or comma separated tokens.
pub fn split_args(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|arg| !arg.is_empty())
        .map(|arg| arg.to_string())
        .collect()
}

fn substitute(line: &str, args: &[String]) -> String {
    placeholder_regex()
        .replace_all(line, |captures: &Captures| {
            captures[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| args.get(idx))
                .cloned()
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

fn first_word(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], &line[idx..]),
        None => (line, ""),
    }
}

impl MacroTable {
    pub fn new() -> Self {
        Self {
            macros: IndexMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for (name, arg_count, body) in BUILTINS {
            table.macros.insert(
                name.to_string(),
                Macro {
                    name: name.to_string(),
                    arg_count: *arg_count,
                    body: body.iter().map(|line| line.to_string()).collect(),
                    expanded_len: body.len(),
                    depth: 1,
                },
            );
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(&name.to_ascii_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.values()
    }

    /// A macro defined before position `before` that `line` invokes.
    fn nested(&self, line: &str, before: usize) -> Option<&Macro> {
        let (name, _) = first_word(line);
        self.macros
            .get_full(&name.to_ascii_uppercase())
            .filter(|(idx, _, _)| *idx < before)
            .map(|(_, _, m)| m)
    }

    /// Adds a macro and works out how many words it expands to. Body lines
    /// only expand macros that already exist, so definitions can't recurse.
    pub fn register(
        &mut self,
        name: &str,
        arg_count: usize,
        body: Vec<String>,
    ) -> Result<&Macro, AsmError> {
        let name = name.to_ascii_uppercase();
        let position = self.macros.len();

        let mut expanded_len = 0;
        let mut depth = 1;
        for line in &body {
            match self.nested(line, position) {
                Some(inner) => {
                    expanded_len += inner.expanded_len;
                    depth = depth.max(inner.depth + 1);
                }
                None => expanded_len += 1,
            }
        }

        if depth > MAX_MACRO_DEPTH {
            return Err(AsmError::MacroDepthExceeded(name));
        }

        let entry = self.macros.entry(name.clone()).or_insert(Macro {
            name,
            arg_count,
            body,
            expanded_len,
            depth,
        });
        Ok(entry)
    }

    /// The instruction lines an invocation turns into, nested macros
    /// included.
    pub fn expand(&self, name: &str, args: &[String]) -> Result<Vec<String>, AsmError> {
        let name = name.to_ascii_uppercase();
        let (position, _, found) = self
            .macros
            .get_full(&name)
            .ok_or_else(|| AsmError::UnknownInstruction(name.clone()))?;

        if args.len() < found.arg_count {
            return Err(AsmError::TooFewArguments);
        }
        if args.len() > found.arg_count {
            return Err(AsmError::TooManyArguments);
        }

        let mut lines = Vec::with_capacity(found.expanded_len);
        for line in &found.body {
            let line = substitute(line, args);
            match self.nested(&line, position) {
                Some(inner) => {
                    let (_, rest) = first_word(&line);
                    lines.extend(self.expand(&inner.name, &split_args(rest))?);
                }
                None => lines.push(line),
            }
        }
        Ok(lines)
    }
}
