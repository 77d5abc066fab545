use indexmap::IndexMap;

use crate::error::AsmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Const,
    Var,
    Macro,
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub value: u32,
}

/// Every name in the program, in definition order. Names are stored
/// uppercased.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: IndexMap::new(),
        }
    }

    /// The first definition wins.
    pub fn define(&mut self, name: &str, value: u32, kind: SymbolKind) -> Result<(), AsmError> {
        let name = name.to_ascii_uppercase();
        if self.symbols.contains_key(&name) {
            return Err(AsmError::RedefinedIdentifier(name));
        }
        self.symbols.insert(name.clone(), Symbol { name, kind, value });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(&name.to_ascii_uppercase())
    }

    /// Shifts every label by `offset`.
    pub fn relocate_labels(&mut self, offset: u32) {
        for symbol in self.symbols.values_mut() {
            if symbol.kind == SymbolKind::Label {
                symbol.value += offset;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &Symbol> {
        self.iter().filter(move |symbol| symbol.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
