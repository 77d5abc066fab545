use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
pub use serde_json::Error;

/// One emitted instruction word and the source it came from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HdbLine {
    pub address: u32,
    pub line_number: usize,
    pub text: String,
}

/// Debug symbols for an assembled Horizon program.
///
/// Every emitted instruction word maps back to the source line it came from.
/// Words produced by a macro expansion carry the expanded text but the line
/// number of the invocation.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Hdb {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Address of the first instruction executed.
    pub entry: u32,
    pub words: Vec<HdbLine>,
    pub labels: BTreeMap<String, u32>,
    #[serde(skip)]
    by_address: HashMap<u32, usize>,
}

impl Hdb {
    pub fn new(name: &str, entry: u32) -> Self {
        Hdb {
            name: name.into(),
            entry,
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self)
    }

    /// The address index isn't stored, so it's rebuilt here.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let mut hdb: Hdb = serde_json::from_str(json)?;
        hdb.by_address = hdb
            .words
            .iter()
            .enumerate()
            .map(|(idx, word)| (word.address, idx))
            .collect();
        Ok(hdb)
    }

    pub fn add_label(&mut self, label: &str, address: u32) {
        self.labels.insert(label.to_ascii_uppercase(), address);
    }

    /// Records the source of the word at `address`. A later word at the same
    /// address replaces the earlier one.
    pub fn add_word(&mut self, address: u32, line_number: usize, text: impl Into<String>) {
        let word = HdbLine {
            address,
            line_number,
            text: text.into(),
        };
        match self.by_address.get(&address) {
            Some(&idx) => self.words[idx] = word,
            None => {
                self.by_address.insert(address, self.words.len());
                self.words.push(word);
            }
        }
    }

    pub fn line_at(&self, address: u32) -> Option<&HdbLine> {
        self.by_address
            .get(&address)
            .and_then(|idx| self.words.get(*idx))
    }

    pub fn address_for_label(&self, label: &str) -> Option<u32> {
        self.labels.get(&label.to_ascii_uppercase()).copied()
    }

    /// First label, alphabetically, that points at `address`.
    pub fn label_at(&self, address: u32) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, at)| **at == address)
            .map(|(label, _)| label.as_str())
    }
}
