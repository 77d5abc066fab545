use strum::EnumString;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, EnumString, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    CONST,
    VAR,
    ARRAY,
    START,
    NAME,
    DESC,
    MACRO,
}

impl Directive {
    /// Data directives reserve words ahead of the code, so they have to
    /// come before it.
    pub fn is_data(&self) -> bool {
        matches!(self, Directive::VAR | Directive::ARRAY)
    }
}
