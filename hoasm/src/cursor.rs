/// Position in the source text. Matchers take one by value and hand back an
/// advanced copy, so a failed match leaves the caller's cursor where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Cursor {
            text,
            pos: 0,
            line: 1,
        }
    }

    pub fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn advance(self, len: usize) -> Self {
        let len = len.min(self.text.len() - self.pos);
        let consumed = &self.text[self.pos..self.pos + len];
        Cursor {
            text: self.text,
            pos: self.pos + len,
            line: self.line + consumed.matches('\n').count(),
        }
    }

    /// Consumes `c` if it is next.
    pub fn eat(self, c: char) -> Option<Self> {
        if self.peek() == Some(c) {
            Some(self.advance(c.len_utf8()))
        } else {
            None
        }
    }

    /// Text up to the end of the line.
    pub fn current_line(&self) -> &'a str {
        let rest = self.rest();
        rest.split('\n').next().unwrap_or(rest)
    }

    /// Text up to a comment or the end of the line.
    pub fn statement(&self) -> &'a str {
        let line = self.current_line();
        line.split(';').next().unwrap_or(line)
    }
}
