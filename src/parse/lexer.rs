//! The lexer: a byte cursor over the source buffer.
//!
//! No token list is ever materialized. Callers probe with `match_` /
//! `matchx` / `peek` and the cursor only advances on success, so all
//! rollback is implicit; there is no putback mechanism.

/// Whitespace is any byte at or below space; this covers tab, newline and
/// carriage return.
fn is_whitespace(b: u8) -> bool {
    b <= b' '
}

fn is_id_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_id_letter(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_punctuation(b: u8) -> bool {
    b"=;[]<>()+-/*".contains(&b)
}

/// Reserved words that may not be used as identifiers.
pub fn is_keyword(s: &str) -> bool {
    matches!(
        s,
        "break"
            | "continue"
            | "else"
            | "false"
            | "if"
            | "int"
            | "new"
            | "null"
            | "return"
            | "struct"
            | "true"
            | "while"
    )
}

pub struct Lexer<'s> {
    input: &'s [u8],
    position: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Lexer {
            input: source.as_bytes(),
            position: 0,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek_byte().is_some_and(is_whitespace) {
            self.position += 1;
        }
    }

    /// True, advancing past `syntax`, if it is next after whitespace.
    /// False without moving the cursor otherwise.
    pub fn match_(&mut self, syntax: &str) -> bool {
        self.skip_whitespace();
        let s = syntax.as_bytes();
        if self.input[self.position..].starts_with(s) {
            self.position += s.len();
            true
        } else {
            false
        }
    }

    /// `match_`, and additionally the match must not be followed by an
    /// identifier letter. Keywords use this so `if` does not match `iffy`.
    pub fn matchx(&mut self, syntax: &str) -> bool {
        if !self.match_(syntax) {
            return false;
        }
        if !self.peek_byte().is_some_and(is_id_letter) {
            return true;
        }
        self.position -= syntax.len();
        false
    }

    /// True, without advancing, if `ch` is next after whitespace.
    pub fn peek(&mut self, ch: u8) -> bool {
        self.skip_whitespace();
        self.peek_byte() == Some(ch)
    }

    pub fn peek_is_id(&mut self) -> bool {
        self.skip_whitespace();
        self.peek_byte().is_some_and(is_id_start)
    }

    pub fn is_number(&mut self) -> bool {
        self.skip_whitespace();
        self.peek_byte().is_some_and(|b| b.is_ascii_digit())
    }

    /// The maximal identifier run, or None if the next byte does not start
    /// an identifier.
    pub fn match_id(&mut self) -> Option<&'s str> {
        if self.peek_is_id() {
            Some(self.parse_id())
        } else {
            None
        }
    }

    fn parse_id(&mut self) -> &'s str {
        let start = self.position;
        while self.peek_byte().is_some_and(is_id_letter) {
            self.position += 1;
        }
        // Identifier bytes are ASCII, so the slice is valid UTF-8.
        std::str::from_utf8(&self.input[start..self.position]).expect("ascii identifier")
    }

    /// Decimal integer literal. Leading zeros are rejected: `0` is the only
    /// literal that may start with `0`.
    pub fn parse_number(&mut self) -> Result<i64, String> {
        self.skip_whitespace();
        let start = self.position;
        while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
            self.position += 1;
        }
        let digits = std::str::from_utf8(&self.input[start..self.position]).expect("ascii digits");
        if digits.len() > 1 && digits.starts_with('0') {
            return Err("Syntax error: integer values cannot start with '0'".to_string());
        }
        digits
            .parse()
            .map_err(|_| format!("Syntax error: integer literal '{digits}' out of range"))
    }

    /// Best-effort token for error messages.
    pub fn get_any_next_token(&mut self) -> &'s str {
        self.skip_whitespace();
        match self.peek_byte() {
            None => "",
            Some(b) if is_id_start(b) => {
                let save = self.position;
                let id = self.parse_id();
                self.position = save;
                id
            }
            Some(b) if is_punctuation(b) => {
                std::str::from_utf8(&self.input[self.position..self.position + 1])
                    .expect("ascii punctuation")
            }
            Some(_) => {
                // Any other byte: show it as-is if it is a UTF-8 boundary,
                // otherwise fall back to an empty slice.
                let rest = &self.input[self.position..];
                let len = (1..=rest.len().min(4))
                    .find(|&l| std::str::from_utf8(&rest[..l]).is_ok())
                    .unwrap_or(0);
                std::str::from_utf8(&rest[..len]).unwrap_or("")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_does_not_advance_on_failure() {
        let mut lexer = Lexer::new("  while (");
        assert!(!lexer.match_("if"));
        assert!(lexer.matchx("while"));
        assert!(lexer.match_("("));
        assert!(lexer.is_eof());
    }

    #[test]
    fn matchx_rejects_longer_identifiers() {
        let mut lexer = Lexer::new("iffy");
        assert!(!lexer.matchx("if"));
        assert_eq!(lexer.match_id(), Some("iffy"));
    }

    #[test]
    fn numbers() {
        let mut lexer = Lexer::new("0 12 034");
        assert_eq!(lexer.parse_number(), Ok(0));
        assert_eq!(lexer.parse_number(), Ok(12));
        assert!(lexer.parse_number().is_err());
    }

    #[test]
    fn identifiers_and_keywords() {
        let mut lexer = Lexer::new("_x1 int");
        assert_eq!(lexer.match_id(), Some("_x1"));
        assert!(!is_keyword("_x1"));
        let id = lexer.match_id().unwrap();
        assert!(is_keyword(id));
    }
}
