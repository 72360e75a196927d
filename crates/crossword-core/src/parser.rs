//! Puzzle file reader.
//!
//! ```text
//! >> "Name" "Description"
//!
//! // entries: (word, "clue", DIRECTION, row, col)
//! (cat, "Feline pet", DOWN, 0, 1)
//! ```
//!
//! Strings escape `\\`, `\n`, `\r` and `\t`. `//` comments and blank space
//! are allowed between tokens; newlines are also allowed inside entries.

use crate::error::{Error, Result};
use crate::puzzle::{Direction, Entry, Puzzle};

/// Parses one puzzle file. The id is the file stem, supplied by the caller.
pub fn parse_puzzle(id: &str, src: &str) -> Result<Puzzle> {
    let mut s = Scanner::new(src);
    s.skip_trivia(true);
    s.expect_str(">>")?;
    s.skip_trivia(false);
    let name = s.parse_string()?;
    s.skip_trivia(false);
    let description = s.parse_string()?;
    let newlines = s.skip_trivia(true);
    if !s.at_end() && newlines == 0 {
        return Err(s.err("expected newline after header"));
    }

    let mut entries = Vec::new();
    while !s.at_end() {
        entries.push(s.parse_entry()?);
        s.skip_trivia(true);
    }
    Puzzle::new(id, &name, &description, entries)
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Scanner<'a> {
        Scanner { src, pos: 0, line: 1 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos == self.src.len()
    }

    fn err(&self, msg: impl Into<String>) -> Error {
        Error::Parse {
            line: self.line,
            msg: msg.into(),
        }
    }

    /// Skips spaces, tabs, carriage returns and `//` comments; newlines too
    /// when allowed. Returns how many newlines went by.
    fn skip_trivia(&mut self, newlines: bool) -> usize {
        let mut seen = 0;
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.bump();
                }
                Some('\n') if newlines => {
                    self.bump();
                    seen += 1;
                }
                Some('/') if self.rest().starts_with("//") => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return seen,
            }
        }
    }

    fn expect_str(&mut self, expected: &str) -> Result<()> {
        if self.rest().starts_with(expected) {
            for _ in expected.chars() {
                self.bump();
            }
            Ok(())
        } else {
            Err(self.err(format!("expected {expected:?}")))
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!("expected {expected:?}")))
        }
    }

    /// Field separator inside an entry: trivia, a comma, more trivia.
    fn separator(&mut self) -> Result<()> {
        self.skip_trivia(true);
        self.expect_char(',')?;
        self.skip_trivia(true);
        Ok(())
    }

    fn parse_string(&mut self) -> Result<String> {
        self.expect_char('"')
            .map_err(|_| self.err("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    other => {
                        return Err(self.err(format!("invalid escape {other:?}")));
                    }
                },
                Some('\n' | '\r') => return Err(self.err("newline in string")),
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_word_name(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_lowercase() || c == '-' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if out.is_empty() {
            Err(self.err("expected word name"))
        } else {
            Ok(out)
        }
    }

    fn parse_number(&mut self) -> Result<usize> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        digits
            .parse()
            .map_err(|_| self.err("expected a number"))
    }

    fn parse_direction(&mut self) -> Result<Direction> {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_uppercase() {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word.parse()
            .map_err(|_| self.err(format!("expected ACROSS or DOWN, found {word:?}")))
    }

    fn parse_entry(&mut self) -> Result<Entry> {
        self.expect_char('(')?;
        self.skip_trivia(true);
        let word = self.parse_word_name()?;
        self.separator()?;
        let clue = self.parse_string()?;
        self.separator()?;
        let direction = self.parse_direction()?;
        self.separator()?;
        let row = self.parse_number()?;
        self.separator()?;
        let col = self.parse_number()?;
        self.skip_trivia(true);
        self.expect_char(')')?;
        Entry::new(&word, &clue, direction, row, col).map_err(|e| self.err(e.to_string()))
    }
}
